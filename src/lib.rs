//!
//! This crate contains the audio transforms used by remote desktop audio channels:
//!  - [MS ADPCM](https://wiki.multimedia.cx/index.php/Microsoft_ADPCM) (wav format 0x0002)
//!  - [IMA / DVI ADPCM](https://wiki.multimedia.cx/index.php/Microsoft_IMA_ADPCM)
//!    (wav format 0x0011)
//!  - PCM pass-through and nearest-neighbor resampling
//!
//! The transforms are driven through a [`DspContext`], which is created in either encoder or
//! decoder mode, reset with a target [`AudioFormat`] and then fed chunks of compressed or
//! PCM data. An external codec library can be plugged in through [`BackendContext`], which
//! offers the same [`Dsp`] capability.
//!

#![no_std]

#![forbid(
    unsafe_code,
    clippy::panic,
    clippy::exit,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unimplemented,
    clippy::todo,
    clippy::unreachable,
)]
#![deny(
    clippy::cast_ptr_alignment,
    clippy::char_lit_as_u8,
    clippy::unnecessary_cast,
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::checked_conversions,
)]
#![allow(clippy::manual_range_contains)]

extern crate alloc;

use alloc::string::String;

mod format;
pub use format::{AudioFormat, WaveFormatTag};

mod registry;
pub use registry::{backend_codec_id, supports_format, BackendCodecId};

mod adpcm_ima;
pub use adpcm_ima::AdpcmImaState;
pub use adpcm_ima::{decode_adpcm_ima, decode_adpcm_ima_blocks};
pub use adpcm_ima::{encode_adpcm_ima, encode_adpcm_ima_blocks};

mod adpcm_ms;
pub use adpcm_ms::AdpcmMsState;
pub use adpcm_ms::{decode_adpcm_ms, decode_adpcm_ms_blocks};
pub use adpcm_ms::{encode_adpcm_ms, encode_adpcm_ms_blocks};

mod resample;
pub use resample::{resample, resampled_frames, PcmLayout};

mod context;
pub use context::{AdpcmState, Dsp, DspContext, Mode};

mod backend;
pub use backend::{duration_ms, BackendContext, BackendSession, CodecBackend, DecodedAudio};

/// Error values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The format tag / bit depth combination isn't handled by any codec path.
    #[error("unsupported format: tag {tag:#06x}, {bits_per_sample} bits per sample")]
    UnsupportedFormat { tag: u16, bits_per_sample: u16 },

    /// Invalid number of channels.
    #[error("invalid channel count: {0}")]
    InvalidChannels(u16),

    /// Block alignment is too small for the block header or doesn't fit the block layout.
    #[error("invalid block alignment {block_align} (minimum {min})")]
    InvalidBlockAlign { block_align: u16, min: u16 },

    /// Output buffer couldn't grow.
    #[error("output buffer allocation failed")]
    AllocationFailure,

    /// A transform was called before the context was reset with a format.
    #[error("context has not been reset with a format")]
    NotInitialized,

    /// The context was created for the other direction.
    #[error("context is not in {expected:?} mode")]
    WrongMode { expected: Mode },

    /// Input data is truncated or misaligned.
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),

    /// Failure reported by an external codec backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type used by this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Reserves room for `additional` bytes in `out`, mapping allocation failure to an error.
pub(crate) fn reserve(out: &mut alloc::vec::Vec<u8>, additional: usize) -> Result<()> {
    out.try_reserve(additional).map_err(|_| Error::AllocationFailure)
}
