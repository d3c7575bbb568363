
use alloc::vec::Vec;

use crate::adpcm_ima::{decode_adpcm_ima_blocks, encode_adpcm_ima_blocks, AdpcmImaState};
use crate::adpcm_ms::{decode_adpcm_ms_blocks, encode_adpcm_ms_blocks, AdpcmMsState};
use crate::format::{AudioFormat, WaveFormatTag};
use crate::registry::supports_format;
use crate::resample::{resample, PcmLayout};
use crate::{reserve, Error, Result};

/// Direction of a context, fixed when the context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Encoder,
    Decoder,
}

/// Codec state held by a context, one item per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdpcmState {
    /// PCM pass-through keeps no state.
    None,
    Ima([AdpcmImaState; 2]),
    Ms([AdpcmMsState; 2]),
}

impl AdpcmState {
    /// Zeroed state for the codec used by `format`.
    pub fn for_format(format: &AudioFormat) -> AdpcmState {
        match format.tag {
            WaveFormatTag::DviAdpcm => AdpcmState::Ima([AdpcmImaState::new(); 2]),
            WaveFormatTag::Adpcm => AdpcmState::Ms([AdpcmMsState::new(); 2]),
            _ => AdpcmState::None,
        }
    }
}

/// Audio transform capability shared by the native engine and external codec backends.
///
/// A context is created for one [`Mode`], reset with a target format and then fed chunks
/// of data. Each call processes exactly the bytes given: every call starts on a block
/// boundary and partial blocks aren't carried over to the next call. ADPCM input to `decode`
/// must be a whole number of blocks.
///
/// Output is appended to `out`. If a call fails, `out` is left at its original length.
pub trait Dsp {
    /// Direction of this context.
    fn mode(&self) -> Mode;

    /// Target format set by the last successful [`reset`](Dsp::reset).
    fn format(&self) -> Option<&AudioFormat>;

    /// Returns true if [`reset`](Dsp::reset) would accept `format` in this context's mode.
    fn supports_format(&self, format: &AudioFormat) -> bool;

    /// Sets the target format and discards all codec state.
    fn reset(&mut self, format: &AudioFormat) -> Result<()>;

    /// Encodes `data`, PCM described by `src_format`, to the target format.
    fn encode(&mut self, src_format: &AudioFormat, data: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Decodes `data`, in the target format, to 16-bit PCM (or copies PCM as is).
    fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()>;
}

/// Native transform context for PCM, MS ADPCM and IMA ADPCM.
///
/// A context mutates its codec state on every call. Use one context per stream.
#[derive(Debug, Clone)]
pub struct DspContext {
    mode: Mode,
    format: Option<AudioFormat>,
    state: AdpcmState,
    scratch: Vec<u8>,
}

impl DspContext {
    /// Creates a context without a format. [`reset`](Dsp::reset) must be called before
    /// the first transform.
    pub fn new(mode: Mode) -> DspContext {
        log::debug!("creating {:?} context", mode);
        DspContext {
            mode,
            format: None,
            state: AdpcmState::None,
            scratch: Vec::new(),
        }
    }

    /// Current codec state.
    pub fn state(&self) -> &AdpcmState {
        &self.state
    }

    fn target(&self, expected: Mode) -> Result<AudioFormat> {
        if self.mode != expected {
            return Err(Error::WrongMode { expected });
        }
        self.format.ok_or(Error::NotInitialized)
    }
}

fn unsupported(format: &AudioFormat) -> Error {
    Error::UnsupportedFormat {
        tag: format.tag.to_u16(),
        bits_per_sample: format.bits_per_sample,
    }
}

fn copy_pcm(format: &AudioFormat, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let frame = format.bytes_per_frame().ok_or_else(|| unsupported(format))?;
    if frame == 0 {
        return Err(unsupported(format));
    }
    if data.len() % frame != 0 {
        return Err(Error::MalformedInput("PCM data isn't a whole number of frames"));
    }
    reserve(out, data.len())?;
    out.extend_from_slice(data);
    Ok(())
}

fn encode_with(format: &AudioFormat, state: &mut AdpcmState, pcm: &[u8], out: &mut Vec<u8>)
    -> Result<()> {

    let channels = usize::from(format.channels);
    let block_align = usize::from(format.block_align);
    match state {
        AdpcmState::None => copy_pcm(format, pcm, out),
        AdpcmState::Ima(states) => {
            let states = states.get_mut(..channels).ok_or(Error::InvalidChannels(format.channels))?;
            encode_adpcm_ima_blocks(pcm, block_align, states, out)
        }
        AdpcmState::Ms(states) => {
            let states = states.get_mut(..channels).ok_or(Error::InvalidChannels(format.channels))?;
            encode_adpcm_ms_blocks(pcm, block_align, states, out)
        }
    }
}

impl Dsp for DspContext {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    fn supports_format(&self, format: &AudioFormat) -> bool {
        supports_format(format, self.mode == Mode::Encoder)
    }

    fn reset(&mut self, format: &AudioFormat) -> Result<()> {
        if !self.supports_format(format) {
            return Err(unsupported(format));
        }
        log::debug!("{:?} context reset to {}, {} channels, {} Hz, block align {}",
            self.mode, format.tag, format.channels, format.sample_rate, format.block_align);
        self.format = Some(*format);
        self.state = AdpcmState::for_format(format);
        self.scratch.clear();
        Ok(())
    }

    fn encode(&mut self, src_format: &AudioFormat, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let format = self.target(Mode::Encoder)?;
        if src_format.tag != WaveFormatTag::Pcm {
            return Err(unsupported(src_format));
        }
        let bits = if format.tag == WaveFormatTag::Pcm { format.bits_per_sample } else { 16 };
        if src_format.bits_per_sample != bits {
            return Err(unsupported(src_format));
        }

        if src_format.channels == format.channels && src_format.sample_rate == format.sample_rate {
            return encode_with(&format, &mut self.state, data, out);
        }
        log::trace!("resampling {} channels at {} Hz to {} channels at {} Hz",
            src_format.channels, src_format.sample_rate, format.channels, format.sample_rate);
        self.scratch.clear();
        resample(data, usize::from(bits / 8),
            PcmLayout::new(src_format.channels, src_format.sample_rate),
            PcmLayout::new(format.channels, format.sample_rate),
            &mut self.scratch)?;
        encode_with(&format, &mut self.state, &self.scratch, out)
    }

    fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let format = self.target(Mode::Decoder)?;
        let channels = usize::from(format.channels);
        let block_align = usize::from(format.block_align);
        match &mut self.state {
            AdpcmState::None => copy_pcm(&format, data, out),
            AdpcmState::Ima(states) => {
                let states = states.get_mut(..channels)
                    .ok_or(Error::InvalidChannels(format.channels))?;
                decode_adpcm_ima_blocks(data, block_align, states, out)
            }
            AdpcmState::Ms(states) => {
                let states = states.get_mut(..channels)
                    .ok_or(Error::InvalidChannels(format.channels))?;
                decode_adpcm_ms_blocks(data, block_align, states, out)
            }
        }
    }
}
