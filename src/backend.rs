
use alloc::vec::Vec;

use crate::context::{Dsp, Mode};
use crate::format::AudioFormat;
use crate::registry::{backend_codec_id, BackendCodecId};
use crate::{Error, Result};

/// Summary of the PCM produced by one backend decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodedAudio {
    /// Samples written, counted over all channels.
    pub samples: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn duration_ms(&self) -> u32 {
        duration_ms(self.samples, self.sample_rate, self.channels)
    }
}

/// Playback duration in milliseconds, computed as `samples * 1000 / sample_rate / channels`
/// where `samples` counts all channels.
///
/// Returns 0 if `sample_rate` or `channels` is 0.
pub fn duration_ms(samples: usize, sample_rate: u32, channels: u16) -> u32 {
    if sample_rate == 0 || channels == 0 {
        return 0;
    }
    let ms = samples as u64 * 1000 / u64::from(sample_rate) / u64::from(channels);
    u32::try_from(ms).unwrap_or(u32::MAX)
}

/// An open decoder of an external codec library.
///
/// Dropping the session releases it.
pub trait BackendSession {
    /// Decodes one compressed packet, appending 16-bit interleaved PCM to `out`.
    fn decode(&mut self, packet: &[u8], out: &mut Vec<u8>) -> Result<DecodedAudio>;
}

/// An external codec library that can open decoder sessions.
pub trait CodecBackend {
    type Session: BackendSession;

    /// Returns true if the library has a decoder for `id`.
    fn supports(&self, id: BackendCodecId) -> bool;

    /// Opens a decoder for `id` that outputs PCM in the layout of `format`.
    fn open(&self, id: BackendCodecId, format: &AudioFormat) -> Result<Self::Session>;
}

/// Decode context backed by an external codec library.
///
/// Offers the same [`Dsp`] capability as [`DspContext`](crate::DspContext) but handles
/// any format the backend can decode. Encoding isn't available.
pub struct BackendContext<B: CodecBackend> {
    backend: B,
    mode: Mode,
    format: Option<AudioFormat>,
    session: Option<B::Session>,
    last_duration_ms: u32,
}

impl<B: CodecBackend> BackendContext<B> {
    pub fn new(backend: B, mode: Mode) -> BackendContext<B> {
        log::debug!("creating {:?} backend context", mode);
        BackendContext {
            backend,
            mode,
            format: None,
            session: None,
            last_duration_ms: 0,
        }
    }

    /// Duration of the audio produced by the last successful decode call.
    pub fn last_duration_ms(&self) -> u32 {
        self.last_duration_ms
    }

    /// Closes the current session. The context must be reset before it is used again.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            log::debug!("backend session closed");
        }
        self.format = None;
    }
}

impl<B: CodecBackend> Dsp for BackendContext<B> {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    fn supports_format(&self, format: &AudioFormat) -> bool {
        if self.mode != Mode::Decoder {
            return false;
        }
        backend_codec_id(format).is_some_and(|id| self.backend.supports(id))
    }

    fn reset(&mut self, format: &AudioFormat) -> Result<()> {
        let unsupported = Error::UnsupportedFormat {
            tag: format.tag.to_u16(),
            bits_per_sample: format.bits_per_sample,
        };
        if self.mode != Mode::Decoder {
            return Err(Error::WrongMode { expected: Mode::Decoder });
        }
        let id = match backend_codec_id(format) {
            Some(id) if self.backend.supports(id) => id,
            _ => return Err(unsupported),
        };
        self.close();
        self.session = Some(self.backend.open(id, format)?);
        self.format = Some(*format);
        self.last_duration_ms = 0;
        log::debug!("backend session opened for {} as {:?}", format.tag, id);
        Ok(())
    }

    fn encode(&mut self, _src_format: &AudioFormat, _data: &[u8], _out: &mut Vec<u8>)
        -> Result<()> {
        Err(Error::WrongMode { expected: Mode::Decoder })
    }

    fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if self.mode != Mode::Decoder {
            return Err(Error::WrongMode { expected: Mode::Decoder });
        }
        let session = self.session.as_mut().ok_or(Error::NotInitialized)?;
        let start_len = out.len();
        match session.decode(data, out) {
            Ok(decoded) => {
                self.last_duration_ms = decoded.duration_ms();
                log::trace!("backend decoded {} bytes to {} samples ({} ms)",
                    data.len(), decoded.samples, self.last_duration_ms);
                Ok(())
            }
            Err(err) => {
                log::error!("backend decode failed: {}", err);
                out.truncate(start_len);
                Err(err)
            }
        }
    }
}
