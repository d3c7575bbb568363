
use crate::format::{AudioFormat, WaveFormatTag};

/// Codec identifiers understood by an external codec backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendCodecId {
    PcmS16Le,
    PcmU8,
    PcmF32Le,
    PcmAlaw,
    PcmMulaw,
    AdpcmMs,
    AdpcmImaOki,
    AdpcmG726,
    AdpcmG722,
    G723,
    G729,
    GsmMs,
    Mp3,
    Ac3,
    WmaV2,
    WmaLossless,
    Aac,
}

/// Returns true if the native engine can transform `format` in the given direction.
///
/// All formats need 1 or 2 channels. PCM is supported with 8 or 16 bits per sample
/// (pass-through), MS ADPCM and IMA ADPCM with a `block_align` that can hold the block header.
/// 2 channel IMA ADPCM data comes in 8 byte units, so its data area must be a multiple of 8.
/// Every other format is only available through an external backend.
///
/// The same formats are supported for encoding and decoding.
pub fn supports_format(format: &AudioFormat, encode: bool) -> bool {
    let _ = encode;
    if format.channels < 1 || format.channels > 2 {
        return false;
    }
    match format.tag {
        WaveFormatTag::Pcm => format.bits_per_sample == 8 || format.bits_per_sample == 16,
        WaveFormatTag::Adpcm | WaveFormatTag::DviAdpcm => {
            let Some(header) = format.header_size() else {
                return false;
            };
            let Some(data_area) = usize::from(format.block_align).checked_sub(header) else {
                return false;
            };
            format.tag == WaveFormatTag::Adpcm || format.channels == 1 || data_area % 8 == 0
        }
        _ => false,
    }
}

/// Maps `format` to the codec an external backend should use for it.
///
/// Returns `None` for unknown tags, for IMA / DVI ADPCM (which has no backend codec in this
/// table) and for PCM widths other than 8 and 16 bits.
///
/// 16-bit PCM maps to the signed little-endian codec, where older backend tables used the
/// unsigned 16-bit id.
pub fn backend_codec_id(format: &AudioFormat) -> Option<BackendCodecId> {
    let id = match format.tag {
        WaveFormatTag::Unknown | WaveFormatTag::DviAdpcm | WaveFormatTag::Other(_) => {
            return None
        }
        WaveFormatTag::Pcm => match format.bits_per_sample {
            16 => BackendCodecId::PcmS16Le,
            8 => BackendCodecId::PcmU8,
            _ => return None,
        },
        WaveFormatTag::Adpcm => BackendCodecId::AdpcmMs,
        WaveFormatTag::IeeeFloat => BackendCodecId::PcmF32Le,
        WaveFormatTag::Alaw => BackendCodecId::PcmAlaw,
        WaveFormatTag::Mulaw => BackendCodecId::PcmMulaw,
        WaveFormatTag::OkiAdpcm => BackendCodecId::AdpcmImaOki,
        WaveFormatTag::G723Adpcm => BackendCodecId::G723,
        WaveFormatTag::Gsm610 => BackendCodecId::GsmMs,
        WaveFormatTag::MpegLayer3 => BackendCodecId::Mp3,
        WaveFormatTag::G726Adpcm => BackendCodecId::AdpcmG726,
        WaveFormatTag::G722Adpcm => BackendCodecId::AdpcmG722,
        WaveFormatTag::G729A => BackendCodecId::G729,
        WaveFormatTag::DolbyAc3Spdif => BackendCodecId::Ac3,
        WaveFormatTag::WmAudio2 => BackendCodecId::WmaV2,
        WaveFormatTag::WmAudioLossless => BackendCodecId::WmaLossless,
        WaveFormatTag::AacMs => BackendCodecId::Aac,
    };
    Some(id)
}
