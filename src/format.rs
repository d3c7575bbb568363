
/// Wave format tags (`wFormatTag` of WAVEFORMATEX) known to this crate.
///
/// Only PCM, MS ADPCM and IMA / DVI ADPCM are transformed natively. The other tags can be
/// mapped to an external backend with [`backend_codec_id`](crate::backend_codec_id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaveFormatTag {
    Unknown,
    Pcm,
    Adpcm,
    IeeeFloat,
    Alaw,
    Mulaw,
    OkiAdpcm,
    DviAdpcm,
    G723Adpcm,
    Gsm610,
    MpegLayer3,
    G726Adpcm,
    G722Adpcm,
    G729A,
    DolbyAc3Spdif,
    WmAudio2,
    WmAudioLossless,
    AacMs,
    /// Any other registered or unregistered tag value.
    Other(u16),
}

impl WaveFormatTag {
    /// All named tags, in tag value order.
    pub const KNOWN: [WaveFormatTag; 18] = [
        WaveFormatTag::Unknown, WaveFormatTag::Pcm, WaveFormatTag::Adpcm,
        WaveFormatTag::IeeeFloat, WaveFormatTag::Alaw, WaveFormatTag::Mulaw,
        WaveFormatTag::OkiAdpcm, WaveFormatTag::DviAdpcm, WaveFormatTag::G723Adpcm,
        WaveFormatTag::Gsm610, WaveFormatTag::MpegLayer3, WaveFormatTag::G726Adpcm,
        WaveFormatTag::G722Adpcm, WaveFormatTag::G729A, WaveFormatTag::DolbyAc3Spdif,
        WaveFormatTag::WmAudio2, WaveFormatTag::WmAudioLossless, WaveFormatTag::AacMs,
    ];

    /// Converts a raw `wFormatTag` value.
    pub fn from_u16(value: u16) -> WaveFormatTag {
        match value {
            0x0000 => WaveFormatTag::Unknown,
            0x0001 => WaveFormatTag::Pcm,
            0x0002 => WaveFormatTag::Adpcm,
            0x0003 => WaveFormatTag::IeeeFloat,
            0x0006 => WaveFormatTag::Alaw,
            0x0007 => WaveFormatTag::Mulaw,
            0x0010 => WaveFormatTag::OkiAdpcm,
            0x0011 => WaveFormatTag::DviAdpcm,
            0x0014 => WaveFormatTag::G723Adpcm,
            0x0031 => WaveFormatTag::Gsm610,
            0x0055 => WaveFormatTag::MpegLayer3,
            0x0064 => WaveFormatTag::G726Adpcm,
            0x0065 => WaveFormatTag::G722Adpcm,
            0x0083 => WaveFormatTag::G729A,
            0x0092 => WaveFormatTag::DolbyAc3Spdif,
            0x0161 => WaveFormatTag::WmAudio2,
            0x0163 => WaveFormatTag::WmAudioLossless,
            0xA106 => WaveFormatTag::AacMs,
            other => WaveFormatTag::Other(other),
        }
    }

    /// Returns the raw `wFormatTag` value.
    pub fn to_u16(self) -> u16 {
        match self {
            WaveFormatTag::Unknown => 0x0000,
            WaveFormatTag::Pcm => 0x0001,
            WaveFormatTag::Adpcm => 0x0002,
            WaveFormatTag::IeeeFloat => 0x0003,
            WaveFormatTag::Alaw => 0x0006,
            WaveFormatTag::Mulaw => 0x0007,
            WaveFormatTag::OkiAdpcm => 0x0010,
            WaveFormatTag::DviAdpcm => 0x0011,
            WaveFormatTag::G723Adpcm => 0x0014,
            WaveFormatTag::Gsm610 => 0x0031,
            WaveFormatTag::MpegLayer3 => 0x0055,
            WaveFormatTag::G726Adpcm => 0x0064,
            WaveFormatTag::G722Adpcm => 0x0065,
            WaveFormatTag::G729A => 0x0083,
            WaveFormatTag::DolbyAc3Spdif => 0x0092,
            WaveFormatTag::WmAudio2 => 0x0161,
            WaveFormatTag::WmAudioLossless => 0x0163,
            WaveFormatTag::AacMs => 0xA106,
            WaveFormatTag::Other(value) => value,
        }
    }

    /// Human readable name of the tag.
    pub fn name(self) -> &'static str {
        match self {
            WaveFormatTag::Unknown => "WAVE_FORMAT_UNKNOWN",
            WaveFormatTag::Pcm => "WAVE_FORMAT_PCM",
            WaveFormatTag::Adpcm => "WAVE_FORMAT_ADPCM",
            WaveFormatTag::IeeeFloat => "WAVE_FORMAT_IEEE_FLOAT",
            WaveFormatTag::Alaw => "WAVE_FORMAT_ALAW",
            WaveFormatTag::Mulaw => "WAVE_FORMAT_MULAW",
            WaveFormatTag::OkiAdpcm => "WAVE_FORMAT_OKI_ADPCM",
            WaveFormatTag::DviAdpcm => "WAVE_FORMAT_DVI_ADPCM",
            WaveFormatTag::G723Adpcm => "WAVE_FORMAT_G723_ADPCM",
            WaveFormatTag::Gsm610 => "WAVE_FORMAT_GSM610",
            WaveFormatTag::MpegLayer3 => "WAVE_FORMAT_MPEGLAYER3",
            WaveFormatTag::G726Adpcm => "WAVE_FORMAT_G726_ADPCM",
            WaveFormatTag::G722Adpcm => "WAVE_FORMAT_G722_ADPCM",
            WaveFormatTag::G729A => "WAVE_FORMAT_G729A",
            WaveFormatTag::DolbyAc3Spdif => "WAVE_FORMAT_DOLBY_AC3_SPDIF",
            WaveFormatTag::WmAudio2 => "WAVE_FORMAT_WMAUDIO2",
            WaveFormatTag::WmAudioLossless => "WAVE_FORMAT_WMAUDIO_LOSSLESS",
            WaveFormatTag::AacMs => "WAVE_FORMAT_AAC_MS",
            WaveFormatTag::Other(_) => "WAVE_FORMAT_UNRECOGNIZED",
        }
    }
}

impl From<u16> for WaveFormatTag {
    fn from(value: u16) -> Self {
        WaveFormatTag::from_u16(value)
    }
}

impl core::fmt::Display for WaveFormatTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({:#06x})", self.name(), self.to_u16())
    }
}

/// Describes a wire audio format (the fields of WAVEFORMATEX).
///
/// For ADPCM formats `block_align` is the size of one compressed block including its header.
/// For PCM formats it is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioFormat {
    pub tag: WaveFormatTag,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub block_align: u16,
    pub avg_bytes_per_sec: u32,
}

impl AudioFormat {
    /// Creates a linear PCM format.
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> AudioFormat {
        let block_align = channels.saturating_mul(bits_per_sample / 8);
        AudioFormat {
            tag: WaveFormatTag::Pcm,
            channels,
            sample_rate,
            bits_per_sample,
            block_align,
            avg_bytes_per_sec: sample_rate.saturating_mul(u32::from(block_align)),
        }
    }

    /// Creates a MS ADPCM format with the given block size.
    pub fn ms_adpcm(channels: u16, sample_rate: u32, block_align: u16) -> AudioFormat {
        AudioFormat::adpcm(WaveFormatTag::Adpcm, channels, sample_rate, block_align)
    }

    /// Creates an IMA / DVI ADPCM format with the given block size.
    pub fn ima_adpcm(channels: u16, sample_rate: u32, block_align: u16) -> AudioFormat {
        AudioFormat::adpcm(WaveFormatTag::DviAdpcm, channels, sample_rate, block_align)
    }

    fn adpcm(tag: WaveFormatTag, channels: u16, sample_rate: u32, block_align: u16)
        -> AudioFormat {
        let mut format = AudioFormat {
            tag,
            channels,
            sample_rate,
            bits_per_sample: 4,
            block_align,
            avg_bytes_per_sec: 0,
        };
        let samples_per_block = u64::from(format.samples_per_block().unwrap_or(0));
        if samples_per_block > 0 {
            let bytes = u64::from(sample_rate) * u64::from(block_align) / samples_per_block;
            format.avg_bytes_per_sec = u32::try_from(bytes).unwrap_or(u32::MAX);
        }
        format
    }

    /// Returns true for the two ADPCM formats handled natively.
    pub fn is_adpcm(&self) -> bool {
        matches!(self.tag, WaveFormatTag::Adpcm | WaveFormatTag::DviAdpcm)
    }

    /// Size of the per-block header in bytes for ADPCM formats, `None` for other formats.
    pub fn header_size(&self) -> Option<usize> {
        let channels = usize::from(self.channels);
        match self.tag {
            WaveFormatTag::Adpcm => Some(7 * channels),
            WaveFormatTag::DviAdpcm => Some(4 * channels),
            _ => None,
        }
    }

    /// Number of samples per channel produced by decoding one full ADPCM block.
    ///
    /// Returns `None` for non-ADPCM formats or if the block can't hold its header.
    pub fn samples_per_block(&self) -> Option<u32> {
        let header = self.header_size()?;
        let channels = usize::from(self.channels);
        let data = usize::from(self.block_align).checked_sub(header)?;
        if channels == 0 {
            return None;
        }
        let samples = match self.tag {
            // two header samples plus two nibbles per byte shared by all channels
            WaveFormatTag::Adpcm => 2 + data * 2 / channels,
            // the header sample isn't output, one sample per nibble
            _ => data * 2 / channels,
        };
        u32::try_from(samples).ok()
    }

    /// Bytes per PCM frame (all channels), `None` for compressed formats.
    pub fn bytes_per_frame(&self) -> Option<usize> {
        if self.tag != WaveFormatTag::Pcm {
            return None;
        }
        Some(usize::from(self.channels) * usize::from(self.bits_per_sample / 8))
    }
}
