
use alloc::vec::Vec;

use crate::{reserve, Error, Result};

/// Channel count and sample rate of an interleaved PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmLayout {
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmLayout {
    pub fn new(channels: u16, sample_rate: u32) -> PcmLayout {
        PcmLayout { channels, sample_rate }
    }
}

/// Number of frames [`resample`] produces for `src_frames` input frames.
///
/// Fractional frames at the end of the stream are truncated.
pub fn resampled_frames(src_frames: usize, src_rate: u32, dst_rate: u32) -> usize {
    if src_rate == 0 {
        return 0;
    }
    let frames = src_frames as u128 * u128::from(dst_rate) / u128::from(src_rate);
    usize::try_from(frames).unwrap_or(usize::MAX)
}

/// Converts interleaved PCM from the `from` layout to the `to` layout.
///
/// Every output frame copies the nearest source frame, there is no interpolation or filtering.
/// If the channel counts differ, output byte `j` of a frame is taken from byte
/// `j % source_frame_size` of the source frame, so mono is duplicated to both stereo channels
/// and stereo is reduced to its left channel.
///
/// `src` length must be a multiple of the source frame size. Resampled bytes are appended to
/// `out` and the number of output frames is returned.
pub fn resample(src: &[u8], bytes_per_sample: usize, from: PcmLayout, to: PcmLayout,
    out: &mut Vec<u8>) -> Result<usize> {

    if from.channels == 0 {
        return Err(Error::InvalidChannels(from.channels));
    }
    if to.channels == 0 {
        return Err(Error::InvalidChannels(to.channels));
    }
    if bytes_per_sample == 0 || from.sample_rate == 0 || to.sample_rate == 0 {
        return Err(Error::MalformedInput("resampler needs non-zero sample size and rates"));
    }
    let src_frame_bytes = bytes_per_sample * usize::from(from.channels);
    let dst_frame_bytes = bytes_per_sample * usize::from(to.channels);
    if src.len() % src_frame_bytes != 0 {
        return Err(Error::MalformedInput("resampler input isn't a whole number of frames"));
    }
    let src_frames = src.len() / src_frame_bytes;
    if src_frames == 0 {
        return Ok(0);
    }
    let dst_frames = resampled_frames(src_frames, from.sample_rate, to.sample_rate);
    reserve(out, dst_frames.saturating_mul(dst_frame_bytes))?;

    let src_rate = u128::from(from.sample_rate);
    let dst_rate = u128::from(to.sample_rate);
    let last = src_frames as u128 - 1;
    for i in 0..dst_frames {
        let pos = i as u128 * src_rate;
        let n1 = (pos / dst_rate).min(last);
        let n2 = if n1 * dst_rate == pos || n1 == last { n1 } else { n1 + 1 };
        let nearest = if n2 != n1 && pos - n1 * dst_rate > n2 * dst_rate - pos { n2 } else { n1 };
        // nearest <= last, which came from a usize
        let start = usize::try_from(nearest).unwrap_or(0) * src_frame_bytes;
        let frame = &src[start..start + src_frame_bytes];
        for j in 0..dst_frame_bytes {
            out.push(frame[j % src_frame_bytes]);
        }
    }
    log::trace!("resampled {} frames at {} Hz to {} frames at {} Hz",
        src_frames, from.sample_rate, dst_frames, to.sample_rate);
    Ok(dst_frames)
}
