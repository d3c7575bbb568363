
#[cfg(feature = "internal-no-panic")]
use no_panic::no_panic;

use alloc::vec::Vec;

use crate::{reserve, Error, Result};

/// State values for the IMA ADPCM encoder and decoder of one channel.
///
/// The values are reseeded from the block header at every block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdpcmImaState {
    pub last_sample: i16,
    pub step_index: u8,
}

impl AdpcmImaState {
    /// Creates a new AdpcmImaState with zero values.
    pub fn new() -> AdpcmImaState {
        AdpcmImaState {
            last_sample: 0,
            step_index: 0,
        }
    }
}

const IMA_INDEX_TABLE: &[i8; 16] = &[
    -1, -1, -1, -1, 2, 4, 6, 8,
    -1, -1, -1, -1, 2, 4, 6, 8
];

const IMA_STEP_TABLE: &[i16; 89] = &[
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17,
    19, 21, 23, 25, 28, 31, 34, 37, 41, 45,
    50, 55, 60, 66, 73, 80, 88, 97, 107, 118,
    130, 143, 157, 173, 190, 209, 230, 253, 279, 307,
    337, 371, 408, 449, 494, 544, 598, 658, 724, 796,
    876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358,
    5894, 6484, 7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899,
    15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767
];

const MAX_STEP_INDEX: u8 = 88;

// Stereo data comes in 8 byte units holding 8 samples per channel. Bytes 0..4 are the left
// channel and bytes 4..8 the right channel, low nibble first:
//
//   byte     0     1     2      3
//   left     2 0   6 4   10 8   14 12
//   byte     4     5     6      7
//   right    3 1   7 5   11 9   15 13
//
// The table maps an interleaved sample index to (byte, shift).
const IMA_STEREO_NIBBLE_MAP: [(usize, u8); 16] = [
    (0, 0), (4, 0), (0, 4), (4, 4),
    (1, 0), (5, 0), (1, 4), (5, 4),
    (2, 0), (6, 0), (2, 4), (6, 4),
    (3, 0), (7, 0), (3, 4), (7, 4),
];

const STEREO_UNIT_BYTES: usize = 8;

/// Decodes a 4-bit encoded IMA ADPCM value to a linear 16-bit signed integer sample value.
///
/// Only the lowest 4 bits of `encoded_nibble` are used and the top-most bits are ignored.
///
/// The `state` parameter should be seeded from the block header. This method updates `state`
/// with new values. Subsequent calls should pass in the state values from the previous call.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn decode_adpcm_ima(encoded_nibble: u8, state: &mut AdpcmImaState) -> i16 {
    let nibble = encoded_nibble & 0x0f;
    state.step_index = state.step_index.min(MAX_STEP_INDEX);

    let step_size = i32::from(IMA_STEP_TABLE[usize::from(state.step_index)]);
    let mut diff = step_size >> 3;
    if (nibble & 1) != 0 { diff += step_size >> 2; }
    if (nibble & 2) != 0 { diff += step_size >> 1; }
    if (nibble & 4) != 0 { diff += step_size; }
    if (nibble & 8) != 0 { diff = -diff; }
    let sample = i32::from(state.last_sample) + diff;
    #[allow(clippy::cast_possible_truncation)] // value is clamped so truncation never happens
    {
    state.last_sample = sample.clamp(-32768, 32767) as i16;
    }
    state.step_index = state.step_index
        .saturating_add_signed(IMA_INDEX_TABLE[usize::from(nibble)])
        .min(MAX_STEP_INDEX);
    state.last_sample
}

/// Encodes a linear 16-bit signed integer sample value to a 4-bit encoded IMA ADPCM value.
///
/// `state` is updated with the value a decoder will reconstruct, so that encoder and decoder
/// stay in lock-step.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn encode_adpcm_ima(sample_value: i16, state: &mut AdpcmImaState) -> u8 {
    state.step_index = state.step_index.min(MAX_STEP_INDEX);

    let mut error = i32::from(sample_value) - i32::from(state.last_sample);
    let mut nibble: u8 = 0;
    if error < 0 {
        nibble = 8;
        error = -error;
    }
    // the same three thresholds the decoder adds up
    let step_size = i32::from(IMA_STEP_TABLE[usize::from(state.step_index)]);
    let mut diff = step_size >> 3;
    let mut threshold = step_size;
    if error >= threshold {
        nibble |= 4;
        diff += step_size;
        error -= threshold;
    }
    threshold >>= 1;
    if error >= threshold {
        nibble |= 2;
        diff += step_size >> 1;
        error -= threshold;
    }
    threshold >>= 1;
    if error >= threshold {
        nibble |= 1;
        diff += step_size >> 2;
    }

    let mut sample = i32::from(state.last_sample);
    if (nibble & 8) != 0 {
        sample -= diff;
    } else {
        sample += diff;
    }
    #[allow(clippy::cast_possible_truncation)] // value is clamped so truncation never happens
    {
    state.last_sample = sample.clamp(-32768, 32767) as i16;
    }
    state.step_index = state.step_index
        .saturating_add_signed(IMA_INDEX_TABLE[usize::from(nibble)])
        .min(MAX_STEP_INDEX);
    nibble
}

fn check_layout(channels: usize, block_align: usize) -> Result<usize> {
    if channels < 1 || channels > 2 {
        return Err(Error::InvalidChannels(u16::try_from(channels).unwrap_or(u16::MAX)));
    }
    let header = 4 * channels;
    if block_align < header {
        return Err(Error::InvalidBlockAlign {
            block_align: u16::try_from(block_align).unwrap_or(u16::MAX),
            min: u16::try_from(header).unwrap_or(u16::MAX),
        });
    }
    Ok(header)
}

/// Decodes IMA / DVI ADPCM blocks (wav format 0x0011) to 16-bit little-endian PCM.
///
/// `buf` must hold whole blocks of `block_align` bytes. Each block starts with a 4 byte
/// header per channel (initial sample, step index and a reserved byte), which reseeds `states`.
/// The header sample isn't output; every following nibble decodes to one sample. `states` must
/// contain 1 or 2 items, one for each channel.
///
/// Decoded samples are appended to `out`, interleaved for 2 channel audio.
///
/// An error is returned if `buf` isn't a whole number of blocks or if 2 channel data isn't
/// made of whole 8 byte units. If an error is returned, `out` and `states` are left unmodified.
pub fn decode_adpcm_ima_blocks(buf: &[u8], block_align: usize, states: &mut [AdpcmImaState],
    out: &mut Vec<u8>) -> Result<()> {

    let header = check_layout(states.len(), block_align)?;
    if buf.len() % block_align != 0 {
        return Err(Error::MalformedInput("IMA ADPCM input isn't a whole number of blocks"));
    }
    let saved = save_states(states);
    let start_len = out.len();
    let result = decode_blocks(buf, block_align, header, states, out);
    if result.is_err() {
        out.truncate(start_len);
        states.copy_from_slice(&saved[..states.len()]);
    }
    result
}

// check_layout() limits states to 2 channels
fn save_states(states: &[AdpcmImaState]) -> [AdpcmImaState; 2] {
    let mut saved = [AdpcmImaState::new(); 2];
    for (saved, state) in saved.iter_mut().zip(states) {
        *saved = *state;
    }
    saved
}

fn decode_blocks(buf: &[u8], block_align: usize, header: usize, states: &mut [AdpcmImaState],
    out: &mut Vec<u8>) -> Result<()> {

    let channels = states.len();
    reserve(out, buf.len().saturating_mul(4))?;
    for block in buf.chunks_exact(block_align) {
        for (ch, state) in states.iter_mut().enumerate() {
            let h = &block[ch * 4..ch * 4 + 4];
            state.last_sample = i16::from_le_bytes([h[0], h[1]]);
            if h[2] > MAX_STEP_INDEX {
                log::warn!("IMA ADPCM step index {} out of range, clamped to 88", h[2]);
            }
            state.step_index = h[2].min(MAX_STEP_INDEX);
        }
        let data = &block[header..];
        log::trace!("IMA ADPCM block: {} data bytes", data.len());
        if channels == 1 {
            for b in data {
                let s0 = decode_adpcm_ima(*b & 0x0f, &mut states[0]);
                let s1 = decode_adpcm_ima(*b >> 4, &mut states[0]);
                out.extend_from_slice(&s0.to_le_bytes());
                out.extend_from_slice(&s1.to_le_bytes());
            }
        } else {
            if data.len() % STEREO_UNIT_BYTES != 0 {
                return Err(Error::MalformedInput(
                    "IMA ADPCM stereo block data isn't a multiple of 8 bytes"));
            }
            for unit in data.chunks_exact(STEREO_UNIT_BYTES) {
                for (i, (byte, shift)) in IMA_STEREO_NIBBLE_MAP.iter().enumerate() {
                    let s = decode_adpcm_ima(unit[*byte] >> shift, &mut states[i % 2]);
                    out.extend_from_slice(&s.to_le_bytes());
                }
            }
        }
    }
    Ok(())
}

/// Encodes 16-bit little-endian PCM to IMA / DVI ADPCM blocks (wav format 0x0011).
///
/// Every block of `block_align` bytes starts with a 4 byte header per channel written from the
/// current `states`, so each block can be decoded on its own. The header doesn't consume any
/// samples. The last block may be shorter than `block_align`. `states` must contain 1 or 2
/// items, one for each channel, and is updated so that the next call continues from it.
///
/// If `block_align` only holds the headers, a single header-only block is written and the
/// samples in `pcm` are dropped.
///
/// For 1 channel audio, `pcm` length must be a multiple of 4 (two samples per byte). For
/// 2 channel audio, it must be a multiple of 32 (16 interleaved samples per 8 byte unit) and
/// the block data area (`block_align - 8`) must be a multiple of 8.
///
/// Encoded bytes are appended to `out`. If an error is returned, `out` and `states` are left
/// unmodified.
pub fn encode_adpcm_ima_blocks(pcm: &[u8], block_align: usize, states: &mut [AdpcmImaState],
    out: &mut Vec<u8>) -> Result<()> {

    let header = check_layout(states.len(), block_align)?;
    let channels = states.len();
    let (unit_bytes, unit_pcm) = if channels == 1 {
        (1, 4)
    } else {
        (STEREO_UNIT_BYTES, 4 * STEREO_UNIT_BYTES)
    };
    let data_area = block_align - header;
    if data_area % unit_bytes != 0 {
        return Err(Error::InvalidBlockAlign {
            block_align: u16::try_from(block_align).unwrap_or(u16::MAX),
            min: u16::try_from(header + unit_bytes).unwrap_or(u16::MAX),
        });
    }
    if pcm.len() % unit_pcm != 0 {
        return Err(Error::MalformedInput("IMA ADPCM encoder input isn't a whole number of units"));
    }
    if pcm.is_empty() {
        return Ok(());
    }
    reserve(out, header)?;
    if data_area == 0 {
        log::warn!("IMA ADPCM block align {} has no room for samples, {} bytes dropped",
            block_align, pcm.len());
        write_headers(states, out);
        return Ok(());
    }

    let pcm_per_block = data_area / unit_bytes * unit_pcm;
    let blocks = pcm.len().div_ceil(pcm_per_block);
    reserve(out, blocks * header + pcm.len() / 4)?;
    for block_pcm in pcm.chunks(pcm_per_block) {
        write_headers(states, out);
        if channels == 1 {
            for pair in block_pcm.chunks_exact(4) {
                let n0 = encode_adpcm_ima(i16::from_le_bytes([pair[0], pair[1]]), &mut states[0]);
                let n1 = encode_adpcm_ima(i16::from_le_bytes([pair[2], pair[3]]), &mut states[0]);
                out.push(n1 << 4 | n0);
            }
        } else {
            for unit in block_pcm.chunks_exact(unit_pcm) {
                let mut encoded = [0u8; STEREO_UNIT_BYTES];
                for (i, s) in unit.chunks_exact(2).enumerate() {
                    let (byte, shift) = IMA_STEREO_NIBBLE_MAP[i];
                    let nibble = encode_adpcm_ima(i16::from_le_bytes([s[0], s[1]]),
                        &mut states[i % 2]);
                    encoded[byte] |= nibble << shift;
                }
                out.extend_from_slice(&encoded);
            }
        }
    }
    Ok(())
}

fn write_headers(states: &mut [AdpcmImaState], out: &mut Vec<u8>) {
    for state in states.iter_mut() {
        state.step_index = state.step_index.min(MAX_STEP_INDEX);
        out.extend_from_slice(&state.last_sample.to_le_bytes());
        out.push(state.step_index);
        out.push(0);
    }
}
