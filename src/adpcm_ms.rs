
#[cfg(feature = "internal-no-panic")]
use no_panic::no_panic;

use alloc::vec::Vec;

use crate::{reserve, Error, Result};

/// State values for the MS ADPCM encoder and decoder of one channel.
///
/// `sample1` is the newest reconstructed sample and `sample2` the one before it.
/// The values are reseeded from the block header at every block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdpcmMsState {
    pub predictor: u8,
    pub delta: i32,
    pub sample1: i32,
    pub sample2: i32,
}

impl AdpcmMsState {
    /// Creates a new AdpcmMsState with zero values.
    pub fn new() -> AdpcmMsState {
        AdpcmMsState {
            predictor: 0,
            delta: 0,
            sample1: 0,
            sample2: 0,
        }
    }
}

const MS_ADAPTATION_TABLE: &[i32; 16] = &[
    230, 230, 230, 230, 307, 409, 512, 614,
    768, 614, 512, 409, 307, 230, 230, 230
];

const MS_COEFF1: &[i32; 7] = &[256, 512, 0, 192, 240, 460, 392];
const MS_COEFF2: &[i32; 7] = &[0, -256, 0, 64, 0, -208, -232];

const MAX_PREDICTOR: u8 = 6;
const MIN_DELTA: i32 = 16;
// keeps delta * 768 within i32
const MAX_DELTA: i32 = i32::MAX / 768;

#[inline(always)]
fn predict(state: &mut AdpcmMsState) -> i32 {
    state.predictor = state.predictor.min(MAX_PREDICTOR);
    state.delta = state.delta.clamp(MIN_DELTA, MAX_DELTA);
    state.sample1 = state.sample1.clamp(-32768, 32767);
    state.sample2 = state.sample2.clamp(-32768, 32767);
    let index = usize::from(state.predictor);
    (state.sample1 * MS_COEFF1[index] + state.sample2 * MS_COEFF2[index]) / 256
}

#[inline(always)]
fn update(state: &mut AdpcmMsState, sample: i32, nibble: u8) {
    state.sample2 = state.sample1;
    state.sample1 = sample;
    state.delta = (state.delta * MS_ADAPTATION_TABLE[usize::from(nibble & 0x0f)] / 256)
        .clamp(MIN_DELTA, MAX_DELTA);
}

/// Decodes a 4-bit encoded MS ADPCM value to a linear 16-bit signed integer sample value.
///
/// Only the lowest 4 bits of `encoded_nibble` are used. The nibble is a signed value
/// in the range -8..=7.
///
/// The `state` parameter should be seeded from the block header. This method updates `state`
/// with new values. Subsequent calls should pass in the state values from the previous call.
#[cfg_attr(feature = "internal-no-panic", no_panic)]
#[inline(always)]
pub fn decode_adpcm_ms(encoded_nibble: u8, state: &mut AdpcmMsState) -> i16 {
    let nibble = encoded_nibble & 0x0f;
    let signed = if (nibble & 8) != 0 {
        i32::from(nibble) - 16
    } else {
        i32::from(nibble)
    };
    let predicted = predict(state);
    let sample = (predicted + signed * state.delta).clamp(-32768, 32767);
    update(state, sample, nibble);
    #[allow(clippy::cast_possible_truncation)] // value is clamped so truncation never happens
    {
    sample as i16
    }
}

/// Encodes a linear 16-bit signed integer sample value to a 4-bit encoded MS ADPCM value.
///
/// The prediction error is divided by `delta`, rounded up when the remainder is more than half
/// of `delta` and clamped to -8..=7. `state` is updated with the value a decoder will
/// reconstruct.
#[inline(always)]
pub fn encode_adpcm_ms(sample_value: i16, state: &mut AdpcmMsState) -> u8 {
    let predicted = predict(state);
    let error = i32::from(sample_value) - predicted;
    let mut error_delta = error / state.delta;
    if error % state.delta > state.delta / 2 {
        error_delta += 1;
    }
    let error_delta = error_delta.clamp(-8, 7);
    let sample = (predicted + state.delta * error_delta).clamp(-32768, 32767);
    let nibble = u8::try_from(error_delta & 0x0f).unwrap_or(0);
    update(state, sample, nibble);
    nibble
}

/// Bounds-checked reader over a block header.
struct HeaderCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> HeaderCursor<'a> {
    fn new(buf: &'a [u8]) -> HeaderCursor<'a> {
        HeaderCursor { buf, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let value = *self.buf.get(self.pos)
            .ok_or(Error::MalformedInput("truncated MS ADPCM block header"))?;
        self.pos += 1;
        Ok(value)
    }

    fn read_i16_le(&mut self) -> Result<i16> {
        let bytes = self.buf.get(self.pos..self.pos + 2)
            .ok_or(Error::MalformedInput("truncated MS ADPCM block header"))?;
        self.pos += 2;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

fn check_layout(channels: usize, block_align: usize) -> Result<usize> {
    if channels < 1 || channels > 2 {
        return Err(Error::InvalidChannels(u16::try_from(channels).unwrap_or(u16::MAX)));
    }
    let header = 7 * channels;
    if block_align < header {
        return Err(Error::InvalidBlockAlign {
            block_align: u16::try_from(block_align).unwrap_or(u16::MAX),
            min: u16::try_from(header).unwrap_or(u16::MAX),
        });
    }
    Ok(header)
}

/// Decodes MS ADPCM blocks (wav format 0x0002) to 16-bit little-endian PCM.
///
/// `buf` must hold whole blocks of `block_align` bytes. The block header holds the predictor
/// index bytes, then the deltas, then `sample1` and then `sample2` (16-bit little-endian
/// values), each field repeated for every channel. The header samples are output first
/// (`sample2` before `sample1`), followed by two samples per data byte, high nibble first.
/// For 2 channel audio the high nibble is the left channel.
///
/// `states` must contain 1 or 2 items, one for each channel.
///
/// An error is returned if `buf` isn't a whole number of blocks or if a block header holds a
/// predictor index greater than 6. If an error is returned, `out` and `states` are left
/// unmodified.
pub fn decode_adpcm_ms_blocks(buf: &[u8], block_align: usize, states: &mut [AdpcmMsState],
    out: &mut Vec<u8>) -> Result<()> {

    check_layout(states.len(), block_align)?;
    if buf.len() % block_align != 0 {
        return Err(Error::MalformedInput("MS ADPCM input isn't a whole number of blocks"));
    }
    let saved = save_states(states);
    let start_len = out.len();
    let result = decode_blocks(buf, block_align, states, out);
    if result.is_err() {
        out.truncate(start_len);
        states.copy_from_slice(&saved[..states.len()]);
    }
    result
}

// check_layout() limits states to 2 channels
fn save_states(states: &[AdpcmMsState]) -> [AdpcmMsState; 2] {
    let mut saved = [AdpcmMsState::new(); 2];
    for (saved, state) in saved.iter_mut().zip(states) {
        *saved = *state;
    }
    saved
}

fn read_header(cursor: &mut HeaderCursor<'_>, states: &mut [AdpcmMsState]) -> Result<()> {
    for state in states.iter_mut() {
        let predictor = cursor.read_u8()?;
        if predictor > MAX_PREDICTOR {
            log::warn!("MS ADPCM predictor index {} out of range", predictor);
            return Err(Error::MalformedInput("MS ADPCM predictor index out of range"));
        }
        state.predictor = predictor;
    }
    for state in states.iter_mut() {
        let delta = i32::from(cursor.read_i16_le()?);
        if delta < MIN_DELTA {
            log::warn!("MS ADPCM delta {} below {}, raised", delta, MIN_DELTA);
        }
        state.delta = delta.max(MIN_DELTA);
    }
    for state in states.iter_mut() {
        state.sample1 = i32::from(cursor.read_i16_le()?);
    }
    for state in states.iter_mut() {
        state.sample2 = i32::from(cursor.read_i16_le()?);
    }
    Ok(())
}

fn decode_blocks(buf: &[u8], block_align: usize, states: &mut [AdpcmMsState],
    out: &mut Vec<u8>) -> Result<()> {

    let channels = states.len();
    reserve(out, buf.len().saturating_mul(4))?;
    for block in buf.chunks_exact(block_align) {
        let mut cursor = HeaderCursor::new(block);
        read_header(&mut cursor, states)?;
        #[allow(clippy::cast_possible_truncation)] // header samples come from 16-bit fields
        {
        for state in states.iter() {
            out.extend_from_slice(&(state.sample2 as i16).to_le_bytes());
        }
        for state in states.iter() {
            out.extend_from_slice(&(state.sample1 as i16).to_le_bytes());
        }
        }
        let data = &block[cursor.pos..];
        log::trace!("MS ADPCM block: {} data bytes", data.len());
        let last = channels - 1;
        for b in data {
            let s0 = decode_adpcm_ms(*b >> 4, &mut states[0]);
            let s1 = decode_adpcm_ms(*b & 0x0f, &mut states[last]);
            out.extend_from_slice(&s0.to_le_bytes());
            out.extend_from_slice(&s1.to_le_bytes());
        }
    }
    Ok(())
}

/// Encodes 16-bit little-endian PCM to MS ADPCM blocks (wav format 0x0002).
///
/// The first two frames of every block are stored in the block header as `sample2` and
/// `sample1`, the predictor index and delta are written from the current `states`. The rest of
/// the block holds one byte per two samples, high nibble first. The last block may be shorter
/// than `block_align`. `states` must contain 1 or 2 items, one for each channel, and is updated
/// so that the next call continues from it.
///
/// `pcm` length must be a multiple of 4 and every block must start with two whole frames.
///
/// Encoded bytes are appended to `out`. If an error is returned, `out` and `states` are left
/// unmodified.
pub fn encode_adpcm_ms_blocks(pcm: &[u8], block_align: usize, states: &mut [AdpcmMsState],
    out: &mut Vec<u8>) -> Result<()> {

    let header = check_layout(states.len(), block_align)?;
    if pcm.len() % 4 != 0 {
        return Err(Error::MalformedInput("MS ADPCM encoder input isn't a whole number of units"));
    }
    let saved = save_states(states);
    let start_len = out.len();
    let result = encode_blocks(pcm, block_align, header, states, out);
    if result.is_err() {
        out.truncate(start_len);
        states.copy_from_slice(&saved[..states.len()]);
    }
    result
}

fn read_sample(pcm: &[u8], index: usize) -> i16 {
    i16::from_le_bytes([pcm[index * 2], pcm[index * 2 + 1]])
}

fn encode_blocks(pcm: &[u8], block_align: usize, header: usize, states: &mut [AdpcmMsState],
    out: &mut Vec<u8>) -> Result<()> {

    let channels = states.len();
    let header_pcm = 4 * channels;
    let data_area = block_align - header;
    let pcm_per_block = header_pcm + data_area * 4;
    let blocks = pcm.len().div_ceil(pcm_per_block);
    reserve(out, blocks * header + pcm.len() / 4)?;

    for block_pcm in pcm.chunks(pcm_per_block) {
        if block_pcm.len() < header_pcm {
            return Err(Error::MalformedInput("MS ADPCM block needs two frames for its header"));
        }
        for state in states.iter_mut() {
            state.predictor = state.predictor.min(MAX_PREDICTOR);
            out.push(state.predictor);
        }
        for state in states.iter_mut() {
            // the header field is 16 bits wide
            let delta = i16::try_from(state.delta.clamp(MIN_DELTA, i32::from(i16::MAX)))
                .unwrap_or(i16::MAX);
            state.delta = i32::from(delta);
            out.extend_from_slice(&delta.to_le_bytes());
        }
        for (ch, state) in states.iter_mut().enumerate() {
            state.sample2 = i32::from(read_sample(block_pcm, ch));
            state.sample1 = i32::from(read_sample(block_pcm, channels + ch));
        }
        for ch in 0..channels {
            out.extend_from_slice(&read_sample(block_pcm, channels + ch).to_le_bytes());
        }
        for ch in 0..channels {
            out.extend_from_slice(&read_sample(block_pcm, ch).to_le_bytes());
        }
        let last = channels - 1;
        for pair in block_pcm[header_pcm..].chunks_exact(4) {
            let n0 = encode_adpcm_ms(i16::from_le_bytes([pair[0], pair[1]]), &mut states[0]);
            let n1 = encode_adpcm_ms(i16::from_le_bytes([pair[2], pair[3]]), &mut states[last]);
            out.push(n0 << 4 | n1);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn to_samples(bytes: &[u8]) -> Vec<i16> {
        bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
    }

    #[test]
    fn test_decode_adpcm_ms() {
        // coefficients 512, -256
        let mut state = AdpcmMsState { predictor: 1, delta: 32, sample1: 100, sample2: 50 };
        assert_eq!(decode_adpcm_ms(1, &mut state), 182);
        assert_eq!(state, AdpcmMsState { predictor: 1, delta: 28, sample1: 182, sample2: 100 });
        assert_eq!(decode_adpcm_ms(0x0f, &mut state), 236);
        assert_eq!(state, AdpcmMsState { predictor: 1, delta: 25, sample1: 236, sample2: 182 });

        // delta never drops below 16
        let mut state = AdpcmMsState { predictor: 0, delta: 16, sample1: 0, sample2: 0 };
        assert_eq!(decode_adpcm_ms(0, &mut state), 0);
        assert_eq!(state.delta, 16);

        // largest adaptation and clamping to 32767 / -32768
        let mut state = AdpcmMsState { predictor: 0, delta: 8000, sample1: 30000, sample2: 0 };
        assert_eq!(decode_adpcm_ms(7, &mut state), 32767);
        assert_eq!(state.delta, 8000 * 614 / 256);
        let mut state = AdpcmMsState { predictor: 0, delta: 8000, sample1: -30000, sample2: 0 };
        assert_eq!(decode_adpcm_ms(8, &mut state), -32768);
        assert_eq!(state.delta, 8000 * 768 / 256);

        // only the low nibble is used, out-of-range predictor is clamped
        let mut state = AdpcmMsState { predictor: 9, delta: 16, sample1: 0, sample2: 0 };
        assert_eq!(decode_adpcm_ms(0x10, &mut state), 0);
        assert_eq!(state.predictor, 6);
    }

    #[test]
    fn test_encode_adpcm_ms() {
        let mut state = AdpcmMsState { predictor: 0, delta: 16, sample1: 100, sample2: 50 };
        assert_eq!(encode_adpcm_ms(182, &mut state), 5);
        assert_eq!(state, AdpcmMsState { predictor: 0, delta: 25, sample1: 180, sample2: 100 });
        // 56 / 25 leaves 6, not more than half of 25
        assert_eq!(encode_adpcm_ms(236, &mut state), 2);
        assert_eq!(state, AdpcmMsState { predictor: 0, delta: 22, sample1: 230, sample2: 180 });
        // 100 - 230 = -130 is -5 * 22 with remainder -20, truncated toward zero
        assert_eq!(encode_adpcm_ms(100, &mut state), 11);
        assert_eq!(state, AdpcmMsState { predictor: 0, delta: 35, sample1: 120, sample2: 230 });
        // 175 - 120 = 55 is 1 * 35 with remainder 20, more than half of 35 rounds up
        assert_eq!(encode_adpcm_ms(175, &mut state), 2);
        assert_eq!(state.sample1, 190);

        // negative errors truncate toward zero
        let mut state = AdpcmMsState { predictor: 0, delta: 16, sample1: 100, sample2: 0 };
        assert_eq!(encode_adpcm_ms(18, &mut state), 11);
        assert_eq!(state.sample1, 20);

        // error is clamped to 7 and -8
        let mut state = AdpcmMsState { predictor: 0, delta: 16, sample1: 0, sample2: 0 };
        assert_eq!(encode_adpcm_ms(32767, &mut state), 7);
        assert_eq!(state.sample1, 112);
        let mut state = AdpcmMsState { predictor: 0, delta: 16, sample1: 0, sample2: 0 };
        assert_eq!(encode_adpcm_ms(-32768, &mut state), 8);
        assert_eq!(state.sample1, -128);

        // zero delta is raised before dividing
        let mut state = AdpcmMsState::new();
        assert_eq!(encode_adpcm_ms(0, &mut state), 0);
        assert_eq!(state.delta, 16);
    }

    #[test]
    fn test_decode_blocks_mono() {
        let mut states = [AdpcmMsState::new()];
        let mut out = Vec::new();
        decode_adpcm_ms_blocks(&[1, 32, 0, 100, 0, 50, 0, 0x1f], 8, &mut states, &mut out)
            .unwrap();
        assert_eq!(to_samples(&out), [50, 100, 182, 236]);
        assert_eq!(states[0], AdpcmMsState { predictor: 1, delta: 25, sample1: 236, sample2: 182 });
    }

    #[test]
    fn test_decode_blocks_stereo_zero() {
        // predictor 0 and delta 16 for both channels, zero samples and zero nibbles
        let block = [0, 0, 16, 0, 16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00];
        let mut states = [AdpcmMsState::new(), AdpcmMsState::new()];
        let mut out = Vec::new();
        decode_adpcm_ms_blocks(&block, 15, &mut states, &mut out).unwrap();
        assert_eq!(to_samples(&out), [0, 0, 0, 0, 0, 0]);
        for state in states {
            assert_eq!(state, AdpcmMsState { predictor: 0, delta: 16, sample1: 0, sample2: 0 });
        }
    }

    #[test]
    fn test_decode_blocks_stereo_layout() {
        // left: predictor 0, delta 16, sample1 10, sample2 20
        // right: predictor 2, delta 100, sample1 -10, sample2 -20
        let block = [0, 2, 16, 0, 100, 0, 10, 0, 0xf6, 0xff, 20, 0, 0xec, 0xff, 0x21];
        let mut states = [AdpcmMsState::new(), AdpcmMsState::new()];
        let mut out = Vec::new();
        decode_adpcm_ms_blocks(&block, 15, &mut states, &mut out).unwrap();
        // left: 10 + 2 * 16, right: 0 + 1 * 100 (coefficients 0, 0)
        assert_eq!(to_samples(&out), [20, -20, 10, -10, 42, 100]);
    }

    #[test]
    fn test_decode_blocks_header_fixes() {
        // delta below 16 is raised
        let mut states = [AdpcmMsState::new()];
        let mut out = Vec::new();
        decode_adpcm_ms_blocks(&[0, 0xfb, 0xff, 0, 0, 0, 0], 7, &mut states, &mut out).unwrap();
        assert_eq!(states[0].delta, 16);
        assert_eq!(to_samples(&out), [0, 0]);

        // predictor index 7 is rejected and out is left unmodified
        let mut out = vec![9];
        assert!(matches!(decode_adpcm_ms_blocks(&[0, 16, 0, 0, 0, 0, 0, 0x11,
            7, 16, 0, 0, 0, 0, 0, 0x11], 8, &mut states, &mut out),
            Err(Error::MalformedInput(_))));
        assert_eq!(out, [9]);

        // partial block
        let mut out = Vec::new();
        assert!(matches!(decode_adpcm_ms_blocks(&[0, 16, 0, 0], 8, &mut states, &mut out),
            Err(Error::MalformedInput(_))));
        assert!(out.is_empty());

        // block_align too small for 2 channel header
        let mut states = [AdpcmMsState::new(), AdpcmMsState::new()];
        assert!(matches!(decode_adpcm_ms_blocks(&[0; 14], 13, &mut states, &mut out),
            Err(Error::InvalidBlockAlign { block_align: 13, min: 14 })));
    }

    #[test]
    fn test_decode_error_keeps_states() {
        // the first block reseeds the state, the second has a bad predictor
        let before = [AdpcmMsState { predictor: 3, delta: 40, sample1: 7, sample2: -7 }];
        let mut states = before;
        let mut out = vec![1];
        assert!(matches!(decode_adpcm_ms_blocks(&[2, 20, 0, 1, 0, 2, 0, 0x44,
            9, 20, 0, 1, 0, 2, 0, 0x44], 8, &mut states, &mut out),
            Err(Error::MalformedInput(_))));
        assert_eq!(out, [1]);
        assert_eq!(states, before);
    }

    #[test]
    fn test_encode_blocks_mono() {
        let mut states = [AdpcmMsState::new()];
        let mut out = Vec::new();
        encode_adpcm_ms_blocks(&to_bytes(&[50, 100, 182, 236]), 8, &mut states, &mut out)
            .unwrap();
        assert_eq!(out, [0, 16, 0, 100, 0, 50, 0, 0x52]);

        let mut decoder = [AdpcmMsState::new()];
        let mut decoded = Vec::new();
        decode_adpcm_ms_blocks(&out, 8, &mut decoder, &mut decoded).unwrap();
        assert_eq!(to_samples(&decoded), [50, 100, 180, 230]);
        assert_eq!(decoder, states);
    }

    #[test]
    fn test_encode_blocks_stereo() {
        let mut states = [AdpcmMsState::new(), AdpcmMsState::new()];
        let mut out = Vec::new();
        encode_adpcm_ms_blocks(&to_bytes(&[1, 2, 3, 4, 3, 4, 3, 4]), 16, &mut states, &mut out)
            .unwrap();
        assert_eq!(out.len(), 16);
        // predictors, deltas, sample1 (second frame), sample2 (first frame)
        assert_eq!(out[..14], [0, 0, 16, 0, 16, 0, 3, 0, 4, 0, 1, 0, 2, 0]);
        // repeating the newest sample predicts exactly
        assert_eq!(out[14..], [0x00, 0x00]);
    }

    #[test]
    fn test_encode_blocks_header_only() {
        // 7 byte mono blocks only hold the two header samples
        let mut states = [AdpcmMsState::new()];
        let mut out = Vec::new();
        encode_adpcm_ms_blocks(&to_bytes(&[1, 2, 3, 4]), 7, &mut states, &mut out).unwrap();
        assert_eq!(out, [0, 16, 0, 2, 0, 1, 0, 0, 16, 0, 4, 0, 3, 0]);

        let mut decoded = Vec::new();
        decode_adpcm_ms_blocks(&out, 7, &mut states, &mut decoded).unwrap();
        assert_eq!(to_samples(&decoded), [1, 2, 3, 4]);
    }

    #[test]
    fn test_encode_blocks_invalid_input() {
        let mut states = [AdpcmMsState::new(), AdpcmMsState::new()];
        let mut out = Vec::new();
        // not a whole number of frames
        assert!(matches!(encode_adpcm_ms_blocks(&[0; 6], 16, &mut states, &mut out),
            Err(Error::MalformedInput(_))));
        // the second block only has one frame for its header
        assert!(matches!(encode_adpcm_ms_blocks(&[0; 20], 16, &mut states, &mut out),
            Err(Error::MalformedInput(_))));
        assert!(out.is_empty());
        assert_eq!(states, [AdpcmMsState::new(), AdpcmMsState::new()]);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let samples: Vec<i16> = (0..4000i32)
            .map(|i| ((i % 160 - 80) * 150) as i16)
            .collect();
        let mut encoder = [AdpcmMsState::new()];
        let mut encoded = Vec::new();
        encode_adpcm_ms_blocks(&to_bytes(&samples), 256, &mut encoder, &mut encoded).unwrap();

        let mut decoder = [AdpcmMsState::new()];
        let mut decoded = Vec::new();
        decode_adpcm_ms_blocks(&encoded, 256, &mut decoder, &mut decoded).unwrap();
        let decoded = to_samples(&decoded);
        assert_eq!(decoded.len(), samples.len());
        assert_eq!(decoder, encoder);
        // the header samples are stored verbatim
        assert_eq!(decoded[..2], samples[..2]);
    }
}
