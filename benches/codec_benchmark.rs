use criterion::{black_box, criterion_group, criterion_main, Criterion};

use audio_dsp::{AudioFormat, Dsp, DspContext, Mode};

fn triangle_pcm(samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| {
            let t = (i % 400) as i16;
            let s = if t < 200 { t * 100 - 10000 } else { (400 - t) * 100 - 10000 };
            s.to_le_bytes()
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {

    // adpcm ima
    c.bench_function("decode_adpcm_ima", |b| b.iter(|| {
        let mut state = audio_dsp::AdpcmImaState::new();
        // only the lowest 4 bits are used by decode_adpcm_ima(), but lets loop over the entire
        // value space [0, 255] so that the time can be compared to the ms adpcm benchmark
        for i in 0..=255 {
            black_box(audio_dsp::decode_adpcm_ima(black_box(i), &mut state));
        }
    }));
    c.bench_function("encode_adpcm_ima", |b| b.iter(|| {
        let mut state = audio_dsp::AdpcmImaState::new();
        for i in -32768..=32767 {
            black_box(audio_dsp::encode_adpcm_ima(black_box(i), &mut state));
        }
    }));

    // adpcm ms
    c.bench_function("decode_adpcm_ms", |b| b.iter(|| {
        let mut state = audio_dsp::AdpcmMsState::new();
        for i in 0..=255 {
            black_box(audio_dsp::decode_adpcm_ms(black_box(i), &mut state));
        }
    }));
    c.bench_function("encode_adpcm_ms", |b| b.iter(|| {
        let mut state = audio_dsp::AdpcmMsState::new();
        for i in -32768..=32767 {
            black_box(audio_dsp::encode_adpcm_ms(black_box(i), &mut state));
        }
    }));

    // one second of 22050 Hz stereo through the contexts
    let pcm = triangle_pcm(22050 * 2);
    let src = AudioFormat::pcm(2, 22050, 16);
    for (name, format) in [
        ("ima", AudioFormat::ima_adpcm(2, 22050, 2048)),
        ("ms", AudioFormat::ms_adpcm(2, 22050, 2048)),
    ] {
        let mut encoder = DspContext::new(Mode::Encoder);
        encoder.reset(&format).expect("format");
        let mut encoded = Vec::new();
        // encoders need whole units, cut the input to whole blocks
        let samples_per_block = format.samples_per_block().expect("adpcm") as usize;
        let block_pcm = samples_per_block * 4;
        let whole = &pcm[..pcm.len() / block_pcm * block_pcm];
        encoder.encode(&src, whole, &mut encoded).expect("encode");

        c.bench_function(&format!("encode_blocks_{}", name), |b| b.iter(|| {
            let mut out = Vec::with_capacity(encoded.len());
            encoder.encode(&src, black_box(whole), &mut out).expect("encode");
            black_box(out);
        }));
        let mut decoder = DspContext::new(Mode::Decoder);
        decoder.reset(&format).expect("format");
        c.bench_function(&format!("decode_blocks_{}", name), |b| b.iter(|| {
            let mut out = Vec::with_capacity(whole.len());
            decoder.decode(black_box(&encoded), &mut out).expect("decode");
            black_box(out);
        }));
    }

    c.bench_function("resample_22050_to_44100", |b| b.iter(|| {
        let mut out = Vec::new();
        black_box(audio_dsp::resample(black_box(&pcm), 2,
            audio_dsp::PcmLayout::new(2, 22050), audio_dsp::PcmLayout::new(2, 44100),
            &mut out).expect("resample"));
    }));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
