
use std::env;
use std::fs;
use std::process::ExitCode;

use audio_dsp::{AudioFormat, Dsp, DspContext, Mode};

fn usage() -> ExitCode {
    println!("Usage: dsp-tester {{decode|encode}} {{ima|ms|pcm}} channels sample_rate block_align \
        input_file output_file");
    println!("  encode reads 16-bit little-endian PCM, decode writes it");
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 8 {
        return usage();
    }
    let command = args[1].as_str();
    let channels = args[3].parse::<u16>().expect("bad channels");
    let sample_rate = args[4].parse::<u32>().expect("bad sample rate");
    let block_align = args[5].parse::<u16>().expect("bad block align");
    let format = match args[2].as_str() {
        "ima" => AudioFormat::ima_adpcm(channels, sample_rate, block_align),
        "ms" => AudioFormat::ms_adpcm(channels, sample_rate, block_align),
        "pcm" => AudioFormat::pcm(channels, sample_rate, 16),
        other => {
            eprintln!("ERROR: invalid format: {}", other);
            return usage();
        }
    };
    let mode = match command {
        "encode" => Mode::Encoder,
        "decode" => Mode::Decoder,
        _ => {
            eprintln!("ERROR: invalid command: {}", command);
            return usage();
        }
    };

    let input = fs::read(&args[6]).expect("can't read input file");
    let mut ctx = DspContext::new(mode);
    if let Err(e) = ctx.reset(&format) {
        eprintln!("ERROR: {}", e);
        return ExitCode::FAILURE;
    }
    let mut output = Vec::new();
    let result = match mode {
        Mode::Encoder => ctx.encode(&AudioFormat::pcm(channels, sample_rate, 16), &input,
            &mut output),
        Mode::Decoder => ctx.decode(&input, &mut output),
    };
    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        return ExitCode::FAILURE;
    }
    fs::write(&args[7], &output).expect("can't write output file");
    println!("{} {} bytes to {} bytes", command, input.len(), output.len());
    ExitCode::SUCCESS
}
