//! Example: track beats in a WAV file or a synthetic click track
//!
//! Usage:
//!   cargo run --release --example click_track -- [--bpm N] [--log beats.txt] [file.wav]
//!
//! Without a file, eight seconds of 120 BPM clicks at 8 kHz are generated.
//! Set `RUST_LOG=debug` to see adopted tempos.

use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::thread;
use std::time::Duration;

use stratum_live::stream::{BeatLog, ChannelObserver};
use stratum_live::{NullSink, SliceSource, StreamOrchestrator, TrackerConfig};

fn load_wav(path: &str) -> Result<SliceSource, Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let source = match spec.sample_format {
        hound::SampleFormat::Int if spec.bits_per_sample == 16 => {
            let pcm = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
            SliceSource::from_interleaved_i16(&pcm, channels, spec.sample_rate as f64)?
        }
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f64;
            let samples = reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f64 / max_value))
                .collect::<Result<Vec<_>, _>>()?;
            let mono = stratum_live::preprocessing::interleaved_to_mono(&samples, channels)?;
            SliceSource::new(mono, spec.sample_rate as f64)?
        }
        hound::SampleFormat::Float => {
            let samples = reader
                .samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<Vec<_>, _>>()?;
            let mono = stratum_live::preprocessing::interleaved_to_mono(&samples, channels)?;
            SliceSource::new(mono, spec.sample_rate as f64)?
        }
    };
    Ok(source)
}

fn synthetic_clicks() -> Result<SliceSource, Box<dyn std::error::Error>> {
    let frame_rate = 8000usize;
    let samples = (0..8 * frame_rate)
        .map(|i| {
            let t = (i % (frame_rate / 2)) as f64 / frame_rate as f64;
            if t < 0.04 {
                0.8 * (-t / 0.01).exp() * (2.0 * std::f64::consts::PI * 200.0 * t).sin()
            } else {
                0.0
            }
        })
        .collect();
    Ok(SliceSource::new(samples, frame_rate as f64)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = TrackerConfig::default();
    let mut log_path = None;
    let mut input = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bpm" => {
                config.expected_bpm = args.next().ok_or("--bpm needs a value")?.parse()?;
            }
            "--log" => log_path = Some(args.next().ok_or("--log needs a path")?),
            _ => input = Some(arg),
        }
    }

    let source = match &input {
        Some(path) => load_wav(path)?,
        None => {
            // Coarser hops keep the synthetic run short
            config.min_reaction_ms = 10.0;
            synthetic_clicks()?
        }
    };

    let mut orchestrator = StreamOrchestrator::new(config, source, NullSink::new())?;
    let reaction_ms = orchestrator.layout().reaction_ms;

    if let Some(path) = &log_path {
        let log = BeatLog::new(
            BufWriter::new(File::create(path)?),
            orchestrator.config(),
            orchestrator.layout(),
        )?;
        orchestrator.add_observer(Box::new(log));
    }

    let (observer, beats) = ChannelObserver::bounded(1024);
    orchestrator.add_observer(Box::new(observer.beats_only()));

    let printer = thread::spawn(move || {
        while let Ok(beat) = beats.recv_timeout(Duration::from_secs(5)) {
            match beat.bpm(reaction_ms) {
                Some(bpm) => println!(
                    "{:>8.0} ms  beat  {:>6.1} BPM  confidence {:.3}",
                    beat.timestamp_ms, bpm, beat.confidence
                ),
                None => println!("{:>8.0} ms  beat", beat.timestamp_ms),
            }
        }
    });

    let summary = orchestrator.run()?;
    drop(orchestrator);
    let _ = printer.join();

    println!(
        "{} windows, {} beats, final tempo {:.1} BPM",
        summary.windows_processed,
        summary.beats,
        if summary.windows_between_beats > 0.0 {
            60_000.0 / (summary.windows_between_beats * reaction_ms)
        } else {
            0.0
        }
    );
    Ok(())
}
