use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mp4probe::{FileParser, FrameType};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "mp4samples",
    about = "Print per-sample timing and offsets, optionally extract payloads"
)]
struct Args {
    /// Input MP4 file
    input: PathBuf,

    /// Track index (default: all tracks)
    #[arg(long)]
    track: Option<usize>,

    /// Limit number of samples printed per track
    #[arg(long)]
    limit: Option<usize>,

    /// Classify frame types from the bitstream
    #[arg(long)]
    classify: bool,

    /// Extract one sample by index and write it next to --output
    #[arg(long)]
    extract: Option<usize>,

    /// Extraction form: raw, video (start codes), or audio (ADTS)
    #[arg(long, default_value = "raw")]
    mode: String,

    /// Output path for --extract
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut parser = FileParser::new();
    if let Err(e) = parser.parse(&args.input) {
        for msg in parser.errors() {
            eprintln!("error: {msg}");
        }
        return Err(e.into());
    }

    if let Some(sample) = args.extract {
        let track = args.track.unwrap_or(0);
        let bytes = match args.mode.as_str() {
            "video" => parser.video_sample(track, sample)?,
            "audio" => parser.audio_sample(track, sample)?,
            _ => parser.sample(track, sample)?,
        };
        let out = args
            .output
            .unwrap_or_else(|| PathBuf::from(format!("track{track}_sample{sample}.bin")));
        fs::write(&out, &bytes)?;
        println!("wrote {} bytes to {}", bytes.len(), out.display());
        return Ok(());
    }

    let indices: Vec<usize> = match args.track {
        Some(i) => vec![i],
        None => (0..parser.tracks().len()).collect(),
    };
    for ti in indices {
        let count = parser.track(ti)?.media.samples.len();
        let shown = args.limit.unwrap_or(count).min(count);
        {
            let t = parser.track(ti)?;
            println!(
                "track {ti} (id {}): {} samples, codec {}",
                t.id,
                count,
                t.media.codec.name()
            );
        }
        for si in 0..shown {
            let frame = if args.classify {
                parser.classify_frame(ti, si)?
            } else {
                FrameType::Unknown
            };
            let s = &parser.track(ti)?.media.samples[si];
            let key = match s.key {
                1 => "sync",
                2 => "sync*",
                0 => "-",
                _ => "?",
            };
            let mut line = format!(
                "  #{:<6} off={:<10} size={:<8} dts={:<8} pts={:<8} {}",
                s.index, s.offset, s.size, s.dts_ms, s.pts_ms, key
            );
            if args.classify {
                line.push_str(&format!(" {frame:?}"));
            }
            println!("{line}");
        }
        if shown < count {
            println!("  ... {} more", count - shown);
        }
    }
    Ok(())
}
