use clap::Parser;
use mp4probe::{FileParser, JsonSink};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Show media info for an MP4/ISOBMFF file")]
struct Args {
    /// MP4/ISOBMFF file path
    path: PathBuf,

    /// Output as JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut parser = FileParser::new();
    if let Err(e) = parser.parse(&args.path) {
        for msg in parser.errors() {
            eprintln!("error: {msg}");
        }
        return Err(e.into());
    }

    if args.json {
        // summary sink: skip per-sample tables
        let mut sink = JsonSink::summary_only();
        parser.export(&mut sink);
        println!("{}", serde_json::to_string_pretty(&sink.into_value())?);
    } else {
        print!("{}", parser.basic_info());
    }
    Ok(())
}
