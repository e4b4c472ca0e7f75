use clap::{ArgAction, Parser};
use mp4probe::known_boxes::KnownBox;
use mp4probe::{BoxData, FileParser, JsonSink, Mp4Box, ParseStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF box-tree explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: PathBuf,

    /// Limit recursion depth for tree output
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Emit JSON instead of a human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Include full per-entry tables in JSON output
    #[arg(long, action = ArgAction::SetTrue)]
    tables: bool,
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
        let mut sink = if args.tables {
            JsonSink::new()
        } else {
            JsonSink::summary_only()
        };
        parser.export(&mut sink);
        println!("{}", serde_json::to_string_pretty(&sink.into_value())?);
    } else {
        for b in parser.boxes() {
            print_tree(b, 0, args.max_depth);
        }
    }
    Ok(())
}

fn print_tree(b: &Mp4Box, depth: usize, max_depth: usize) {
    if depth > max_depth {
        return;
    }
    let indent = "  ".repeat(depth);
    let mut line = format!(
        "{indent}{} @{} size={}",
        b.hdr.typ.as_str_lossy(),
        b.hdr.start,
        b.hdr.size
    );
    if b.canonical != b.hdr.typ {
        line.push_str(&format!(" ({})", b.canonical.as_str_lossy()));
    }
    let name = KnownBox::from(b.canonical).full_name();
    if !name.is_empty() {
        line.push_str(&format!("  {name}"));
    }
    match b.status {
        ParseStatus::Incomplete => line.push_str("  [incomplete]"),
        ParseStatus::Invalid => line.push_str("  [invalid]"),
        ParseStatus::Complete => {}
    }
    if let Some(u) = b.hdr.uuid {
        line.push_str(&format!("  uuid={}", hex::encode(u)));
    }
    if let BoxData::Custom(c) = &b.data {
        line.push_str(&format!("  <{}>", c.name()));
    }
    println!("{line}");
    for c in &b.children {
        print_tree(c, depth + 1, max_depth);
    }
}
