//! Parser facade: owns the reader, the box tree, the track timelines, and
//! the per-instance extension registry.
//!
//! A `parse` call always starts from a clean slate: prior tree, tracks,
//! error queue, and file handle are discarded first. Everything afterwards
//! is a read-only view, except on-demand frame classification which caches
//! its result into the sample it classified.

use crate::bitstream::{Classification, FrameType, HevcContext, classify_h264, classify_hevc};
use crate::boxes::{BoxData, BoxKey, Mp4Box, ParseStatus};
use crate::error::{Error, Result};
use crate::extract::{adts_sample, annexb_sample, read_raw_sample};
use crate::info::{InfoSink, InfoValue};
use crate::known_boxes::KnownBox;
use crate::reader::DataReader;
use crate::registry::{BoxHandler, Registry};
use crate::timeline::{
    SampleItem, TrackInfo, TrackKind, build_fragmented_tracks, build_iso_tracks, is_fragmented,
};
use crate::tree::{finalize_tree, parse_tree};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mp4Type {
    Unknown,
    Iso,
    Fragmented,
}

pub struct Mp4Parser<R: Read + Seek> {
    reader: Option<DataReader<R>>,
    registry: Registry,
    boxes: Vec<Mp4Box>,
    tracks: Vec<TrackInfo>,
    mp4_type: Mp4Type,
    errors: Vec<String>,
    /// Lazily-built HEVC SPS/PPS geometry, one slot per track.
    hevc_ctx: HashMap<usize, Option<HevcContext>>,
}

pub type FileParser = Mp4Parser<File>;

impl<R: Read + Seek> Default for Mp4Parser<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> Mp4Parser<R> {
    pub fn new() -> Self {
        Self {
            reader: None,
            registry: Registry::new(),
            boxes: Vec::new(),
            tracks: Vec::new(),
            mp4_type: Mp4Type::Unknown,
            errors: Vec::new(),
            hevc_ctx: HashMap::new(),
        }
    }

    /// Register a custom box handler; scoped to this instance.
    pub fn register_handler(&mut self, key: BoxKey, full_box: bool, handler: Box<dyn BoxHandler>) {
        self.registry.register(key, full_box, handler);
    }

    /// Discard all parsed state and close the input.
    pub fn clear(&mut self) {
        self.reader = None;
        self.boxes.clear();
        self.tracks.clear();
        self.errors.clear();
        self.hevc_ctx.clear();
        self.mp4_type = Mp4Type::Unknown;
    }

    /// Parse from an already-open source.
    pub fn parse_from(&mut self, inner: R) -> Result<()> {
        self.clear();
        let reader = DataReader::from_inner(inner)?;
        self.run(reader)
    }

    fn run(&mut self, mut reader: DataReader<R>) -> Result<()> {
        let outcome: Result<(Vec<Mp4Box>, Mp4Type, Vec<TrackInfo>)> = (|| {
            let mut boxes = parse_tree(&mut reader, &self.registry)?;
            finalize_tree(&mut reader, &mut boxes)?;
            let mp4_type = if is_fragmented(&boxes) {
                Mp4Type::Fragmented
            } else {
                Mp4Type::Iso
            };
            let tracks = match mp4_type {
                Mp4Type::Fragmented => build_fragmented_tracks(&boxes)?,
                _ => build_iso_tracks(&boxes)?,
            };
            Ok((boxes, mp4_type, tracks))
        })();
        match outcome {
            Ok((boxes, mp4_type, tracks)) => {
                info!(
                    top_level = boxes.len(),
                    tracks = tracks.len(),
                    fragmented = mp4_type == Mp4Type::Fragmented,
                    "parse complete"
                );
                self.boxes = boxes;
                self.mp4_type = mp4_type;
                self.tracks = tracks;
                self.reader = Some(reader);
                Ok(())
            }
            Err(e) => {
                self.errors.push(e.to_string());
                Err(e)
            }
        }
    }

    pub fn mp4_type(&self) -> Mp4Type {
        self.mp4_type
    }

    pub fn boxes(&self) -> &[Mp4Box] {
        &self.boxes
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    /// Fraction of the file covered by parsed top-level boxes, 0.0 to 1.0.
    pub fn progress(&self) -> f64 {
        let Some(reader) = &self.reader else {
            return 0.0;
        };
        let len = reader.len();
        if len == 0 {
            return 0.0;
        }
        let covered = self.boxes.last().map(|b| b.hdr.end()).unwrap_or(0);
        covered as f64 / len as f64
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn track(&self, index: usize) -> Result<&TrackInfo> {
        self.tracks.get(index).ok_or(Error::NoSuchTrack(index))
    }

    pub fn sample_count(&self, track: usize) -> Result<usize> {
        Ok(self.track(track)?.media.samples.len())
    }

    fn sample_ref(&self, track: usize, sample: usize) -> Result<&SampleItem> {
        self.track(track)?
            .media
            .samples
            .get(sample)
            .ok_or(Error::NoSuchSample { track, sample })
    }

    /// Copy one sample's raw bytes.
    pub fn sample(&mut self, track: usize, sample: usize) -> Result<Vec<u8>> {
        let item = self.sample_ref(track, sample)?.clone();
        let reader = self.reader.as_mut().ok_or(Error::NotParsed)?;
        read_raw_sample(reader, &item)
    }

    /// One video sample in start-code form; key frames carry their
    /// parameter sets up front.
    pub fn video_sample(&mut self, track: usize, sample: usize) -> Result<Vec<u8>> {
        let raw = self.sample(track, sample)?;
        let t = self.track(track)?;
        if !t.media.codec.is_video() {
            return Ok(raw);
        }
        let item = self.sample_ref(track, sample)?;
        let key = item.key == 1 || item.key == 2;
        match &t.media.video {
            Some(params) => Ok(annexb_sample(&raw, params, key)),
            None => Ok(raw),
        }
    }

    /// One audio sample behind a synthesized ADTS header.
    pub fn audio_sample(&mut self, track: usize, sample: usize) -> Result<Vec<u8>> {
        let raw = self.sample(track, sample)?;
        let t = self.track(track)?;
        match &t.media.audio {
            Some(params) => Ok(adts_sample(&raw, params)),
            None => Ok(raw),
        }
    }

    /// Classify one sample's frame type from its bitstream. The result is
    /// cached on the sample; repeat calls return the cache.
    pub fn classify_frame(&mut self, track: usize, sample: usize) -> Result<FrameType> {
        let cached = {
            let item = self.sample_ref(track, sample)?;
            if !item.nalu_types.is_empty() || item.frame_type != FrameType::Unknown {
                Some(item.frame_type)
            } else {
                None
            }
        };
        if let Some(t) = cached {
            return Ok(t);
        }

        let raw = self.sample(track, sample)?;
        let t = self.track(track)?;
        let codec = t.media.codec;
        let length_size = t.media.video.as_ref().map(|v| v.length_size).unwrap_or(4);
        let result: Classification = match codec {
            crate::timeline::Codec::H264 => classify_h264(&raw, length_size),
            crate::timeline::Codec::Hevc => {
                let ctx = self.hevc_context(track);
                classify_hevc(&raw, length_size, ctx.as_ref())
            }
            _ => return Ok(FrameType::Unknown),
        };

        let item = &mut self.tracks[track].media.samples[sample];
        item.frame_type = result.frame_type;
        item.nalu_types = result.nalu_types;
        if result.frame_type == FrameType::I && item.key == 0 {
            warn!(
                track,
                sample, "bitstream says intra frame but the container flags it non-sync"
            );
            item.key = 2;
        }
        Ok(result.frame_type)
    }

    fn hevc_context(&mut self, track: usize) -> Option<HevcContext> {
        if let Some(slot) = self.hevc_ctx.get(&track) {
            return *slot;
        }
        let ctx = self
            .tracks
            .get(track)
            .and_then(|t| t.media.video.as_ref())
            .and_then(|v| v.hvc.as_ref())
            .and_then(HevcContext::from_config);
        self.hevc_ctx.insert(track, ctx);
        ctx
    }

    /// Multi-line human-readable summary.
    pub fn basic_info(&self) -> String {
        use std::fmt::Write;
        let mut s = String::new();
        let kind = match self.mp4_type {
            Mp4Type::Iso => "ISO base media",
            Mp4Type::Fragmented => "fragmented",
            Mp4Type::Unknown => "not parsed",
        };
        let _ = writeln!(s, "file type: {kind}");
        let _ = writeln!(s, "tracks: {}", self.tracks.len());
        for t in &self.tracks {
            let m = &t.media;
            let _ = write!(
                s,
                "  track {} (id {}): {:?}, {}, {} samples, {} ms, {} bps",
                t.index,
                t.id,
                t.kind,
                m.codec.name(),
                m.samples.len(),
                m.duration_ms,
                m.avg_bitrate
            );
            match (&m.video, &m.audio) {
                (Some(v), _) => {
                    let _ = writeln!(s, ", {}x{}", v.width, v.height);
                }
                (_, Some(a)) => {
                    let _ = writeln!(s, ", {} ch @ {} Hz", a.channel_count, a.sample_rate);
                }
                _ => {
                    let _ = writeln!(s);
                }
            }
        }
        s
    }

    /// Export the box tree and timelines through a structured-info sink.
    pub fn export(&self, sink: &mut dyn InfoSink) {
        let kind = match self.mp4_type {
            Mp4Type::Iso => "iso",
            Mp4Type::Fragmented => "fragmented",
            Mp4Type::Unknown => "unknown",
        };
        sink.pair("type", kind.into());
        sink.begin_array("boxes");
        for b in &self.boxes {
            export_box(b, sink);
        }
        sink.end_array();
        sink.begin_array("tracks");
        for t in &self.tracks {
            export_track(t, sink);
        }
        sink.end_array();
    }
}

impl FileParser {
    /// Parse a file from disk, replacing any prior state.
    pub fn parse(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.clear();
        let reader = DataReader::open(path)?;
        self.run(reader)
    }
}

fn status_name(s: ParseStatus) -> &'static str {
    match s {
        ParseStatus::Complete => "complete",
        ParseStatus::Incomplete => "incomplete",
        ParseStatus::Invalid => "invalid",
    }
}

fn export_box(b: &Mp4Box, sink: &mut dyn InfoSink) {
    sink.begin_child(&b.hdr.typ.as_str_lossy());
    sink.pair("type", b.hdr.typ.as_str_lossy().into());
    sink.pair("name", KnownBox::from(b.canonical).full_name().into());
    sink.pair("offset", b.hdr.start.into());
    sink.pair("size", b.hdr.size.into());
    if b.status != ParseStatus::Complete {
        sink.pair("status", status_name(b.status).into());
    }
    if let Some(v) = b.version {
        sink.pair("version", v.into());
    }
    if let Some(f) = b.flags {
        sink.pair("flags", f.into());
    }
    match &b.data {
        BoxData::Container | BoxData::Opaque | BoxData::Unknown => {}
        BoxData::Custom(c) => {
            sink.begin_child(c.name());
            c.export(sink);
            sink.end_child();
        }
        data => {
            if let Ok(v) = box_data_value(data) {
                export_value(&v, sink);
            }
        }
    }
    if !b.children.is_empty() {
        sink.begin_array("children");
        for c in &b.children {
            export_box(c, sink);
        }
        sink.end_array();
    }
    sink.end_child();
}

macro_rules! box_value_arms {
    ($data:expr, $($variant:ident),* $(,)?) => {
        match $data {
            $(BoxData::$variant(d) => serde_json::to_value(d),)*
            _ => Ok(serde_json::Value::Null),
        }
    };
}

fn box_data_value(data: &BoxData) -> serde_json::Result<serde_json::Value> {
    box_value_arms!(
        data, Ftyp, Mvhd, Tkhd, Mdhd, Hdlr, Elst, Dref, Stsd, VisualEntry, AudioEntry, AvcC,
        HvcC, Esds, Btrt, Pasp, Colr, Chnl, Srat, Stts, Ctts, Stsc, Stsz, Stz2, Stco, Co64,
        Stss, Sdtp, Mehd, Trex, Mfhd, Tfhd, Tfdt, Trun, Tfra, Mfro,
    )
}

/// Flatten a serde value into sink calls. Large arrays collapse to a count
/// when the sink declines tables.
fn export_value(v: &serde_json::Value, sink: &mut dyn InfoSink) {
    if let serde_json::Value::Object(m) = v {
        for (k, val) in m {
            export_named(k, val, sink);
        }
    }
}

fn export_named(name: &str, v: &serde_json::Value, sink: &mut dyn InfoSink) {
    match v {
        serde_json::Value::Object(_) => {
            sink.begin_child(name);
            export_value(v, sink);
            sink.end_child();
        }
        serde_json::Value::Array(items) => {
            if !sink.wants_tables() && items.len() > 32 {
                sink.pair(name, format!("{} entries", items.len()).into());
                return;
            }
            sink.begin_array(name);
            for item in items {
                match item {
                    serde_json::Value::Object(_) => {
                        sink.begin_child("");
                        export_value(item, sink);
                        sink.end_child();
                    }
                    other => export_named("", other, sink),
                }
            }
            sink.end_array();
        }
        serde_json::Value::String(s) => sink.pair(name, s.as_str().into()),
        serde_json::Value::Bool(b) => sink.pair(name, (*b).into()),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                sink.pair(name, u.into());
            } else if let Some(i) = n.as_i64() {
                sink.pair(name, i.into());
            } else {
                sink.pair(name, n.as_f64().unwrap_or(0.0).into());
            }
        }
        serde_json::Value::Null => sink.pair(name, InfoValue::Str(String::new())),
    }
}

fn export_track(t: &TrackInfo, sink: &mut dyn InfoSink) {
    sink.begin_child(&format!("track{}", t.index));
    sink.pair("id", t.id.into());
    let kind = match t.kind {
        TrackKind::Video => "video",
        TrackKind::Audio => "audio",
        TrackKind::Other => "other",
    };
    sink.pair("kind", kind.into());
    sink.pair("codec", t.media.codec.name().into());
    sink.pair("duration_ms", t.media.duration_ms.into());
    sink.pair("sample_count", t.media.samples.len().into());
    sink.pair("total_size", t.media.total_size.into());
    sink.pair("avg_bitrate", t.media.avg_bitrate.into());
    if let Some(v) = &t.media.video {
        sink.pair("width", v.width.into());
        sink.pair("height", v.height.into());
    }
    if let Some(a) = &t.media.audio {
        sink.pair("channels", a.channel_count.into());
        sink.pair("sample_rate", a.sample_rate.into());
    }
    if sink.wants_tables() {
        if let Ok(v) = serde_json::to_value(&t.media.samples) {
            export_named("samples", &v, sink);
        }
        if let Ok(v) = serde_json::to_value(&t.media.chunks) {
            export_named("chunks", &v, sink);
        }
    } else {
        sink.pair("chunk_count", t.media.chunks.len().into());
    }
    sink.end_child();
}
