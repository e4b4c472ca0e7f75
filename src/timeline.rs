//! Track and timeline reconstruction.
//!
//! Turns a parsed box tree into per-track sample and chunk lists with
//! millisecond timestamps. Plain movies derive everything from the sample
//! tables under each `stbl`; fragmented movies replay the `trex`/`tfhd`/`trun`
//! default chain across every `moof` and then group samples into GOPs.

use crate::bitstream::FrameType;
use crate::boxes::{BoxData, FourCC, Mp4Box, find_box, top_level};
use crate::entries::{AvcConfig, HvcConfig, is_aac_object_type, object_type_name};
use crate::error::{Error, Result};
use crate::tables::{SAMPLE_FLAG_IS_NON_SYNC, StszData, Stz2Data, TfhdData, TrexData, tfhd_flags};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

/// Resolved codec identity for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Codec {
    H264,
    Hevc,
    /// AAC family; payload is the systems object-type byte.
    Aac(u8),
    /// Any other codec reached through an elementary-stream descriptor.
    ObjectType(u8),
    #[default]
    Unknown,
}

impl Codec {
    pub fn name(&self) -> &'static str {
        match self {
            Codec::H264 => "H.264/AVC",
            Codec::Hevc => "H.265/HEVC",
            Codec::Aac(ot) | Codec::ObjectType(ot) => object_type_name(*ot),
            Codec::Unknown => "Unknown",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Codec::H264 | Codec::Hevc)
    }
}

fn map_object_type(ot: u8) -> Codec {
    match ot {
        0x21 => Codec::H264,
        0x23 => Codec::Hevc,
        ot if is_aac_object_type(ot) => Codec::Aac(ot),
        ot => Codec::ObjectType(ot),
    }
}

/// One reconstructed sample. `key` is tri-state plus one: -1 unknown, 0 not
/// a sync sample, 1 sync sample, 2 inferred from the bitstream after the
/// container said otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct SampleItem {
    pub index: usize,
    pub offset: u64,
    pub size: u32,
    pub dts_ms: i64,
    pub pts_ms: i64,
    pub dts_delta_ms: u64,
    pub key: i8,
    pub frame_type: FrameType,
    pub nalu_types: Vec<u8>,
}

/// A storage chunk (plain movies) or GOP (fragmented movies).
#[derive(Debug, Clone, Serialize)]
pub struct ChunkItem {
    pub index: usize,
    pub offset: u64,
    pub size: u64,
    pub first_sample: usize,
    pub sample_count: usize,
    pub start_pts_ms: i64,
    pub duration_ms: u64,
    /// Bits per second over the chunk's duration; 0 when duration is 0.
    pub avg_bitrate: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoParams {
    pub width: u16,
    pub height: u16,
    /// NALU length-prefix width from the configuration record.
    pub length_size: u8,
    pub avc: Option<AvcConfig>,
    pub hvc: Option<HvcConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioParams {
    pub channel_count: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
    pub object_type: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub codec: Codec,
    pub timescale: u32,
    pub duration_ms: u64,
    pub total_size: u64,
    pub avg_bitrate: u64,
    pub samples: Vec<SampleItem>,
    pub chunks: Vec<ChunkItem>,
    /// 0-based indices of sync samples.
    pub sync_samples: Vec<u32>,
    pub video: Option<VideoParams>,
    pub audio: Option<AudioParams>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackInfo {
    pub index: usize,
    pub id: u32,
    pub kind: TrackKind,
    pub media: MediaInfo,
}

pub fn ticks_to_ms(ticks: u64, timescale: u32) -> u64 {
    if timescale == 0 {
        return 0;
    }
    ticks * 1000 / timescale as u64
}

fn signed_ticks_to_ms(ticks: i64, timescale: u32) -> i64 {
    if timescale == 0 {
        return 0;
    }
    ticks * 1000 / timescale as i64
}

// ---------------------------------------------------------------- size table

enum SizeTable<'a> {
    Plain(&'a StszData),
    Compact(&'a Stz2Data),
}

impl SizeTable<'_> {
    fn sample_count(&self) -> u32 {
        match self {
            SizeTable::Plain(d) => d.sample_count,
            SizeTable::Compact(d) => d.sample_count,
        }
    }

    fn size_of(&self, idx: usize) -> u32 {
        match self {
            SizeTable::Plain(d) => d.size_of(idx),
            SizeTable::Compact(d) => d.size_of(idx),
        }
    }
}

// ---------------------------------------------------------------- codec resolution

#[derive(Default)]
struct EntryInfo {
    codec: Codec,
    video_params: Option<VideoParams>,
    audio_params: Option<AudioParams>,
}

fn resolve_entry(stsd: &Mp4Box) -> EntryInfo {
    let mut out = EntryInfo::default();
    let Some(entry) = stsd.children.first() else {
        return out;
    };
    match (&entry.canonical.0, &entry.data) {
        (b"avc1", BoxData::VisualEntry(v)) => {
            let avc = entry.child(b"avcC").and_then(|c| match &c.data {
                BoxData::AvcC(a) => Some(a.clone()),
                _ => None,
            });
            out.codec = Codec::H264;
            out.video_params = Some(VideoParams {
                width: v.width,
                height: v.height,
                length_size: avc.as_ref().map(|a| a.length_size).unwrap_or(4),
                avc,
                hvc: None,
            });
        }
        (b"hvc1", BoxData::VisualEntry(v)) => {
            let hvc = entry.child(b"hvcC").and_then(|c| match &c.data {
                BoxData::HvcC(h) => Some(h.clone()),
                _ => None,
            });
            out.codec = Codec::Hevc;
            out.video_params = Some(VideoParams {
                width: v.width,
                height: v.height,
                length_size: hvc.as_ref().map(|h| h.length_size).unwrap_or(4),
                avc: None,
                hvc,
            });
        }
        (b"mp4v", BoxData::VisualEntry(v)) => {
            let ot = esds_object_type(entry);
            out.codec = ot.map(map_object_type).unwrap_or(Codec::Unknown);
            out.video_params = Some(VideoParams {
                width: v.width,
                height: v.height,
                length_size: 4,
                avc: None,
                hvc: None,
            });
        }
        (b"mp4a", BoxData::AudioEntry(a)) => {
            let ot = esds_object_type(entry);
            out.codec = ot.map(map_object_type).unwrap_or(Codec::Unknown);
            // srat carries the real rate when it exceeds the 16.16 field
            let sample_rate = entry
                .child(b"srat")
                .and_then(|c| match &c.data {
                    BoxData::Srat(s) => Some(s.sampling_rate),
                    _ => None,
                })
                .unwrap_or(a.sample_rate);
            out.audio_params = Some(AudioParams {
                channel_count: a.channel_count,
                sample_size: a.sample_size,
                sample_rate,
                object_type: ot,
            });
        }
        _ => {
            warn!(entry = %entry.hdr.typ, "unrecognized sample entry, codec unknown");
        }
    }
    out
}

fn esds_object_type(entry: &Mp4Box) -> Option<u8> {
    entry.child(b"esds").and_then(|c| match &c.data {
        BoxData::Esds(e) => e.object_type,
        _ => None,
    })
}

// ---------------------------------------------------------------- shared pieces

struct TrakHeader<'a> {
    trak: &'a Mp4Box,
    track_id: u32,
    header_duration: u64,
    timescale: u32,
    kind: TrackKind,
    stsd: Option<&'a Mp4Box>,
}

fn trak_header(trak: &Mp4Box) -> TrakHeader<'_> {
    let (track_id, header_duration) = match trak.child(b"tkhd").map(|b| &b.data) {
        Some(BoxData::Tkhd(t)) => (t.track_id, t.duration),
        _ => (0, 0),
    };
    let timescale = match trak.descend(&[b"mdia", b"mdhd"]).map(|b| &b.data) {
        Some(BoxData::Mdhd(m)) => m.timescale,
        _ => 0,
    };
    let kind = match trak.descend(&[b"mdia", b"hdlr"]).map(|b| &b.data) {
        Some(BoxData::Hdlr(h)) => match &h.handler_type.0 {
            b"vide" => TrackKind::Video,
            b"soun" => TrackKind::Audio,
            _ => TrackKind::Other,
        },
        _ => TrackKind::Other,
    };
    let stsd = trak.descend(&[b"mdia", b"minf", b"stbl", b"stsd"]);
    TrakHeader {
        trak,
        track_id,
        header_duration,
        timescale,
        kind,
        stsd,
    }
}

/// Chunk/GOP roll-up over a finished sample list. Duration spans from the
/// chunk's first presentation time to its last sample's decode end.
fn chunk_metrics(samples: &[SampleItem], chunks: &mut [ChunkItem]) {
    for c in chunks.iter_mut() {
        if c.sample_count == 0 {
            continue;
        }
        let first = &samples[c.first_sample];
        let last = &samples[c.first_sample + c.sample_count - 1];
        c.offset = first.offset;
        c.size = samples[c.first_sample..c.first_sample + c.sample_count]
            .iter()
            .map(|s| s.size as u64)
            .sum();
        c.start_pts_ms = first.pts_ms;
        let end = last.dts_ms + last.dts_delta_ms as i64;
        c.duration_ms = (end - c.start_pts_ms).max(0) as u64;
        c.avg_bitrate = if c.duration_ms > 0 {
            c.size * 8000 / c.duration_ms
        } else {
            0
        };
    }
}

fn finish_media(
    mut media: MediaInfo,
    header_duration: u64,
    movie_timescale: u32,
) -> MediaInfo {
    media.total_size = media.samples.iter().map(|s| s.size as u64).sum();
    media.duration_ms = if header_duration > 0 && movie_timescale > 0 {
        ticks_to_ms(header_duration, movie_timescale)
    } else {
        // Degenerate fallback: chunk durations minus the lead sample's delta.
        // Zero chunks yields zero.
        let sum: u64 = media.chunks.iter().map(|c| c.duration_ms).sum();
        let lead = media
            .samples
            .first()
            .map(|s| s.dts_delta_ms)
            .unwrap_or(0);
        sum.saturating_sub(lead)
    };
    media.avg_bitrate = if media.duration_ms > 0 {
        media.total_size * 8000 / media.duration_ms
    } else {
        0
    };
    media.sync_samples = media
        .samples
        .iter()
        .filter(|s| s.key == 1)
        .map(|s| s.index as u32)
        .collect();
    media
}

fn movie_timescale(moov: &Mp4Box) -> u32 {
    match moov.child(b"mvhd").map(|b| &b.data) {
        Some(BoxData::Mvhd(m)) => m.timescale,
        _ => 0,
    }
}

// ---------------------------------------------------------------- plain movies

struct RunCursor<'a, T> {
    entries: &'a [T],
    idx: usize,
    used: u32,
}

impl<'a, T> RunCursor<'a, T> {
    fn new(entries: &'a [T]) -> Self {
        Self {
            entries,
            idx: 0,
            used: 0,
        }
    }

    /// Advance one sample and return the active entry; run lengths come from
    /// the caller since the entry types differ.
    fn next(&mut self, count_of: impl Fn(&T) -> u32) -> Option<&'a T> {
        while self.idx < self.entries.len() {
            let e = &self.entries[self.idx];
            if self.used < count_of(e) {
                self.used += 1;
                return Some(e);
            }
            self.idx += 1;
            self.used = 0;
        }
        None
    }
}

pub fn build_iso_tracks(boxes: &[Mp4Box]) -> Result<Vec<TrackInfo>> {
    let moov = top_level(boxes, b"moov").next().ok_or(Error::NoMovie)?;
    let movie_ts = movie_timescale(moov);
    let traks: Vec<_> = moov.children_of(b"trak").collect();
    if traks.is_empty() {
        return Err(Error::NoTracks);
    }
    let mut tracks = Vec::with_capacity(traks.len());
    for (index, trak) in traks.into_iter().enumerate() {
        let hdr = trak_header(trak);
        let stbl = hdr
            .trak
            .descend(&[b"mdia", b"minf", b"stbl"])
            .ok_or(Error::MissingBox("stbl"))?;
        let stsd = hdr.stsd.ok_or(Error::MissingBox("stsd"))?;
        let entry = resolve_entry(stsd);

        let sizes = match (stbl.child(b"stsz"), stbl.child(b"stz2")) {
            (Some(b), _) => match &b.data {
                BoxData::Stsz(d) => SizeTable::Plain(d),
                _ => return Err(Error::MissingBox("stsz")),
            },
            (None, Some(b)) => match &b.data {
                BoxData::Stz2(d) => SizeTable::Compact(d),
                _ => return Err(Error::MissingBox("stsz")),
            },
            _ => return Err(Error::MissingBox("stsz")),
        };
        let offsets: Vec<u64> = match (stbl.child(b"stco"), stbl.child(b"co64")) {
            (Some(b), _) => match &b.data {
                BoxData::Stco(d) => d.offsets.iter().map(|&o| o as u64).collect(),
                _ => return Err(Error::MissingBox("stco")),
            },
            (None, Some(b)) => match &b.data {
                BoxData::Co64(d) => d.offsets.clone(),
                _ => return Err(Error::MissingBox("stco")),
            },
            _ => return Err(Error::MissingBox("stco")),
        };
        let stts = match stbl.child(b"stts").map(|b| &b.data) {
            Some(BoxData::Stts(d)) => d,
            _ => return Err(Error::MissingBox("stts")),
        };
        let stsc = match stbl.child(b"stsc").map(|b| &b.data) {
            Some(BoxData::Stsc(d)) => d,
            _ => return Err(Error::MissingBox("stsc")),
        };
        let ctts = match stbl.child(b"ctts").map(|b| &b.data) {
            Some(BoxData::Ctts(d)) => Some(d),
            _ => None,
        };
        let sync: Option<HashSet<u32>> = match stbl.child(b"stss").map(|b| &b.data) {
            Some(BoxData::Stss(d)) => Some(
                d.sample_numbers
                    .iter()
                    .filter(|&&n| n > 0)
                    .map(|&n| n - 1)
                    .collect(),
            ),
            _ => None,
        };

        let sample_count = sizes.sample_count() as usize;

        // Expand the sample-to-chunk runs over the real chunk count.
        let mut chunks: Vec<ChunkItem> = Vec::with_capacity(offsets.len());
        let mut next_first = 0usize;
        let mut stsc_idx = 0usize;
        for (c, &off) in offsets.iter().enumerate() {
            while stsc_idx + 1 < stsc.entries.len()
                && (stsc.entries[stsc_idx + 1].first_chunk as usize).saturating_sub(1) <= c
            {
                stsc_idx += 1;
            }
            let spc = stsc
                .entries
                .get(stsc_idx)
                .map(|e| e.samples_per_chunk as usize)
                .unwrap_or(0);
            let count = spc.min(sample_count.saturating_sub(next_first));
            chunks.push(ChunkItem {
                index: c,
                offset: off,
                size: 0,
                first_sample: next_first,
                sample_count: count,
                start_pts_ms: 0,
                duration_ms: 0,
                avg_bitrate: 0,
            });
            next_first += count;
        }
        if next_first != sample_count {
            warn!(
                track = index,
                expanded = next_first,
                declared = sample_count,
                "chunk expansion does not cover the sample count"
            );
        }

        let mut samples = Vec::with_capacity(sample_count);
        let mut dts_ms: i64 = 0;
        let mut stts_cur = RunCursor::new(&stts.entries);
        let mut ctts_cur = ctts.map(|c| RunCursor::new(&c.entries));
        for chunk in &chunks {
            let mut intra = 0u64;
            for _ in 0..chunk.sample_count {
                let idx = samples.len();
                let delta = stts_cur
                    .next(|e| e.sample_count)
                    .map(|e| e.sample_delta)
                    .unwrap_or(0);
                let delta_ms = ticks_to_ms(delta as u64, hdr.timescale);
                let cts = ctts_cur
                    .as_mut()
                    .and_then(|c| c.next(|e| e.sample_count))
                    .map(|e| e.sample_offset)
                    .unwrap_or(0);
                let size = sizes.size_of(idx);
                let key = match &sync {
                    Some(set) => i8::from(set.contains(&(idx as u32))),
                    None => -1,
                };
                samples.push(SampleItem {
                    index: idx,
                    offset: chunk.offset + intra,
                    size,
                    dts_ms,
                    pts_ms: dts_ms + signed_ticks_to_ms(cts, hdr.timescale),
                    dts_delta_ms: delta_ms,
                    key,
                    frame_type: FrameType::Unknown,
                    nalu_types: Vec::new(),
                });
                intra += size as u64;
                dts_ms += delta_ms as i64;
            }
        }

        chunk_metrics(&samples, &mut chunks);
        let media = finish_media(
            MediaInfo {
                codec: entry.codec,
                timescale: hdr.timescale,
                duration_ms: 0,
                total_size: 0,
                avg_bitrate: 0,
                samples,
                chunks,
                sync_samples: Vec::new(),
                video: entry.video_params,
                audio: entry.audio_params,
            },
            hdr.header_duration,
            movie_ts,
        );
        tracks.push(TrackInfo {
            index,
            id: hdr.track_id,
            kind: hdr.kind,
            media,
        });
    }
    Ok(tracks)
}

// ---------------------------------------------------------------- fragmented movies

fn resolved_or(entry: Option<u32>, tfhd_default: Option<u32>, trex_default: u32) -> u32 {
    entry.or(tfhd_default).unwrap_or(trex_default)
}

pub fn build_fragmented_tracks(boxes: &[Mp4Box]) -> Result<Vec<TrackInfo>> {
    let moov = top_level(boxes, b"moov").next().ok_or(Error::NoMovie)?;
    let movie_ts = movie_timescale(moov);
    let mvex = moov.child(b"mvex").ok_or(Error::MissingBox("mvex"))?;
    let trexes: Vec<&TrexData> = mvex
        .children_of(b"trex")
        .filter_map(|b| match &b.data {
            BoxData::Trex(t) => Some(t),
            _ => None,
        })
        .collect();
    let traks: Vec<_> = moov.children_of(b"trak").collect();
    if traks.is_empty() {
        return Err(Error::NoTracks);
    }
    let moofs: Vec<&Mp4Box> = top_level(boxes, b"moof").collect();

    let mut tracks = Vec::with_capacity(traks.len());
    for (index, trak) in traks.into_iter().enumerate() {
        let hdr = trak_header(trak);
        let trex = *trexes.get(index).ok_or(Error::MissingBox("trex"))?;
        if trex.track_id != hdr.track_id {
            warn!(
                track = index,
                trex_id = trex.track_id,
                tkhd_id = hdr.track_id,
                "track-extends entry order does not match track order"
            );
        }
        let entry = hdr.stsd.map(resolve_entry).unwrap_or_default();

        let mut samples: Vec<SampleItem> = Vec::new();
        let mut dts_ms: i64 = 0;
        for moof in &moofs {
            let Some(traf) = moof.children_of(b"traf").nth(index) else {
                warn!(track = index, moof = moof.hdr.start, "fragment has no run for this track");
                continue;
            };
            let tfhd: &TfhdData = match traf.child(b"tfhd").map(|b| &b.data) {
                Some(BoxData::Tfhd(t)) => t,
                _ => return Err(Error::MissingBox("tfhd")),
            };
            if tfhd.flags & tfhd_flags::DURATION_IS_EMPTY != 0 {
                // an empty stretch of the timeline, no runs to walk
                continue;
            }
            // default-base-is-moof anchors at the fragment's body, just
            // past the size and type fields.
            let base = tfhd.base_data_offset.unwrap_or(if tfhd.default_base_is_moof() {
                moof.hdr.body_start()
            } else {
                0
            });
            let mut cursor = base;
            let mut saw_run = false;
            for trun_box in traf.children_of(b"trun") {
                let trun = match &trun_box.data {
                    BoxData::Trun(t) => t,
                    _ => continue,
                };
                saw_run = true;
                if let Some(off) = trun.data_offset {
                    cursor = base.saturating_add_signed(off as i64);
                }
                for (j, e) in trun.entries.iter().enumerate() {
                    let duration = resolved_or(
                        e.duration,
                        tfhd.default_sample_duration,
                        trex.default_sample_duration,
                    );
                    let size = resolved_or(
                        e.size,
                        tfhd.default_sample_size,
                        trex.default_sample_size,
                    );
                    let flags = if j == 0 && trun.first_sample_flags.is_some() {
                        trun.first_sample_flags.unwrap_or(0)
                    } else {
                        resolved_or(e.flags, tfhd.default_sample_flags, trex.default_sample_flags)
                    };
                    let delta_ms = ticks_to_ms(duration as u64, hdr.timescale);
                    let cts = e.composition_offset.unwrap_or(0);
                    let idx = samples.len();
                    samples.push(SampleItem {
                        index: idx,
                        offset: cursor,
                        size,
                        dts_ms,
                        pts_ms: dts_ms + signed_ticks_to_ms(cts, hdr.timescale),
                        dts_delta_ms: delta_ms,
                        key: i8::from(flags & SAMPLE_FLAG_IS_NON_SYNC == 0),
                        frame_type: FrameType::Unknown,
                        nalu_types: Vec::new(),
                    });
                    cursor += size as u64;
                    dts_ms += delta_ms as i64;
                }
            }
            if !saw_run {
                return Err(Error::MissingBox("trun"));
            }
        }

        // GOP grouping: a new group opens at every sync sample.
        let mut chunks: Vec<ChunkItem> = Vec::new();
        for s in &samples {
            if s.key == 1 || chunks.is_empty() {
                chunks.push(ChunkItem {
                    index: chunks.len(),
                    offset: s.offset,
                    size: 0,
                    first_sample: s.index,
                    sample_count: 1,
                    start_pts_ms: 0,
                    duration_ms: 0,
                    avg_bitrate: 0,
                });
            } else if let Some(last) = chunks.last_mut() {
                last.sample_count += 1;
            }
        }
        chunk_metrics(&samples, &mut chunks);

        let media = finish_media(
            MediaInfo {
                codec: entry.codec,
                timescale: hdr.timescale,
                duration_ms: 0,
                total_size: 0,
                avg_bitrate: 0,
                samples,
                chunks,
                sync_samples: Vec::new(),
                video: entry.video_params,
                audio: entry.audio_params,
            },
            hdr.header_duration,
            movie_ts,
        );
        tracks.push(TrackInfo {
            index,
            id: hdr.track_id,
            kind: hdr.kind,
            media,
        });
    }
    Ok(tracks)
}

/// A movie is fragmented when any `moof` or `mvex` exists anywhere in the tree.
pub fn is_fragmented(boxes: &[Mp4Box]) -> bool {
    find_box(boxes, b"moof").is_some() || find_box(boxes, b"mvex").is_some()
}

/// Lookup used by summaries: the sample entry code of a track's first entry.
pub fn entry_code(trak_stsd: &Mp4Box) -> Option<FourCC> {
    trak_stsd.children.first().map(|c| c.hdr.typ)
}
