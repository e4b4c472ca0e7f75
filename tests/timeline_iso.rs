mod common;

use common::*;
use mp4probe::{Codec, Mp4Parser, Mp4Type, TrackKind};
use std::io::Cursor;

fn parse(data: Vec<u8>) -> Mp4Parser<Cursor<Vec<u8>>> {
    let mut p = Mp4Parser::new();
    p.parse_from(Cursor::new(data)).expect("parse failed");
    p
}

fn video_stbl() -> Vec<Vec<u8>> {
    vec![
        stsd(&[avc1(320, 240)]),
        stts(&[(3, 1000)]),
        stsc(&[(1, 3, 1)]),
        stsz_constant(500, 3),
        stco(&[1000]),
        stss(&[1]),
    ]
}

fn single_video_file(duration: u32, stbl: Vec<Vec<u8>>) -> Vec<u8> {
    let moov = container(
        b"moov",
        &[mvhd(1000, duration), trak(1, duration, 1000, b"vide", &stbl)],
    );
    let mut file = ftyp();
    file.extend_from_slice(&moov);
    // enough trailing bytes that declared sample offsets stay inside the file
    file.extend_from_slice(&bx(b"mdat", &vec![0u8; 2600]));
    file
}

#[test]
fn three_samples_single_chunk() {
    let p = parse(single_video_file(3000, video_stbl()));
    assert_eq!(p.mp4_type(), Mp4Type::Iso);
    assert_eq!(p.tracks().len(), 1);

    let t = &p.tracks()[0];
    assert_eq!(t.id, 1);
    assert_eq!(t.kind, TrackKind::Video);
    assert_eq!(t.media.codec, Codec::H264);
    assert_eq!(t.media.timescale, 1000);

    let s = &t.media.samples;
    assert_eq!(s.len(), 3);
    assert_eq!(s.iter().map(|s| s.dts_ms).collect::<Vec<_>>(), [0, 1000, 2000]);
    assert_eq!(s.iter().map(|s| s.pts_ms).collect::<Vec<_>>(), [0, 1000, 2000]);
    assert_eq!(s.iter().map(|s| s.offset).collect::<Vec<_>>(), [1000, 1500, 2000]);
    assert!(s.iter().all(|s| s.size == 500 && s.dts_delta_ms == 1000));

    let c = &t.media.chunks;
    assert_eq!(c.len(), 1);
    assert_eq!(c[0].offset, 1000);
    assert_eq!(c[0].first_sample, 0);
    assert_eq!(c[0].sample_count, 3);
    assert_eq!(c[0].size, 1500);
    assert_eq!(c[0].start_pts_ms, 0);
    assert_eq!(c[0].duration_ms, 3000);
    assert_eq!(c[0].avg_bitrate, 1500 * 8000 / 3000);

    assert_eq!(t.media.total_size, 1500);
    assert_eq!(t.media.duration_ms, 3000);
    assert_eq!(t.media.avg_bitrate, 1500 * 8000 / 3000);

    let v = t.media.video.as_ref().expect("video params");
    assert_eq!((v.width, v.height), (320, 240));
    assert_eq!(v.length_size, 4);
    assert!(v.avc.is_some());
}

#[test]
fn sync_table_drives_key_state() {
    let mut stbl = video_stbl();
    stbl[5] = stss(&[1, 3]);
    let p = parse(single_video_file(3000, stbl));
    let t = &p.tracks()[0];
    assert_eq!(t.media.samples.iter().map(|s| s.key).collect::<Vec<_>>(), [1, 0, 1]);
    assert_eq!(t.media.sync_samples, [0, 2]);
}

#[test]
fn missing_sync_table_leaves_keys_unknown() {
    let stbl = video_stbl().into_iter().take(5).collect::<Vec<_>>();
    let p = parse(single_video_file(3000, stbl));
    let t = &p.tracks()[0];
    assert!(t.media.samples.iter().all(|s| s.key == -1));
    assert!(t.media.sync_samples.is_empty());
}

#[test]
fn composition_offsets_shift_pts() {
    let mut stbl = video_stbl();
    stbl.push(ctts(&[(1, 2000), (2, 0)]));
    let p = parse(single_video_file(3000, stbl));
    let s = &p.tracks()[0].media.samples;
    assert_eq!(s.iter().map(|s| s.dts_ms).collect::<Vec<_>>(), [0, 1000, 2000]);
    assert_eq!(s.iter().map(|s| s.pts_ms).collect::<Vec<_>>(), [2000, 1000, 2000]);
}

#[test]
fn zero_header_duration_falls_back_to_chunk_sum() {
    // One chunk covering 3000 ms, minus the lead sample's delta.
    let p = parse(single_video_file(0, video_stbl()));
    assert_eq!(p.tracks()[0].media.duration_ms, 2000);
}

#[test]
fn sample_to_chunk_runs_expand_over_chunks() {
    let stbl = vec![
        stsd(&[avc1(320, 240)]),
        stts(&[(5, 100)]),
        // two samples per chunk until chunk 3, then one
        stsc(&[(1, 2, 1), (3, 1, 1)]),
        stsz_explicit(&[10, 20, 30, 40, 50]),
        stco(&[1000, 1100, 1200]),
    ];
    let p = parse(single_video_file(500, stbl));
    let t = &p.tracks()[0];
    let c = &t.media.chunks;
    assert_eq!(c.len(), 3);
    assert_eq!(c.iter().map(|c| c.sample_count).collect::<Vec<_>>(), [2, 2, 1]);
    assert_eq!(c.iter().map(|c| c.first_sample).collect::<Vec<_>>(), [0, 2, 4]);
    let s = &t.media.samples;
    assert_eq!(
        s.iter().map(|s| s.offset).collect::<Vec<_>>(),
        [1000, 1010, 1100, 1130, 1200]
    );
    assert_eq!(t.media.total_size, 150);
}

#[test]
fn compact_size_table_drives_offsets() {
    let stbl = vec![
        stsd(&[avc1(320, 240)]),
        stts(&[(3, 1000)]),
        stsc(&[(1, 3, 1)]),
        // odd count: the final byte's low nibble is padding
        stz2_nibbles(&[7, 3, 9]),
        stco(&[1000]),
    ];
    let p = parse(single_video_file(3000, stbl));
    let s = &p.tracks()[0].media.samples;
    assert_eq!(s.iter().map(|s| s.size).collect::<Vec<_>>(), [7, 3, 9]);
    assert_eq!(s.iter().map(|s| s.offset).collect::<Vec<_>>(), [1000, 1007, 1010]);
    assert_eq!(p.tracks()[0].media.total_size, 19);
}

#[test]
fn audio_track_reports_codec_and_params() {
    let stbl = vec![
        stsd(&[mp4a(2, 44100, 0x40)]),
        stts(&[(2, 1024)]),
        stsc(&[(1, 2, 1)]),
        stsz_explicit(&[400, 420]),
        stco(&[900]),
    ];
    let moov = container(
        b"moov",
        &[mvhd(44100, 88200), trak(1, 88200, 44100, b"soun", &stbl)],
    );
    let mut file = ftyp();
    file.extend_from_slice(&moov);
    file.extend_from_slice(&bx(b"mdat", &vec![0u8; 2000]));

    let p = parse(file);
    let t = &p.tracks()[0];
    assert_eq!(t.kind, TrackKind::Audio);
    assert_eq!(t.media.codec, Codec::Aac(0x40));
    let a = t.media.audio.as_ref().expect("audio params");
    assert_eq!(a.channel_count, 2);
    assert_eq!(a.sample_rate, 44100);
    assert_eq!(a.object_type, Some(0x40));
    assert_eq!(t.media.duration_ms, 2000);
}

#[test]
fn missing_chunk_offsets_are_fatal() {
    let stbl = video_stbl().into_iter().take(4).collect::<Vec<_>>();
    let mut p = Mp4Parser::new();
    let err = p.parse_from(Cursor::new(single_video_file(3000, stbl)));
    assert!(err.is_err());
    assert!(!p.errors().is_empty());
    assert!(p.tracks().is_empty());
}

#[test]
fn movie_without_tracks_is_fatal() {
    let moov = container(b"moov", &[mvhd(1000, 0)]);
    let mut file = ftyp();
    file.extend_from_slice(&moov);
    let mut p = Mp4Parser::new();
    assert!(p.parse_from(Cursor::new(file)).is_err());
}
