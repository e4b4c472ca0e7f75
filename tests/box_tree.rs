mod common;

use common::*;
use mp4probe::{BoxData, FourCC, Mp4Parser, ParseStatus};
use std::io::Cursor;

fn parse(data: Vec<u8>) -> Mp4Parser<Cursor<Vec<u8>>> {
    let mut p = Mp4Parser::new();
    p.parse_from(Cursor::new(data)).expect("parse failed");
    p
}

fn minimal_file() -> Vec<u8> {
    let stbl = vec![
        stsd(&[avc1(640, 480)]),
        stts(&[(1, 1000)]),
        stsc(&[(1, 1, 1)]),
        stsz_constant(100, 1),
        stco(&[500]),
    ];
    let moov = container(
        b"moov",
        &[mvhd(1000, 1000), trak(1, 1000, 1000, b"vide", &stbl)],
    );
    let mut file = ftyp();
    file.extend_from_slice(&moov);
    file.extend_from_slice(&bx(b"mdat", &vec![0u8; 700]));
    file
}

#[test]
fn top_level_boxes_and_extents() {
    let p = parse(minimal_file());
    let boxes = p.boxes();
    assert_eq!(boxes.len(), 3);
    assert_eq!(boxes[0].hdr.typ, FourCC(*b"ftyp"));
    assert_eq!(boxes[1].hdr.typ, FourCC(*b"moov"));
    assert_eq!(boxes[2].hdr.typ, FourCC(*b"mdat"));
    // extents tile the file
    assert_eq!(boxes[0].hdr.start, 0);
    for w in boxes.windows(2) {
        assert_eq!(w[0].hdr.end(), w[1].hdr.start);
    }
    assert!(boxes.iter().all(|b| b.status == ParseStatus::Complete));
    assert!(matches!(boxes[2].data, BoxData::Opaque));
}

#[test]
fn file_type_fields_decode() {
    let p = parse(minimal_file());
    match &p.boxes()[0].data {
        BoxData::Ftyp(f) => {
            assert_eq!(f.major_brand, FourCC(*b"isom"));
            assert_eq!(f.minor_version, 512);
            assert_eq!(f.compatible_brands, [FourCC(*b"isom"), FourCC(*b"iso2")]);
        }
        other => panic!("expected ftyp data, got {other:?}"),
    }
}

#[test]
fn sample_description_nests_codec_config() {
    let p = parse(minimal_file());
    let moov = &p.boxes()[1];
    let stsd = moov
        .descend(&[b"trak", b"mdia", b"minf", b"stbl", b"stsd"])
        .expect("stsd");
    assert_eq!(stsd.children.len(), 1);
    let entry = &stsd.children[0];
    assert_eq!(entry.hdr.typ, FourCC(*b"avc1"));
    match &entry.data {
        BoxData::VisualEntry(v) => {
            assert_eq!((v.width, v.height), (640, 480));
            assert_eq!(v.data_reference_index, 1);
        }
        other => panic!("expected visual entry, got {other:?}"),
    }
    let avcc = entry.child(b"avcC").expect("avcC");
    match &avcc.data {
        BoxData::AvcC(a) => {
            assert_eq!(a.length_size, 4);
            assert_eq!(a.sps.len(), 1);
            assert_eq!(a.pps.len(), 1);
        }
        other => panic!("expected avcC data, got {other:?}"),
    }
}

#[test]
fn free_resolves_to_skip_alias() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"free", &[0u8; 12]));
    let p = parse(file);
    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.hdr.typ, FourCC(*b"free"));
    assert_eq!(last.canonical, FourCC(*b"skip"));
    assert!(matches!(last.data, BoxData::Opaque));
}

#[test]
fn unknown_box_is_kept_with_its_extent() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"wxyz", &[1, 2, 3, 4]));
    let p = parse(file);
    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.hdr.typ, FourCC(*b"wxyz"));
    assert_eq!(last.hdr.size, 12);
    assert!(matches!(last.data, BoxData::Unknown));
    assert_eq!(last.status, ParseStatus::Complete);
}

#[test]
fn zero_size_box_runs_to_end_of_file() {
    let mut file = minimal_file();
    let start = file.len() as u64;
    file.extend_from_slice(&0u32.to_be_bytes());
    file.extend_from_slice(b"mdat");
    file.extend_from_slice(&[0u8; 40]);
    let p = parse(file.clone());
    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.hdr.start, start);
    assert_eq!(last.hdr.size, file.len() as u64 - start);
}

#[test]
fn body_past_end_of_file_is_fatal() {
    let mut file = minimal_file();
    file.extend_from_slice(&4096u32.to_be_bytes());
    file.extend_from_slice(b"mdat");
    let mut p = Mp4Parser::new();
    assert!(p.parse_from(Cursor::new(file)).is_err());
    assert!(!p.errors().is_empty());
}

#[test]
fn truncated_table_marks_box_incomplete() {
    // stts declares more entries than its body holds
    let mut bad_stts = Vec::new();
    bad_stts.extend_from_slice(&5u32.to_be_bytes());
    bad_stts.extend_from_slice(&1u32.to_be_bytes());
    bad_stts.extend_from_slice(&1000u32.to_be_bytes());
    let stbl = vec![
        stsd(&[avc1(640, 480)]),
        full(b"stts", 0, 0, &bad_stts),
        stsc(&[(1, 1, 1)]),
        stsz_constant(100, 1),
        stco(&[500]),
    ];
    let moov = container(
        b"moov",
        &[mvhd(1000, 1000), trak(1, 1000, 1000, b"vide", &stbl)],
    );
    let mut file = ftyp();
    file.extend_from_slice(&moov);
    file.extend_from_slice(&bx(b"mdat", &vec![0u8; 700]));
    let p = parse(file);
    let stts_box = p.boxes()[1]
        .descend(&[b"trak", b"mdia", b"minf", b"stbl", b"stts"])
        .expect("stts");
    assert_eq!(stts_box.status, ParseStatus::Incomplete);
    match &stts_box.data {
        BoxData::Stts(d) => assert_eq!(d.entries.len(), 1),
        other => panic!("expected stts data, got {other:?}"),
    }
}
