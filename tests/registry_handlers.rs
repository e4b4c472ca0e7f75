mod common;

use common::*;
use mp4probe::{BoxData, BoxKey, CustomData, FourCC, InfoSink, JsonSink, Mp4Parser, ParseStatus};
use std::io::{Cursor, Read};

fn minimal_file() -> Vec<u8> {
    let stbl = vec![
        stsd(&[avc1(320, 240)]),
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

#[derive(Debug)]
struct Blob {
    label: &'static str,
    bytes: Vec<u8>,
}

impl CustomData for Blob {
    fn name(&self) -> &str {
        self.label
    }

    fn export(&self, sink: &mut dyn InfoSink) {
        sink.pair("length", (self.bytes.len() as u64).into());
    }
}

fn blob_handler(label: &'static str) -> Box<dyn mp4probe::BoxHandler> {
    Box::new(
        move |r: &mut dyn Read,
              _hdr: &mp4probe::BoxHeader,
              _version: Option<u8>,
              _flags: Option<u32>|
              -> anyhow::Result<Box<dyn CustomData>> {
            let mut bytes = Vec::new();
            r.read_to_end(&mut bytes)?;
            Ok(Box::new(Blob { label, bytes }))
        },
    )
}

#[test]
fn fourcc_handler_sees_box_body() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"vndx", &[1, 2, 3, 4, 5]));

    let mut p = Mp4Parser::new();
    p.register_handler(BoxKey::FourCC(FourCC(*b"vndx")), false, blob_handler("vendor"));
    p.parse_from(Cursor::new(file)).expect("parse failed");

    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.hdr.typ, FourCC(*b"vndx"));
    match &last.data {
        BoxData::Custom(c) => assert_eq!(c.name(), "vendor"),
        other => panic!("expected custom data, got {other:?}"),
    }
    assert_eq!(last.status, ParseStatus::Complete);
}

#[test]
fn full_box_handler_gets_version_and_flags() {
    let mut file = minimal_file();
    file.extend_from_slice(&full(b"vndf", 2, 0x000007, &[9, 9]));

    let mut p = Mp4Parser::new();
    p.register_handler(BoxKey::FourCC(FourCC(*b"vndf")), true, blob_handler("vf"));
    p.parse_from(Cursor::new(file)).expect("parse failed");

    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.version, Some(2));
    assert_eq!(last.flags, Some(7));
    match &last.data {
        // version/flags were consumed before the handler ran
        BoxData::Custom(_) => {}
        other => panic!("expected custom data, got {other:?}"),
    }
}

#[test]
fn uuid_handler_matches_extended_type() {
    let user_type = [0xabu8; 16];
    let mut body = Vec::new();
    body.extend_from_slice(&user_type);
    body.extend_from_slice(&[0xde, 0xad]);
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"uuid", &body));

    let mut p = Mp4Parser::new();
    p.register_handler(BoxKey::Uuid(user_type), false, blob_handler("ext"));
    p.parse_from(Cursor::new(file)).expect("parse failed");

    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.hdr.uuid, Some(user_type));
    match &last.data {
        BoxData::Custom(c) => assert_eq!(c.name(), "ext"),
        other => panic!("expected custom data, got {other:?}"),
    }
}

#[test]
fn registered_handler_wins_over_builtin() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"free", &[0u8; 8]));

    let mut p = Mp4Parser::new();
    p.register_handler(BoxKey::FourCC(FourCC(*b"free")), false, blob_handler("padding"));
    p.parse_from(Cursor::new(file)).expect("parse failed");

    let last = p.boxes().last().expect("boxes");
    assert!(matches!(last.data, BoxData::Custom(_)));
}

#[test]
fn handler_error_marks_box_invalid() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"vndx", &[0]));

    let mut p = Mp4Parser::new();
    p.register_handler(
        BoxKey::FourCC(FourCC(*b"vndx")),
        false,
        Box::new(
            |_r: &mut dyn Read,
             _hdr: &mp4probe::BoxHeader,
             _v: Option<u8>,
             _f: Option<u32>|
             -> anyhow::Result<Box<dyn CustomData>> {
                anyhow::bail!("malformed payload")
            },
        ),
    );
    p.parse_from(Cursor::new(file)).expect("parse failed");

    let last = p.boxes().last().expect("boxes");
    assert_eq!(last.status, ParseStatus::Invalid);
    assert!(matches!(last.data, BoxData::Unknown));
}

#[test]
fn registrations_are_scoped_to_one_parser() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"vndx", &[1, 2, 3]));

    let mut with = Mp4Parser::new();
    with.register_handler(BoxKey::FourCC(FourCC(*b"vndx")), false, blob_handler("vendor"));
    with.parse_from(Cursor::new(file.clone())).expect("parse failed");
    assert!(matches!(with.boxes().last().map(|b| &b.data), Some(BoxData::Custom(_))));

    let mut without = Mp4Parser::<Cursor<Vec<u8>>>::new();
    without.parse_from(Cursor::new(file)).expect("parse failed");
    assert!(matches!(without.boxes().last().map(|b| &b.data), Some(BoxData::Unknown)));
}

#[test]
fn custom_data_flows_through_export() {
    let mut file = minimal_file();
    file.extend_from_slice(&bx(b"vndx", &[1, 2, 3, 4, 5]));

    let mut p = Mp4Parser::new();
    p.register_handler(BoxKey::FourCC(FourCC(*b"vndx")), false, blob_handler("vendor"));
    p.parse_from(Cursor::new(file)).expect("parse failed");

    let mut sink = JsonSink::new();
    p.export(&mut sink);
    let value = sink.into_value();
    let boxes = value["boxes"].as_array().expect("boxes array");
    let custom = boxes
        .iter()
        .find(|b| b["type"] == "vndx")
        .expect("custom box in export");
    assert_eq!(custom["vendor"]["length"], 5);
}
