//! Byte-level builders for synthetic MP4 files used by the integration tests.
#![allow(dead_code)]

/// Plain box: 32-bit size header plus body.
pub fn bx(typ: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + body.len());
    v.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(body);
    v
}

/// Full box: version byte and 24-bit flags before the payload.
pub fn full(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.push(version);
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(payload);
    bx(typ, &body)
}

pub fn container(typ: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    bx(typ, &children.concat())
}

pub fn ftyp() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"isom");
    body.extend_from_slice(&512u32.to_be_bytes());
    body.extend_from_slice(b"isom");
    body.extend_from_slice(b"iso2");
    bx(b"ftyp", &body)
}

pub fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes()); // creation_time
    p.extend_from_slice(&0u32.to_be_bytes()); // modification_time
    p.extend_from_slice(&timescale.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    p.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    p.extend_from_slice(&[0u8; 10 + 36 + 24]);
    p.extend_from_slice(&2u32.to_be_bytes()); // next_track_id
    full(b"mvhd", 0, 0, &p)
}

pub fn tkhd(track_id: u32, duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&track_id.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes()); // reserved
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&[0u8; 8]); // reserved
    p.extend_from_slice(&[0u8; 2 + 2 + 2 + 2]); // layer / group / volume / reserved
    p.extend_from_slice(&[0u8; 36]); // matrix
    p.extend_from_slice(&(320u32 << 16).to_be_bytes());
    p.extend_from_slice(&(240u32 << 16).to_be_bytes());
    full(b"tkhd", 0, 7, &p)
}

pub fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&timescale.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&0x55c4u16.to_be_bytes()); // "und"
    p.extend_from_slice(&0u16.to_be_bytes());
    full(b"mdhd", 0, 0, &p)
}

pub fn hdlr(handler: &[u8; 4], name: &str) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
    p.extend_from_slice(handler);
    p.extend_from_slice(&[0u8; 12]);
    p.extend_from_slice(name.as_bytes());
    p.push(0);
    full(b"hdlr", 0, 0, &p)
}

pub fn vmhd() -> Vec<u8> {
    full(b"vmhd", 0, 1, &[0u8; 8])
}

pub fn smhd() -> Vec<u8> {
    full(b"smhd", 0, 0, &[0u8; 4])
}

pub fn dinf() -> Vec<u8> {
    let url = full(b"url ", 0, 1, &[]);
    let mut dref_p = Vec::new();
    dref_p.extend_from_slice(&1u32.to_be_bytes());
    dref_p.extend_from_slice(&url);
    container(b"dinf", &[full(b"dref", 0, 0, &dref_p)])
}

pub fn stts(runs: &[(u32, u32)]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(runs.len() as u32).to_be_bytes());
    for (count, delta) in runs {
        p.extend_from_slice(&count.to_be_bytes());
        p.extend_from_slice(&delta.to_be_bytes());
    }
    full(b"stts", 0, 0, &p)
}

pub fn ctts(runs: &[(u32, u32)]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(runs.len() as u32).to_be_bytes());
    for (count, offset) in runs {
        p.extend_from_slice(&count.to_be_bytes());
        p.extend_from_slice(&offset.to_be_bytes());
    }
    full(b"ctts", 0, 0, &p)
}

pub fn stsc(entries: &[(u32, u32, u32)]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (first, per_chunk, desc) in entries {
        p.extend_from_slice(&first.to_be_bytes());
        p.extend_from_slice(&per_chunk.to_be_bytes());
        p.extend_from_slice(&desc.to_be_bytes());
    }
    full(b"stsc", 0, 0, &p)
}

pub fn stsz_constant(sample_size: u32, count: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&sample_size.to_be_bytes());
    p.extend_from_slice(&count.to_be_bytes());
    full(b"stsz", 0, 0, &p)
}

pub fn stsz_explicit(sizes: &[u32]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
    for s in sizes {
        p.extend_from_slice(&s.to_be_bytes());
    }
    full(b"stsz", 0, 0, &p)
}

/// Compact size table with 4-bit entries, two per byte, high nibble first.
pub fn stz2_nibbles(sizes: &[u32]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&[0u8; 3]); // reserved
    p.push(4);
    p.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
    for pair in sizes.chunks(2) {
        let hi = (pair[0] as u8 & 0x0f) << 4;
        let lo = pair.get(1).map(|&s| s as u8 & 0x0f).unwrap_or(0);
        p.push(hi | lo);
    }
    full(b"stz2", 0, 0, &p)
}

pub fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for o in offsets {
        p.extend_from_slice(&o.to_be_bytes());
    }
    full(b"stco", 0, 0, &p)
}

pub fn stss(sample_numbers: &[u32]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(sample_numbers.len() as u32).to_be_bytes());
    for n in sample_numbers {
        p.extend_from_slice(&n.to_be_bytes());
    }
    full(b"stss", 0, 0, &p)
}

pub fn stsd(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    p.extend_from_slice(&entries.concat());
    full(b"stsd", 0, 0, &p)
}

/// 78-byte visual sample entry body followed by codec-specific children.
pub fn visual_entry(typ: &[u8; 4], width: u16, height: u16, children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]); // reserved
    body.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    body.extend_from_slice(&[0u8; 16]);
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&height.to_be_bytes());
    body.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // 72 dpi
    body.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(&1u16.to_be_bytes()); // frame_count
    body.extend_from_slice(&[0u8; 32]); // compressor name
    body.extend_from_slice(&24u16.to_be_bytes()); // depth
    body.extend_from_slice(&0xffffu16.to_be_bytes());
    body.extend_from_slice(&children.concat());
    bx(typ, &body)
}

pub fn avcc(sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let mut cfg = Vec::new();
    cfg.push(1); // configurationVersion
    cfg.push(66); // Baseline
    cfg.push(0);
    cfg.push(30);
    cfg.push(0xfc | 3); // length_size_minus_one = 3
    cfg.push(0xe0 | 1); // one SPS
    cfg.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    cfg.extend_from_slice(sps);
    cfg.push(1); // one PPS
    cfg.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    cfg.extend_from_slice(pps);
    bx(b"avcC", &cfg)
}

pub fn avc1(width: u16, height: u16) -> Vec<u8> {
    visual_entry(b"avc1", width, height, &[avcc(&[0x67, 66, 0, 30], &[0x68, 0xce])])
}

/// 28-byte audio sample entry body followed by children.
pub fn audio_entry(typ: &[u8; 4], channels: u16, sample_rate: u32, children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]);
    body.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    body.extend_from_slice(&[0u8; 8]);
    body.extend_from_slice(&channels.to_be_bytes());
    body.extend_from_slice(&16u16.to_be_bytes()); // sample_size
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(&(sample_rate << 16).to_be_bytes());
    body.extend_from_slice(&children.concat());
    bx(typ, &body)
}

pub fn esds(object_type: u8) -> Vec<u8> {
    let mut p = Vec::new();
    // ES descriptor: es_id + stream priority flags
    p.push(0x03);
    p.push(3);
    p.extend_from_slice(&1u16.to_be_bytes());
    p.push(0);
    // decoder config: object type, stream type, buffer, max/avg bitrate
    p.push(0x04);
    p.push(13);
    p.push(object_type);
    p.push(0x15);
    p.extend_from_slice(&[0, 0, 0]);
    p.extend_from_slice(&128_000u32.to_be_bytes());
    p.extend_from_slice(&128_000u32.to_be_bytes());
    // decoder specific info (AudioSpecificConfig, AAC-LC 44.1 kHz stereo)
    p.push(0x05);
    p.push(2);
    p.extend_from_slice(&[0x12, 0x10]);
    full(b"esds", 0, 0, &p)
}

pub fn mp4a(channels: u16, sample_rate: u32, object_type: u8) -> Vec<u8> {
    audio_entry(b"mp4a", channels, sample_rate, &[esds(object_type)])
}

pub fn trak(id: u32, duration: u32, timescale: u32, handler: &[u8; 4], stbl_children: &[Vec<u8>]) -> Vec<u8> {
    let mhd = if handler == b"vide" { vmhd() } else { smhd() };
    container(
        b"trak",
        &[
            tkhd(id, duration),
            container(
                b"mdia",
                &[
                    mdhd(timescale, duration),
                    hdlr(handler, "handler"),
                    container(b"minf", &[mhd, dinf(), container(b"stbl", stbl_children)]),
                ],
            ),
        ],
    )
}

pub fn trex(track_id: u32, duration: u32, size: u32, flags: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&track_id.to_be_bytes());
    p.extend_from_slice(&1u32.to_be_bytes()); // default sample description index
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&size.to_be_bytes());
    p.extend_from_slice(&flags.to_be_bytes());
    full(b"trex", 0, 0, &p)
}

pub fn mfhd(sequence_number: u32) -> Vec<u8> {
    full(b"mfhd", 0, 0, &sequence_number.to_be_bytes())
}
