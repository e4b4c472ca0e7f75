//! Recursive box-tree construction.
//!
//! One pass walks the file top to bottom, resolving the three size forms,
//! dispatching known types to their table parsers, recursing into containers,
//! and consulting the extension registry for everything else. A short
//! finalize pass afterwards fills in the one box whose layout depends on a
//! sibling parsed later (`sdtp`).

use crate::boxes::{BoxData, BoxHeader, BoxKey, FourCC, Mp4Box, ParseStatus, resolve_alias};
use crate::entries::{
    AudioSampleEntry, AvcConfig, BtrtData, ChnlData, ColrData, EsdsData, HvcConfig, PaspData,
    SratData, VisualSampleEntry,
};
use crate::error::{Error, Result};
use crate::known_boxes::KnownBox;
use crate::reader::DataReader;
use crate::registry::Registry;
use crate::tables::{
    Co64Data, CttsData, DrefData, ElstData, FtypData, HdlrData, MdhdData, MehdData, MfhdData,
    MfroData, MvhdData, SdtpData, StcoData, StscData, StsdData, StssData, SttsData, StszData,
    Stz2Data, TfdtData, TfhdData, TfraData, TkhdData, TrexData, TrunData,
};
use std::io::{Cursor, Read, Seek};
use tracing::warn;

const MIN_HEADER: u64 = 8;

/// Context threaded down the recursion for the few child boxes whose layout
/// depends on a field of an ancestor.
#[derive(Debug, Clone, Copy, Default)]
struct Ctx {
    /// Channel count of the enclosing audio sample entry, for `chnl`.
    channel_count: Option<u16>,
}

/// Read one box header at the current position, resolving the compact,
/// large-size, and to-end-of-file forms and the `uuid` extended type.
///
/// A body that extends past the end of the file is a hard error; nothing
/// after it could be framed.
pub fn read_box_header<R: Read + Seek>(r: &mut DataReader<R>) -> Result<BoxHeader> {
    let start = r.pos();
    let size32 = r.read_u32(true)?;
    let mut b = [0u8; 4];
    r.read(&mut b)?;
    let typ = FourCC(b);
    let mut header_size = MIN_HEADER;
    let size = match size32 {
        0 => r.len() - start,
        1 => {
            header_size += 8;
            r.read_u64(true)?
        }
        s => s as u64,
    };
    let uuid = if &typ.0 == b"uuid" {
        if size < header_size + 16 {
            return Err(Error::InvalidSize { typ, offset: start });
        }
        let mut u = [0u8; 16];
        r.read(&mut u)?;
        header_size += 16;
        Some(u)
    } else {
        None
    };
    if size < header_size {
        return Err(Error::InvalidSize { typ, offset: start });
    }
    // start <= len always holds; subtracting avoids overflow on a huge
    // crafted largesize.
    if size > r.len() - start {
        return Err(Error::BoxExceedsFile {
            typ,
            offset: start,
            declared: size,
            available: r.len() - start,
        });
    }
    Ok(BoxHeader {
        size,
        typ,
        uuid,
        header_size,
        start,
    })
}

/// Parse every top-level box in the file.
pub fn parse_tree<R: Read + Seek>(r: &mut DataReader<R>, registry: &Registry) -> Result<Vec<Mp4Box>> {
    r.set_pos(0);
    let mut out = Vec::new();
    while r.pos() + MIN_HEADER <= r.len() {
        out.push(parse_box(r, registry, Ctx::default())?);
    }
    if r.pos() < r.len() {
        warn!(trailing = r.len() - r.pos(), "trailing bytes after last top-level box");
    }
    Ok(out)
}

fn parse_children<R: Read + Seek>(
    r: &mut DataReader<R>,
    end: u64,
    registry: &Registry,
    ctx: Ctx,
) -> Result<Vec<Mp4Box>> {
    let mut out = Vec::new();
    while r.pos() + MIN_HEADER <= end {
        let mut child = parse_box(r, registry, ctx)?;
        if child.hdr.end() > end {
            warn!(typ = %child.hdr.typ, "child box overruns its parent");
            child.status = ParseStatus::Invalid;
            out.push(child);
            break;
        }
        out.push(child);
    }
    // Under 8 bytes of slack at the tail is padding, not a box.
    r.set_pos(end);
    Ok(out)
}

fn parse_box<R: Read + Seek>(r: &mut DataReader<R>, registry: &Registry, ctx: Ctx) -> Result<Mp4Box> {
    let hdr = read_box_header(r)?;
    let end = hdr.end();
    let canonical = resolve_alias(hdr.typ);
    let kind = KnownBox::from(canonical);
    let key = match hdr.uuid {
        Some(u) => BoxKey::Uuid(u),
        None => BoxKey::FourCC(hdr.typ),
    };

    let mut version = None;
    let mut flags = None;
    let mut children = Vec::new();
    let mut status = ParseStatus::Complete;

    // A registered handler takes the box over entirely, built-in or not.
    let data = if registry.contains(&key) {
        if registry.is_full_box(&key) == Some(true) {
            version = Some(r.read_u8()?);
            flags = Some(r.read_u24(true)?);
        }
        let body = r.read_vec(end.saturating_sub(r.pos()) as usize)?;
        let mut cur = Cursor::new(body.as_slice());
        match registry.dispatch(&key, &mut cur, &hdr, version, flags) {
            Some(Ok(custom)) => BoxData::Custom(custom),
            Some(Err(e)) => {
                warn!(typ = %hdr.typ, error = %e, "custom box handler failed");
                status = ParseStatus::Invalid;
                BoxData::Unknown
            }
            None => BoxData::Unknown,
        }
    } else {
        if kind.is_full_box() {
            version = Some(r.read_u8()?);
            flags = Some(r.read_u24(true)?);
        }
        let v = version.unwrap_or(0);
        let f = flags.unwrap_or(0);
        match kind {
            k if k.is_container() => {
                children = parse_children(r, end, registry, ctx)?;
                BoxData::Container
            }
            k if k.is_opaque() => BoxData::Opaque,
            KnownBox::Ftyp => BoxData::Ftyp(FtypData::parse(r, end)?),
            KnownBox::Mvhd => BoxData::Mvhd(MvhdData::parse(r, v)?),
            KnownBox::Tkhd => BoxData::Tkhd(TkhdData::parse(r, v)?),
            KnownBox::Mdhd => BoxData::Mdhd(MdhdData::parse(r, v)?),
            KnownBox::Hdlr => BoxData::Hdlr(HdlrData::parse(r, end)?),
            KnownBox::Elst => {
                let (d, s) = ElstData::parse(r, v, end)?;
                status = s;
                BoxData::Elst(d)
            }
            KnownBox::Dref => {
                let d = DrefData::parse(r)?;
                children = parse_children(r, end, registry, ctx)?;
                BoxData::Dref(d)
            }
            KnownBox::Stsd => {
                let d = StsdData::parse(r)?;
                children = parse_children(r, end, registry, ctx)?;
                BoxData::Stsd(d)
            }
            KnownBox::Avc1 | KnownBox::Hvc1 | KnownBox::Mp4v => {
                let e = VisualSampleEntry::parse(r)?;
                children = parse_children(r, end, registry, ctx)?;
                BoxData::VisualEntry(e)
            }
            KnownBox::Mp4a => {
                let e = AudioSampleEntry::parse(r)?;
                let inner = Ctx {
                    channel_count: Some(e.channel_count),
                };
                children = parse_children(r, end, registry, inner)?;
                BoxData::AudioEntry(e)
            }
            KnownBox::AvcC => BoxData::AvcC(AvcConfig::parse(r, end)?),
            KnownBox::HvcC => BoxData::HvcC(HvcConfig::parse(r)?),
            KnownBox::Esds => BoxData::Esds(EsdsData::parse(r, end)?),
            KnownBox::Btrt => BoxData::Btrt(BtrtData::parse(r)?),
            KnownBox::Pasp => BoxData::Pasp(PaspData::parse(r)?),
            KnownBox::Colr => BoxData::Colr(ColrData::parse(r, end)?),
            KnownBox::Chnl => {
                BoxData::Chnl(ChnlData::parse(r, ctx.channel_count.unwrap_or(0))?)
            }
            KnownBox::Srat => BoxData::Srat(SratData::parse(r)?),
            KnownBox::Stts => {
                let (d, s) = SttsData::parse(r, end)?;
                status = s;
                BoxData::Stts(d)
            }
            KnownBox::Ctts => {
                let (d, s) = CttsData::parse(r, v, end)?;
                status = s;
                BoxData::Ctts(d)
            }
            KnownBox::Stsc => {
                let (d, s) = StscData::parse(r, end)?;
                status = s;
                BoxData::Stsc(d)
            }
            KnownBox::Stsz => {
                let (d, s) = StszData::parse(r, end)?;
                status = s;
                BoxData::Stsz(d)
            }
            KnownBox::Stz2 => {
                let (d, s) = Stz2Data::parse(r, end)?;
                status = s;
                BoxData::Stz2(d)
            }
            KnownBox::Stco => {
                let (d, s) = StcoData::parse(r, end)?;
                status = s;
                BoxData::Stco(d)
            }
            KnownBox::Co64 => {
                let (d, s) = Co64Data::parse(r, end)?;
                status = s;
                BoxData::Co64(d)
            }
            KnownBox::Stss => {
                let (d, s) = StssData::parse(r, end)?;
                status = s;
                BoxData::Stss(d)
            }
            // Entry count comes from the sibling size table; filled during
            // finalize once the whole stbl has parsed.
            KnownBox::Sdtp => BoxData::Sdtp(SdtpData::default()),
            KnownBox::Mehd => BoxData::Mehd(MehdData::parse(r, v)?),
            KnownBox::Trex => BoxData::Trex(TrexData::parse(r)?),
            KnownBox::Mfhd => BoxData::Mfhd(MfhdData::parse(r)?),
            KnownBox::Tfhd => BoxData::Tfhd(TfhdData::parse(r, f)?),
            KnownBox::Tfdt => BoxData::Tfdt(TfdtData::parse(r, v)?),
            KnownBox::Trun => {
                let (d, s) = TrunData::parse(r, v, f, end)?;
                status = s;
                BoxData::Trun(d)
            }
            KnownBox::Tfra => {
                let (d, s) = TfraData::parse(r, v, end)?;
                status = s;
                BoxData::Tfra(d)
            }
            KnownBox::Mfro => BoxData::Mfro(MfroData::parse(r)?),
            // Headers we only need framed, plus anything unrecognized.
            _ => BoxData::Unknown,
        }
    };

    if status == ParseStatus::Complete {
        if r.pos() > end {
            warn!(typ = %hdr.typ, "box body ended before its fields");
            status = ParseStatus::Incomplete;
        } else if children.iter().any(|c| c.status == ParseStatus::Invalid) {
            status = ParseStatus::Invalid;
        }
    }
    r.set_pos(end);

    Ok(Mp4Box {
        hdr,
        canonical,
        version,
        flags,
        data,
        children,
        status,
    })
}

fn child_mut<'a>(b: &'a mut Mp4Box, typ: &[u8; 4]) -> Option<&'a mut Mp4Box> {
    b.children.iter_mut().find(|c| &c.canonical.0 == typ)
}

/// Second pass over a finished tree: re-parse each `sdtp` with the sample
/// count taken from its sibling size table.
pub fn finalize_tree<R: Read + Seek>(r: &mut DataReader<R>, boxes: &mut [Mp4Box]) -> Result<()> {
    for moov in boxes.iter_mut().filter(|b| &b.canonical.0 == b"moov") {
        for trak in moov
            .children
            .iter_mut()
            .filter(|c| &c.canonical.0 == b"trak")
        {
            let Some(stbl) = child_mut(trak, b"mdia")
                .and_then(|m| child_mut(m, b"minf"))
                .and_then(|m| child_mut(m, b"stbl"))
            else {
                continue;
            };
            let count = match (stbl.child(b"stsz"), stbl.child(b"stz2")) {
                (Some(c), _) => match &c.data {
                    BoxData::Stsz(d) => Some(d.sample_count),
                    _ => None,
                },
                (None, Some(c)) => match &c.data {
                    BoxData::Stz2(d) => Some(d.sample_count),
                    _ => None,
                },
                _ => None,
            };
            let Some(count) = count else { continue };
            if let Some(sdtp) = child_mut(stbl, b"sdtp") {
                // Skip version and flags that already parsed.
                r.set_pos(sdtp.hdr.body_start() + 4);
                let (d, s) = SdtpData::parse(r, count, sdtp.hdr.end())?;
                sdtp.data = BoxData::Sdtp(d);
                if sdtp.status == ParseStatus::Complete {
                    sdtp.status = s;
                }
            }
        }
    }
    Ok(())
}
