use std::fmt;

use crate::entries::{
    AudioSampleEntry, AvcConfig, BtrtData, ChnlData, ColrData, EsdsData, HvcConfig, PaspData,
    SratData, VisualSampleEntry,
};
use crate::registry::CustomData;
use crate::tables::{
    Co64Data, CttsData, DrefData, ElstData, FtypData, HdlrData, MdhdData, MehdData, MfhdData,
    MfroData, MvhdData, SdtpData, StcoData, StscData, StsdData, StssData, SttsData, StszData,
    Stz2Data, TfdtData, TfhdData, TfraData, TkhdData, TrexData, TrunData,
};

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

/// Key for dispatch and extension lookup: a plain 4CC or the 16-byte
/// extended type of a `uuid` box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

/// Map alternate sample-entry codes onto their canonical form so that all
/// downstream dispatch only ever sees one code per codec family. `free` and
/// `skip` are the same free-space box under two names.
pub fn resolve_alias(typ: FourCC) -> FourCC {
    match &typ.0 {
        b"free" => FourCC(*b"skip"),
        b"avc2" | b"avc3" | b"avc4" => FourCC(*b"avc1"),
        b"hvc2" | b"hvc3" | b"hev1" | b"hev2" | b"hev3" => FourCC(*b"hvc1"),
        _ => typ,
    }
}

#[derive(Debug, Clone)]
pub struct BoxHeader {
    /// Total size including header; already resolved from the large-size and
    /// to-end-of-file forms.
    pub size: u64,
    /// Type code exactly as stored in the file.
    pub typ: FourCC,
    pub uuid: Option<[u8; 16]>,
    /// 8, 16, 24, or 32 depending on largesize/uuid.
    pub header_size: u64,
    /// File offset of the header start.
    pub start: u64,
}

impl BoxHeader {
    pub fn body_start(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn body_len(&self) -> u64 {
        self.size.saturating_sub(self.header_size)
    }
}

/// Outcome of parsing one box body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Complete,
    /// The declared body ended before the variant's fields were all read.
    /// The box still registers in the tree.
    Incomplete,
    /// A child failed; the subtree below this node is unusable.
    Invalid,
}

/// Parsed payload of a box. Containers and opaque boxes carry no fields of
/// their own; everything else holds its typed record.
pub enum BoxData {
    Container,
    /// Extent-only boxes: `mdat`, `skip` (and alias `free`).
    Opaque,
    Unknown,
    Ftyp(FtypData),
    Mvhd(MvhdData),
    Tkhd(TkhdData),
    Mdhd(MdhdData),
    Hdlr(HdlrData),
    Elst(ElstData),
    Dref(DrefData),
    Stsd(StsdData),
    VisualEntry(VisualSampleEntry),
    AudioEntry(AudioSampleEntry),
    AvcC(AvcConfig),
    HvcC(HvcConfig),
    Esds(EsdsData),
    Btrt(BtrtData),
    Pasp(PaspData),
    Colr(ColrData),
    Chnl(ChnlData),
    Srat(SratData),
    Stts(SttsData),
    Ctts(CttsData),
    Stsc(StscData),
    Stsz(StszData),
    Stz2(Stz2Data),
    Stco(StcoData),
    Co64(Co64Data),
    Stss(StssData),
    Sdtp(SdtpData),
    Mehd(MehdData),
    Trex(TrexData),
    Mfhd(MfhdData),
    Tfhd(TfhdData),
    Tfdt(TfdtData),
    Trun(TrunData),
    Tfra(TfraData),
    Mfro(MfroData),
    /// Extension-registry payload; shape is opaque to the core.
    Custom(Box<dyn CustomData>),
}

impl fmt::Debug for BoxData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxData::Container => write!(f, "Container"),
            BoxData::Opaque => write!(f, "Opaque"),
            BoxData::Unknown => write!(f, "Unknown"),
            BoxData::Custom(_) => write!(f, "Custom(..)"),
            BoxData::Ftyp(d) => d.fmt(f),
            BoxData::Mvhd(d) => d.fmt(f),
            BoxData::Tkhd(d) => d.fmt(f),
            BoxData::Mdhd(d) => d.fmt(f),
            BoxData::Hdlr(d) => d.fmt(f),
            BoxData::Elst(d) => d.fmt(f),
            BoxData::Dref(d) => d.fmt(f),
            BoxData::Stsd(d) => d.fmt(f),
            BoxData::VisualEntry(d) => d.fmt(f),
            BoxData::AudioEntry(d) => d.fmt(f),
            BoxData::AvcC(d) => d.fmt(f),
            BoxData::HvcC(d) => d.fmt(f),
            BoxData::Esds(d) => d.fmt(f),
            BoxData::Btrt(d) => d.fmt(f),
            BoxData::Pasp(d) => d.fmt(f),
            BoxData::Colr(d) => d.fmt(f),
            BoxData::Chnl(d) => d.fmt(f),
            BoxData::Srat(d) => d.fmt(f),
            BoxData::Stts(d) => d.fmt(f),
            BoxData::Ctts(d) => d.fmt(f),
            BoxData::Stsc(d) => d.fmt(f),
            BoxData::Stsz(d) => d.fmt(f),
            BoxData::Stz2(d) => d.fmt(f),
            BoxData::Stco(d) => d.fmt(f),
            BoxData::Co64(d) => d.fmt(f),
            BoxData::Stss(d) => d.fmt(f),
            BoxData::Sdtp(d) => d.fmt(f),
            BoxData::Mehd(d) => d.fmt(f),
            BoxData::Trex(d) => d.fmt(f),
            BoxData::Mfhd(d) => d.fmt(f),
            BoxData::Tfhd(d) => d.fmt(f),
            BoxData::Tfdt(d) => d.fmt(f),
            BoxData::Trun(d) => d.fmt(f),
            BoxData::Tfra(d) => d.fmt(f),
            BoxData::Mfro(d) => d.fmt(f),
        }
    }
}

/// One node in the parsed box tree. Children are exclusively owned by their
/// parent; cross-references needed during finalize are passed down as context
/// instead of stored back-pointers.
#[derive(Debug)]
pub struct Mp4Box {
    pub hdr: BoxHeader,
    /// Type after alias resolution; `hdr.typ` keeps the on-disk code.
    pub canonical: FourCC,
    pub version: Option<u8>,
    pub flags: Option<u32>,
    pub data: BoxData,
    pub children: Vec<Mp4Box>,
    pub status: ParseStatus,
}

impl Mp4Box {
    /// First direct child with the given canonical type.
    pub fn child(&self, typ: &[u8; 4]) -> Option<&Mp4Box> {
        self.children.iter().find(|c| &c.canonical.0 == typ)
    }

    pub fn children_of(&self, typ: &[u8; 4]) -> impl Iterator<Item = &Mp4Box> {
        self.children.iter().filter(move |c| &c.canonical.0 == typ)
    }

    /// Walk the path of canonical types from this node downward.
    pub fn descend(&self, path: &[&[u8; 4]]) -> Option<&Mp4Box> {
        let mut cur = self;
        for typ in path {
            cur = cur.child(typ)?;
        }
        Some(cur)
    }

    /// Depth-first search for any node of the given canonical type.
    pub fn find(&self, typ: &[u8; 4]) -> Option<&Mp4Box> {
        if &self.canonical.0 == typ {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(typ))
    }
}

/// Search helpers over a top-level box list.
pub fn find_box<'a>(boxes: &'a [Mp4Box], typ: &[u8; 4]) -> Option<&'a Mp4Box> {
    boxes.iter().find_map(|b| b.find(typ))
}

pub fn top_level<'a>(boxes: &'a [Mp4Box], typ: &[u8; 4]) -> impl Iterator<Item = &'a Mp4Box> {
    boxes.iter().filter(move |b| &b.canonical.0 == typ)
}
