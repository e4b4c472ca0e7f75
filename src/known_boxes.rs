use crate::boxes::FourCC;

/// Typed view over the box types the parser understands.
///
/// Sample-entry aliases (`avc2..4`, `hev1`, `hvc2..3`, `hev2..3`, `free`)
/// are resolved before this classification runs, so only canonical codes
/// appear here. Anything else becomes `KnownBox::Unknown(fourcc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Moov,
    Mdat,
    Skip,
    Mfra,
    Mfro,
    Moof,

    // moov children
    Mvhd,
    Trak,
    Mvex,
    Udta,

    // trak children
    Tkhd,
    Edts,
    Mdia,
    Elst,

    // mdia children
    Mdhd,
    Hdlr,
    Minf,

    // minf children
    Vmhd,
    Smhd,
    Nmhd,
    Dinf,
    Dref,
    Url,
    Urn,
    Stbl,

    // stbl children
    Stsd,
    Stts,
    Ctts,
    Stsc,
    Stsz,
    Stz2,
    Stco,
    Co64,
    Stss,
    Sdtp,

    // fragmented movies
    Mehd,
    Trex,
    Mfhd,
    Traf,
    Tfhd,
    Tfdt,
    Trun,
    Tfra,

    // sample entries (post-alias)
    Avc1,
    Hvc1,
    Mp4v,
    Mp4a,

    // sample entry children
    AvcC,
    HvcC,
    Esds,
    Btrt,
    Pasp,
    Colr,
    Chnl,
    Srat,

    // vendor
    Uuid,

    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"moov" => KnownBox::Moov,
            b"mdat" => KnownBox::Mdat,
            b"skip" => KnownBox::Skip,
            b"mfra" => KnownBox::Mfra,
            b"mfro" => KnownBox::Mfro,
            b"moof" => KnownBox::Moof,

            b"mvhd" => KnownBox::Mvhd,
            b"trak" => KnownBox::Trak,
            b"mvex" => KnownBox::Mvex,
            b"udta" => KnownBox::Udta,

            b"tkhd" => KnownBox::Tkhd,
            b"edts" => KnownBox::Edts,
            b"mdia" => KnownBox::Mdia,
            b"elst" => KnownBox::Elst,

            b"mdhd" => KnownBox::Mdhd,
            b"hdlr" => KnownBox::Hdlr,
            b"minf" => KnownBox::Minf,

            b"vmhd" => KnownBox::Vmhd,
            b"smhd" => KnownBox::Smhd,
            b"nmhd" => KnownBox::Nmhd,
            b"dinf" => KnownBox::Dinf,
            b"dref" => KnownBox::Dref,
            b"url " => KnownBox::Url,
            b"urn " => KnownBox::Urn,
            b"stbl" => KnownBox::Stbl,

            b"stsd" => KnownBox::Stsd,
            b"stts" => KnownBox::Stts,
            b"ctts" => KnownBox::Ctts,
            b"stsc" => KnownBox::Stsc,
            b"stsz" => KnownBox::Stsz,
            b"stz2" => KnownBox::Stz2,
            b"stco" => KnownBox::Stco,
            b"co64" => KnownBox::Co64,
            b"stss" => KnownBox::Stss,
            b"sdtp" => KnownBox::Sdtp,

            b"mehd" => KnownBox::Mehd,
            b"trex" => KnownBox::Trex,
            b"mfhd" => KnownBox::Mfhd,
            b"traf" => KnownBox::Traf,
            b"tfhd" => KnownBox::Tfhd,
            b"tfdt" => KnownBox::Tfdt,
            b"trun" => KnownBox::Trun,
            b"tfra" => KnownBox::Tfra,

            b"avc1" => KnownBox::Avc1,
            b"hvc1" => KnownBox::Hvc1,
            b"mp4v" => KnownBox::Mp4v,
            b"mp4a" => KnownBox::Mp4a,

            b"avcC" => KnownBox::AvcC,
            b"hvcC" => KnownBox::HvcC,
            b"esds" => KnownBox::Esds,
            b"btrt" => KnownBox::Btrt,
            b"pasp" => KnownBox::Pasp,
            b"colr" => KnownBox::Colr,
            b"chnl" => KnownBox::Chnl,
            b"srat" => KnownBox::Srat,

            b"uuid" => KnownBox::Uuid,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Pure containers: body is nothing but child boxes.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Mdia
                | KnownBox::Minf
                | KnownBox::Stbl
                | KnownBox::Edts
                | KnownBox::Udta
                | KnownBox::Dinf
                | KnownBox::Moof
                | KnownBox::Traf
                | KnownBox::Mvex
                | KnownBox::Mfra
        )
    }

    /// FullBox (8-bit version + 24-bit flags right after the header)?
    pub fn is_full_box(&self) -> bool {
        matches!(
            self,
            KnownBox::Mvhd
                | KnownBox::Tkhd
                | KnownBox::Mdhd
                | KnownBox::Hdlr
                | KnownBox::Vmhd
                | KnownBox::Smhd
                | KnownBox::Nmhd
                | KnownBox::Dref
                | KnownBox::Url
                | KnownBox::Urn
                | KnownBox::Stsd
                | KnownBox::Stts
                | KnownBox::Ctts
                | KnownBox::Stsc
                | KnownBox::Stsz
                | KnownBox::Stz2
                | KnownBox::Stco
                | KnownBox::Co64
                | KnownBox::Stss
                | KnownBox::Sdtp
                | KnownBox::Elst
                | KnownBox::Mehd
                | KnownBox::Trex
                | KnownBox::Mfhd
                | KnownBox::Tfhd
                | KnownBox::Tfdt
                | KnownBox::Trun
                | KnownBox::Tfra
                | KnownBox::Mfro
                | KnownBox::Esds
                | KnownBox::Chnl
                | KnownBox::Srat
        )
    }

    /// Extent-only boxes whose payload is never interpreted.
    pub fn is_opaque(&self) -> bool {
        matches!(self, KnownBox::Mdat | KnownBox::Skip)
    }

    /// Sample entries carry fixed fields and then child boxes.
    pub fn is_sample_entry(&self) -> bool {
        matches!(
            self,
            KnownBox::Avc1 | KnownBox::Hvc1 | KnownBox::Mp4v | KnownBox::Mp4a
        )
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Box",
            KnownBox::Moov => "Movie Box",
            KnownBox::Mdat => "Media Data Box",
            KnownBox::Skip => "Free Space Box",
            KnownBox::Mfra => "Movie Fragment Random Access Box",
            KnownBox::Mfro => "Movie Fragment Random Access Offset Box",
            KnownBox::Moof => "Movie Fragment Box",
            KnownBox::Mvhd => "Movie Header Box",
            KnownBox::Trak => "Track Box",
            KnownBox::Mvex => "Movie Extends Box",
            KnownBox::Udta => "User Data Box",
            KnownBox::Tkhd => "Track Header Box",
            KnownBox::Edts => "Edit Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Elst => "Edit List Box",
            KnownBox::Mdhd => "Media Header Box",
            KnownBox::Hdlr => "Handler Reference Box",
            KnownBox::Minf => "Media Information Box",
            KnownBox::Vmhd => "Video Media Header Box",
            KnownBox::Smhd => "Sound Media Header Box",
            KnownBox::Nmhd => "Null Media Header Box",
            KnownBox::Dinf => "Data Information Box",
            KnownBox::Dref => "Data Reference Box",
            KnownBox::Url => "Data Entry URL Box",
            KnownBox::Urn => "Data Entry URN Box",
            KnownBox::Stbl => "Sample Table Box",
            KnownBox::Stsd => "Sample Description Box",
            KnownBox::Stts => "Decoding Time to Sample Box",
            KnownBox::Ctts => "Composition Time to Sample Box",
            KnownBox::Stsc => "Sample To Chunk Box",
            KnownBox::Stsz => "Sample Size Box",
            KnownBox::Stz2 => "Compact Sample Size Box",
            KnownBox::Stco => "Chunk Offset Box",
            KnownBox::Co64 => "Chunk Large Offset Box",
            KnownBox::Stss => "Sync Sample Box",
            KnownBox::Sdtp => "Independent and Disposable Samples Box",
            KnownBox::Mehd => "Movie Extends Header Box",
            KnownBox::Trex => "Track Extends Box",
            KnownBox::Mfhd => "Movie Fragment Header Box",
            KnownBox::Traf => "Track Fragment Box",
            KnownBox::Tfhd => "Track Fragment Header Box",
            KnownBox::Tfdt => "Track Fragment Decode Time Box",
            KnownBox::Trun => "Track Fragment Run Box",
            KnownBox::Tfra => "Track Fragment Random Access Box",
            KnownBox::Avc1 => "AVC Sample Entry",
            KnownBox::Hvc1 => "HEVC Sample Entry",
            KnownBox::Mp4v => "MP4 Visual Sample Entry",
            KnownBox::Mp4a => "MP4 Audio Sample Entry",
            KnownBox::AvcC => "AVC Configuration Box",
            KnownBox::HvcC => "HEVC Configuration Box",
            KnownBox::Esds => "Elementary Stream Descriptor Box",
            KnownBox::Btrt => "Bit Rate Box",
            KnownBox::Pasp => "Pixel Aspect Ratio Box",
            KnownBox::Colr => "Colour Information Box",
            KnownBox::Chnl => "Channel Layout Box",
            KnownBox::Srat => "Sampling Rate Box",
            KnownBox::Uuid => "User Extension Box",
            KnownBox::Unknown(_) => "Unknown Box",
        }
    }
}
