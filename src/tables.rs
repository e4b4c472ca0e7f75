use crate::boxes::{FourCC, ParseStatus};
use crate::error::Result;
use crate::reader::DataReader;
use serde::Serialize;
use std::io::{Read, Seek};
use tracing::warn;

// tfhd flag bits
pub mod tfhd_flags {
    pub const BASE_DATA_OFFSET: u32 = 0x0000_0001;
    pub const SAMPLE_DESCRIPTION_INDEX: u32 = 0x0000_0002;
    pub const DEFAULT_SAMPLE_DURATION: u32 = 0x0000_0008;
    pub const DEFAULT_SAMPLE_SIZE: u32 = 0x0000_0010;
    pub const DEFAULT_SAMPLE_FLAGS: u32 = 0x0000_0020;
    pub const DURATION_IS_EMPTY: u32 = 0x0001_0000;
    pub const DEFAULT_BASE_IS_MOOF: u32 = 0x0002_0000;
}

// trun flag bits
pub mod trun_flags {
    pub const DATA_OFFSET: u32 = 0x0000_0001;
    pub const FIRST_SAMPLE_FLAGS: u32 = 0x0000_0004;
    pub const SAMPLE_DURATION: u32 = 0x0000_0100;
    pub const SAMPLE_SIZE: u32 = 0x0000_0200;
    pub const SAMPLE_FLAGS: u32 = 0x0000_0400;
    pub const SAMPLE_CTS_OFFSET: u32 = 0x0000_0800;
}

/// Bit in resolved per-sample flags marking a non-sync (non-key) sample.
pub const SAMPLE_FLAG_IS_NON_SYNC: u32 = 0x0001_0000;

/// Clamp a declared entry count to what the box body can actually hold.
/// Returns the usable count and whether the declaration overran the body.
fn bounded_count(declared: u64, entry_size: u64, pos: u64, end: u64) -> (u64, bool) {
    let avail = end.saturating_sub(pos) / entry_size;
    if declared > avail {
        (avail, true)
    } else {
        (declared, false)
    }
}

fn status_of(truncated: bool) -> ParseStatus {
    if truncated {
        ParseStatus::Incomplete
    } else {
        ParseStatus::Complete
    }
}

// ---------------------------------------------------------------- ftyp

#[derive(Debug, Clone, Serialize)]
pub struct FtypData {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl FtypData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, end: u64) -> Result<Self> {
        let major_brand = read_fourcc(r)?;
        let minor_version = r.read_u32(true)?;
        let mut compatible_brands = Vec::new();
        while r.pos() + 4 <= end {
            compatible_brands.push(read_fourcc(r)?);
        }
        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }
}

fn read_fourcc<R: Read + Seek>(r: &mut DataReader<R>) -> Result<FourCC> {
    let mut b = [0u8; 4];
    r.read(&mut b)?;
    Ok(FourCC(b))
}

// ---------------------------------------------------------------- mvhd

#[derive(Debug, Clone, Serialize)]
pub struct MvhdData {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: f64,
    pub volume: f32,
    pub next_track_id: u32,
}

impl MvhdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, version: u8) -> Result<Self> {
        let (creation_time, modification_time, timescale, duration) = if version == 1 {
            (
                r.read_u64(true)?,
                r.read_u64(true)?,
                r.read_u32(true)?,
                r.read_u64(true)?,
            )
        } else {
            (
                r.read_u32(true)? as u64,
                r.read_u32(true)? as u64,
                r.read_u32(true)?,
                r.read_u32(true)? as u64,
            )
        };
        let rate = r.read_u32(true)? as f64 / 65536.0;
        let volume = r.read_u16(true)? as f32 / 256.0;
        // reserved(10) + matrix(36) + pre_defined(24)
        r.skip(10 + 36 + 24);
        let next_track_id = r.read_u32(true)?;
        Ok(Self {
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            next_track_id,
        })
    }
}

// ---------------------------------------------------------------- tkhd

#[derive(Debug, Clone, Serialize)]
pub struct TkhdData {
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: f32,
    pub width: f64,
    pub height: f64,
}

impl TkhdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, version: u8) -> Result<Self> {
        let (creation_time, modification_time, track_id, duration) = if version == 1 {
            let c = r.read_u64(true)?;
            let m = r.read_u64(true)?;
            let id = r.read_u32(true)?;
            r.skip(4);
            (c, m, id, r.read_u64(true)?)
        } else {
            let c = r.read_u32(true)? as u64;
            let m = r.read_u32(true)? as u64;
            let id = r.read_u32(true)?;
            r.skip(4);
            (c, m, id, r.read_u32(true)? as u64)
        };
        r.skip(8); // reserved
        let layer = r.read_signed(2, true)? as i16;
        let alternate_group = r.read_signed(2, true)? as i16;
        let volume = r.read_u16(true)? as f32 / 256.0;
        r.skip(2); // reserved
        r.skip(36); // matrix
        let width = r.read_u32(true)? as f64 / 65536.0;
        let height = r.read_u32(true)? as f64 / 65536.0;
        Ok(Self {
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            width,
            height,
        })
    }
}

// ---------------------------------------------------------------- mdhd

#[derive(Debug, Clone, Serialize)]
pub struct MdhdData {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

impl MdhdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, version: u8) -> Result<Self> {
        let (creation_time, modification_time, timescale, duration) = if version == 1 {
            (
                r.read_u64(true)?,
                r.read_u64(true)?,
                r.read_u32(true)?,
                r.read_u64(true)?,
            )
        } else {
            (
                r.read_u32(true)? as u64,
                r.read_u32(true)? as u64,
                r.read_u32(true)?,
                r.read_u32(true)? as u64,
            )
        };
        let code = r.read_u16(true)?;
        r.skip(2); // pre_defined
        Ok(Self {
            creation_time,
            modification_time,
            timescale,
            duration,
            language: lang_from_u16(code),
        })
    }
}

fn lang_from_u16(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1f) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1f) as u8 + 0x60;
    let c3 = (code & 0x1f) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

// ---------------------------------------------------------------- hdlr

#[derive(Debug, Clone, Serialize)]
pub struct HdlrData {
    pub handler_type: FourCC,
    pub name: String,
}

impl HdlrData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, end: u64) -> Result<Self> {
        r.skip(4); // pre_defined
        let handler_type = read_fourcc(r)?;
        r.skip(12); // reserved
        let rest = end.saturating_sub(r.pos()) as usize;
        let name = r.read_string(rest)?;
        Ok(Self { handler_type, name })
    }
}

// ---------------------------------------------------------------- elst

#[derive(Debug, Clone, Serialize)]
pub struct ElstEntry {
    pub segment_duration: u64,
    pub media_time: i64,
    pub media_rate_integer: i16,
    pub media_rate_fraction: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElstData {
    pub entry_count: u32,
    pub entries: Vec<ElstEntry>,
}

impl ElstData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        version: u8,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let entry_size = if version == 1 { 20 } else { 12 };
        let (n, truncated) = bounded_count(entry_count as u64, entry_size, r.pos(), end);
        if truncated {
            warn!(entry_count, "elst entry count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let (segment_duration, media_time) = if version == 1 {
                (r.read_u64(true)?, r.read_signed(8, true)?)
            } else {
                (r.read_u32(true)? as u64, r.read_signed(4, true)?)
            };
            entries.push(ElstEntry {
                segment_duration,
                media_time,
                media_rate_integer: r.read_signed(2, true)? as i16,
                media_rate_fraction: r.read_signed(2, true)? as i16,
            });
        }
        Ok((
            Self {
                entry_count,
                entries,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- dref

#[derive(Debug, Clone, Serialize)]
pub struct DrefData {
    pub entry_count: u32,
}

impl DrefData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            entry_count: r.read_u32(true)?,
        })
    }
}

// ---------------------------------------------------------------- stsd

#[derive(Debug, Clone, Serialize)]
pub struct StsdData {
    pub entry_count: u32,
}

impl StsdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            entry_count: r.read_u32(true)?,
        })
    }
}

// ---------------------------------------------------------------- stts

#[derive(Debug, Clone, Serialize)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SttsData {
    pub entry_count: u32,
    pub entries: Vec<SttsEntry>,
}

impl SttsData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let (n, truncated) = bounded_count(entry_count as u64, 8, r.pos(), end);
        if truncated {
            warn!(entry_count, "stts entry count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            entries.push(SttsEntry {
                sample_count: r.read_u32(true)?,
                sample_delta: r.read_u32(true)?,
            });
        }
        Ok((
            Self {
                entry_count,
                entries,
            },
            status_of(truncated),
        ))
    }

    /// Total sample count over all runs.
    pub fn total_samples(&self) -> u64 {
        self.entries.iter().map(|e| e.sample_count as u64).sum()
    }
}

// ---------------------------------------------------------------- ctts

#[derive(Debug, Clone, Serialize)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CttsData {
    pub entry_count: u32,
    pub entries: Vec<CttsEntry>,
}

impl CttsData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        version: u8,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let (n, truncated) = bounded_count(entry_count as u64, 8, r.pos(), end);
        if truncated {
            warn!(entry_count, "ctts entry count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let sample_count = r.read_u32(true)?;
            // version 1 offsets are signed
            let sample_offset = if version == 1 {
                r.read_signed(4, true)?
            } else {
                r.read_u32(true)? as i64
            };
            entries.push(CttsEntry {
                sample_count,
                sample_offset,
            });
        }
        Ok((
            Self {
                entry_count,
                entries,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- stsc

#[derive(Debug, Clone, Serialize)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StscData {
    pub entry_count: u32,
    pub entries: Vec<StscEntry>,
}

impl StscData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let (n, truncated) = bounded_count(entry_count as u64, 12, r.pos(), end);
        if truncated {
            warn!(entry_count, "stsc entry count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            entries.push(StscEntry {
                first_chunk: r.read_u32(true)?,
                samples_per_chunk: r.read_u32(true)?,
                sample_description_index: r.read_u32(true)?,
            });
        }
        Ok((
            Self {
                entry_count,
                entries,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- stsz

#[derive(Debug, Clone, Serialize)]
pub struct StszData {
    /// Constant size for all samples, or 0 when `sizes` is per-sample.
    pub sample_size: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl StszData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let sample_size = r.read_u32(true)?;
        let sample_count = r.read_u32(true)?;
        let mut sizes = Vec::new();
        let mut truncated = false;
        if sample_size == 0 {
            let (n, t) = bounded_count(sample_count as u64, 4, r.pos(), end);
            truncated = t;
            if truncated {
                warn!(sample_count, "stsz sample count exceeds box body");
            }
            sizes.reserve(n as usize);
            for _ in 0..n {
                sizes.push(r.read_u32(true)?);
            }
        }
        Ok((
            Self {
                sample_size,
                sample_count,
                sizes,
            },
            status_of(truncated),
        ))
    }

    pub fn size_of(&self, idx: usize) -> u32 {
        if self.sample_size > 0 {
            self.sample_size
        } else {
            self.sizes.get(idx).copied().unwrap_or(0)
        }
    }
}

// ---------------------------------------------------------------- stz2

#[derive(Debug, Clone, Serialize)]
pub struct Stz2Data {
    /// 4, 8, or 16 bits per entry.
    pub field_size: u8,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl Stz2Data {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        r.skip(3); // reserved
        let field_size = r.read_u8()?;
        let sample_count = r.read_u32(true)?;
        let mut sizes = Vec::new();
        let mut truncated = false;
        match field_size {
            4 => {
                // Two entries share a byte, high nibble first. An odd final
                // entry leaves the low nibble of its byte unread.
                let mut i = 0u32;
                while i < sample_count {
                    if r.pos() >= end {
                        truncated = true;
                        break;
                    }
                    let b = r.read_u8()?;
                    sizes.push((b >> 4) as u32);
                    i += 1;
                    if i < sample_count {
                        sizes.push((b & 0x0f) as u32);
                        i += 1;
                    }
                }
            }
            8 => {
                let (n, t) = bounded_count(sample_count as u64, 1, r.pos(), end);
                truncated = t;
                for _ in 0..n {
                    sizes.push(r.read_u8()? as u32);
                }
            }
            16 => {
                let (n, t) = bounded_count(sample_count as u64, 2, r.pos(), end);
                truncated = t;
                for _ in 0..n {
                    sizes.push(r.read_u16(true)? as u32);
                }
            }
            other => {
                warn!(field_size = other, "stz2 with unsupported field size");
                truncated = true;
            }
        }
        if truncated {
            warn!(sample_count, field_size, "stz2 table truncated");
        }
        Ok((
            Self {
                field_size,
                sample_count,
                sizes,
            },
            status_of(truncated),
        ))
    }

    pub fn size_of(&self, idx: usize) -> u32 {
        self.sizes.get(idx).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------- stco / co64

#[derive(Debug, Clone, Serialize)]
pub struct StcoData {
    pub entry_count: u32,
    pub offsets: Vec<u32>,
}

impl StcoData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let (n, truncated) = bounded_count(entry_count as u64, 4, r.pos(), end);
        if truncated {
            warn!(entry_count, "stco entry count exceeds box body");
        }
        let mut offsets = Vec::with_capacity(n as usize);
        for _ in 0..n {
            offsets.push(r.read_u32(true)?);
        }
        Ok((
            Self {
                entry_count,
                offsets,
            },
            status_of(truncated),
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Co64Data {
    pub entry_count: u32,
    pub offsets: Vec<u64>,
}

impl Co64Data {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let (n, truncated) = bounded_count(entry_count as u64, 8, r.pos(), end);
        if truncated {
            warn!(entry_count, "co64 entry count exceeds box body");
        }
        let mut offsets = Vec::with_capacity(n as usize);
        for _ in 0..n {
            offsets.push(r.read_u64(true)?);
        }
        Ok((
            Self {
                entry_count,
                offsets,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- stss

#[derive(Debug, Clone, Serialize)]
pub struct StssData {
    pub entry_count: u32,
    /// 1-based sample numbers, strictly increasing.
    pub sample_numbers: Vec<u32>,
}

impl StssData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let entry_count = r.read_u32(true)?;
        let (n, truncated) = bounded_count(entry_count as u64, 4, r.pos(), end);
        if truncated {
            warn!(entry_count, "stss entry count exceeds box body");
        }
        let mut sample_numbers = Vec::with_capacity(n as usize);
        for _ in 0..n {
            sample_numbers.push(r.read_u32(true)?);
        }
        Ok((
            Self {
                entry_count,
                sample_numbers,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- sdtp

#[derive(Debug, Clone, Serialize)]
pub struct SdtpEntry {
    pub is_leading: u8,
    pub sample_depends_on: u8,
    pub sample_is_depended_on: u8,
    pub sample_has_redundancy: u8,
}

/// Dependency flags, one byte per sample. The box carries no entry count of
/// its own; the tree's finalize pass supplies it from the sibling size table
/// and re-parses.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SdtpData {
    pub entry_count: u32,
    pub entries: Vec<SdtpEntry>,
}

impl SdtpData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        entry_count: u32,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let (n, truncated) = bounded_count(entry_count as u64, 1, r.pos(), end);
        if truncated {
            warn!(entry_count, "sdtp entry count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let b = r.read_u8()?;
            entries.push(SdtpEntry {
                is_leading: b >> 6,
                sample_depends_on: (b >> 4) & 0x3,
                sample_is_depended_on: (b >> 2) & 0x3,
                sample_has_redundancy: b & 0x3,
            });
        }
        Ok((
            Self {
                entry_count,
                entries,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- mvex family

#[derive(Debug, Clone, Serialize)]
pub struct MehdData {
    pub fragment_duration: u64,
}

impl MehdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, version: u8) -> Result<Self> {
        let fragment_duration = if version == 1 {
            r.read_u64(true)?
        } else {
            r.read_u32(true)? as u64
        };
        Ok(Self { fragment_duration })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrexData {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TrexData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            track_id: r.read_u32(true)?,
            default_sample_description_index: r.read_u32(true)?,
            default_sample_duration: r.read_u32(true)?,
            default_sample_size: r.read_u32(true)?,
            default_sample_flags: r.read_u32(true)?,
        })
    }
}

// ---------------------------------------------------------------- moof family

#[derive(Debug, Clone, Serialize)]
pub struct MfhdData {
    pub sequence_number: u32,
}

impl MfhdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            sequence_number: r.read_u32(true)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TfhdData {
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TfhdData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, flags: u32) -> Result<Self> {
        let track_id = r.read_u32(true)?;
        let base_data_offset = if flags & tfhd_flags::BASE_DATA_OFFSET != 0 {
            Some(r.read_u64(true)?)
        } else {
            None
        };
        let sample_description_index = if flags & tfhd_flags::SAMPLE_DESCRIPTION_INDEX != 0 {
            Some(r.read_u32(true)?)
        } else {
            None
        };
        let default_sample_duration = if flags & tfhd_flags::DEFAULT_SAMPLE_DURATION != 0 {
            Some(r.read_u32(true)?)
        } else {
            None
        };
        let default_sample_size = if flags & tfhd_flags::DEFAULT_SAMPLE_SIZE != 0 {
            Some(r.read_u32(true)?)
        } else {
            None
        };
        let default_sample_flags = if flags & tfhd_flags::DEFAULT_SAMPLE_FLAGS != 0 {
            Some(r.read_u32(true)?)
        } else {
            None
        };
        Ok(Self {
            flags,
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
        })
    }

    pub fn default_base_is_moof(&self) -> bool {
        self.flags & tfhd_flags::DEFAULT_BASE_IS_MOOF != 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TfdtData {
    pub base_media_decode_time: u64,
}

impl TfdtData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, version: u8) -> Result<Self> {
        let base_media_decode_time = if version == 1 {
            r.read_u64(true)?
        } else {
            r.read_u32(true)? as u64
        };
        Ok(Self {
            base_media_decode_time,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrunEntry {
    pub duration: Option<u32>,
    pub size: Option<u32>,
    pub flags: Option<u32>,
    pub composition_offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrunData {
    pub flags: u32,
    pub sample_count: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub entries: Vec<TrunEntry>,
}

impl TrunData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        version: u8,
        flags: u32,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let sample_count = r.read_u32(true)?;
        let data_offset = if flags & trun_flags::DATA_OFFSET != 0 {
            Some(r.read_signed(4, true)? as i32)
        } else {
            None
        };
        let first_sample_flags = if flags & trun_flags::FIRST_SAMPLE_FLAGS != 0 {
            Some(r.read_u32(true)?)
        } else {
            None
        };
        let mut entry_size = 0u64;
        for bit in [
            trun_flags::SAMPLE_DURATION,
            trun_flags::SAMPLE_SIZE,
            trun_flags::SAMPLE_FLAGS,
            trun_flags::SAMPLE_CTS_OFFSET,
        ] {
            if flags & bit != 0 {
                entry_size += 4;
            }
        }
        let (n, truncated) = if entry_size == 0 {
            (sample_count as u64, false)
        } else {
            bounded_count(sample_count as u64, entry_size, r.pos(), end)
        };
        if truncated {
            warn!(sample_count, "trun sample count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let duration = if flags & trun_flags::SAMPLE_DURATION != 0 {
                Some(r.read_u32(true)?)
            } else {
                None
            };
            let size = if flags & trun_flags::SAMPLE_SIZE != 0 {
                Some(r.read_u32(true)?)
            } else {
                None
            };
            let sflags = if flags & trun_flags::SAMPLE_FLAGS != 0 {
                Some(r.read_u32(true)?)
            } else {
                None
            };
            let composition_offset = if flags & trun_flags::SAMPLE_CTS_OFFSET != 0 {
                // version 1 composition offsets are signed
                Some(if version == 1 {
                    r.read_signed(4, true)?
                } else {
                    r.read_u32(true)? as i64
                })
            } else {
                None
            };
            entries.push(TrunEntry {
                duration,
                size,
                flags: sflags,
                composition_offset,
            });
        }
        Ok((
            Self {
                flags,
                sample_count,
                data_offset,
                first_sample_flags,
                entries,
            },
            status_of(truncated),
        ))
    }
}

// ---------------------------------------------------------------- mfra family

#[derive(Debug, Clone, Serialize)]
pub struct TfraEntry {
    pub time: u64,
    pub moof_offset: u64,
    pub traf_number: u32,
    pub trun_number: u32,
    pub sample_number: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TfraData {
    pub track_id: u32,
    pub entry_count: u32,
    pub entries: Vec<TfraEntry>,
}

impl TfraData {
    pub fn parse<R: Read + Seek>(
        r: &mut DataReader<R>,
        version: u8,
        end: u64,
    ) -> Result<(Self, ParseStatus)> {
        let track_id = r.read_u32(true)?;
        // 26 reserved bits then three 2-bit length-minus-one fields
        let packed = r.read_u32(true)?;
        let len_traf = ((packed >> 4) & 0x3) as usize + 1;
        let len_trun = ((packed >> 2) & 0x3) as usize + 1;
        let len_sample = (packed & 0x3) as usize + 1;
        let entry_count = r.read_u32(true)?;
        let time_size: u64 = if version == 1 { 16 } else { 8 };
        let entry_size = time_size + (len_traf + len_trun + len_sample) as u64;
        let (n, truncated) = bounded_count(entry_count as u64, entry_size, r.pos(), end);
        if truncated {
            warn!(entry_count, "tfra entry count exceeds box body");
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let (time, moof_offset) = if version == 1 {
                (r.read_u64(true)?, r.read_u64(true)?)
            } else {
                (r.read_u32(true)? as u64, r.read_u32(true)? as u64)
            };
            entries.push(TfraEntry {
                time,
                moof_offset,
                traf_number: r.read_unsigned(len_traf, true)? as u32,
                trun_number: r.read_unsigned(len_trun, true)? as u32,
                sample_number: r.read_unsigned(len_sample, true)? as u32,
            });
        }
        Ok((
            Self {
                track_id,
                entry_count,
                entries,
            },
            status_of(truncated),
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MfroData {
    pub size: u32,
}

impl MfroData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            size: r.read_u32(true)?,
        })
    }
}
