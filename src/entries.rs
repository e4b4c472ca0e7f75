use crate::boxes::FourCC;
use crate::error::Result;
use crate::reader::DataReader;
use serde::Serialize;
use std::io::{Read, Seek};
use tracing::warn;

// MPEG-4 systems object types the timeline cares about.
pub const OBJECT_TYPE_H264: u8 = 0x21;
pub const OBJECT_TYPE_HEVC: u8 = 0x23;

/// Object-type indication to display name (14496-1 table subset).
pub fn object_type_name(ot: u8) -> &'static str {
    match ot {
        0x20 => "MPEG-4 Visual",
        0x21 => "H.264/AVC",
        0x22 => "H.264 Parameter Sets",
        0x23 => "H.265/HEVC",
        0x40 => "MPEG-4 AAC",
        0x60 => "MPEG-2 Visual Simple",
        0x61 => "MPEG-2 Visual Main",
        0x62 => "MPEG-2 Visual SNR",
        0x63 => "MPEG-2 Visual Spatial",
        0x64 => "MPEG-2 Visual High",
        0x65 => "MPEG-2 Visual 422",
        0x66 => "MPEG-2 AAC Main",
        0x67 => "MPEG-2 AAC LC",
        0x68 => "MPEG-2 AAC SSR",
        0x69 => "MPEG-2 Audio",
        0x6a => "MPEG-1 Visual",
        0x6b => "MPEG-1 Audio",
        0x6c => "JPEG",
        _ => "Unknown",
    }
}

pub fn is_aac_object_type(ot: u8) -> bool {
    matches!(ot, 0x40 | 0x66 | 0x67 | 0x68)
}

/// ADTS profile field (2 bits) for an AAC object type: Main=0, LC=1, SSR=2.
/// Plain MPEG-4 AAC is treated as LC.
pub fn adts_profile(ot: u8) -> u8 {
    match ot {
        0x66 => 0,
        0x68 => 2,
        _ => 1,
    }
}

// ---------------------------------------------------------------- sample entries

#[derive(Debug, Clone, Serialize)]
pub struct VisualSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub horiz_resolution: f64,
    pub vert_resolution: f64,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
}

impl VisualSampleEntry {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        r.skip(6); // reserved
        let data_reference_index = r.read_u16(true)?;
        r.skip(16); // pre_defined / reserved
        let width = r.read_u16(true)?;
        let height = r.read_u16(true)?;
        let horiz_resolution = r.read_u32(true)? as f64 / 65536.0;
        let vert_resolution = r.read_u32(true)? as f64 / 65536.0;
        r.skip(4); // reserved
        let frame_count = r.read_u16(true)?;
        // Pascal-style counted name inside a fixed 32-byte field.
        let name_len = r.read_u8()?.min(31) as usize;
        let compressor_name = r.read_string(name_len)?;
        r.skip((31 - name_len) as u64);
        let depth = r.read_u16(true)?;
        r.skip(2); // pre_defined
        Ok(Self {
            data_reference_index,
            width,
            height,
            horiz_resolution,
            vert_resolution,
            frame_count,
            compressor_name,
            depth,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioSampleEntry {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    /// Hz; stored as 16.16 fixed point in the file.
    pub sample_rate: u32,
}

impl AudioSampleEntry {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        r.skip(6); // reserved
        let data_reference_index = r.read_u16(true)?;
        r.skip(8); // reserved
        let channel_count = r.read_u16(true)?;
        let sample_size = r.read_u16(true)?;
        r.skip(4); // pre_defined / reserved
        let sample_rate = r.read_u32(true)? >> 16;
        Ok(Self {
            data_reference_index,
            channel_count,
            sample_size,
            sample_rate,
        })
    }
}

// ---------------------------------------------------------------- avcC

#[derive(Debug, Clone, Serialize)]
pub struct AvcConfig {
    pub config_version: u8,
    pub profile: u8,
    pub profile_compat: u8,
    pub level: u8,
    /// NALU length-prefix width in bytes (1..=4).
    pub length_size: u8,
    #[serde(serialize_with = "ser_nalu_list")]
    pub sps: Vec<Vec<u8>>,
    #[serde(serialize_with = "ser_nalu_list")]
    pub pps: Vec<Vec<u8>>,
    pub chroma_format: Option<u8>,
    pub bit_depth_luma: Option<u8>,
    pub bit_depth_chroma: Option<u8>,
    #[serde(serialize_with = "ser_nalu_list")]
    pub sps_ext: Vec<Vec<u8>>,
}

fn ser_nalu_list<S: serde::Serializer>(v: &[Vec<u8>], s: S) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeSeq;
    let mut seq = s.serialize_seq(Some(v.len()))?;
    for n in v {
        seq.serialize_element(&hex::encode(n))?;
    }
    seq.end()
}

impl AvcConfig {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, end: u64) -> Result<Self> {
        let config_version = r.read_u8()?;
        let profile = r.read_u8()?;
        let profile_compat = r.read_u8()?;
        let level = r.read_u8()?;
        let b = r.read_u8()?;
        if b >> 2 != 0b11_1111 {
            warn!("avcC reserved bits not all-ones");
        }
        let length_size = (b & 0x3) + 1;
        let b = r.read_u8()?;
        if b >> 5 != 0b111 {
            warn!("avcC reserved bits not all-ones");
        }
        let num_sps = b & 0x1f;
        let mut sps = Vec::with_capacity(num_sps as usize);
        for _ in 0..num_sps {
            let len = r.read_u16(true)? as usize;
            sps.push(r.read_vec(len)?);
        }
        let num_pps = r.read_u8()?;
        let mut pps = Vec::with_capacity(num_pps as usize);
        for _ in 0..num_pps {
            let len = r.read_u16(true)? as usize;
            pps.push(r.read_vec(len)?);
        }

        // High-profile tail, present only for certain profiles and only when
        // bytes remain in the body.
        let mut chroma_format = None;
        let mut bit_depth_luma = None;
        let mut bit_depth_chroma = None;
        let mut sps_ext = Vec::new();
        if matches!(profile, 100 | 110 | 122 | 144) && r.pos() < end {
            chroma_format = Some(r.read_u8()? & 0x3);
            bit_depth_luma = Some((r.read_u8()? & 0x7) + 8);
            bit_depth_chroma = Some((r.read_u8()? & 0x7) + 8);
            let num_spse = r.read_u8()?;
            for _ in 0..num_spse {
                let len = r.read_u16(true)? as usize;
                sps_ext.push(r.read_vec(len)?);
            }
        }
        Ok(Self {
            config_version,
            profile,
            profile_compat,
            level,
            length_size,
            sps,
            pps,
            chroma_format,
            bit_depth_luma,
            bit_depth_chroma,
            sps_ext,
        })
    }
}

// ---------------------------------------------------------------- hvcC

#[derive(Debug, Clone, Serialize)]
pub struct HvcNaluArray {
    pub array_complete: bool,
    pub nalu_type: u8,
    #[serde(serialize_with = "ser_nalu_list")]
    pub nalus: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HvcConfig {
    pub config_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: u8,
    pub general_profile_idc: u8,
    pub general_profile_compat_flags: u32,
    pub general_constraint_flags: u64,
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format_idc: u8,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: u8,
    /// NALU length-prefix width in bytes (1..=4).
    pub length_size: u8,
    pub arrays: Vec<HvcNaluArray>,
}

impl HvcConfig {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        let config_version = r.read_u8()?;
        if config_version != 1 {
            warn!(config_version, "hvcC with unexpected configuration version");
        }
        let b = r.read_u8()?;
        let general_profile_space = b >> 6;
        let general_tier_flag = (b >> 5) & 1;
        let general_profile_idc = b & 0x1f;
        let general_profile_compat_flags = r.read_u32(true)?;
        let general_constraint_flags = r.read_unsigned(6, true)?;
        let general_level_idc = r.read_u8()?;
        let min_spatial_segmentation_idc = r.read_u16(true)? & 0x0fff;
        let parallelism_type = r.read_u8()? & 0x3;
        let chroma_format_idc = r.read_u8()? & 0x3;
        let bit_depth_luma = (r.read_u8()? & 0x7) + 8;
        let bit_depth_chroma = (r.read_u8()? & 0x7) + 8;
        let avg_frame_rate = r.read_u16(true)?;
        let b = r.read_u8()?;
        let constant_frame_rate = b >> 6;
        let num_temporal_layers = (b >> 3) & 0x7;
        let temporal_id_nested = (b >> 2) & 1;
        let length_size = (b & 0x3) + 1;
        let array_count = r.read_u8()?;
        let mut arrays = Vec::with_capacity(array_count as usize);
        for _ in 0..array_count {
            let b = r.read_u8()?;
            let array_complete = b & 0x80 != 0;
            let nalu_type = b & 0x3f;
            let num = r.read_u16(true)?;
            let mut nalus = Vec::with_capacity(num as usize);
            for _ in 0..num {
                let len = r.read_u16(true)? as usize;
                nalus.push(r.read_vec(len)?);
            }
            arrays.push(HvcNaluArray {
                array_complete,
                nalu_type,
                nalus,
            });
        }
        Ok(Self {
            config_version,
            general_profile_space,
            general_tier_flag,
            general_profile_idc,
            general_profile_compat_flags,
            general_constraint_flags,
            general_level_idc,
            min_spatial_segmentation_idc,
            parallelism_type,
            chroma_format_idc,
            bit_depth_luma,
            bit_depth_chroma,
            avg_frame_rate,
            constant_frame_rate,
            num_temporal_layers,
            temporal_id_nested,
            length_size,
            arrays,
        })
    }

    /// First parameter set of the given HEVC NALU type (32 VPS, 33 SPS, 34 PPS).
    pub fn first_nalu_of_type(&self, nalu_type: u8) -> Option<&[u8]> {
        self.arrays
            .iter()
            .filter(|a| a.nalu_type == nalu_type)
            .flat_map(|a| a.nalus.iter())
            .next()
            .map(|v| v.as_slice())
    }
}

// ---------------------------------------------------------------- esds

pub mod descriptor_tags {
    pub const OBJECT: u8 = 0x01;
    pub const INITIAL_OBJECT: u8 = 0x02;
    pub const ES: u8 = 0x03;
    pub const DECODER_CONFIG: u8 = 0x04;
    pub const DECODER_SPECIFIC: u8 = 0x05;
    pub const SL_CONFIG: u8 = 0x06;
}

/// Flattened view over the elementary-stream descriptor chain. Each
/// descriptor is a tag byte plus a 1–4 byte self-length quantity; the ones we
/// model nest in document order so a sequential walk reaches them all.
#[derive(Debug, Clone, Serialize, Default)]
pub struct EsdsData {
    pub es_id: u16,
    pub object_type: Option<u8>,
    pub stream_type: Option<u8>,
    pub buffer_size: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    #[serde(serialize_with = "ser_bytes_hex")]
    pub decoder_specific: Vec<u8>,
}

fn ser_bytes_hex<S: serde::Serializer>(v: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(v))
}

fn read_descriptor_len<R: Read + Seek>(r: &mut DataReader<R>) -> Result<u32> {
    let mut len = 0u32;
    for _ in 0..4 {
        let b = r.read_u8()?;
        len = (len << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            break;
        }
    }
    Ok(len)
}

impl EsdsData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, end: u64) -> Result<Self> {
        let mut out = Self::default();
        while r.pos() + 2 <= end {
            let tag = r.read_u8()?;
            let len = read_descriptor_len(r)?;
            let body_end = (r.pos() + len as u64).min(end);
            match tag {
                descriptor_tags::OBJECT | descriptor_tags::INITIAL_OBJECT => {
                    // Only the nested descriptors matter; skip own fields.
                    r.skip((body_end - r.pos()).min(if tag == descriptor_tags::OBJECT {
                        2
                    } else {
                        7
                    }));
                }
                descriptor_tags::ES => {
                    out.es_id = r.read_u16(true)?;
                    let es_flags = r.read_u8()?;
                    if es_flags & 0x80 != 0 {
                        r.skip(2); // dependsOn_ES_ID
                    }
                    if es_flags & 0x40 != 0 {
                        let url_len = r.read_u8()? as u64;
                        r.skip(url_len);
                    }
                    if es_flags & 0x20 != 0 {
                        r.skip(2); // OCR_ES_ID
                    }
                }
                descriptor_tags::DECODER_CONFIG => {
                    out.object_type = Some(r.read_u8()?);
                    out.stream_type = Some(r.read_u8()?);
                    out.buffer_size = r.read_u24(true)?;
                    out.max_bitrate = r.read_u32(true)?;
                    out.avg_bitrate = r.read_u32(true)?;
                }
                descriptor_tags::DECODER_SPECIFIC => {
                    let take = (body_end - r.pos()) as usize;
                    out.decoder_specific = r.read_vec(take)?;
                }
                descriptor_tags::SL_CONFIG => {
                    r.set_pos(body_end);
                }
                other => {
                    warn!(tag = other, "unknown elementary-stream descriptor");
                    break;
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------- misc entry children

#[derive(Debug, Clone, Serialize)]
pub struct BtrtData {
    pub buffer_size_db: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
}

impl BtrtData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            buffer_size_db: r.read_u32(true)?,
            max_bitrate: r.read_u32(true)?,
            avg_bitrate: r.read_u32(true)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaspData {
    pub h_spacing: u32,
    pub v_spacing: u32,
}

impl PaspData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            h_spacing: r.read_u32(true)?,
            v_spacing: r.read_u32(true)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColrData {
    pub colour_type: FourCC,
    pub primaries: Option<u16>,
    pub transfer: Option<u16>,
    pub matrix: Option<u16>,
    pub full_range: Option<bool>,
    #[serde(serialize_with = "ser_bytes_hex")]
    pub icc_profile: Vec<u8>,
}

impl ColrData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, end: u64) -> Result<Self> {
        let mut b = [0u8; 4];
        r.read(&mut b)?;
        let colour_type = FourCC(b);
        let mut out = Self {
            colour_type,
            primaries: None,
            transfer: None,
            matrix: None,
            full_range: None,
            icc_profile: Vec::new(),
        };
        match &colour_type.0 {
            b"nclx" => {
                out.primaries = Some(r.read_u16(true)?);
                out.transfer = Some(r.read_u16(true)?);
                out.matrix = Some(r.read_u16(true)?);
                out.full_range = Some(r.read_u8()? & 0x80 != 0);
            }
            b"rICC" | b"prof" => {
                let len = end.saturating_sub(r.pos()) as usize;
                out.icc_profile = r.read_vec(len)?;
            }
            _ => {
                warn!(colour_type = %colour_type, "unknown colr colour type");
                r.set_pos(end);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerPosition {
    pub position: u8,
    pub azimuth: Option<i16>,
    pub elevation: Option<i8>,
}

/// Channel layout. The per-channel loop needs the parent audio entry's
/// channel count, which is only known after the entry's own fields parse;
/// the tree's finalize pass re-runs this with the count filled in.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ChnlData {
    pub stream_structure: u8,
    pub defined_layout: Option<u8>,
    pub positions: Vec<SpeakerPosition>,
    pub omitted_channels_map: Option<u64>,
    pub object_count: Option<u8>,
}

impl ChnlData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>, channel_count: u16) -> Result<Self> {
        let stream_structure = r.read_u8()?;
        let mut out = Self {
            stream_structure,
            ..Self::default()
        };
        if stream_structure & 1 != 0 {
            let defined_layout = r.read_u8()?;
            out.defined_layout = Some(defined_layout);
            if defined_layout == 0 {
                for _ in 0..channel_count {
                    let position = r.read_u8()?;
                    let (azimuth, elevation) = if position == 126 {
                        (
                            Some(r.read_signed(2, true)? as i16),
                            Some(r.read_signed(1, true)? as i8),
                        )
                    } else {
                        (None, None)
                    };
                    out.positions.push(SpeakerPosition {
                        position,
                        azimuth,
                        elevation,
                    });
                }
            } else {
                out.omitted_channels_map = Some(r.read_u64(true)?);
            }
        }
        if stream_structure & 2 != 0 {
            out.object_count = Some(r.read_u8()?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SratData {
    pub sampling_rate: u32,
}

impl SratData {
    pub fn parse<R: Read + Seek>(r: &mut DataReader<R>) -> Result<Self> {
        Ok(Self {
            sampling_rate: r.read_u32(true)?,
        })
    }
}
