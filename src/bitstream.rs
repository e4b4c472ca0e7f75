//! Frame-type classification from raw sample bytes.
//!
//! Samples arrive as length-prefixed NALUs; the prefix width comes from the
//! track's codec configuration record. Only the first few slice-header
//! fields are decoded, enough to recover the slice type. HEVC additionally
//! needs a little SPS/PPS geometry to step over the slice-segment address,
//! parsed once per track and cached.

use crate::bits::BitReader;
use crate::entries::HvcConfig;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum FrameType {
    I,
    P,
    B,
    #[default]
    Unknown,
}

/// Result of scanning one sample's NALUs.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub frame_type: FrameType,
    pub nalu_types: Vec<u8>,
    /// The bitstream carried an IDR unit.
    pub is_idr: bool,
}

/// Iterate length-prefixed NALUs. A prefix that overruns the buffer ends the
/// walk; the tail is corrupt, not a unit.
pub fn nal_units(data: &[u8], length_size: u8) -> impl Iterator<Item = &[u8]> {
    let ls = (length_size as usize).clamp(1, 4);
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        if pos + ls > data.len() {
            return None;
        }
        let mut len = 0usize;
        for &b in &data[pos..pos + ls] {
            len = (len << 8) | b as usize;
        }
        pos += ls;
        if len == 0 || pos + len > data.len() {
            return None;
        }
        let unit = &data[pos..pos + len];
        pos += len;
        Some(unit)
    })
}

// ---------------------------------------------------------------- H264

const H264_SLICE_TYPES: [FrameType; 10] = [
    FrameType::P,
    FrameType::B,
    FrameType::I,
    FrameType::P,
    FrameType::I,
    FrameType::P,
    FrameType::B,
    FrameType::I,
    FrameType::P,
    FrameType::I,
];

pub fn classify_h264(data: &[u8], length_size: u8) -> Classification {
    let mut out = Classification::default();
    for unit in nal_units(data, length_size) {
        let typ = unit[0] & 0x1f;
        out.nalu_types.push(typ);
        match typ {
            5 => {
                out.frame_type = FrameType::I;
                out.is_idr = true;
            }
            1 if out.frame_type == FrameType::Unknown => {
                // The first few slice-header fields fit in an 8-byte window.
                let window = &unit[1..unit.len().min(9)];
                let mut br = BitReader::new(window);
                let _first_mb_in_slice = br.read_ue();
                let slice_type = br.read_ue() as usize;
                if br.overrun() {
                    warn!("slice header truncated, frame type unresolved");
                    continue;
                }
                match H264_SLICE_TYPES.get(slice_type) {
                    Some(&t) => out.frame_type = t,
                    None => warn!(slice_type, "slice type out of range"),
                }
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------- HEVC

/// Geometry pulled from a track's SPS/PPS, needed to step over the
/// slice-segment address of non-first slice segments.
#[derive(Debug, Clone, Copy)]
pub struct HevcContext {
    pub pic_width_in_luma_samples: u32,
    pub pic_height_in_luma_samples: u32,
    /// ceil(log2(PicSizeInCtbsY)): bit width of slice_segment_address.
    pub address_bits: u32,
    pub dependent_slice_segments_enabled: bool,
    pub num_extra_slice_header_bits: u32,
}

impl HevcContext {
    /// Parse the first SPS (and PPS, when present) out of the configuration
    /// record's parameter-set arrays. Returns `None` when no SPS exists or
    /// its header does not decode.
    pub fn from_config(cfg: &HvcConfig) -> Option<Self> {
        let sps = cfg.first_nalu_of_type(33)?;
        let mut ctx = parse_sps(sps)?;
        if let Some(pps) = cfg.first_nalu_of_type(34)
            && let Some((dep, extra)) = parse_pps(pps)
        {
            ctx.dependent_slice_segments_enabled = dep;
            ctx.num_extra_slice_header_bits = extra;
        }
        Some(ctx)
    }
}

fn parse_sps(sps: &[u8]) -> Option<HevcContext> {
    if sps.len() < 3 {
        return None;
    }
    // 2-byte NALU header
    let mut br = BitReader::new(&sps[2..]);
    br.read_bits(4); // sps_video_parameter_set_id
    let max_sub_layers_minus1 = br.read_bits(3);
    br.read_bit(); // sps_temporal_id_nesting_flag

    // profile_tier_level: general block then per-sublayer presence flags
    br.read_bits(8); // profile space, tier, profile idc
    br.read_bits(32); // compatibility flags
    br.read_bits(32);
    br.read_bits(16); // 48 constraint bits
    br.read_bits(8); // general_level_idc
    let mut profile_present = [false; 8];
    let mut level_present = [false; 8];
    for i in 0..max_sub_layers_minus1 as usize {
        profile_present[i] = br.read_bit() == 1;
        level_present[i] = br.read_bit() == 1;
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            br.read_bits(2); // reserved
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if profile_present[i] {
            br.read_bits(32);
            br.read_bits(32);
            br.read_bits(24); // 88 bits of sub-layer profile
        }
        if level_present[i] {
            br.read_bits(8);
        }
    }

    br.read_ue(); // sps_seq_parameter_set_id
    let chroma_format_idc = br.read_ue();
    if chroma_format_idc == 3 {
        br.read_bit(); // separate_colour_plane_flag
    }
    let pic_width = br.read_ue();
    let pic_height = br.read_ue();
    if br.read_bit() == 1 {
        // conformance window
        br.read_ue();
        br.read_ue();
        br.read_ue();
        br.read_ue();
    }
    br.read_ue(); // bit_depth_luma_minus8
    br.read_ue(); // bit_depth_chroma_minus8
    br.read_ue(); // log2_max_pic_order_cnt_lsb_minus4
    let ordering_info_present = br.read_bit() == 1;
    let lo = if ordering_info_present {
        0
    } else {
        max_sub_layers_minus1
    };
    for _ in lo..=max_sub_layers_minus1 {
        br.read_ue();
        br.read_ue();
        br.read_ue();
    }
    let log2_min_cb_size_minus3 = br.read_ue();
    let log2_diff_max_min_cb_size = br.read_ue();
    if br.overrun() {
        return None;
    }

    let ctb_log2_size = log2_min_cb_size_minus3 + 3 + log2_diff_max_min_cb_size;
    let ctb_size = 1u32 << ctb_log2_size;
    let w_ctbs = pic_width.div_ceil(ctb_size);
    let h_ctbs = pic_height.div_ceil(ctb_size);
    let pic_size = (w_ctbs * h_ctbs).max(1);
    let address_bits = 32 - (pic_size - 1).leading_zeros().min(31);
    Some(HevcContext {
        pic_width_in_luma_samples: pic_width,
        pic_height_in_luma_samples: pic_height,
        address_bits: if pic_size == 1 { 0 } else { address_bits },
        dependent_slice_segments_enabled: false,
        num_extra_slice_header_bits: 0,
    })
}

fn parse_pps(pps: &[u8]) -> Option<(bool, u32)> {
    if pps.len() < 3 {
        return None;
    }
    let mut br = BitReader::new(&pps[2..]);
    br.read_ue(); // pps_pic_parameter_set_id
    br.read_ue(); // pps_seq_parameter_set_id
    let dependent = br.read_bit() == 1;
    br.read_bit(); // output_flag_present_flag
    let extra = br.read_bits(3);
    if br.overrun() {
        return None;
    }
    Some((dependent, extra))
}

fn is_hevc_slice_type(typ: u8) -> bool {
    matches!(typ, 0..=9 | 16..=21)
}

pub fn classify_hevc(data: &[u8], length_size: u8, ctx: Option<&HevcContext>) -> Classification {
    let mut out = Classification::default();
    for unit in nal_units(data, length_size) {
        let typ = (unit[0] >> 1) & 0x3f;
        out.nalu_types.push(typ);
        match typ {
            19 | 20 => {
                out.frame_type = FrameType::I;
                out.is_idr = true;
            }
            t if is_hevc_slice_type(t) && out.frame_type == FrameType::Unknown => {
                if unit.len() < 3 {
                    continue;
                }
                let window = &unit[2..unit.len().min(18)];
                let mut br = BitReader::new(window);
                let first_slice = br.read_bit() == 1;
                if (16..=23).contains(&t) {
                    br.read_bit(); // no_output_of_prior_pics_flag
                }
                br.read_ue(); // slice_pic_parameter_set_id
                if !first_slice {
                    let Some(ctx) = ctx else {
                        // Without SPS geometry the address width is unknown.
                        continue;
                    };
                    let dependent = if ctx.dependent_slice_segments_enabled {
                        br.read_bit() == 1
                    } else {
                        false
                    };
                    if dependent {
                        // Dependent segments inherit their slice type.
                        continue;
                    }
                    br.read_bits(ctx.address_bits);
                }
                if let Some(ctx) = ctx {
                    br.read_bits(ctx.num_extra_slice_header_bits);
                }
                let slice_type = br.read_ue();
                if br.overrun() {
                    warn!("slice segment header truncated, frame type unresolved");
                    continue;
                }
                out.frame_type = match slice_type {
                    0 => FrameType::B,
                    1 => FrameType::P,
                    2 => FrameType::I,
                    other => {
                        warn!(slice_type = other, "slice type out of range");
                        FrameType::Unknown
                    }
                };
            }
            _ => {}
        }
    }
    out
}
