//! Sample payload assembly.
//!
//! Raw extraction is a single absolute read. Video extraction rewrites the
//! stored length prefixes into Annex-B start codes and, on key frames,
//! prepends the track's parameter sets so the result decodes standalone.
//! Audio extraction prepends a synthesized ADTS header.

use crate::bits::BitWriter;
use crate::entries::adts_profile;
use crate::error::Result;
use crate::reader::DataReader;
use crate::timeline::{AudioParams, SampleItem, VideoParams};
use std::io::{Read, Seek};
use tracing::warn;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

pub fn read_raw_sample<R: Read + Seek>(
    r: &mut DataReader<R>,
    sample: &SampleItem,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; sample.size as usize];
    r.read_exact_at(sample.offset, &mut buf)?;
    Ok(buf)
}

/// Parameter sets to prepend ahead of a key frame, in decode order.
fn parameter_sets(params: &VideoParams) -> Vec<&[u8]> {
    let mut out: Vec<&[u8]> = Vec::new();
    if let Some(avc) = &params.avc {
        out.extend(avc.sps.iter().map(|v| v.as_slice()));
        out.extend(avc.pps.iter().map(|v| v.as_slice()));
    }
    if let Some(hvc) = &params.hvc {
        // Arrays are stored VPS, SPS, PPS by muxers; keep file order.
        for a in &hvc.arrays {
            out.extend(a.nalus.iter().map(|v| v.as_slice()));
        }
    }
    out
}

/// Rewrite a length-prefixed sample into start-code form, prepending the
/// parameter sets when `key_frame` is set.
pub fn annexb_sample(raw: &[u8], params: &VideoParams, key_frame: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 64);
    if key_frame {
        for ps in parameter_sets(params) {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(ps);
        }
    }
    for unit in crate::bitstream::nal_units(raw, params.length_size) {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(unit);
    }
    out
}

const ADTS_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

fn sample_rate_index(rate: u32) -> u32 {
    match ADTS_SAMPLE_RATES.iter().position(|&r| r == rate) {
        Some(i) => i as u32,
        None => {
            warn!(rate, "sample rate not in the ADTS table, signalling escape index");
            13
        }
    }
}

/// Build the 7-byte ADTS header (no CRC) for one AAC access unit.
pub fn adts_header(object_type: u8, sample_rate: u32, channels: u16, payload_len: usize) -> Vec<u8> {
    // 7.1 channel layouts signal 8 channels under configuration 7
    let channel_config = if channels == 8 { 7 } else { channels as u32 & 0x7 };
    let frame_len = (payload_len + 7) as u32 & 0x1fff;
    let mut w = BitWriter::new();
    w.write_bits(0xfff, 12); // syncword
    w.write_bit(0); // MPEG-4
    w.write_bits(0, 2); // layer
    w.write_bit(1); // no CRC
    w.write_bits(adts_profile(object_type) as u32, 2);
    w.write_bits(sample_rate_index(sample_rate), 4);
    w.write_bit(0); // private
    w.write_bits(channel_config, 3);
    w.write_bits(0, 4); // original/home/copyright id+start
    w.write_bits(frame_len, 13);
    w.write_bits(0x7ff, 11); // buffer fullness: variable bitrate
    w.write_bits(0, 2); // one raw data block
    w.into_bytes()
}

/// ADTS header plus the raw access unit.
pub fn adts_sample(raw: &[u8], params: &AudioParams) -> Vec<u8> {
    let mut out = adts_header(
        params.object_type.unwrap_or(0x40),
        params.sample_rate,
        params.channel_count,
        raw.len(),
    );
    out.extend_from_slice(raw);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_params(length_size: u8) -> VideoParams {
        VideoParams {
            width: 1920,
            height: 1080,
            length_size,
            avc: None,
            hvc: None,
        }
    }

    #[test]
    fn start_code_rewrite() {
        let mut raw = 3u32.to_be_bytes().to_vec();
        raw.extend_from_slice(&[0x65, 0x88, 0x80]);
        raw.extend_from_slice(&2u32.to_be_bytes());
        raw.extend_from_slice(&[0x06, 0x01]);
        let out = annexb_sample(&raw, &video_params(4), false);
        assert_eq!(
            out,
            vec![0, 0, 0, 1, 0x65, 0x88, 0x80, 0, 0, 0, 1, 0x06, 0x01]
        );
    }

    #[test]
    fn key_frame_prepends_parameter_sets() {
        let mut params = video_params(4);
        params.avc = Some(crate::entries::AvcConfig {
            config_version: 1,
            profile: 66,
            profile_compat: 0,
            level: 30,
            length_size: 4,
            sps: vec![vec![0x67, 0x42]],
            pps: vec![vec![0x68, 0xce]],
            chroma_format: None,
            bit_depth_luma: None,
            bit_depth_chroma: None,
            sps_ext: Vec::new(),
        });
        let mut raw = 2u32.to_be_bytes().to_vec();
        raw.extend_from_slice(&[0x65, 0x88]);
        let out = annexb_sample(&raw, &params, true);
        assert_eq!(
            out,
            vec![0, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x68, 0xce, 0, 0, 0, 1, 0x65, 0x88]
        );
    }

    #[test]
    fn adts_header_layout() {
        // AAC LC, 44100 Hz, stereo, 100-byte payload
        let h = adts_header(0x40, 44100, 2, 100);
        assert_eq!(h.len(), 7);
        assert_eq!(h[0], 0xff);
        assert_eq!(h[1], 0xf1); // MPEG-4, layer 0, no CRC
        // profile 1 (LC), rate index 4, channel config 2
        assert_eq!(h[2], (1 << 6) | (4 << 2) | 0);
        assert_eq!(h[3] >> 6, 2);
        // frame length 107 across bytes 3..6
        let frame_len =
            ((h[3] as u32 & 0x3) << 11) | ((h[4] as u32) << 3) | ((h[5] as u32) >> 5);
        assert_eq!(frame_len, 107);
        // buffer fullness all ones
        assert_eq!(h[5] & 0x1f, 0x1f);
        assert_eq!(h[6] >> 2, 0x3f);
    }

    #[test]
    fn unlisted_sample_rate_signals_escape_index() {
        let h = adts_header(0x40, 44056, 2, 10);
        assert_eq!((h[2] >> 2) & 0xf, 13);
    }

    #[test]
    fn eight_channels_map_to_config_seven() {
        let h = adts_header(0x40, 48000, 8, 10);
        assert_eq!(h[3] >> 6, 3); // low 2 bits of config 7 == 0b11
        assert_eq!(h[2] & 1, 1); // high bit of config 7
    }
}
