/// MSB-first bit cursor over an in-memory buffer.
///
/// Slice-header parsing walks fixed windows copied out of a sample, so a read
/// past the end must not abort the parse: it yields 0 and latches an overrun
/// flag the caller can inspect.
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
    overrun: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_pos: 0,
            overrun: false,
        }
    }

    /// True once any read has gone past the buffer end.
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }

    pub fn read_bit(&mut self) -> u32 {
        let byte = self.bit_pos / 8;
        if byte >= self.data.len() {
            self.overrun = true;
            return 0;
        }
        let shift = 7 - (self.bit_pos % 8);
        self.bit_pos += 1;
        ((self.data[byte] >> shift) & 1) as u32
    }

    /// Read `n` bits (n <= 32), MSB first.
    pub fn read_bits(&mut self, n: u32) -> u32 {
        debug_assert!(n <= 32);
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.read_bit();
        }
        v
    }

    /// Exp-Golomb ue(v): count leading zeros `n`, value = 2^n - 1 + next n bits.
    pub fn read_ue(&mut self) -> u32 {
        let mut zeros = 0u32;
        while !self.overrun && self.read_bit() == 0 {
            zeros += 1;
            if zeros > 31 {
                self.overrun = true;
                return 0;
            }
        }
        if self.overrun {
            return 0;
        }
        (1u32 << zeros) - 1 + self.read_bits(zeros)
    }
}

/// MSB-first bit assembler, used to synthesize ADTS headers.
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_pos: 0,
        }
    }

    pub fn write_bit(&mut self, bit: u32) {
        if self.bit_pos % 8 == 0 {
            self.bytes.push(0);
        }
        if bit & 1 != 0
            && let Some(last) = self.bytes.last_mut()
        {
            let shift = 7 - (self.bit_pos % 8);
            *last |= 1 << shift;
        }
        self.bit_pos += 1;
    }

    /// Write the low `n` bits of `v`, MSB first.
    pub fn write_bits(&mut self, v: u32, n: u32) {
        debug_assert!(n <= 32);
        for i in (0..n).rev() {
            self.write_bit((v >> i) & 1);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ue_known_patterns() {
        // 1 -> 0
        assert_eq!(BitReader::new(&[0b1000_0000]).read_ue(), 0);
        // 010 -> 1
        assert_eq!(BitReader::new(&[0b0100_0000]).read_ue(), 1);
        // 011 -> 2
        assert_eq!(BitReader::new(&[0b0110_0000]).read_ue(), 2);
        // 00100 -> 3
        assert_eq!(BitReader::new(&[0b0010_0000]).read_ue(), 3);
    }

    #[test]
    fn ue_round_trip() {
        for n in 0u32..=1000 {
            let mut w = BitWriter::new();
            // encode: zeros then (n+1) in (zeros+1) bits
            let val = n + 1;
            let width = 32 - val.leading_zeros();
            w.write_bits(0, width - 1);
            w.write_bits(val, width);
            let bytes = w.into_bytes();
            let mut r = BitReader::new(&bytes);
            assert_eq!(r.read_ue(), n, "round trip failed for {}", n);
            assert!(!r.overrun());
        }
    }

    #[test]
    fn reads_past_end_latch_overrun() {
        let mut r = BitReader::new(&[0xff]);
        assert_eq!(r.read_bits(8), 0xff);
        assert!(!r.overrun());
        assert_eq!(r.read_bit(), 0);
        assert!(r.overrun());
        assert_eq!(r.read_ue(), 0);
    }

    #[test]
    fn bit_sequences() {
        let mut r = BitReader::new(&[0b1011_0010, 0b0100_0000]);
        assert_eq!(r.read_bit(), 1);
        assert_eq!(r.read_bits(3), 0b011);
        assert_eq!(r.read_bits(5), 0b00100);
        assert_eq!(r.bit_pos(), 9);
    }

    #[test]
    fn writer_packs_msb_first() {
        let mut w = BitWriter::new();
        w.write_bits(0xfff, 12);
        w.write_bits(0, 1);
        w.write_bits(0, 2);
        w.write_bit(1);
        assert_eq!(w.into_bytes(), vec![0xff, 0xf1]);
    }
}
