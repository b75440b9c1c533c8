//! Bloom filter over change hashes, used to summarize which changes a peer
//! already has.
//!
//! Encoding: three LEB128 integers (entry count, bits per entry, probe
//! count) followed by the bit array. A filter with no entries encodes as
//! zero bytes.

use crate::{engine::EngineError, ids::ChangeHash};

const BITS_PER_ENTRY: u32 = 10;
const NUM_PROBES: u32 = 7;
/// Upper bound accepted for either header parameter of a peer's filter.
const MAX_HEADER_PARAM: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BloomFilter {
    num_entries: u32,
    num_bits_per_entry: u32,
    num_probes: u32,
    bits: Vec<u8>,
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self {
            num_entries: 0,
            num_bits_per_entry: BITS_PER_ENTRY,
            num_probes: NUM_PROBES,
            bits: Vec::new(),
        }
    }
}

impl BloomFilter {
    pub(crate) fn from_hashes<'a>(hashes: impl IntoIterator<Item = &'a ChangeHash>) -> Self {
        let hashes: Vec<&ChangeHash> = hashes.into_iter().collect();
        let num_entries = hashes.len() as u32;
        let mut filter = Self {
            num_entries,
            bits: vec![0; bits_len(num_entries, BITS_PER_ENTRY)],
            ..Self::default()
        };
        for hash in hashes {
            for probe in filter.probes(hash) {
                filter.bits[(probe >> 3) as usize] |= 1 << (probe & 7);
            }
        }
        filter
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let mut cursor = bytes;
        let num_entries = read_leb128(&mut cursor)?;
        let num_bits_per_entry = read_leb128(&mut cursor)?;
        let num_probes = read_leb128(&mut cursor)?;
        if num_bits_per_entry > MAX_HEADER_PARAM || num_probes > MAX_HEADER_PARAM {
            return Err(EngineError::decode(
                "bloom filter",
                format!(
                    "{num_bits_per_entry} bits per entry and {num_probes} probes exceed the limit of {MAX_HEADER_PARAM}"
                ),
            ));
        }
        let expected = bits_len(num_entries, num_bits_per_entry);
        if cursor.len() != expected {
            return Err(EngineError::decode(
                "bloom filter",
                format!("expected {expected} bytes of bits, found {}", cursor.len()),
            ));
        }
        Ok(Self {
            num_entries,
            num_bits_per_entry,
            num_probes,
            bits: cursor.to_vec(),
        })
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        if self.num_entries == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.bits.len() + 6);
        write_leb128(&mut out, self.num_entries);
        write_leb128(&mut out, self.num_bits_per_entry);
        write_leb128(&mut out, self.num_probes);
        out.extend_from_slice(&self.bits);
        out
    }

    pub(crate) fn contains_hash(&self, hash: &ChangeHash) -> bool {
        if self.num_entries == 0 || self.bits.is_empty() {
            return false;
        }
        self.probes(hash)
            .into_iter()
            .all(|probe| self.bits[(probe >> 3) as usize] & (1 << (probe & 7)) != 0)
    }

    /// Bit positions for `hash`, derived from its first twelve bytes.
    fn probes(&self, hash: &ChangeHash) -> Vec<u32> {
        let bytes = hash.as_bytes();
        let modulo = 8 * self.bits.len() as u64;
        if modulo == 0 {
            return Vec::new();
        }
        let word = |i: usize| {
            u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]) as u64
        };
        let mut x = word(0) % modulo;
        let mut y = word(4) % modulo;
        let z = word(8) % modulo;

        let mut probes = Vec::with_capacity(self.num_probes as usize);
        probes.push(x as u32);
        for _ in 1..self.num_probes {
            x = (x + y) % modulo;
            y = (y + z) % modulo;
            probes.push(x as u32);
        }
        probes
    }
}

fn bits_len(num_entries: u32, bits_per_entry: u32) -> usize {
    (num_entries as usize * bits_per_entry as usize).div_ceil(8)
}

fn write_leb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_leb128(cursor: &mut &[u8]) -> Result<u32, EngineError> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let (&byte, rest) = cursor
            .split_first()
            .ok_or_else(|| EngineError::decode("bloom filter", "truncated header"))?;
        *cursor = rest;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(EngineError::decode("bloom filter", "header value overflows"));
        }
    }
    u32::try_from(result).map_err(|_| EngineError::decode("bloom filter", "header value overflows"))
}
