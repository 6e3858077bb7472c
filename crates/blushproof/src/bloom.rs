//! Bloom filter for approximate membership.
//!
//! All eight bit positions come from one SHA-256 digest of the item: the
//! 32-byte digest is read as eight big-endian `u32` words, each reduced
//! modulo the filter size. False positives are expected; false negatives
//! cannot happen.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Number of bit positions set per item.
pub const HASH_COUNT: usize = 8;

/// A fixed-size Bloom filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BloomRepr", into = "BloomRepr")]
pub struct BloomFilter {
    size_in_bits: u32,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Create an empty filter of `size_in_bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBloom`] if `size_in_bits` is zero.
    pub fn new(size_in_bits: u32) -> Result<Self> {
        if size_in_bits == 0 {
            return Err(Error::invalid_bloom("size must be non-zero"));
        }
        Ok(Self {
            size_in_bits,
            bits: vec![0; byte_len(size_in_bits)],
        })
    }

    /// Create a filter and insert every item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBloom`] if `size_in_bits` is zero.
    pub fn from_items<I, T>(size_in_bits: u32, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut filter = Self::new(size_in_bits)?;
        for item in items {
            filter.insert(item.as_ref());
        }
        Ok(filter)
    }

    /// Rebuild a filter from its raw bit array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBloom`] if the size is zero or `bytes` is not
    /// exactly the length the size calls for.
    pub fn from_bytes(size_in_bits: u32, bytes: Vec<u8>) -> Result<Self> {
        if size_in_bits == 0 {
            return Err(Error::invalid_bloom("size must be non-zero"));
        }
        let expected = byte_len(size_in_bits);
        if bytes.len() != expected {
            return Err(Error::invalid_bloom(format!(
                "expected {expected} bytes for {size_in_bits} bits, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            size_in_bits,
            bits: bytes,
        })
    }

    /// Add an item.
    pub fn insert(&mut self, item: &str) {
        for pos in self.positions(item) {
            self.bits[pos / 8] |= 1 << (pos % 8);
        }
    }

    /// Whether the item may have been inserted.
    #[must_use]
    pub fn probe(&self, item: &str) -> bool {
        self.positions(item)
            .into_iter()
            .all(|pos| self.bits[pos / 8] & (1 << (pos % 8)) != 0)
    }

    /// Filter size in bits.
    #[must_use]
    pub fn size_in_bits(&self) -> u32 {
        self.size_in_bits
    }

    /// The raw bit array, least significant bit first within each byte.
    #[must_use]
    pub fn to_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Number of bits currently set.
    #[must_use]
    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    fn positions(&self, item: &str) -> [usize; HASH_COUNT] {
        let digest = Sha256::digest(item.as_bytes());
        let mut positions = [0usize; HASH_COUNT];
        for (pos, word) in positions.iter_mut().zip(digest.chunks_exact(4)) {
            let value = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            *pos = (value % self.size_in_bits) as usize;
        }
        positions
    }
}

fn byte_len(size_in_bits: u32) -> usize {
    size_in_bits.div_ceil(8) as usize
}

#[derive(Serialize, Deserialize)]
struct BloomRepr {
    size_in_bits: u32,
    bits: String,
}

impl From<BloomFilter> for BloomRepr {
    fn from(filter: BloomFilter) -> Self {
        Self {
            size_in_bits: filter.size_in_bits,
            bits: hex::encode(&filter.bits),
        }
    }
}

impl TryFrom<BloomRepr> for BloomFilter {
    type Error = Error;

    fn try_from(repr: BloomRepr) -> Result<Self> {
        let bytes = hex::decode(&repr.bits).map_err(|e| Error::invalid_bloom(e.to_string()))?;
        Self::from_bytes(repr.size_in_bits, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_A: &str = "https://www.example.com/a/very/long/path/that/keeps/going/and/going?with=query&and=more";
    const LONG_B: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt";

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(BloomFilter::new(0), Err(Error::InvalidBloom(_))));
        assert!(BloomFilter::from_bytes(0, Vec::new()).is_err());
    }

    #[test]
    fn test_probe_before_and_after_insert() {
        let mut filter = BloomFilter::new(1024 * 8).unwrap();

        for item in ["asdf", "fsda", LONG_A, LONG_B] {
            assert!(!filter.probe(item), "{item} present before insert");
            filter.insert(item);
            assert!(filter.probe(item), "{item} missing after insert");
        }

        for item in ["asdf", "fsda", LONG_A, LONG_B] {
            assert!(filter.probe(item));
        }
    }

    #[test]
    fn test_insert_sets_at_most_eight_bits() {
        let mut filter = BloomFilter::new(8192).unwrap();
        filter.insert("asdf");
        let set = filter.count_ones();
        assert!(set >= 1 && set <= HASH_COUNT as u32);
    }

    #[test]
    fn test_positions_follow_digest_words() {
        let filter = BloomFilter::new(1000).unwrap();
        let digest = Sha256::digest(b"asdf");
        let first = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        assert_eq!(filter.positions("asdf")[0], (first % 1000) as usize);
    }

    #[test]
    fn test_size_not_multiple_of_eight() {
        let mut filter = BloomFilter::new(13).unwrap();
        assert_eq!(filter.to_bytes().len(), 2);
        filter.insert("x");
        assert!(filter.probe("x"));
    }

    #[test]
    fn test_single_bit_filter_is_saturated_after_insert() {
        let mut filter = BloomFilter::new(1).unwrap();
        assert!(!filter.probe("anything"));
        filter.insert("a");
        assert!(filter.probe("anything"));
    }

    #[test]
    fn test_from_items_and_bytes() {
        let filter = BloomFilter::from_items(4096, ["poker", "casino"]).unwrap();
        let rebuilt =
            BloomFilter::from_bytes(filter.size_in_bits(), filter.to_bytes().to_vec()).unwrap();
        assert_eq!(rebuilt, filter);
        assert!(rebuilt.probe("poker"));

        assert!(BloomFilter::from_bytes(4096, vec![0; 3]).is_err());
    }

    #[test]
    fn test_serde_shape() {
        let filter = BloomFilter::from_items(16, ["a"]).unwrap();
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["size_in_bits"], 16);
        assert_eq!(json["bits"].as_str().unwrap().len(), 4);

        let back: BloomFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_serde_rejects_bad_hex() {
        let bad = serde_json::json!({"size_in_bits": 16, "bits": "zz00"});
        assert!(serde_json::from_value::<BloomFilter>(bad).is_err());
        let short = serde_json::json!({"size_in_bits": 16, "bits": "00"});
        assert!(serde_json::from_value::<BloomFilter>(short).is_err());
    }
}
