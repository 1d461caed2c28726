use xxhash_rust::xxh3::xxh3_64;

/// Filter width in bits.
pub const FILTER_BITS: usize = 2048;

/// Bytes in the serialized bitmap.
pub const FILTER_BYTES: usize = FILTER_BITS / 8;

/// Tokens shorter than this are not indexed and must not be used to prune.
pub const MIN_TOKEN_LEN: usize = 3;

/// Probe positions derived per token from one 64-bit hash.
const NUM_PROBES: u64 = 4;

/// Per-file membership filter over whitespace-delimited content tokens.
///
/// May-have only: a clear probe proves the token was absent from the
/// payload at the last content write, a set probe proves nothing. Tokens
/// are ASCII-folded before hashing so case-insensitive probes stay sound.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenFilter {
    bits: [u8; FILTER_BYTES],
}

impl TokenFilter {
    pub fn empty() -> Self {
        Self {
            bits: [0; FILTER_BYTES],
        }
    }

    /// Build a filter from a full payload. Called on every content write;
    /// the filter is rebuilt whole, never updated incrementally.
    pub fn build(payload: &[u8]) -> Self {
        let mut filter = Self::empty();
        for token in payload.split(|b| b.is_ascii_whitespace()) {
            if token.len() >= MIN_TOKEN_LEN {
                filter.insert(token);
            }
        }
        filter
    }

    fn insert(&mut self, token: &[u8]) {
        for pos in positions(token) {
            self.bits[pos / 8] |= 1 << (pos % 8);
        }
    }

    /// May the payload contain `token`? A `false` answer is definitive.
    pub fn may_contain(&self, token: &[u8]) -> bool {
        positions(token).all(|pos| self.bits[pos / 8] & (1 << (pos % 8)) != 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let bits: [u8; FILTER_BYTES] = raw.try_into().ok()?;
        Some(Self { bits })
    }
}

impl std::fmt::Debug for TokenFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set: u32 = self.bits.iter().map(|b| b.count_ones()).sum();
        write!(f, "TokenFilter({set}/{FILTER_BITS} bits set)")
    }
}

/// The k probe positions for a token: a double-hash over the two halves of
/// one xxh3 digest.
fn positions(token: &[u8]) -> impl Iterator<Item = usize> {
    let folded: Vec<u8> = token.iter().map(|b| b.to_ascii_lowercase()).collect();
    let digest = xxh3_64(&folded);
    let h1 = digest & 0xffff_ffff;
    let h2 = digest >> 32;
    (0..NUM_PROBES).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % FILTER_BITS as u64) as usize)
}
