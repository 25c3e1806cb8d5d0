//! CRC-32 computation.
//!
//! Zip entries carry the IEEE 802.3 CRC-32 of their uncompressed bytes. The
//! reader checks it after decoding every entry and the writer computes it for
//! every entry it emits.
//!
//! ```rust
//! use rezip::checksum::Crc32;
//!
//! let mut crc = Crc32::new();
//! crc.update(b"Hello, ");
//! crc.update(b"World!");
//! assert_eq!(crc.finalize(), 0xEC4AC3D0);
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

/// Incremental CRC-32 calculator.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("current", &self.finalize())
            .finish()
    }
}

impl Crc32 {
    /// Creates a new calculator.
    pub fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// Feeds more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Returns the CRC of everything fed so far.
    pub fn finalize(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Resets to the initial state.
    pub fn reset(&mut self) {
        self.hasher.reset();
    }

    /// Computes the CRC of a single slice.
    pub fn compute(data: &[u8]) -> u32 {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}
