/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag that is prepended to every computation,
/// so bytes hashed for one purpose never collide with the same bytes hashed
/// for another.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for entry names when placing them in a shard table.
    pub const SHARD_KEY: Self = Self {
        domain: "arbor-shard-key-v1",
    };

    /// BLAKE3 of `domain ":" data`, as bare bytes.
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }
}
