use sha1::{Digest, Sha1};
use std::fmt;

pub const DIGEST_LEN: usize = 20;

/// 160-bit content hash of a whole file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sha1Digest(pub [u8; DIGEST_LEN]);

impl Sha1Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Streaming digest so large files are hashed incrementally.
pub trait DigestStream {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self) -> Sha1Digest;
}

impl DigestStream for Sha1 {
    fn update(&mut self, bytes: &[u8]) {
        Digest::update(self, bytes);
    }
    fn finalize(self) -> Sha1Digest {
        let out = Digest::finalize(self);
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&out);
        Sha1Digest(bytes)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Sha1Digest {
    let mut h = Sha1::new();
    DigestStream::update(&mut h, bytes);
    DigestStream::finalize(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(hash_bytes(b"abc").to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn chunked_updates_match_oneshot() {
        let data = vec![7u8; 200_000];
        let mut h = Sha1::new();
        for piece in data.chunks(4096) {
            DigestStream::update(&mut h, piece);
        }
        assert_eq!(DigestStream::finalize(h), hash_bytes(&data));
    }
}
