//! Device / network fingerprints.
//!
//! Raw device identifiers and IP addresses never enter Accrue; only their
//! BLAKE3 digest is stored and compared.

use std::fmt;

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of a device id and the network address it connected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceFingerprint(pub [u8; 32]);

impl DeviceFingerprint {
    /// Hash a device id and an IP address into a fingerprint.
    ///
    /// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
    pub fn from_parts(device_id: &str, ip: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [device_id, ip] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// First 8 bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(
            DeviceFingerprint::from_parts("pixel-7", "10.0.0.1"),
            DeviceFingerprint::from_parts("pixel-7", "10.0.0.1")
        );
    }

    #[test]
    fn parts_are_length_prefixed() {
        assert_ne!(DeviceFingerprint::from_parts("ab", "c"), DeviceFingerprint::from_parts("a", "bc"));
    }

    #[test]
    fn short_is_sixteen_hex_chars() {
        let fp = DeviceFingerprint::from_parts("dev", "ip");
        assert_eq!(fp.short().len(), 16);
        assert_eq!(fp.to_string(), fp.short());
    }
}
