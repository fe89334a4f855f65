use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::model::common::identity::Identity;

pub type HmacSha256 = Hmac<Sha256>;

/// Keyed one-way digest of `value`, hex-encoded.
fn keyed_digest(secret: &[u8], value: &str) -> String {
    let mut hmac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    hmac.update(value.as_bytes());
    HEXLOWER.encode(&hmac.finalize().into_bytes())
}

/// Digest of a normalised voter identity. Raw identities are never stored
/// alongside votes, only this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityHash(String);

impl IdentityHash {
    pub fn new(identity: &Identity, secret: &[u8]) -> Self {
        Self(keyed_digest(secret, &identity.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Digest of a client-supplied device fingerprint.
///
/// Fingerprints are collected by the browser and trivially spoofed, so this
/// only ever serves as a best-effort secondary deduplication signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHash(String);

impl DeviceHash {
    /// Hash a raw fingerprint, or return `None` if it is blank.
    pub fn new(fingerprint: &str, secret: &[u8]) -> Option<Self> {
        let normalised = fingerprint.trim().to_lowercase();
        (!normalised.is_empty()).then(|| Self(keyed_digest(secret, &normalised)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test secret";

    #[test]
    fn identity_hash_is_fixed_length_and_stable() {
        let a = IdentityHash::new(&"Voter@Example.com ".parse().unwrap(), SECRET);
        let b = IdentityHash::new(&Identity::example(), SECRET);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(!a.as_str().contains("voter"));
    }

    #[test]
    fn identity_hash_depends_on_secret() {
        let a = IdentityHash::new(&Identity::example(), SECRET);
        let b = IdentityHash::new(&Identity::example(), b"another secret");
        assert_ne!(a, b);
    }

    #[test]
    fn device_hash_normalises_and_skips_blank() {
        assert_eq!(
            DeviceHash::new(" ABCDEF ", SECRET),
            DeviceHash::new("abcdef", SECRET)
        );
        assert_eq!(DeviceHash::new("   ", SECRET), None);
    }
}
