use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic identity of a pending transfer.
///
/// Correlates a resume probe with a prior upload of the same source to
/// the same bucket and object. It carries no durability guarantee of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the fingerprint of `(source, bucket, object_name)`.
///
/// Each component is length-prefixed before hashing so that
/// `("a/b", "c")` and `("a", "b/c")` never collide.
pub fn fingerprint(source: &str, bucket: &str, object_name: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    for part in [source, bucket, object_name] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    Fingerprint(format!("tus-{}", hex::encode(hasher.finalize())))
}
