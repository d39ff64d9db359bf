/// Fingerprints for fragment outcomes
///
/// A key is SHA256 over the previous block's key (as lowercase hex) followed
/// by the current block's normalized text. The first block is seeded with the
/// empty string, so every key depends on the whole prefix of fragments before
/// it. The positional policy hashes only the block index and its text.
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::document::ExtractedBlock;

/// Fixed-size fingerprint of one fragment's cacheable outcome
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 64 lowercase hex characters; the persisted and displayed form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).with_context(|| format!("Invalid cache key: {}", s))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("Cache key must be 32 bytes, got {}", b.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

impl FromStr for CacheKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// How keys relate to earlier blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    /// Each key folds in the previous key; any upstream edit invalidates everything after it
    #[default]
    Chained,
    /// Each key depends only on the block's index and text
    Positional,
}

impl FromStr for KeyPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chained" => Ok(Self::Chained),
            "positional" => Ok(Self::Positional),
            other => anyhow::bail!("Unknown key policy: {} (expected chained or positional)", other),
        }
    }
}

impl fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chained => f.write_str("chained"),
            Self::Positional => f.write_str("positional"),
        }
    }
}

/// Chained fingerprint: SHA256(seed || normalized)
pub fn fingerprint(seed: &str, normalized: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(normalized.as_bytes());
    CacheKey(hasher.finalize().into())
}

/// Position-only fingerprint: SHA256("position: {i}" || normalized)
pub fn positional_fingerprint(position: usize, normalized: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(format!("position: {}", position).as_bytes());
    hasher.update(normalized.as_bytes());
    CacheKey(hasher.finalize().into())
}

/// Walks a document's blocks in order, producing one key per block
#[derive(Debug, Clone)]
pub struct KeyChain {
    policy: KeyPolicy,
    previous: String,
}

impl KeyChain {
    /// Chain whose first block is seeded with the empty string
    pub fn new(policy: KeyPolicy) -> Self {
        Self::with_seed(policy, String::new())
    }

    pub fn with_seed(policy: KeyPolicy, seed: impl Into<String>) -> Self {
        Self {
            policy,
            previous: seed.into(),
        }
    }

    /// Key for the next block. Blocks must be fed in document order.
    pub fn next_key(&mut self, block: &ExtractedBlock) -> CacheKey {
        let normalized = block.fragment.normalized();
        let key = match self.policy {
            KeyPolicy::Chained => fingerprint(&self.previous, normalized),
            KeyPolicy::Positional => positional_fingerprint(block.position, normalized),
        };
        self.previous = key.to_hex();
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::extract_all;

    fn keys(doc: &str, policy: KeyPolicy) -> Vec<CacheKey> {
        let mut chain = KeyChain::new(policy);
        extract_all(doc).map(|b| chain.next_key(&b)).collect()
    }

    #[test]
    fn test_first_block_seeded_with_empty_string() {
        let doc = "```js: a = 1\n```";
        let expected = fingerprint("", "a = 1");
        assert_eq!(keys(doc, KeyPolicy::Chained), vec![expected]);

        let mut hasher = Sha256::new();
        hasher.update(b"a = 1");
        assert_eq!(expected.to_hex(), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_key_chains_previous_hex() {
        let doc = "```js: a = 1\n```\n```js: b = 2\n```";
        let k = keys(doc, KeyPolicy::Chained);
        assert_eq!(k[1], fingerprint(&k[0].to_hex(), "b = 2"));
    }

    #[test]
    fn test_edit_invalidates_downstream_only() {
        let before = "```js: a = 1\n```\n```js: b = 2\n```\n```js: c = 3\n```";
        let after = "```js: a = 1\n```\n```js: b = 20\n```\n```js: c = 3\n```";

        let k1 = keys(before, KeyPolicy::Chained);
        let k2 = keys(after, KeyPolicy::Chained);

        assert_eq!(k1[0], k2[0]);
        assert_ne!(k1[1], k2[1]);
        assert_ne!(k1[2], k2[2]);
    }

    #[test]
    fn test_surrounding_prose_does_not_matter() {
        let a = "intro\n```js: a = 1\n```\nmiddle\n```js: b = 2\n```";
        let b = "# Title\n\nother text\n```js: a = 1\n```\n```js: b = 2\n```\nend";
        assert_eq!(keys(a, KeyPolicy::Chained), keys(b, KeyPolicy::Chained));
    }

    #[test]
    fn test_blank_lines_do_not_change_key() {
        let a = "```js: a = 1\n\nb = 2\n```";
        let b = "```js: a = 1\nb = 2\n```";
        assert_eq!(keys(a, KeyPolicy::Chained), keys(b, KeyPolicy::Chained));
    }

    #[test]
    fn test_positional_policy_ignores_upstream_edits() {
        let before = "```js: a = 1\n```\n```js: b = 2\n```";
        let after = "```js: a = 100\n```\n```js: b = 2\n```";

        let k1 = keys(before, KeyPolicy::Positional);
        let k2 = keys(after, KeyPolicy::Positional);

        assert_ne!(k1[0], k2[0]);
        assert_eq!(k1[1], k2[1]);
        assert_eq!(k1[1], positional_fingerprint(1, "b = 2"));
    }

    #[test]
    fn test_hex_round_trip_and_parse_errors() {
        let key = fingerprint("", "x");
        assert_eq!(key.to_hex().len(), 64);
        assert_eq!(key.to_hex().parse::<CacheKey>().unwrap(), key);
        assert!("abcd".parse::<CacheKey>().is_err());
        assert!("zz".repeat(32).parse::<CacheKey>().is_err());
    }

    #[test]
    fn test_key_policy_parse() {
        assert_eq!("chained".parse::<KeyPolicy>().unwrap(), KeyPolicy::Chained);
        assert_eq!(
            "positional".parse::<KeyPolicy>().unwrap(),
            KeyPolicy::Positional
        );
        assert!("sometimes".parse::<KeyPolicy>().is_err());
    }
}
