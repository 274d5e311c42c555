use core::fmt::{self, Debug, Display, Formatter};
use core::str::FromStr;

use sha2::Digest;
use thiserror::Error;

const BYTES_LEN: usize = 32;

/// A 32-byte content hash, rendered as lowercase hex.
#[derive(Copy, Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Hash {
    bytes: [u8; BYTES_LEN],
}

impl Hash {
    pub fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.bytes
    }

    pub fn hash(data: &[u8]) -> Self {
        Self {
            bytes: sha2::Sha256::digest(data).into(),
        }
    }

    pub fn hash_json<T: serde::Serialize>(data: &T) -> serde_json::Result<Self> {
        let mut hasher = sha2::Sha256::default();

        serde_json::to_writer(&mut hasher, data)?;

        Ok(Self {
            bytes: hasher.finalize().into(),
        })
    }
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("expected {BYTES_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error(transparent)]
    FromHex(#[from] hex::FromHexError),
}

impl From<[u8; BYTES_LEN]> for Hash {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self { bytes }
    }
}

impl From<Hash> for [u8; BYTES_LEN] {
    fn from(hash: Hash) -> Self {
        hash.bytes
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s)?;

        let bytes = <[u8; BYTES_LEN]>::try_from(raw.as_slice())
            .map_err(|_| HashError::InvalidLength(raw.len()))?;

        Ok(Self { bytes })
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(&hex::encode(self.bytes))
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_string()).finish()
    }
}

impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_str(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hash = Hash::hash(b"edgemesh");
        let parsed: Hash = hash.to_string().parse().unwrap();

        assert_eq!(hash, parsed);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            "deadbeef".parse::<Hash>(),
            Err(HashError::InvalidLength(4))
        ));
    }

    #[test]
    fn serde_as_string() {
        let hash = Hash::hash(b"edgemesh");
        let json = serde_json::to_string(&hash).unwrap();

        assert_eq!(json, format!("\"{hash}\""));
        assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), hash);
    }
}
