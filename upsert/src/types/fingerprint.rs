use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bail;
use crate::error::{ErrorKind, UpsertError, UpsertResult};

/// Width in bytes of a [`Fingerprint`] (SHA-256).
pub const FINGERPRINT_LEN: usize = 32;

/// Fixed-width digest used as a compact proxy for row identity and row content.
///
/// Equality of fingerprints is treated as equality of the hashed values. A SHA-256
/// collision between two different payloads would make a changed row look unchanged; at
/// this width that risk is accepted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Returns the first eight hex digits, enough to tell rows apart in logs.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl FromStr for Fingerprint {
    type Err = UpsertError;

    /// Parses the 64 hex digit form produced by [`fmt::Display`].
    fn from_str(s: &str) -> UpsertResult<Self> {
        if s.len() != FINGERPRINT_LEN * 2 || !s.is_ascii() {
            bail!(
                ErrorKind::InvalidData,
                "Could not parse fingerprint",
                format!("expected {} hex digits, got `{s}`", FINGERPRINT_LEN * 2)
            );
        }

        let mut bytes = [0u8; FINGERPRINT_LEN];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let digits = &s[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(digits, 16).map_err(|err| {
                crate::upsert_error!(
                    ErrorKind::InvalidData,
                    "Could not parse fingerprint",
                    format!("invalid hex digits `{digits}`"),
                    source: err
                )
            })?;
        }

        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}
