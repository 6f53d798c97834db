use sha2::{Digest, Sha256};

use crate::errors::AppError;
use crate::models::IcpConfig;

/// Identifies the ICP snapshot a collection was scored against.
///
/// The digest is SHA-256 over the configuration's JSON form. Sets serialize in
/// sorted order, so equal configurations always hash equally regardless of the
/// order their industries or geography were entered in.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    pub fn of(config: &IcpConfig) -> Result<Self, AppError> {
        let canonical = serde_json::to_string(config)?;
        Ok(Self(Self::compute_checksum(&canonical)))
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when `config` is the snapshot this fingerprint was taken from.
    pub fn matches(&self, config: &IcpConfig) -> bool {
        Self::of(config).map(|other| other == *self).unwrap_or(false)
    }
}
