//! Override records, descriptors and the resolution cache key.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of every resolution cache key.
pub const CACHE_KEY_PREFIX: &str = "tmpl_override:user_id:";

/// Opaque, stable identifier of the user owning a set of overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolution cache key for this user: `tmpl_override:user_id:<id>`.
    pub fn cache_key(&self) -> String {
        format!("{CACHE_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A persisted per-user override.
///
/// Lower `priority` values take precedence: they are applied first and end up
/// closest to the top of the template search path and routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub user_id: UserId,
    pub priority: i32,
    #[serde(default)]
    pub override_name: Option<String>,
    pub override_dir: String,
}

impl OverrideRecord {
    pub fn new(
        user_id: impl Into<UserId>,
        priority: i32,
        override_name: Option<&str>,
        override_dir: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            priority,
            override_name: override_name.map(str::to_string),
            override_dir: override_dir.into(),
        }
    }
}

/// Total order used by every store when returning a user's overrides.
///
/// Ascending priority, then ascending `override_dir`, then ascending
/// `override_name` with absent names last.
pub fn precedence_cmp(a: &OverrideRecord, b: &OverrideRecord) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.override_dir.cmp(&b.override_dir))
        .then_with(|| match (&a.override_name, &b.override_name) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Sort records into precedence order in place.
pub fn sort_by_precedence(records: &mut [OverrideRecord]) {
    records.sort_by(precedence_cmp);
}

/// Transient resolved form of an [`OverrideRecord`].
///
/// This is both the resolver's output unit and the cache payload element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDescriptor {
    pub user_id: UserId,
    pub priority: i32,
    #[serde(default)]
    pub override_name: Option<String>,
    pub override_dir: String,
}

impl From<OverrideRecord> for OverrideDescriptor {
    fn from(record: OverrideRecord) -> Self {
        Self {
            user_id: record.user_id,
            priority: record.priority,
            override_name: record.override_name,
            override_dir: record.override_dir,
        }
    }
}

impl OverrideDescriptor {
    /// Serialize a resolution into its cached textual form (a JSON array).
    pub fn encode_list(descriptors: &[OverrideDescriptor]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(descriptors)?)
    }

    /// Parse a cached payload back into descriptors.
    pub fn decode_list(payload: &[u8]) -> Result<Vec<OverrideDescriptor>> {
        Ok(serde_json::from_slice(payload)?)
    }
}
