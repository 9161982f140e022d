//! The Pin record and its replication predicates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::condition::PinCondition;
use super::status::PeerStatus;

/// Metadata key naming the owning organization
pub const META_ORG: &str = "org";

/// Metadata key carrying the content size in bytes
pub const META_SIZE: &str = "size";

/// Status one peer reports for a pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPinStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub peername: String,
    pub status: PeerStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub error: Option<String>,
}

impl PeerPinStatus {
    pub fn new(peername: impl Into<String>, status: PeerStatus) -> Self {
        Self {
            peername: peername.into(),
            status,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Replication record for one CID.
///
/// Parsed from the cluster's `/pins` output and serialized back as a flat
/// record that deserializes to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    #[serde(deserialize_with = "cid_from_value")]
    pub cid: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Peers the pin is explicitly targeted to, in order
    #[serde(default, deserialize_with = "null_as_default")]
    pub allocations: Vec<String>,

    /// Observed status keyed by peer id
    #[serde(default, deserialize_with = "null_as_default")]
    pub peer_map: BTreeMap<String, PeerPinStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor_min: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor_max: Option<i32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_datetime"
    )]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, String>,
}

impl Pin {
    pub fn new(cid: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            name: String::new(),
            allocations: Vec::new(),
            peer_map: BTreeMap::new(),
            replication_factor_min: None,
            replication_factor_max: None,
            created: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_allocations<I, S>(mut self, allocations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allocations = allocations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_peer(mut self, peer_id: impl Into<String>, status: PeerPinStatus) -> Self {
        self.peer_map.insert(peer_id.into(), status);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_replication(mut self, min: i32, max: i32) -> Self {
        self.replication_factor_min = Some(min);
        self.replication_factor_max = Some(max);
        self
    }

    /// True iff the allocation is non-empty and every allocated peer
    /// reports `pinned`. An empty allocation is never satisfied.
    pub fn is_fully_pinned(&self) -> bool {
        if self.allocations.is_empty() {
            return false;
        }
        self.allocations.iter().all(|peer| {
            self.peer_map
                .get(peer)
                .map(|s| s.status == PeerStatus::Pinned)
                .unwrap_or(false)
        })
    }

    /// Peers reporting `pinned`, allocated or not
    pub fn pinned_count(&self) -> usize {
        self.peer_map
            .values()
            .filter(|s| s.status == PeerStatus::Pinned)
            .count()
    }

    /// Any peer reporting `pin_error`. Unpin and cluster errors do not count.
    pub fn has_error(&self) -> bool {
        self.peer_map.values().any(|s| s.status.is_pin_error())
    }

    pub fn needs_repair(&self) -> bool {
        self.has_error() || self.pinned_count() == 0
    }

    /// No peer holds the data or is fetching it
    pub fn is_lost(&self) -> bool {
        !self.peer_map.values().any(|s| s.status.holds_or_fetching())
    }

    pub fn condition(&self) -> PinCondition {
        PinCondition::classify(self)
    }

    /// Peer ids reporting `pinned`, in peer id order
    pub fn pinned_peers(&self) -> Vec<&str> {
        self.peers_where(|s| *s == PeerStatus::Pinned)
    }

    /// Peer ids reporting `pin_error`, in peer id order
    pub fn error_peers(&self) -> Vec<&str> {
        self.peers_where(PeerStatus::is_pin_error)
    }

    fn peers_where(&self, pred: impl Fn(&PeerStatus) -> bool) -> Vec<&str> {
        self.peer_map
            .iter()
            .filter(|(_, s)| pred(&s.status))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn status_of(&self, peer_id: &str) -> Option<&PeerStatus> {
        self.peer_map.get(peer_id).map(|s| &s.status)
    }

    /// Owning organization, when tagged
    pub fn org(&self) -> Option<&str> {
        self.metadata
            .get(META_ORG)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Tagged size in bytes, when present and numeric
    pub fn size(&self) -> Option<u64> {
        self.metadata.get(META_SIZE).and_then(|s| s.parse().ok())
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.cid
        } else {
            &self.name
        }
    }
}

/// Deserialize `null` as the type's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

fn cid_from_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get("/")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| serde::de::Error::custom("cid link without '/'")),
        other => Err(serde::de::Error::custom(format!("invalid cid: {}", other))),
    }
}

/// Accepts RFC 3339 strings; anything else becomes None
fn lenient_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}
