//! Re-pin options
//!
//! Re-issuing a pin replaces every field the request leaves out: a call
//! that carries only metadata clears the allocation and the name. The only
//! way to get a `PinOptions` is therefore from the pin's current record,
//! so every field starts out as what the cluster already has.

use std::collections::BTreeMap;

use crate::replication::Pin;

/// Full set of fields sent with `POST /pins/<cid>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinOptions {
    name: String,
    allocations: Vec<String>,
    replication_min: Option<i32>,
    replication_max: Option<i32>,
    metadata: BTreeMap<String, String>,
}

impl PinOptions {
    /// Copy name, allocation, replication factors and metadata verbatim
    pub fn from_pin(pin: &Pin) -> Self {
        Self {
            name: pin.name.clone(),
            allocations: pin.allocations.clone(),
            replication_min: pin.replication_factor_min,
            replication_max: pin.replication_factor_max,
            metadata: pin.metadata.clone(),
        }
    }

    /// Set or overwrite metadata keys; keys not named are kept
    pub fn with_metadata(mut self, updates: &BTreeMap<String, String>) -> Self {
        for (key, value) in updates {
            self.metadata.insert(key.clone(), value.clone());
        }
        self
    }

    /// Replace the allocation
    pub fn with_allocations(mut self, allocations: Vec<String>) -> Self {
        self.allocations = allocations;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allocations(&self) -> &[String] {
        &self.allocations
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Query parameters in the cluster's wire format.
    /// Metadata goes out as one `meta-<key>` parameter per key.
    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.name.is_empty() {
            pairs.push(("name".to_string(), self.name.clone()));
        }
        if !self.allocations.is_empty() {
            pairs.push(("allocations".to_string(), self.allocations.join(",")));
        }
        if let Some(min) = self.replication_min {
            pairs.push(("replication-min".to_string(), min.to_string()));
        }
        if let Some(max) = self.replication_max {
            pairs.push(("replication-max".to_string(), max.to_string()));
        }
        pairs.extend(meta_pairs(&self.metadata));
        pairs
    }
}

/// `meta-<key>=<value>` pairs in key order
pub(crate) fn meta_pairs(metadata: &BTreeMap<String, String>) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(k, v)| (format!("meta-{}", k), v.clone()))
        .collect()
}
