//! Add a file or directory with an explicit allocation
//!
//! `add` never returns an error: every failure becomes an `AddResult`
//! with a non-success return code and an error message, and a success
//! always carries a root CID and at least one entry.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::Utc;

use super::results::{AddOutcome, AddResult, CidEntry};
use super::Operations;
use crate::allocation::{resolve, AllocationPolicy};
use crate::observability::{log_event_with_fields, warn_event, Event};
use crate::replication::{META_ORG, META_SIZE};
use crate::transport::{AddContent, AddedRecord};

const MISSING_FROM_RESPONSE: &str = "missing from cluster response";

impl<'a> Operations<'a> {
    /// Upload `path` for `profile` and pin it to the profile's resolved
    /// allocation, tagged with `org` and `size` metadata.
    ///
    /// A directory is only accepted when `recursive` is set.
    pub async fn add(&self, path: &Path, profile: &str, recursive: bool) -> AddResult {
        let root_path = path.display().to_string();
        let profile_config = self.config.get_profile(profile);
        let preferred = profile_config.map(|p| p.primary.as_str());

        let host_name = self
            .host
            .as_deref()
            .or(preferred)
            .or(self.config.default_node.as_deref())
            .unwrap_or_default()
            .to_string();

        log_event_with_fields(
            Event::AddStart,
            &[("host", &host_name), ("path", &root_path), ("profile", profile)],
        );

        let fail = |outcome: AddOutcome, allocations: Vec<String>, error: String| {
            log_event_with_fields(
                Event::AddFailed,
                &[
                    ("code", &outcome.code().to_string()),
                    ("error", &error),
                    ("path", &root_path),
                ],
            );
            AddResult::failure(
                root_path.clone(),
                Some(profile),
                host_name.clone(),
                allocations,
                outcome,
                error,
            )
        };

        if !path.exists() {
            return fail(
                AddOutcome::Failed,
                Vec::new(),
                format!("Path not found: {}", root_path),
            );
        }
        if path.is_dir() && !recursive {
            return fail(
                AddOutcome::Failed,
                Vec::new(),
                format!("{} is a directory; add it recursively", root_path),
            );
        }

        let Some(profile_config) = profile_config else {
            return fail(
                AddOutcome::ConfigError,
                Vec::new(),
                format!("Profile '{}' not found in config", profile),
            );
        };

        let client = match self
            .target_node(preferred)
            .and_then(|node| self.client_for(&node))
        {
            Ok(client) => client,
            Err(e) => return fail(AddOutcome::ConfigError, Vec::new(), e.to_string()),
        };

        let topology = self.topology(&client).await;
        let policy = AllocationPolicy::from_config(self.config);
        let allocation = match resolve(profile_config, &topology, &policy) {
            Ok(allocation) => allocation,
            Err(e) => return fail(AddOutcome::ConfigError, Vec::new(), e.to_string()),
        };
        let allocations = allocation.peers.clone();

        let content = match AddContent::from_path(path) {
            Ok(content) => content,
            Err(e) => return fail(AddOutcome::Failed, allocations, e.to_string()),
        };

        let metadata = BTreeMap::from([
            (META_ORG.to_string(), profile.to_string()),
            (META_SIZE.to_string(), content.total_size().to_string()),
        ]);

        let added = client
            .add(&content, &content.root_name(), &allocations, &metadata)
            .await;
        let records = match added {
            Ok(records) => records,
            Err(e) => return fail(AddOutcome::Failed, allocations, e.to_string()),
        };

        let (entries, missing) = build_entries(&records, &content);
        let Some(root) = entries.iter().find(|e| e.is_root) else {
            return fail(
                AddOutcome::Failed,
                allocations,
                "No entries returned from cluster".to_string(),
            );
        };
        let root_cid = root.cid.clone();

        let replica_count = match client.pin_status(&root_cid).await {
            Ok(pin) => Some(pin.pinned_count()),
            Err(e) => {
                warn_event(
                    Event::ReplicaCountUnavailable,
                    &[("cid", &root_cid), ("reason", &e.to_string())],
                );
                None
            }
        };

        let (returncode, error) = if missing.is_empty() {
            (AddOutcome::Success, None)
        } else {
            (
                AddOutcome::Partial,
                Some(format!(
                    "{} of {} files {}: {}",
                    missing.len(),
                    content.files().len(),
                    MISSING_FROM_RESPONSE,
                    missing.join(", ")
                )),
            )
        };

        log_event_with_fields(
            Event::AddComplete,
            &[
                ("code", &returncode.code().to_string()),
                ("entries", &entries.len().to_string()),
                ("root_cid", &root_cid),
                ("shortfall", &allocation.shortfall.to_string()),
            ],
        );

        AddResult {
            root_cid,
            root_path,
            entries,
            allocations,
            profile: Some(profile.to_string()),
            added_at: Utc::now(),
            cluster_host: host_name,
            returncode,
            error,
            replica_count,
        }
    }
}

/// Entries in response order, root last. Uploaded files the response does
/// not mention are listed before the root with an empty CID and an error.
fn build_entries(records: &[AddedRecord], content: &AddContent) -> (Vec<CidEntry>, Vec<String>) {
    let returned: BTreeSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let missing: Vec<String> = content
        .files()
        .iter()
        .filter(|f| !returned.contains(f.name.as_str()))
        .map(|f| f.name.clone())
        .collect();

    let mut entries: Vec<CidEntry> = records
        .iter()
        .enumerate()
        .map(|(i, r)| CidEntry {
            path: r.name.clone(),
            cid: r.cid.clone(),
            size: r.size,
            is_root: i + 1 == records.len(),
            error: None,
        })
        .collect();

    let root = entries.pop();
    entries.extend(content.files().iter().filter(|f| missing.contains(&f.name)).map(|f| {
        CidEntry {
            path: f.name.clone(),
            cid: String::new(),
            size: f.size,
            is_root: false,
            error: Some(MISSING_FROM_RESPONSE.to_string()),
        }
    }));
    entries.extend(root);

    (entries, missing)
}
