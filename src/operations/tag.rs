//! One pass of org/size metadata tagging
//!
//! A pass under-counts while the cluster's shared state converges, so
//! callers re-run it until a pass reports `converged`. Running it with
//! nothing left to do changes nothing.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::errors::{OpsError, OpsResult};
use super::pool::run_bounded;
use super::reports::TagReport;
use super::Operations;
use crate::observability::{log_event_with_fields, warn_event, Event, ObservationScope};
use crate::replication::{Pin, META_ORG, META_SIZE};
use crate::transport::{ClusterClient, Gateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagOutcome {
    Skipped,
    Foreign,
    Tagged { size_unavailable: bool },
    /// Org already right, size wanted but not found
    SizeUnavailable,
    Failed,
}

impl<'a> Operations<'a> {
    /// Tag untagged pins with `org=<profile>` and the content size, and
    /// add a missing size to pins already owned by the profile. Pins of
    /// other orgs are counted as foreign and left alone.
    ///
    /// Sizes come from the gateway; a pin whose size cannot be found is
    /// tagged with its org only. Dry runs make no gateway or update calls.
    pub async fn tag_pins(&self, profile: &str, dry_run: bool) -> OpsResult<TagReport> {
        if self.config.get_profile(profile).is_none() {
            return Err(OpsError::UnknownProfile(profile.to_string()));
        }

        let pass_id = Uuid::new_v4();
        let scope = ObservationScope::with_fields(
            "TAG_PASS",
            &[
                ("dry_run", &dry_run.to_string()),
                ("pass_id", &pass_id.to_string()),
                ("profile", profile),
            ],
        );

        let node = self.target_node(None)?;
        let client = self.client_for(&node)?;
        let gateway = self.gateway_for(&node)?;
        let pins = match client.list_pins().await {
            Ok(pins) => pins,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e.into());
            }
        };
        let total = pins.len();

        let (client, gateway) = (&client, &gateway);
        let outcomes = run_bounded(pins, self.config.concurrency, |pin| async move {
            tag_one(client, gateway, &pin, profile, dry_run).await
        })
        .await;

        let count = |pred: fn(&TagOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();
        let tagged = count(|o| matches!(o, TagOutcome::Tagged { .. }));
        let errors = count(|o| *o == TagOutcome::Failed);
        let report = TagReport {
            pass_id,
            profile: profile.to_string(),
            total,
            tagged,
            skipped: count(|o| *o == TagOutcome::Skipped),
            foreign: count(|o| *o == TagOutcome::Foreign),
            errors,
            size_unavailable: count(|o| {
                matches!(
                    o,
                    TagOutcome::SizeUnavailable | TagOutcome::Tagged { size_unavailable: true }
                )
            }),
            dry_run,
            converged: tagged == 0 && errors == 0,
        };

        scope.complete_with_fields(&[
            ("errors", &report.errors.to_string()),
            ("tagged", &report.tagged.to_string()),
            ("total", &report.total.to_string()),
        ]);
        Ok(report)
    }
}

async fn tag_one(
    client: &ClusterClient,
    gateway: &Gateway,
    pin: &Pin,
    profile: &str,
    dry_run: bool,
) -> TagOutcome {
    let org_missing = match pin.org() {
        Some(org) if org != profile => return TagOutcome::Foreign,
        Some(_) => false,
        None => true,
    };
    let size_missing = pin.size().is_none();
    if !org_missing && !size_missing {
        return TagOutcome::Skipped;
    }
    if dry_run {
        return TagOutcome::Tagged {
            size_unavailable: false,
        };
    }

    let mut updates = BTreeMap::new();
    if org_missing {
        updates.insert(META_ORG.to_string(), profile.to_string());
    }

    let mut size_unavailable = false;
    if size_missing {
        match gateway.dag_size(&pin.cid).await {
            Ok(size) => {
                updates.insert(META_SIZE.to_string(), size.to_string());
            }
            Err(e) => {
                warn_event(
                    Event::PinSizeUnavailable,
                    &[("cid", &pin.cid), ("reason", &e.to_string())],
                );
                size_unavailable = true;
            }
        }
    }
    if updates.is_empty() {
        return TagOutcome::SizeUnavailable;
    }

    match client.set_metadata_via_query_params(pin, &updates).await {
        Ok(()) => {
            let keys: Vec<&str> = updates.keys().map(String::as_str).collect();
            log_event_with_fields(
                Event::PinTagged,
                &[("cid", &pin.cid), ("keys", &keys.join(","))],
            );
            TagOutcome::Tagged { size_unavailable }
        }
        Err(e) => {
            log_event_with_fields(
                Event::PinTagFailed,
                &[("cid", &pin.cid), ("reason", &e.to_string())],
            );
            TagOutcome::Failed
        }
    }
}
