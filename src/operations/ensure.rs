//! Bring a profile's pins onto its current allocation
//!
//! Every fix is a full re-pin built from the pin's current record: name,
//! replication factors and metadata go back out unchanged, only the
//! allocation differs.

use super::errors::{OpsError, OpsResult};
use super::pool::run_bounded;
use super::reports::{EnsureError, EnsureReport};
use super::Operations;
use crate::allocation::{required_peers, resolve, AllocationPolicy};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::replication::Pin;
use crate::transport::PinOptions;

enum EnsureOutcome {
    Correct,
    Fixed,
    Failed(EnsureError),
}

impl<'a> Operations<'a> {
    /// Re-allocate pins owned by `profile` (or untagged) that lack the
    /// profile's primary or the backup, or carry fewer other peers than
    /// the resolver currently picks.
    pub async fn ensure_pins(&self, profile: &str, dry_run: bool) -> OpsResult<EnsureReport> {
        let profile_config = self
            .config
            .get_profile(profile)
            .ok_or_else(|| OpsError::UnknownProfile(profile.to_string()))?;

        let client = self.client()?;
        let topology = self.topology(&client).await;
        let policy = AllocationPolicy::from_config(self.config);
        let required = required_peers(profile_config, &topology, &policy)?;
        let allocation = resolve(profile_config, &topology, &policy)?;
        let extra: Vec<String> = allocation
            .peers
            .into_iter()
            .filter(|p| !required.contains(p))
            .collect();

        let scope = ObservationScope::with_fields(
            "ENSURE_PINS",
            &[("dry_run", &dry_run.to_string()), ("profile", profile)],
        );
        let pins = match client.list_pins().await {
            Ok(pins) => pins,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e.into());
            }
        };
        let owned: Vec<Pin> = pins
            .into_iter()
            .filter(|p| p.org().map_or(true, |org| org == profile))
            .collect();
        let total = owned.len();

        let (client, required_ref, extra_ref) = (&client, &required, &extra);
        let max = policy.replication_max;
        let outcomes = run_bounded(owned, self.config.concurrency, |pin| async move {
            let Some(target) = target_allocation(&pin, required_ref, extra_ref, max) else {
                return EnsureOutcome::Correct;
            };
            if dry_run {
                return EnsureOutcome::Fixed;
            }

            let options = PinOptions::from_pin(&pin).with_allocations(target.clone());
            match client.repin(&pin.cid, &options).await {
                Ok(()) => {
                    log_event_with_fields(
                        Event::PinReallocated,
                        &[("allocations", &target.join(",")), ("cid", &pin.cid)],
                    );
                    EnsureOutcome::Fixed
                }
                Err(e) => {
                    let error = e.to_string();
                    log_event_with_fields(
                        Event::PinReallocateFailed,
                        &[("cid", &pin.cid), ("reason", &error)],
                    );
                    EnsureOutcome::Failed(EnsureError {
                        cid: pin.cid.clone(),
                        error,
                    })
                }
            }
        })
        .await;

        let mut report = EnsureReport {
            profile: profile.to_string(),
            total,
            already_correct: 0,
            fixed: 0,
            errors: 0,
            dry_run,
            required_peers: required,
            error_details: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                EnsureOutcome::Correct => report.already_correct += 1,
                EnsureOutcome::Fixed => report.fixed += 1,
                EnsureOutcome::Failed(detail) => {
                    report.errors += 1;
                    report.error_details.push(detail);
                }
            }
        }

        scope.complete_with_fields(&[
            ("errors", &report.errors.to_string()),
            ("fixed", &report.fixed.to_string()),
            ("total", &report.total.to_string()),
        ]);
        Ok(report)
    }
}

/// New allocation for a pin, or None when it already satisfies the
/// profile: required peers first, then the peers it already had, then
/// resolver picks until it has as many non-required peers as the
/// resolver chose. Never longer than `max`.
fn target_allocation(
    pin: &Pin,
    required: &[String],
    extra: &[String],
    max: usize,
) -> Option<Vec<String>> {
    let has_required = required.iter().all(|r| pin.allocations.contains(r));
    let others: Vec<&String> = pin
        .allocations
        .iter()
        .filter(|p| !required.contains(p))
        .collect();
    if has_required && others.len() >= extra.len() {
        return None;
    }

    let mut target: Vec<String> = required.to_vec();
    target.extend(others.iter().map(|p| (*p).clone()));
    let mut deficit = extra.len().saturating_sub(others.len());
    for pick in extra {
        if deficit == 0 {
            break;
        }
        if !target.contains(pick) {
            target.push(pick.clone());
            deficit -= 1;
        }
    }
    target.truncate(max.max(required.len()));
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::*;
    use crate::replication::META_ORG;
    use wiremock::MockServer;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_target_allocation() {
        let required = strings(&["pA", "pB"]);
        let extra = strings(&["pC"]);

        let good = healthy_pin("Qm", &["pA", "pB", "pX"]);
        assert_eq!(target_allocation(&good, &required, &extra, 5), None);

        let missing_backup = healthy_pin("Qm", &["pA", "pC"]);
        assert_eq!(
            target_allocation(&missing_backup, &required, &extra, 5),
            Some(strings(&["pA", "pB", "pC"]))
        );

        let no_extra = healthy_pin("Qm", &["pB", "pA"]);
        assert_eq!(
            target_allocation(&no_extra, &required, &extra, 5),
            Some(strings(&["pA", "pB", "pC"]))
        );

        let dead_peer_kept = healthy_pin("Qm", &["pDead"]);
        assert_eq!(
            target_allocation(&dead_peer_kept, &required, &extra, 5),
            Some(strings(&["pA", "pB", "pDead"]))
        );

        let empty = Pin::new("Qm");
        assert_eq!(
            target_allocation(&empty, &required, &extra, 2),
            Some(strings(&["pA", "pB"]))
        );
    }

    #[tokio::test]
    async fn test_reallocates_preserving_metadata_and_name() {
        let server = MockServer::start().await;
        mount_peers(&server, &[("pA", "nodeA"), ("pB", "nodeB"), ("pC", "nodeC")]).await;
        mount_freespace(&server, &[("pC", 50 * GB)]).await;
        let stale = healthy_pin("QmSTALE", &["pA"])
            .with_name("archive-2019")
            .with_replication(3, 5)
            .with_metadata(META_ORG, "orgA")
            .with_metadata("size", "42")
            .with_metadata("batch", "7");
        mount_pins(
            &server,
            &[
                stale,
                healthy_pin("QmGOOD", &["pA", "pB", "pC"]).with_metadata(META_ORG, "orgA"),
                healthy_pin("QmOTHER", &["pC"]).with_metadata(META_ORG, "orgC"),
            ],
        )
        .await;
        mount_repin_ok(&server).await;

        let config = config_for(&server);
        let report = Operations::new(&config).ensure_pins("orgA", false).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.already_correct, 1);
        assert_eq!(report.required_peers, strings(&["pA", "pB"]));

        let sent = repins(&server).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.path(), "/pins/QmSTALE");
        assert_eq!(allocations_of(&sent[0]), strings(&["pA", "pB", "pC"]));
        let q = query(&sent[0]);
        assert_eq!(q["name"], "archive-2019");
        assert_eq!(q["meta-org"], "orgA");
        assert_eq!(q["meta-size"], "42");
        assert_eq!(q["meta-batch"], "7");
        assert_eq!(q["replication-min"], "3");
        assert_eq!(q["replication-max"], "5");
        assert!(sent[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let server = MockServer::start().await;
        mount_peers(&server, &[("pA", "nodeA"), ("pB", "nodeB"), ("pC", "nodeC")]).await;
        mount_freespace(&server, &[]).await;
        mount_pins(&server, &[healthy_pin("QmSTALE", &["pA"])]).await;

        let config = config_for(&server);
        let report = Operations::new(&config).ensure_pins("orgA", true).await.unwrap();
        assert_eq!(report.fixed, 1);
        assert!(repins(&server).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_peer_id_is_allocation_error() {
        let server = MockServer::start().await;
        let mut config = config_for(&server);
        config.nodes.get_mut("nodeB").unwrap().peer_id = None;
        let err = Operations::new(&config).ensure_pins("orgA", false).await.unwrap_err();
        assert!(err.is_config_error());
    }
}
