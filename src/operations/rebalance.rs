//! Rebalance pass over every org-tagged pin

use chrono::Utc;

use super::errors::OpsResult;
use super::pool::run_bounded;
use super::reports::{RebalanceAction, RebalanceReport};
use super::Operations;
use crate::allocation::{required_peers, AllocationPolicy, Topology};
use crate::config::CcsConfig;
use crate::observability::{log_event_with_fields, warn_event, Event, ObservationScope};
use crate::replication::Pin;
use crate::transport::PinOptions;

enum Plan {
    Skip,
    Keep,
    Change(RebalanceAction),
}

impl<'a> Operations<'a> {
    /// For every pin whose org has a profile: drop peers the configuration
    /// does not know, make sure primary and backup are present, top up to
    /// `replication_min` with the peers that have the most free space, and
    /// trim to `replication_max` by removing the non-required peers with
    /// the least. Changes are re-pinned with name and metadata unchanged.
    pub async fn rebalance(&self, dry_run: bool) -> OpsResult<RebalanceReport> {
        let scope = ObservationScope::with_fields("REBALANCE", &[("dry_run", &dry_run.to_string())]);
        let client = self.client()?;

        let pins = match client.list_pins().await {
            Ok(pins) => pins,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e.into());
            }
        };
        let mut topology = Topology::from_config(self.config);
        match client.freespace().await {
            Ok(metrics) => topology = topology.with_freespace(&metrics),
            Err(e) => warn_event(Event::FreespaceUnavailable, &[("reason", &e.to_string())]),
        }
        let policy = AllocationPolicy::from_config(self.config);
        let total_pins = pins.len();

        let plans: Vec<Plan> = pins
            .iter()
            .map(|pin| plan(pin, self.config, &topology, &policy))
            .collect();

        let mut skipped = 0;
        let mut already_correct = 0;
        let mut changes = Vec::new();
        for (pin, plan) in pins.into_iter().zip(plans) {
            match plan {
                Plan::Skip => skipped += 1,
                Plan::Keep => already_correct += 1,
                Plan::Change(action) => changes.push((pin, action)),
            }
        }

        let client = &client;
        let actions = run_bounded(changes, self.config.concurrency, |(pin, mut action)| async move {
            if dry_run || action.error.is_some() {
                return action;
            }
            let options = PinOptions::from_pin(&pin).with_allocations(action.after.clone());
            match client.repin(&pin.cid, &options).await {
                Ok(()) => log_event_with_fields(
                    Event::PinReallocated,
                    &[("allocations", &action.after.join(",")), ("cid", &pin.cid)],
                ),
                Err(e) => {
                    let reason = e.to_string();
                    log_event_with_fields(
                        Event::PinReallocateFailed,
                        &[("cid", &pin.cid), ("reason", &reason)],
                    );
                    action.error = Some(reason);
                }
            }
            action
        })
        .await;

        let ok = || actions.iter().filter(|a| a.error.is_none());
        let added_replicas = ok().filter(|a| !a.added.is_empty()).count();
        let removed_replicas = ok().filter(|a| !a.removed.is_empty()).count();
        let changed = ok().count();
        let errors = actions.len() - changed;

        let report = RebalanceReport {
            total_pins,
            already_correct,
            skipped,
            added_replicas,
            removed_replicas,
            errors,
            actions,
            dry_run,
            replication_min: policy.replication_min,
            replication_max: policy.replication_max,
            exit_code: RebalanceReport::compute_exit_code(changed, errors),
            checked_at: Utc::now(),
        };

        scope.complete_with_fields(&[
            ("changed", &changed.to_string()),
            ("errors", &errors.to_string()),
            ("skipped", &skipped.to_string()),
        ]);
        Ok(report)
    }
}

fn plan(pin: &Pin, config: &CcsConfig, topology: &Topology, policy: &AllocationPolicy) -> Plan {
    let Some(org) = pin.org() else {
        return Plan::Skip;
    };
    let Some(profile) = config.get_profile(org) else {
        return Plan::Skip;
    };

    let action = |after: Vec<String>, error: Option<String>| {
        let added = after
            .iter()
            .filter(|p| !pin.allocations.contains(p))
            .cloned()
            .collect();
        let removed = pin
            .allocations
            .iter()
            .filter(|p| !after.contains(p))
            .cloned()
            .collect();
        RebalanceAction {
            cid: pin.cid.clone(),
            name: pin.name.clone(),
            org: org.to_string(),
            before: pin.allocations.clone(),
            after,
            added,
            removed,
            error,
        }
    };

    let required = match required_peers(profile, topology, policy) {
        Ok(required) => required,
        Err(e) => {
            return Plan::Change(action(pin.allocations.clone(), Some(e.to_string())));
        }
    };

    let after = rebalanced(&pin.allocations, &required, config, topology, policy);
    let result = action(after, None);
    if result.added.is_empty() && result.removed.is_empty() {
        Plan::Keep
    } else {
        Plan::Change(result)
    }
}

fn rebalanced(
    current: &[String],
    required: &[String],
    config: &CcsConfig,
    topology: &Topology,
    policy: &AllocationPolicy,
) -> Vec<String> {
    let known = config.known_peer_ids();
    let mut after: Vec<String> = current
        .iter()
        .filter(|p| known.contains(&p.as_str()))
        .cloned()
        .collect();

    for peer in required {
        if !after.contains(peer) {
            after.push(peer.clone());
        }
    }

    while after.len() < policy.replication_min {
        let best = topology
            .nodes()
            .iter()
            .filter_map(|n| {
                let id = n.peer_id.as_ref()?;
                let free = n.free_bytes?;
                (free > n.reserved_bytes && !after.contains(id)).then_some((id, free))
            })
            .max_by_key(|(_, free)| *free);
        match best {
            Some((id, _)) => after.push(id.clone()),
            None => break,
        }
    }

    while after.len() > policy.replication_max {
        let worst = after
            .iter()
            .enumerate()
            .filter(|(_, p)| !required.contains(p))
            .min_by_key(|(_, p)| topology.free_bytes(p).unwrap_or(0))
            .map(|(i, _)| i);
        match worst {
            Some(i) => {
                after.remove(i);
            }
            None => break,
        }
    }

    after
}
