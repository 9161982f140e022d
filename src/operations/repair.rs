//! Repair pass: recover pins that report errors or have no copy

use chrono::Utc;

use super::errors::OpsResult;
use super::pool::run_bounded;
use super::reports::{BrokenPin, RepairReport};
use super::Operations;
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::replication::{Pin, PinCondition};

impl<'a> Operations<'a> {
    /// Ask the cluster to recover every broken pin that some peer still
    /// holds or is fetching. Lost pins are reported and left alone; a dry
    /// run only classifies.
    ///
    /// Recovery re-uses the cluster's stored pin record, so allocation
    /// and metadata are never touched.
    pub async fn repair(&self, dry_run: bool) -> OpsResult<RepairReport> {
        let scope = ObservationScope::with_fields("REPAIR", &[("dry_run", &dry_run.to_string())]);
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };
        let pins = match client.list_pins().await {
            Ok(pins) => pins,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e.into());
            }
        };

        let total_pins = pins.len();
        let broken: Vec<Pin> = pins.into_iter().filter(Pin::needs_repair).collect();
        let clean = total_pins - broken.len();

        let client = &client;
        let broken_pins = run_bounded(broken, self.config.concurrency, |pin| async move {
            let condition = pin.condition();
            let mut entry = BrokenPin {
                cid: pin.cid.clone(),
                name: pin.name.clone(),
                condition,
                error_peers: pin.error_peers().into_iter().map(str::to_string).collect(),
                recovered: false,
                recover_error: None,
            };

            if condition == PinCondition::Unrecoverable {
                log_event_with_fields(Event::PinLost, &[("cid", &pin.cid), ("name", &pin.name)]);
                return entry;
            }
            if dry_run {
                return entry;
            }

            match client.recover(&pin.cid).await {
                Ok(()) => {
                    log_event_with_fields(Event::PinRecover, &[("cid", &pin.cid)]);
                    entry.recovered = true;
                }
                Err(e) => {
                    let reason = e.to_string();
                    log_event_with_fields(
                        Event::PinRecoverFailed,
                        &[("cid", &pin.cid), ("reason", &reason)],
                    );
                    entry.recover_error = Some(reason);
                }
            }
            entry
        })
        .await;

        let lost = broken_pins
            .iter()
            .filter(|b| b.condition == PinCondition::Unrecoverable)
            .count();
        let recovered = broken_pins.iter().filter(|b| b.recovered).count();
        let recover_errors = broken_pins.iter().filter(|b| b.recover_error.is_some()).count();
        let broken = broken_pins.len();

        let report = RepairReport {
            total_pins,
            clean,
            broken,
            recoverable: broken - lost,
            lost,
            recovered,
            recover_errors,
            dry_run,
            broken_pins,
            exit_code: RepairReport::compute_exit_code(broken, recovered, lost, dry_run),
            checked_at: Utc::now(),
        };

        scope.complete_with_fields(&[
            ("broken", &broken.to_string()),
            ("lost", &lost.to_string()),
            ("recovered", &recovered.to_string()),
        ]);
        Ok(report)
    }
}
