//! Cluster health summary

use chrono::Utc;

use super::errors::OpsResult;
use super::reports::{
    HealthReport, HealthStatus, NodeHealth, PeerSummary, PinErrorEntry, PinSummary,
};
use super::Operations;
use crate::observability::{log_event_with_fields, warn_event, Event};
use crate::replication::{PeerStatus, Pin};
use crate::transport::PeerRecord;

impl<'a> Operations<'a> {
    /// Peer availability plus per-peer pin state counts.
    ///
    /// `error` when any peer is offline, `degraded` when any peer reports
    /// `pin_error`, `ok` otherwise.
    pub async fn health(&self) -> OpsResult<HealthReport> {
        let client = self.client()?;
        let peers = client.list_peers().await?;
        let pins = client.list_pins().await?;
        Ok(summarize(&peers, &pins))
    }
}

#[derive(Default)]
struct Counts {
    pinned: usize,
    pinning: usize,
    queued: usize,
    pin_error: usize,
    other_error: usize,
    remote: usize,
}

impl Counts {
    fn record(&mut self, status: &PeerStatus) {
        match status {
            PeerStatus::Pinned => self.pinned += 1,
            PeerStatus::Pinning => self.pinning += 1,
            PeerStatus::PinQueued => self.queued += 1,
            PeerStatus::Remote => self.remote += 1,
            PeerStatus::PinError => self.pin_error += 1,
            s if s.is_error() => self.other_error += 1,
            _ => {}
        }
    }
}

fn summarize(peers: &[PeerRecord], pins: &[Pin]) -> HealthReport {
    let mut nodes = Vec::with_capacity(peers.len());
    for peer in peers {
        let mut counts = Counts::default();
        for pin in pins {
            if let Some(status) = pin.status_of(&peer.id) {
                counts.record(status);
            }
        }

        let name = if peer.peername.is_empty() {
            peer.id.clone()
        } else {
            peer.peername.clone()
        };
        let online = peer.is_online();
        if !online {
            warn_event(
                Event::PeerOffline,
                &[("error", &peer.error), ("peer", &name)],
            );
        }
        let status = if !online {
            HealthStatus::Error
        } else if counts.pin_error > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };

        nodes.push(NodeHealth {
            name,
            peer_id: peer.id.clone(),
            online,
            status,
            pinned: counts.pinned,
            pinning: counts.pinning,
            queued: counts.queued,
            pin_error: counts.pin_error,
            other_error: counts.other_error,
            remote: counts.remote,
        });
    }

    let mut totals = Counts::default();
    let mut pin_errors = Vec::new();
    for pin in pins {
        for (peer_id, state) in &pin.peer_map {
            totals.record(&state.status);
            if state.status.is_pin_error() {
                pin_errors.push(PinErrorEntry {
                    cid: pin.cid.clone(),
                    node: if state.peername.is_empty() {
                        peer_id.clone()
                    } else {
                        state.peername.clone()
                    },
                    error: state
                        .error
                        .clone()
                        .unwrap_or_else(|| state.status.as_str().to_string()),
                });
            }
        }
    }

    let online = nodes.iter().filter(|n| n.online).count();
    let status = if online < nodes.len() {
        HealthStatus::Error
    } else if !pin_errors.is_empty() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };

    log_event_with_fields(
        Event::HealthCheck,
        &[
            ("peers", &nodes.len().to_string()),
            ("pin_errors", &pin_errors.len().to_string()),
            ("pins", &pins.len().to_string()),
            ("status", status.as_str()),
        ],
    );

    HealthReport {
        status,
        exit_code: status.exit_code(),
        peers: PeerSummary {
            total: nodes.len(),
            online,
            offline: nodes.len() - online,
        },
        pins: PinSummary {
            total: pins.len(),
            pinned: totals.pinned,
            pinning: totals.pinning,
            queued: totals.queued,
            pin_error: totals.pin_error,
            other_error: totals.other_error,
            remote: totals.remote,
        },
        nodes,
        pin_errors,
        checked_at: Utc::now(),
    }
}
