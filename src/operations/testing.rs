//! Fixtures shared by the operation tests

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::config::{CcsConfig, NodeConfig, NodeRole, ProfileConfig};
use crate::replication::{PeerPinStatus, PeerStatus, Pin};

pub(crate) const GB: u64 = 1_000_000_000;

/// Three nodes served by one mock server: nodeA (orgA primary), nodeB
/// (shared backup) and nodeC (orgC, cross-org)
pub(crate) fn config_for(server: &MockServer) -> CcsConfig {
    let port = server.address().port();
    let mut config = CcsConfig::default();
    config.insert_node(
        NodeConfig::new("nodeA", "127.0.0.1")
            .with_peer_id("pA")
            .with_role(NodeRole::Primary)
            .with_org("orgA")
            .with_ports(port, port),
    );
    config.insert_node(
        NodeConfig::new("nodeB", "127.0.0.1")
            .with_peer_id("pB")
            .with_role(NodeRole::Backup)
            .with_ports(port, port),
    );
    config.insert_node(
        NodeConfig::new("nodeC", "127.0.0.1")
            .with_peer_id("pC")
            .with_role(NodeRole::CrossOrg)
            .with_org("orgC")
            .with_ports(port, port),
    );
    config.insert_profile(ProfileConfig::new("orgA", "nodeA"));
    config.insert_profile(ProfileConfig::new("orgC", "nodeC"));
    config.backup_node = Some("nodeB".into());
    config.default_node = Some("nodeA".into());
    config.replication_min = 3;
    config.replication_max = 5;
    config.cross_org_replicas = 1;
    config
}

pub(crate) fn ndjson<T: Serialize>(items: &[T]) -> String {
    items
        .iter()
        .filter_map(|item| serde_json::to_string(item).ok())
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn peer(name: &str, status: PeerStatus) -> PeerPinStatus {
    PeerPinStatus::new(name, status)
}

/// Pin allocated to the given peers, every one of them `pinned`
pub(crate) fn healthy_pin(cid: &str, peers: &[&str]) -> Pin {
    peers.iter().fold(
        Pin::new(cid).with_name(cid).with_allocations(peers.iter().copied()),
        |pin, id| pin.with_peer(*id, peer(id, PeerStatus::Pinned)),
    )
}

pub(crate) async fn mount_pins(server: &MockServer, pins: &[Pin]) {
    Mock::given(method("GET"))
        .and(path("/pins"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(pins)))
        .mount(server)
        .await;
}

/// Every listed peer online
pub(crate) async fn mount_peers(server: &MockServer, peers: &[(&str, &str)]) {
    let records: Vec<_> = peers
        .iter()
        .map(|(id, name)| json!({"id": id, "peername": name, "addresses": [], "error": ""}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/peers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&records)))
        .mount(server)
        .await;
}

pub(crate) async fn mount_freespace(server: &MockServer, metrics: &[(&str, u64)]) {
    let records: Vec<_> = metrics
        .iter()
        .map(|(peer, bytes)| json!({"name": "freespace", "peer": peer, "value": bytes.to_string()}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/monitor/metrics/freespace"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records))
        .mount(server)
        .await;
}

/// Accept every re-pin
pub(crate) async fn mount_repin_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/pins/[^/]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(server)
        .await;
}

pub(crate) async fn requests_to(server: &MockServer, http_method: &str, prefix: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path().starts_with(prefix))
        .collect()
}

/// Re-pin requests, excluding recover calls
pub(crate) async fn repins(server: &MockServer) -> Vec<Request> {
    requests_to(server, "POST", "/pins/")
        .await
        .into_iter()
        .filter(|r| !r.url.path().ends_with("/recover"))
        .collect()
}

/// Query parameters of a request; repeated keys keep the last value
pub(crate) fn query(request: &Request) -> BTreeMap<String, String> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub(crate) fn allocations_of(request: &Request) -> Vec<String> {
    query(request)
        .get("allocations")
        .map(|a| a.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}
