//! Stateful fake pinning cluster for integration tests
//!
//! One `MockServer` plays every node's REST API and gateway. Pins,
//! uploaded content, peers and freespace live in shared state so a test
//! can run several operations in a row and watch the cluster change.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use ccs::config::CcsConfig;
use ccs::replication::{PeerPinStatus, PeerStatus, Pin};
use ccs::transport::PeerRecord;

pub const GB: u64 = 1_000_000_000;

/// Peer ids and names of the three nodes in `config()`
pub const PEERS: [(&str, &str); 3] = [("pA", "nodeA"), ("pB", "nodeB"), ("pC", "nodeC")];

#[derive(Debug, Clone)]
enum Blob {
    File(Vec<u8>),
    /// Paths relative to the directory root
    Dir(Vec<(String, Vec<u8>)>),
}

#[derive(Debug, Default)]
struct State {
    pins: BTreeMap<String, Pin>,
    blobs: BTreeMap<String, Blob>,
    peers: Vec<PeerRecord>,
    freespace: BTreeMap<String, u64>,
    next_cid: u64,
    recovered: Vec<String>,
    repinned: Vec<String>,
    add_error: Option<String>,
}

impl State {
    fn mint_cid(&mut self) -> String {
        self.next_cid += 1;
        format!("QmFAKE{:04}", self.next_cid)
    }

    fn peer_name(&self, id: &str) -> String {
        self.peers
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.peername.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

type Shared = Arc<Mutex<State>>;

fn lock(state: &Shared) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn query_of(request: &Request) -> BTreeMap<String, String> {
    request.url.query_pairs().into_owned().collect()
}

fn cid_of(request: &Request) -> String {
    request
        .url
        .path_segments()
        .and_then(|mut s| s.nth(1))
        .unwrap_or_default()
        .to_string()
}

fn not_found(cid: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({"code": 404, "message": format!("{} not found", cid)}))
}

fn ndjson<T: serde::Serialize>(items: &[T]) -> ResponseTemplate {
    let body: String = items
        .iter()
        .map(|i| format!("{}\n", serde_json::to_string(i).unwrap_or_default()))
        .collect();
    ResponseTemplate::new(200).set_body_string(body)
}

/// `(filename, data)` of every part of a multipart body
fn multipart_files(request: &Request) -> Vec<(String, Vec<u8>)> {
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let Some(boundary) = content_type.split("boundary=").nth(1) else {
        return Vec::new();
    };
    let delimiter = format!("--{}", boundary.trim_matches('"'));
    let body = String::from_utf8_lossy(&request.body).into_owned();

    body.split(delimiter.as_str())
        .filter_map(|part| {
            let (headers, data) = part.split_once("\r\n\r\n")?;
            let start = headers.find("filename=\"")? + "filename=\"".len();
            let end = headers[start..].find('"')? + start;
            let data = data.strip_suffix("\r\n").unwrap_or(data);
            Some((headers[start..end].to_string(), data.as_bytes().to_vec()))
        })
        .collect()
}

struct AddResponder(Shared);

impl Respond for AddResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = lock(&self.0);
        if let Some(message) = state.add_error.take() {
            return ResponseTemplate::new(500).set_body_json(json!({"code": 500, "message": message}));
        }

        let query = query_of(request);
        let files = multipart_files(request);
        let root_name = query.get("name").cloned().unwrap_or_default();
        let mut records = Vec::new();
        for (name, data) in &files {
            let cid = state.mint_cid();
            records.push(json!({"name": name, "cid": cid, "size": data.len()}));
            state.blobs.insert(cid, Blob::File(data.clone()));
        }

        let is_dir = files.iter().any(|(name, _)| name.contains('/'));
        let root_cid = if is_dir {
            let prefix = format!("{}/", root_name);
            let entries: Vec<(String, Vec<u8>)> = files
                .iter()
                .map(|(name, data)| {
                    (name.strip_prefix(&prefix).unwrap_or(name).to_string(), data.clone())
                })
                .collect();
            let total: usize = entries.iter().map(|(_, d)| d.len()).sum();
            let cid = state.mint_cid();
            records.push(json!({"name": root_name, "cid": cid, "size": total}));
            state.blobs.insert(cid.clone(), Blob::Dir(entries));
            cid
        } else {
            match records.last().and_then(|r| r["cid"].as_str()) {
                Some(cid) => cid.to_string(),
                None => return ResponseTemplate::new(200),
            }
        };

        let allocations: Vec<String> = query
            .get("allocations")
            .map(|a| a.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let mut pin = Pin::new(root_cid.clone())
            .with_name(root_name)
            .with_allocations(allocations.clone());
        for peer in &allocations {
            let name = state.peer_name(peer);
            pin = pin.with_peer(peer.clone(), PeerPinStatus::new(name, PeerStatus::Pinned));
        }
        for (key, value) in &query {
            if let Some(meta) = key.strip_prefix("meta-") {
                pin = pin.with_metadata(meta, value.clone());
            }
        }
        state.pins.insert(root_cid, pin);

        ndjson(&records)
    }
}

struct PinsResponder(Shared);

impl Respond for PinsResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let state = lock(&self.0);
        let pins: Vec<&Pin> = state.pins.values().collect();
        ndjson(&pins)
    }
}

/// GET and POST `/pins/{cid}`
struct PinResponder(Shared);

impl Respond for PinResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let cid = cid_of(request);
        let mut state = lock(&self.0);
        if request.method.as_str() == "GET" {
            return match state.pins.get(&cid) {
                Some(pin) => ResponseTemplate::new(200).set_body_json(pin),
                None => not_found(&cid),
            };
        }

        // The cluster replaces the whole pin record from the query
        let query = query_of(request);
        let previous = state.pins.get(&cid).cloned().unwrap_or_else(|| Pin::new(cid.clone()));
        let allocations: Vec<String> = query
            .get("allocations")
            .map(|a| a.split(',').map(str::to_string).collect())
            .unwrap_or_default();

        let mut pin = Pin::new(cid.clone())
            .with_name(query.get("name").cloned().unwrap_or_default())
            .with_allocations(allocations.clone());
        pin.replication_factor_min = query.get("replication-min").and_then(|v| v.parse().ok());
        pin.replication_factor_max = query.get("replication-max").and_then(|v| v.parse().ok());
        pin.created = previous.created;
        for (key, value) in &query {
            if let Some(meta) = key.strip_prefix("meta-") {
                pin = pin.with_metadata(meta, value.clone());
            }
        }
        for peer in &allocations {
            let status = match previous.peer_map.get(peer) {
                Some(status) => status.clone(),
                None => PeerPinStatus::new(state.peer_name(peer), PeerStatus::Pinned),
            };
            pin = pin.with_peer(peer.clone(), status);
        }

        state.repinned.push(cid.clone());
        state.pins.insert(cid, pin.clone());
        ResponseTemplate::new(200).set_body_json(&pin)
    }
}

struct RecoverResponder(Shared);

impl Respond for RecoverResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let cid = cid_of(request);
        let mut state = lock(&self.0);
        state.recovered.push(cid.clone());
        let Some(pin) = state.pins.get_mut(&cid) else {
            return not_found(&cid);
        };
        let holds = pin.peer_map.values().any(|s| s.status.holds_or_fetching());
        if holds {
            for status in pin.peer_map.values_mut() {
                if status.status.is_error() {
                    status.status = PeerStatus::Pinned;
                    status.error = None;
                }
            }
        }
        ResponseTemplate::new(202).set_body_json(&*pin)
    }
}

struct PeersResponder(Shared);

impl Respond for PeersResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ndjson(&lock(&self.0).peers)
    }
}

struct FreespaceResponder(Shared);

impl Respond for FreespaceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let state = lock(&self.0);
        let metrics: Vec<Value> = state
            .freespace
            .iter()
            .map(|(peer, bytes)| json!({"name": "freespace", "peer": peer, "value": bytes.to_string()}))
            .collect();
        ResponseTemplate::new(200).set_body_json(metrics)
    }
}

/// HEAD and GET `/ipfs/{cid}`, with `format=tar` and `format=dag-json`
struct GatewayResponder(Shared);

impl Respond for GatewayResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let cid = cid_of(request);
        let state = lock(&self.0);
        let Some(blob) = state.blobs.get(&cid) else {
            return ResponseTemplate::new(404).set_body_string("no link named");
        };
        let format = query_of(request).get("format").cloned();

        match (format.as_deref(), blob) {
            (Some("tar"), blob) => match tar_of(&cid, blob) {
                Ok(data) => ResponseTemplate::new(200).set_body_raw(data, "application/x-tar"),
                Err(e) => ResponseTemplate::new(500).set_body_string(e.to_string()),
            },
            (Some("dag-json"), Blob::Dir(entries)) => {
                let links: Vec<Value> = entries
                    .iter()
                    .map(|(name, data)| json!({"Hash": {"/": "QmLINK"}, "Name": name, "Tsize": data.len()}))
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({"Links": links}))
            }
            (Some("dag-json"), Blob::File(_)) => {
                ResponseTemplate::new(200).set_body_json(json!({"Links": []}))
            }
            (_, Blob::Dir(_)) => ResponseTemplate::new(200).set_body_raw(
                format!("<html>Index of /ipfs/{}</html>", cid),
                "text/html; charset=utf-8",
            ),
            (_, Blob::File(data)) => {
                ResponseTemplate::new(200).set_body_raw(data.clone(), "application/octet-stream")
            }
        }
    }
}

fn tar_of(cid: &str, blob: &Blob) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut append = |name: &str, data: &[u8]| {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data)
    };
    match blob {
        Blob::File(data) => append(cid, data)?,
        Blob::Dir(entries) => {
            for (name, data) in entries {
                append(&format!("{}/{}", cid, name), data)?;
            }
        }
    }
    builder.into_inner()
}

/// A running fake cluster plus a config file pointing at it
pub struct FakeCluster {
    pub server: MockServer,
    state: Shared,
    dir: TempDir,
}

impl FakeCluster {
    /// Three online peers with 100 GB free each and no pins
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state: Shared = Arc::default();
        {
            let mut s = lock(&state);
            for (id, name) in PEERS {
                s.peers.push(PeerRecord {
                    id: id.to_string(),
                    peername: name.to_string(),
                    addresses: vec![format!("/ip4/127.0.0.1/tcp/9096/p2p/{}", id)],
                    error: String::new(),
                });
                s.freespace.insert(id.to_string(), 100 * GB);
            }
        }

        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(AddResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pins"))
            .respond_with(PinsResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(path_regex(r"^/pins/[^/]+$"))
            .respond_with(PinResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/pins/[^/]+/recover$"))
            .respond_with(RecoverResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(PeersResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/monitor/metrics/freespace"))
            .respond_with(FreespaceResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(path_regex(r"^/ipfs/[^/]+$"))
            .respond_with(GatewayResponder(state.clone()))
            .mount(&server)
            .await;

        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("tempdir: {}", e),
        };
        Self { server, state, dir }
    }

    /// Config JSON: nodeA (orgA primary), nodeB (backup), nodeC (orgC)
    pub fn config_json(&self) -> Value {
        let port = self.server.address().port();
        let node = |peer: &str, role: &str, org: Option<&str>| {
            let mut node = json!({
                "host": "127.0.0.1",
                "peer_id": peer,
                "role": role,
                "api_port": port,
                "gateway_port": port,
            });
            if let Some(org) = org {
                node["org"] = json!(org);
            }
            node
        };
        json!({
            "cluster": {"basic_auth_user": "admin", "basic_auth_password": "secret"},
            "backup_node": "nodeB",
            "default_node": "nodeA",
            "replication_min": 3,
            "replication_max": 5,
            "cross_org_replicas": 1,
            "concurrency": 4,
            "timeout_secs": 10,
            "profiles": {"orgA": {"primary": "nodeA"}, "orgC": {"primary": "nodeC"}},
            "nodes": {
                "nodeA": node("pA", "primary", Some("orgA")),
                "nodeB": node("pB", "backup", None),
                "nodeC": node("pC", "cross-org", Some("orgC")),
            }
        })
    }

    /// Write `config_json` to disk and load it the way the CLI does
    pub fn config(&self) -> CcsConfig {
        let path = self.dir.path().join("config.json");
        fs::write(&path, self.config_json().to_string()).unwrap();
        CcsConfig::load_validated(&path).unwrap()
    }

    pub fn workdir(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn seed_pin(&self, pin: Pin) {
        lock(&self.state).pins.insert(pin.cid.clone(), pin);
    }

    pub fn seed_file(&self, cid: &str, data: &[u8]) {
        lock(&self.state)
            .blobs
            .insert(cid.to_string(), Blob::File(data.to_vec()));
    }

    pub fn pin(&self, cid: &str) -> Option<Pin> {
        lock(&self.state).pins.get(cid).cloned()
    }

    pub fn pin_count(&self) -> usize {
        lock(&self.state).pins.len()
    }

    pub fn set_peer_status(&self, cid: &str, peer: &str, status: PeerPinStatus) {
        if let Some(pin) = lock(&self.state).pins.get_mut(cid) {
            pin.peer_map.insert(peer.to_string(), status);
        }
    }

    pub fn set_peer_offline(&self, id: &str, error: &str) {
        for peer in lock(&self.state).peers.iter_mut().filter(|p| p.id == id) {
            peer.error = error.to_string();
        }
    }

    pub fn set_freespace(&self, peer: &str, bytes: u64) {
        lock(&self.state).freespace.insert(peer.to_string(), bytes);
    }

    pub fn fail_next_add(&self, message: &str) {
        lock(&self.state).add_error = Some(message.to_string());
    }

    pub fn recovered(&self) -> Vec<String> {
        lock(&self.state).recovered.clone()
    }

    pub fn repinned(&self) -> Vec<String> {
        lock(&self.state).repinned.clone()
    }

    pub async fn add_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/add")
            .count()
    }
}

/// Pin held by `peers`, every one reporting `pinned`
pub fn pinned_on(cid: &str, peers: &[&str]) -> Pin {
    let mut pin = Pin::new(cid).with_name(cid).with_allocations(peers.iter().copied());
    for peer in peers {
        pin = pin.with_peer(*peer, status(peer, PeerStatus::Pinned));
    }
    pin
}

/// Per-peer status using the fake cluster's peer names
pub fn status(peer: &str, status: PeerStatus) -> PeerPinStatus {
    let name = PEERS
        .iter()
        .find(|(id, _)| id == &peer)
        .map(|(_, name)| *name)
        .unwrap_or(peer);
    PeerPinStatus::new(name, status)
}
