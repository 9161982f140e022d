//! Cluster REST API client

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use super::content::AddContent;
use super::errors::{TransportError, TransportResult};
use super::pin_options::{meta_pairs, PinOptions};
use super::records::{
    decode, error_message, parse_records, AddedRecord, FreespaceMetric, PeerRecord,
};
use crate::config::ClusterAuth;
use crate::observability::{log_event_with_fields, preview, Event, Logger, Severity};
use crate::replication::Pin;

/// Longest body excerpt written to trace logs
const BODY_PREVIEW_LIMIT: usize = 2000;

/// Client for one node's cluster REST API.
///
/// Every call carries the timeout given at construction and fails with
/// `TransportError::Timeout` when it expires. Nothing is retried.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    base_url: String,
    auth: Option<ClusterAuth>,
    http: Client,
}

impl ClusterClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: Option<ClusterAuth>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: auth.filter(ClusterAuth::is_complete),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        form: Option<Form>,
    ) -> TransportResult<String> {
        let url = format!("{}{}", self.base_url, path);
        log_event_with_fields(
            Event::ClusterRequest,
            &[("method", method.as_str()), ("url", &url)],
        );

        let mut request = self.http.request(method, &url).query(query);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }
        if let Some(form) = form {
            request = request.multipart(form);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if Logger::enabled(Severity::Trace) {
            log_event_with_fields(
                Event::ClusterResponse,
                &[
                    ("body", &preview(&body, BODY_PREVIEW_LIMIT)),
                    ("status", status.as_str()),
                    ("url", &url),
                ],
            );
        }

        check_status(status, &body)?;
        Ok(body)
    }

    /// Upload content and pin it.
    ///
    /// Always requests the buffered response mode, so a placement failure
    /// arrives as a non-2xx status or an error record instead of a
    /// trailer. An empty result is an error.
    pub async fn add(
        &self,
        content: &AddContent,
        name: &str,
        allocations: &[String],
        metadata: &BTreeMap<String, String>,
    ) -> TransportResult<Vec<AddedRecord>> {
        let mut query = vec![("name".to_string(), name.to_string())];
        if !allocations.is_empty() {
            query.push(("allocations".to_string(), allocations.join(",")));
        }
        query.push(("local".to_string(), "true".to_string()));
        query.push(("stream-channels".to_string(), "false".to_string()));
        query.extend(meta_pairs(metadata));

        let form = content.to_form().await?;
        let body = self.call(Method::POST, "/add", &query, Some(form)).await?;

        let records = parse_records(&body)?;
        if records.is_empty() {
            return Err(TransportError::EmptyResponse("/add".to_string()));
        }
        records.iter().map(AddedRecord::from_record).collect()
    }

    /// Current allocation and per-peer status of one CID
    pub async fn pin_status(&self, cid: &str) -> TransportResult<Pin> {
        let path = format!("/pins/{}", cid);
        let body = self.call(Method::GET, &path, &[], None).await?;
        let record = parse_records(&body)?
            .into_iter()
            .next()
            .ok_or(TransportError::EmptyResponse(path))?;
        decode(record)
    }

    /// Every pin the cluster tracks. An empty cluster yields an empty list.
    pub async fn list_pins(&self) -> TransportResult<Vec<Pin>> {
        let body = self.call(Method::GET, "/pins", &[], None).await?;
        parse_records(&body)?.into_iter().map(decode).collect()
    }

    pub async fn list_peers(&self) -> TransportResult<Vec<PeerRecord>> {
        let body = self.call(Method::GET, "/peers", &[], None).await?;
        parse_records(&body)?.into_iter().map(decode).collect()
    }

    /// Latest freespace metric per peer. Malformed entries are skipped.
    pub async fn freespace(&self) -> TransportResult<Vec<FreespaceMetric>> {
        let body = self
            .call(Method::GET, "/monitor/metrics/freespace", &[], None)
            .await?;
        Ok(parse_records(&body)?
            .iter()
            .filter_map(FreespaceMetric::from_record)
            .collect())
    }

    /// Re-issue a pin with a complete set of fields, sent as query
    /// parameters with no body.
    pub async fn repin(&self, cid: &str, options: &PinOptions) -> TransportResult<()> {
        let path = format!("/pins/{}", cid);
        let body = self
            .call(Method::POST, &path, &options.query_pairs(), None)
            .await?;
        parse_records(&body).map(|_| ())
    }

    /// Set metadata keys on an existing pin.
    ///
    /// `pin` must be the pin's current record: its name, allocation and
    /// replication factors are re-sent unchanged along with the merged
    /// metadata.
    pub async fn set_metadata_via_query_params(
        &self,
        pin: &Pin,
        updates: &BTreeMap<String, String>,
    ) -> TransportResult<()> {
        let options = PinOptions::from_pin(pin).with_metadata(updates);
        self.repin(&pin.cid, &options).await
    }

    /// Ask the cluster to retry pinning with its own stored pin record
    pub async fn recover(&self, cid: &str) -> TransportResult<()> {
        let path = format!("/pins/{}/recover", cid);
        let body = self.call(Method::POST, &path, &[], None).await?;
        parse_records(&body).map(|_| ())
    }

    /// Raw `/id` record of the node we talk to
    pub async fn id(&self) -> TransportResult<Value> {
        let body = self.call(Method::GET, "/id", &[], None).await?;
        parse_records(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::EmptyResponse("/id".to_string()))
    }
}

fn check_status(status: StatusCode, body: &str) -> TransportResult<()> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(TransportError::Unauthorized);
    }
    if !status.is_success() {
        let mut message = error_message(body);
        if message.is_empty() {
            message = status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string();
        }
        return Err(TransportError::cluster(message, i64::from(status.as_u16())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::{PeerStatus, META_ORG, META_SIZE};
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ClusterClient {
        ClusterClient::new(
            server.uri(),
            Some(ClusterAuth::new("admin", "secret")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn sample_file(dir: &TempDir) -> AddContent {
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();
        AddContent::from_path(&path).unwrap()
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::OK, "").is_ok());
        assert_eq!(
            check_status(StatusCode::UNAUTHORIZED, "nope"),
            Err(TransportError::Unauthorized)
        );
        assert_eq!(
            check_status(StatusCode::NOT_FOUND, ""),
            Err(TransportError::ClusterReported {
                message: "Not Found".into(),
                code: 404
            })
        );
    }

    #[tokio::test]
    async fn test_add_sends_buffered_mode_allocations_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .and(query_param("name", "a.txt"))
            .and(query_param("allocations", "peerA,peerB"))
            .and(query_param("local", "true"))
            .and(query_param("stream-channels", "false"))
            .and(query_param("meta-org", "hrdag"))
            .and(query_param("meta-size", "5"))
            .and(body_string_contains("filename=\"a.txt\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"name\":\"a.txt\",\"cid\":\"QmA\",\"size\":5}\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut metadata = BTreeMap::new();
        metadata.insert(META_ORG.to_string(), "hrdag".to_string());
        metadata.insert(META_SIZE.to_string(), "5".to_string());

        let records = client(&server)
            .add(
                &sample_file(&dir),
                "a.txt",
                &["peerA".to_string(), "peerB".to_string()],
                &metadata,
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cid, "QmA");
    }

    #[tokio::test]
    async fn test_add_empty_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = client(&server)
            .add(&sample_file(&dir), "a.txt", &[], &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::EmptyResponse("/add".into()));
    }

    #[tokio::test]
    async fn test_add_not_enough_peers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                r#"{"code":500,"message":"not enough peers to allocate CID. Needed at least: 2. Wanted at most: 3. Available candidates: 1."}"#,
            ))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = client(&server)
            .add(&sample_file(&dir), "a.txt", &[], &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InsufficientReplicas { .. }));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pins"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).list_pins().await.unwrap_err();
        assert_eq!(err, TransportError::Unauthorized);
    }

    #[tokio::test]
    async fn test_list_pins_ndjson_and_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pins"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"cid\":\"QmA\",\"allocations\":[\"p1\"],\"peer_map\":{\"p1\":{\"peername\":\"nas\",\"status\":\"pinned\"}}}\n\
                 {\"cid\":{\"/\":\"bafyB\"},\"allocations\":null,\"peer_map\":{}}\n",
            ))
            .mount(&server)
            .await;

        let pins = client(&server).list_pins().await.unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].status_of("p1"), Some(&PeerStatus::Pinned));
        assert_eq!(pins[1].cid, "bafyB");

        let empty = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pins"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&empty)
            .await;
        assert!(client(&empty).list_pins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_metadata_resends_allocation_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pins/QmDOC"))
            .and(query_param("name", "docs"))
            .and(query_param("allocations", "p1,p2"))
            .and(query_param("meta-org", "hrdag"))
            .and(query_param("meta-size", "42"))
            .and(body_string(""))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"cid":"QmDOC"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let pin = Pin::new("QmDOC")
            .with_name("docs")
            .with_allocations(["p1", "p2"])
            .with_metadata(META_ORG, "hrdag");
        let mut updates = BTreeMap::new();
        updates.insert(META_SIZE.to_string(), "42".to_string());

        client(&server)
            .set_metadata_via_query_params(&pin, &updates)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/peers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let slow = ClusterClient::new(server.uri(), None, Duration::from_millis(50)).unwrap();
        assert_eq!(slow.list_peers().await.unwrap_err(), TransportError::Timeout);
    }

    #[tokio::test]
    async fn test_network_unavailable() {
        let client =
            ClusterClient::new("http://127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
        let err = client.recover("QmA").await.unwrap_err();
        assert!(matches!(err, TransportError::NetworkUnavailable(_)));
    }

    #[tokio::test]
    async fn test_id_returns_raw_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/id"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"id":"12D3KooWNAS","peername":"nas","version":"1.1.1"}"#),
            )
            .mount(&server)
            .await;

        let id = client(&server).id().await.unwrap();
        assert_eq!(id["peername"], "nas");
        assert_eq!(id["id"], "12D3KooWNAS");
    }

    #[tokio::test]
    async fn test_freespace_skips_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitor/metrics/freespace"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"name":"freespace","peer":"p1","value":"1000"},{"name":"freespace","peer":"p2","value":""}]"#,
            ))
            .mount(&server)
            .await;

        let metrics = client(&server).freespace().await.unwrap();
        assert_eq!(metrics, vec![FreespaceMetric { peer: "p1".into(), bytes: 1000 }]);
    }
}
