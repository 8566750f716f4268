//! JSONBin-style store — one `GET` returns `{"record": {key: payload, ...}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use storewatch_core::config::StoreConfig;
use storewatch_core::error::{Result, WatchError};
use storewatch_core::traits::SnapshotSource;
use storewatch_core::types::Snapshot;

const ACCESS_KEY_HEADER: &str = "x-access-key";

#[derive(Deserialize)]
struct Envelope {
    record: Option<Snapshot>,
}

pub struct JsonBinSource {
    url: String,
    client: reqwest::Client,
}

impl JsonBinSource {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = config.access_key.as_deref().filter(|k| !k.is_empty()) {
            let value = key
                .parse::<reqwest::header::HeaderValue>()
                .map_err(|_| WatchError::config("store.access_key contains invalid header characters"))?;
            headers.insert(ACCESS_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("StoreWatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WatchError::config(format!("HTTP client: {e}")))?;

        Ok(Self { url: config.url.clone(), client })
    }
}

#[async_trait]
impl SnapshotSource for JsonBinSource {
    fn name(&self) -> &str { "jsonbin" }

    async fn fetch(&self) -> Result<Snapshot> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                WatchError::fetch(format!("store request timed out ({}): {e}", self.url))
            } else {
                WatchError::fetch(format!("store connection failed ({}): {e}", self.url))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(WatchError::fetch(format!("store returned {status}: {text}")));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| WatchError::fetch(format!("malformed store payload: {e}")))?;

        let snapshot = envelope
            .record
            .ok_or_else(|| WatchError::fetch("store payload has no 'record' field"))?;

        tracing::debug!("Fetched {} records from {}", snapshot.len(), self.url);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, key: Option<&str>) -> StoreConfig {
        StoreConfig {
            url: format!("{}/b/games/latest", server.uri()),
            access_key: key.map(String::from),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_with_access_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b/games/latest"))
            .and(header("X-Access-Key", "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "record": {
                    "celeste": {"official_name": "Celeste", "description": "Climb."},
                    "hades": {"official_name": "Hades", "image_url": "https://img/h.png"}
                },
                "metadata": {"private": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = JsonBinSource::new(&config(&server, Some("s3cret"))).unwrap();
        let snapshot = source.fetch().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, ["celeste", "hades"]);
        assert_eq!(snapshot.get("hades").unwrap().image.as_deref(), Some("https://img/h.png"));
    }

    #[tokio::test]
    async fn test_one_bad_entry_keeps_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "record": {
                    "a": {"official_name": "A"},
                    "b": {"official_name": "B", "description": 123},
                    "c": {"official_name": "C"}
                }
            })))
            .mount(&server)
            .await;

        let snapshot = JsonBinSource::new(&config(&server, None)).unwrap().fetch().await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.get("a").unwrap().malformed.is_none());
        assert!(snapshot.get("b").unwrap().malformed.is_some());
        assert_eq!(snapshot.get("c").unwrap().display_name.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn test_empty_record_is_empty_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"record": {}})))
            .mount(&server)
            .await;

        let snapshot = JsonBinSource::new(&config(&server, None)).unwrap().fetch().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = JsonBinSource::new(&config(&server, None)).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch(ref m) if m.contains("503") && m.contains("maintenance")));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = JsonBinSource::new(&config(&server, None)).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_missing_envelope_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "Bin not found"})))
            .mount(&server)
            .await;

        let err = JsonBinSource::new(&config(&server, None)).unwrap().fetch().await.unwrap_err();
        assert!(err.to_string().contains("record"));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"record": {}}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server, None);
        cfg.timeout_secs = 1;
        let err = JsonBinSource::new(&cfg).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fetch_error() {
        let cfg = StoreConfig {
            url: "http://127.0.0.1:9/b/none".into(),
            access_key: None,
            timeout_secs: 2,
        };
        let err = JsonBinSource::new(&cfg).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch(_)));
    }
}
