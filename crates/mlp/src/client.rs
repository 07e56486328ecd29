use std::time::Duration;

use async_trait::async_trait;
use pitchwatch_core::checkout::venue_url;
use pitchwatch_core::config::ProviderConfig;
use pitchwatch_core::domain::pitch::Pitch;
use pitchwatch_core::domain::slot::Slot;
use pitchwatch_core::reconcile::{FetchError, SlotSource, TimeWindow};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::debug;

use crate::wire::SlotsResponse;

const FILTER_DATE_FORMAT: &str = "%Y-%m-%d";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/61.0.3163.91 Safari/537.36";

/// The booking site rejects requests that do not look like they come from its
/// own web frontend, so every request carries browser-like headers.
#[derive(Clone, Debug)]
pub struct MlpClient {
    http: Client,
    api_endpoint: String,
    site_url: String,
    timeout: Duration,
}

impl MlpClient {
    pub fn new(
        api_endpoint: impl Into<String>,
        site_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| FetchError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_owned(),
            site_url: site_url.into().trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, FetchError> {
        Self::new(
            config.api_endpoint.clone(),
            config.site_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn slots_url(&self, pitch: &Pitch) -> String {
        format!("{}/pitches/{}/slots", self.api_endpoint, pitch.id)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl SlotSource for MlpClient {
    async fn fetch_slots(
        &self,
        pitch: &Pitch,
        window: &TimeWindow,
    ) -> Result<Vec<Slot>, FetchError> {
        let starts = window.starts.format(FILTER_DATE_FORMAT).to_string();
        let ends = window.ends.format(FILTER_DATE_FORMAT).to_string();

        debug!(
            event_name = "provider.slots.request",
            pitch_id = %pitch.id,
            starts = %starts,
            ends = %ends,
            "requesting pitch slots"
        );

        let response = self
            .http
            .get(self.slots_url(pitch))
            .query(&[("filter[starts]", starts.as_str()), ("filter[ends]", ends.as_str())])
            .header(ORIGIN, &self.site_url)
            .header(REFERER, venue_url(&self.site_url, pitch))
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.8")
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|error| self.map_transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let body = response.text().await.map_err(|error| self.map_transport_error(error))?;
        let decoded: SlotsResponse =
            serde_json::from_str(&body).map_err(|error| FetchError::Decode(error.to_string()))?;

        Ok(decoded.into_slots())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use chrono::{TimeZone, Utc};
    use pitchwatch_core::domain::pitch::Pitch;
    use pitchwatch_core::reconcile::{FetchError, SlotSource, TimeWindow};

    use super::MlpClient;

    #[derive(Clone, Debug, Default)]
    struct Seen {
        pitch_id: String,
        query: HashMap<String, String>,
        referer: Option<String>,
        origin: Option<String>,
    }

    type SeenState = Arc<Mutex<Option<Seen>>>;

    const BODY: &str = r#"{"data":[{"type":"slots","id":"77","attributes":{
        "starts":"2026-10-20T19:00:00+01:00","ends":"2026-10-20T20:00:00+01:00",
        "price":"60.00","admin_fee":"1.50","currency":"GBP","availabilities":2}}]}"#;

    async fn slots_handler(
        State(seen): State<SeenState>,
        Path(pitch_id): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, String) {
        let header = |name: &str| {
            headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
        };
        let record = Seen {
            pitch_id: pitch_id.clone(),
            query,
            referer: header("referer"),
            origin: header("origin"),
        };
        if let Ok(mut slot) = seen.lock() {
            *slot = Some(record);
        }

        match pitch_id.as_str() {
            "500" => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            "999" => (StatusCode::OK, "not json".to_owned()),
            _ => (StatusCode::OK, BODY.to_owned()),
        }
    }

    async fn spawn_provider() -> (String, SeenState) {
        let seen: SeenState = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route("/pitches/{id}/slots", get(slots_handler))
            .with_state(seen.clone());
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{address}"), seen)
    }

    fn window() -> TimeWindow {
        let now = Utc.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).single().expect("valid date");
        TimeWindow::ahead(now, 14)
    }

    fn pitch(id: &str) -> Pitch {
        Pitch::new(id, "Three Corners", "three-corners/football-5-a-side-34933", "london")
    }

    #[test]
    fn slots_url_strips_trailing_slash() {
        let client =
            MlpClient::new("https://api.example.test/", "https://site.test", Duration::from_secs(5))
                .expect("client should build");
        assert_eq!(
            client.slots_url(&pitch("34933")),
            "https://api.example.test/pitches/34933/slots"
        );
    }

    #[tokio::test]
    async fn fetch_sends_date_filters_and_browser_headers() {
        let (base, seen) = spawn_provider().await;
        let client = MlpClient::new(base, "https://www.mylocalpitch.com", Duration::from_secs(5))
            .expect("client should build");

        let slots =
            client.fetch_slots(&pitch("34933"), &window()).await.expect("fetch should succeed");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id.0, "77");
        assert_eq!(slots[0].availabilities, 2);

        let seen = seen.lock().expect("state lock").clone().expect("request should be recorded");
        assert_eq!(seen.pitch_id, "34933");
        assert_eq!(seen.query.get("filter[starts]").map(String::as_str), Some("2026-10-20"));
        assert_eq!(seen.query.get("filter[ends]").map(String::as_str), Some("2026-11-03"));
        assert_eq!(seen.origin.as_deref(), Some("https://www.mylocalpitch.com"));
        assert_eq!(
            seen.referer.as_deref(),
            Some("https://www.mylocalpitch.com/london/venue/three-corners/football-5-a-side-34933")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (base, _) = spawn_provider().await;
        let client = MlpClient::new(base, "https://site.test", Duration::from_secs(5))
            .expect("client should build");

        let error =
            client.fetch_slots(&pitch("500"), &window()).await.expect_err("500 should fail");
        assert_eq!(error, FetchError::Status { status: 500 });
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let (base, _) = spawn_provider().await;
        let client = MlpClient::new(base, "https://site.test", Duration::from_secs(5))
            .expect("client should build");

        let error = client
            .fetch_slots(&pitch("999"), &window())
            .await
            .expect_err("body should not decode");
        assert!(matches!(error, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transport_error() {
        let client =
            MlpClient::new("http://127.0.0.1:9", "https://site.test", Duration::from_secs(5))
                .expect("client should build");

        let error =
            client.fetch_slots(&pitch("1"), &window()).await.expect_err("connect should fail");
        assert!(matches!(error, FetchError::Transport(_) | FetchError::Timeout(_)));
    }
}
