use std::time::Duration;

use indicatif::ProgressBar;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::records::{Booking, BookingStatus, Collection, Inquiry, Spa, User};

/// Total fetch attempts before a list load gives up.
pub const MAX_FETCH_ATTEMPTS: u32 = 13;

const BACKOFF_BASE: Duration = Duration::from_millis(250);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no response from server: {source}")]
    NoResponse {
        #[source]
        source: reqwest::Error,
    },
    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("not logged in, run the login command first")]
    MissingToken,
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build the http client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Transient failures worth another attempt. Client-side rejections
    /// (4xx, auth, decode) fail immediately.
    pub fn retryable(&self) -> bool {
        match self {
            Self::NoResponse { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Auth context threaded through every client call site.
#[derive(Clone, Debug, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching {
        attempt: u32,
    },
    Retrying {
        attempt: u32,
    },
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub backoff: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            backoff: true,
        }
    }
}

impl FetchPolicy {
    /// Retries fire back-to-back with no pause between attempts.
    pub fn immediate() -> Self {
        Self {
            backoff: false,
            ..Self::default()
        }
    }

    /// Pause before the given 1-based attempt. The first attempt and the
    /// no-backoff policy never wait.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if !self.backoff || attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(31);
        let millis = (BACKOFF_BASE.as_millis() as u64).saturating_mul(1u64 << exp);
        Duration::from_millis(millis).min(BACKOFF_CAP)
    }
}

/// Decoded list response plus the count of records the server sent that
/// did not match the expected shape.
#[derive(Clone, Debug, Default)]
pub struct FetchBatch<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CollectionStats {
    pub total: usize,
    pub skipped: usize,
    pub discounted: Option<usize>,
    pub pending: Option<usize>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session, timeout: u64) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spadmin/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|source| ApiError::ClientBuild { source })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn record_endpoint(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection.path(), id)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self.session.token().ok_or(ApiError::MissingToken)?;
        Ok(request.bearer_auth(token))
    }

    /// Map non-2xx responses onto the error taxonomy. A 401 always means
    /// the session is gone; anything else keeps the server's own message
    /// when the body carries one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }
        let fallback = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or(fallback),
            Err(_) => fallback,
        };
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode_body<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::NoResponse { source })?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// One GET of the whole collection. Records that fail to decode are
    /// dropped from the batch and counted, never silently discarded.
    pub async fn fetch_all<T>(&self, collection: Collection) -> Result<FetchBatch<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint(collection.path());
        let request = self.authorize(self.http.get(&endpoint))?;
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::NoResponse { source })?;
        let response = Self::check(response).await?;
        let envelope: ListEnvelope = Self::decode_body(&endpoint, response).await?;
        let mut batch = FetchBatch {
            records: Vec::with_capacity(envelope.data.len()),
            skipped: 0,
        };
        for value in envelope.data {
            match serde_json::from_value::<T>(value) {
                Ok(record) => batch.records.push(record),
                Err(_) => batch.skipped += 1,
            }
        }
        Ok(batch)
    }

    /// Fetch with bounded retries. Only the final failure surfaces; the
    /// state machine records where the loop currently stands so callers
    /// can render progress.
    pub async fn fetch_all_with_retry<T>(
        &self,
        collection: Collection,
        policy: FetchPolicy,
        state: &mut FetchState,
        progress: Option<&ProgressBar>,
    ) -> Result<FetchBatch<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            *state = if attempt == 1 {
                FetchState::Fetching { attempt }
            } else {
                FetchState::Retrying { attempt }
            };
            if attempt > 1 {
                if let Some(bar) = progress {
                    bar.set_message(format!(
                        "retrying {} ({}/{})",
                        collection, attempt, max_attempts
                    ));
                }
                let delay = policy.delay_before(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            match self.fetch_all::<T>(collection).await {
                Ok(batch) => {
                    *state = FetchState::Succeeded;
                    return Ok(batch);
                }
                Err(err) if err.retryable() && attempt < max_attempts => {
                    attempt += 1;
                }
                Err(err) => {
                    *state = FetchState::Failed;
                    return Err(err);
                }
            }
        }
    }

    pub async fn create<T>(
        &self,
        collection: Collection,
        payload: &serde_json::Value,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint(collection.path());
        let request = self.authorize(self.http.post(&endpoint))?.json(payload);
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::NoResponse { source })?;
        let response = Self::check(response).await?;
        Self::decode_body(&endpoint, response).await
    }

    /// PUT replaces the record server-side; the response body is the
    /// updated record and becomes the local copy.
    pub async fn update<T>(
        &self,
        collection: Collection,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let endpoint = self.record_endpoint(collection, id);
        let request = self.authorize(self.http.put(&endpoint))?.json(payload);
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::NoResponse { source })?;
        let response = Self::check(response).await?;
        Self::decode_body(&endpoint, response).await
    }

    /// The server answers 200 or 204 depending on version; the body is
    /// ignored either way.
    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), ApiError> {
        let endpoint = self.record_endpoint(collection, id);
        let request = self.authorize(self.http.delete(&endpoint))?;
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::NoResponse { source })?;
        Self::check(response).await?;
        Ok(())
    }

    /// Exchange credentials for a bearer token. The only call that goes
    /// out without one. The server accepts an email or a phone number as
    /// the login id.
    pub async fn login(&self, login_id: &str, password: &str) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct LoginReply {
            token: String,
        }

        let endpoint = self.endpoint("auth/login");
        let response = self
            .http
            .post(&endpoint)
            .json(&serde_json::json!({ "loginId": login_id, "password": password }))
            .send()
            .await
            .map_err(|source| ApiError::NoResponse { source })?;
        let response = Self::check(response).await?;
        let reply: LoginReply = Self::decode_body(&endpoint, response).await?;
        Ok(reply.token)
    }

    /// Headline numbers for one collection, shaped for the summary view.
    pub async fn collection_summary(
        &self,
        collection: Collection,
        policy: FetchPolicy,
    ) -> (Collection, Result<CollectionStats, ApiError>) {
        let mut state = FetchState::Idle;
        let result = match collection {
            Collection::Spas => self
                .fetch_all_with_retry::<Spa>(collection, policy, &mut state, None)
                .await
                .map(|batch| CollectionStats {
                    total: batch.records.len(),
                    skipped: batch.skipped,
                    discounted: Some(
                        batch.records.iter().filter(|s| s.discount > 0.0).count(),
                    ),
                    pending: None,
                }),
            Collection::Bookings => self
                .fetch_all_with_retry::<Booking>(collection, policy, &mut state, None)
                .await
                .map(|batch| CollectionStats {
                    total: batch.records.len(),
                    skipped: batch.skipped,
                    discounted: None,
                    pending: Some(
                        batch
                            .records
                            .iter()
                            .filter(|b| b.status == Some(BookingStatus::Pending))
                            .count(),
                    ),
                }),
            Collection::Users => self
                .fetch_all_with_retry::<User>(collection, policy, &mut state, None)
                .await
                .map(|batch| CollectionStats {
                    total: batch.records.len(),
                    skipped: batch.skipped,
                    discounted: None,
                    pending: None,
                }),
            Collection::Inquiries => self
                .fetch_all_with_retry::<Inquiry>(collection, policy, &mut state, None)
                .await
                .map(|batch| CollectionStats {
                    total: batch.records.len(),
                    skipped: batch.skipped,
                    discounted: None,
                    pending: None,
                }),
        };
        (collection, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn backoff_doubles_from_250ms_and_caps_at_5s() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(250));
        assert_eq!(policy.delay_before(3), Duration::from_millis(500));
        assert_eq!(policy.delay_before(6), Duration::from_millis(4000));
        assert_eq!(policy.delay_before(7), Duration::from_secs(5));
        assert_eq!(policy.delay_before(13), Duration::from_secs(5));
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = FetchPolicy::immediate();
        assert_eq!(policy.max_attempts, MAX_FETCH_ATTEMPTS);
        for attempt in 1..=13 {
            assert_eq!(policy.delay_before(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn retryable_covers_network_and_5xx_only() {
        let server_down = ApiError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        let bad_request = ApiError::Server {
            status: 400,
            message: "missing name".into(),
        };
        assert!(server_down.retryable());
        assert!(!bad_request.retryable());
        assert!(!ApiError::SessionExpired.retryable());
        assert!(!ApiError::MissingToken.retryable());
    }

    #[test]
    fn blank_token_counts_as_logged_out() {
        assert!(!Session::new(None).has_token());
        assert!(!Session::new(Some("   ".into())).has_token());
        assert!(Session::new(Some("abc".into())).has_token());
    }

    #[tokio::test]
    async fn fetch_without_token_fails_before_any_request() {
        let client = ApiClient::new("http://127.0.0.1:1", Session::new(None), 5).unwrap();
        let err = client.fetch_all::<Booking>(Collection::Bookings).await;
        assert!(matches!(err, Err(ApiError::MissingToken)));
    }

    #[tokio::test]
    async fn fetch_counts_records_it_cannot_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "_id": "b1", "name": "Asha", "status": "confirmed" },
                    { "_id": "b2", "name": "Maya", "status": "arrived" },
                    "not even an object"
                ]
            })))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Session::new(Some("tok".into())), 5).unwrap();
        let batch = client
            .fetch_all::<Booking>(Collection::Bookings)
            .await
            .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, "b1");
        assert_eq!(batch.skipped, 2);
    }

    #[tokio::test]
    async fn unauthorized_becomes_session_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spas"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Session::new(Some("stale".into())), 5).unwrap();
        let err = client.fetch_all::<Spa>(Collection::Spas).await;
        assert!(matches!(err, Err(ApiError::SessionExpired)));
    }

    #[tokio::test]
    async fn server_message_wins_over_status_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "message": "db offline" })),
            )
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Session::new(Some("tok".into())), 5).unwrap();
        let err = client.fetch_all::<User>(Collection::Users).await.unwrap_err();
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "db offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_returns_the_token_without_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "fresh" })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), Session::new(None), 5).unwrap();
        let token = client.login("admin@example.com", "hunter2").await.unwrap();
        assert_eq!(token, "fresh");
    }

    #[tokio::test]
    async fn create_posts_the_payload_and_decodes_the_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/spas"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({ "name": "Zen Garden Spa", "startingPrice": 3500 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "s9",
                "name": "Zen Garden Spa",
                "startingPrice": 3500,
                "discount": 0,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Session::new(Some("tok".into())), 5).unwrap();
        let created: Spa = client
            .create(
                Collection::Spas,
                &json!({ "name": "Zen Garden Spa", "startingPrice": 3500 }),
            )
            .await
            .unwrap();
        // the id comes from the server
        assert_eq!(created.id, "s9");
        assert_eq!(created.starting_price, 3500.0);
    }

    #[tokio::test]
    async fn update_returns_the_server_side_copy() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bookings/b7"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({ "status": "confirmed" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "b7",
                "name": "Asha Rai",
                "serviceTital": "Hot Stone",
                "status": "confirmed",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Session::new(Some("tok".into())), 5).unwrap();
        let updated: Booking = client
            .update(Collection::Bookings, "b7", &json!({ "status": "confirmed" }))
            .await
            .unwrap();
        // the local copy is whatever the server sent back, not the submitted body
        assert_eq!(updated.id, "b7");
        assert_eq!(updated.name, "Asha Rai");
        assert_eq!(updated.service_title, "Hot Stone");
        assert_eq!(updated.status, Some(BookingStatus::Confirmed));
    }

    #[tokio::test]
    async fn summary_derives_discounted_and_pending_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spas"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "_id": "s1", "name": "Zen", "discount": 10 },
                    { "_id": "s2", "name": "Aqua", "discount": 0 },
                    { "_id": "s3", "name": "Lotus", "discount": 25 },
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "_id": "b1", "name": "Asha", "status": "pending" },
                    { "_id": "b2", "name": "Maya", "status": "confirmed" },
                ]
            })))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Session::new(Some("tok".into())), 5).unwrap();

        let (collection, stats) = client
            .collection_summary(Collection::Spas, FetchPolicy::immediate())
            .await;
        let stats = stats.unwrap();
        assert_eq!(collection, Collection::Spas);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.discounted, Some(2));
        assert_eq!(stats.pending, None);

        let (_, stats) = client
            .collection_summary(Collection::Bookings, FetchPolicy::immediate())
            .await;
        let stats = stats.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, Some(1));
        assert_eq!(stats.discounted, None);
    }
}
