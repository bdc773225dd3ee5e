use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::entity::{Entity, Page, Record, RecordId};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response shape from {url}")]
    UnexpectedShape { url: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout_seconds: 10,
            proxy: None,
        }
    }
}

/// Authenticated client for the patient history endpoints.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: String,
    base: Url,
    token: Option<String>,
}

fn build_http_client(timeout_seconds: u64, proxy: Option<&str>) -> Result<reqwest::Client, ApiError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        )),
    );

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_seconds.max(1)));

    builder = match proxy.filter(|p| !p.trim().is_empty()) {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| ApiError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| ApiError::HttpClientBuild { source: e })
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ApiError> {
    let invalid = |message: String| ApiError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };
    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http(s) URL".to_string()));
    }
    Ok(url)
}

impl ApiClient {
    pub fn new(options: ClientOptions) -> Result<Self, ApiError> {
        let http = build_http_client(options.timeout_seconds, options.proxy.as_deref())?;
        Self::with_http_client(http, &options.endpoint, options.token)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: &str,
        token: Option<String>,
    ) -> Result<Self, ApiError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        let base = parse_endpoint(&endpoint)?;
        Ok(Self {
            http,
            endpoint,
            base,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Appends `segments` to the endpoint path, percent-encoding each one so
    /// ids cannot change the route. The empty last segment keeps the trailing
    /// slash the backend routes expect.
    fn route(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments).push("");
        }
        url
    }

    pub fn list_url(&self, entity: Entity, patient_id: &str, page: u32) -> String {
        let mut url = self.route(&["api", "patient", "fetch", patient_id, entity.path_segment()]);
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url.into()
    }

    pub fn record_url(&self, entity: Entity, patient_id: &str, record_id: RecordId) -> String {
        let record_id = record_id.to_string();
        self.route(&["api", "patient", "fetch", patient_id, entity.path_segment(), &record_id])
            .into()
    }

    pub fn update_url(&self, entity: Entity, patient_id: &str, record_id: RecordId) -> String {
        let record_id = record_id.to_string();
        self.route(&["api", "patient", "update", patient_id, entity.path_segment(), &record_id])
            .into()
    }

    pub fn create_url(&self, entity: Entity, patient_id: &str) -> String {
        self.route(&["api", "patient", "create", patient_id, entity.path_segment()])
            .into()
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
        match self.token.as_deref() {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, format!("Token {token}")),
            None => builder,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        debug!(%url, "GET");
        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.to_string(),
                source: e,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.json::<Value>().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            source: e,
        })
    }

    pub async fn try_fetch_page(
        &self,
        entity: Entity,
        patient_id: &str,
        page: u32,
    ) -> Result<Page, ApiError> {
        let url = self.list_url(entity, patient_id, page);
        let value = self.get_json(&url).await?;
        serde_json::from_value::<Page>(value).map_err(|_| ApiError::UnexpectedShape { url })
    }

    /// Fetches one page of `entity` records. Every failure is logged and
    /// reported as `None`; callers skip rendering and keep what they show.
    pub async fn fetch_page(&self, entity: Entity, patient_id: &str, page: u32) -> Option<Page> {
        match self.try_fetch_page(entity, patient_id, page).await {
            Ok(page) => Some(page),
            Err(e) => {
                error!(%entity, page, error = %e, "error fetching patient history");
                None
            }
        }
    }

    pub async fn try_fetch_record(
        &self,
        entity: Entity,
        patient_id: &str,
        record_id: RecordId,
    ) -> Result<Record, ApiError> {
        let url = self.record_url(entity, patient_id, record_id);
        match self.get_json(&url).await? {
            Value::Object(object) => Ok(Record::from_object(object, record_id)),
            _ => Err(ApiError::UnexpectedShape { url }),
        }
    }

    pub async fn fetch_record(
        &self,
        entity: Entity,
        patient_id: &str,
        record_id: RecordId,
    ) -> Option<Record> {
        match self.try_fetch_record(entity, patient_id, record_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                error!(%entity, %record_id, error = %e, "error fetching patient history record");
                None
            }
        }
    }

    /// Sends `body` as JSON. The reply body is optional and only logged; an
    /// undecodable reply is not an error.
    async fn send_json(
        &self,
        method: Method,
        url: String,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, ApiError> {
        debug!(%url, %method, "sending record");
        let resp = self
            .authorize(self.http.request(method, &url))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                source: e,
            })?;
        let status = resp.status();
        let reply = resp.json::<Value>().await.ok();
        debug!(%url, status = status.as_u16(), reply = ?reply, "write response");
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(reply)
    }

    /// PUTs `body` to the update endpoint.
    pub async fn update_record(
        &self,
        entity: Entity,
        patient_id: &str,
        record_id: RecordId,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.update_url(entity, patient_id, record_id);
        let reply = self.send_json(Method::PUT, url, body).await?;
        info!(%entity, %record_id, "record updated");
        Ok(reply)
    }

    /// POSTs `body` as a new record of `entity`.
    pub async fn create_record(
        &self,
        entity: Entity,
        patient_id: &str,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.create_url(entity, patient_id);
        let reply = self.send_json(Method::POST, url, body).await?;
        info!(%entity, "record created");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::stub::{StubResponse, StubServer};
    use serde_json::json;

    fn client(endpoint: &str) -> ApiClient {
        ApiClient::new(ClientOptions {
            endpoint: endpoint.to_string(),
            token: Some("tok123".to_string()),
            timeout_seconds: 5,
            proxy: None,
        })
        .unwrap()
    }

    #[test]
    fn urls_match_backend_routes() {
        let c = client("http://api.local/");
        assert_eq!(
            c.list_url(Entity::SurgicalHistory, "8", 2),
            "http://api.local/api/patient/fetch/8/surgical_history/?page=2"
        );
        assert_eq!(
            c.record_url(Entity::SocialHistory, "8", RecordId(3)),
            "http://api.local/api/patient/fetch/8/social_history/3/"
        );
        assert_eq!(
            c.update_url(Entity::MedicationHistory, "8", RecordId(3)),
            "http://api.local/api/patient/update/8/medication_history/3/"
        );
        assert_eq!(
            c.create_url(Entity::SocialHistory, "8"),
            "http://api.local/api/patient/create/8/social_history/"
        );
    }

    #[test]
    fn patient_id_cannot_change_the_route() {
        let c = client("http://api.local/backend");
        assert_eq!(
            c.record_url(Entity::SocialHistory, "1/../x", RecordId(3)),
            "http://api.local/backend/api/patient/fetch/1%2F..%2Fx/social_history/3/"
        );
        assert_eq!(
            c.list_url(Entity::SocialHistory, "1?page=9", 2),
            "http://api.local/backend/api/patient/fetch/1%3Fpage=9/social_history/?page=2"
        );
    }

    #[test]
    fn endpoint_must_be_an_http_url() {
        for endpoint in ["not a url", "mailto:someone@example.com", "ftp://files.local"] {
            let err = ApiClient::new(ClientOptions {
                endpoint: endpoint.to_string(),
                ..ClientOptions::default()
            })
            .unwrap_err();
            assert!(matches!(err, ApiError::InvalidEndpoint { .. }), "{endpoint}");
        }
    }

    #[tokio::test]
    async fn fetch_page_sends_token_and_parses_body() {
        let server = StubServer::start(|_req| {
            StubResponse::json(
                200,
                json!({"results": [{"id": 1, "diet": "vegan"}], "total_pages": 1, "current_page": 1}),
            )
        })
        .await;
        let c = client(&server.endpoint());

        let page = c.fetch_page(Entity::SocialHistory, "4", 1).await.unwrap();
        assert_eq!(page.results[0].display_value("diet"), "vegan");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/api/patient/fetch/4/social_history/?page=1");
        assert_eq!(requests[0].header("authorization"), Some("Token tok123"));
    }

    #[tokio::test]
    async fn fetch_page_returns_none_on_error_status() {
        for status in [400u16, 401, 404, 500] {
            let server = StubServer::start(move |_req| {
                StubResponse::json(status, json!({"error": "Patient not found."}))
            })
            .await;
            let c = client(&server.endpoint());
            assert!(c.fetch_page(Entity::SocialHistory, "4", 1).await.is_none());
            let err = c.try_fetch_page(Entity::SocialHistory, "4", 1).await.unwrap_err();
            assert_eq!(err.status(), Some(status));
        }
    }

    #[tokio::test]
    async fn fetch_page_returns_none_when_connection_fails() {
        let endpoint = StubServer::unused_endpoint().await;
        let c = client(&endpoint);
        assert!(c.fetch_page(Entity::MedicationHistory, "1", 1).await.is_none());
        assert!(matches!(
            c.try_fetch_page(Entity::MedicationHistory, "1", 1).await,
            Err(ApiError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_page_returns_none_for_unexpected_shape() {
        let server = StubServer::start(|_req| StubResponse::json(200, json!(["not", "a", "page"]))).await;
        let c = client(&server.endpoint());
        assert!(c.fetch_page(Entity::SocialHistory, "4", 1).await.is_none());
    }

    #[tokio::test]
    async fn update_record_puts_json_body() {
        let server = StubServer::start(|_req| StubResponse::json(200, json!({"id": 3}))).await;
        let c = client(&server.endpoint());
        let mut body = Map::new();
        body.insert("diet".to_string(), Value::String("keto".to_string()));

        let reply = c
            .update_record(Entity::SocialHistory, "4", RecordId(3), &body)
            .await
            .unwrap();
        assert_eq!(reply, Some(json!({"id": 3})));

        let requests = server.requests();
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].path, "/api/patient/update/4/social_history/3/");
        assert_eq!(requests[0].json(), Some(json!({"diet": "keto"})));
    }

    #[tokio::test]
    async fn create_record_posts_json_body() {
        let server = StubServer::start(|_req| StubResponse::json(201, json!({"id": 40}))).await;
        let c = client(&server.endpoint());
        let mut body = Map::new();
        body.insert("hospital".to_string(), Value::String("General".to_string()));

        let reply = c
            .create_record(Entity::SurgicalHistory, "4", &body)
            .await
            .unwrap();
        assert_eq!(reply, Some(json!({"id": 40})));

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/api/patient/create/4/surgical_history/");
        assert_eq!(requests[0].header("authorization"), Some("Token tok123"));
        assert_eq!(requests[0].json(), Some(json!({"hospital": "General"})));
    }

    #[tokio::test]
    async fn update_record_tolerates_empty_reply() {
        let server = StubServer::start(|_req| StubResponse::empty(204)).await;
        let c = client(&server.endpoint());
        let reply = c
            .update_record(Entity::SocialHistory, "4", RecordId(3), &Map::new())
            .await
            .unwrap();
        assert_eq!(reply, None);
    }
}
