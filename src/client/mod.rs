//! HTTP client for the Shelly Cloud API.
//!
//! Endpoint methods are grouped by concern in the submodules; this module owns
//! request construction, authentication headers and response classification.

mod apps;
mod backups;
mod configs;
mod deploys;
pub mod error;
mod logs;
mod users;

pub use apps::{
    AppAttributes, AppSummary, CommandResult, ConsoleConnection, CreateAppRequest,
    CreatedApp, Deployment, GitInfo, Organization,
};
pub use backups::BackupAttributes;
pub use configs::ConfigFile;
pub use deploys::{DeployLog, DeployLogSummary};
pub use error::{ApiError, ErrorPayload};
pub use logs::{LogDownload, LogRange, LogsPage, LogsQuery};
pub use users::Collaborator;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const HEADER_CLIENT_VERSION: &str = "shelly-version";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl Client {
    pub fn new(api_url: &str, token: Option<String>, timeout: Duration) -> ApiResult<Self> {
        let base_url = Url::parse(api_url).map_err(|e| ApiError::Url(format!("{api_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Url(api_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(HEADER_CLIENT_VERSION, HeaderValue::from_static(VERSION));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("shelly/{VERSION}"))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Same client authenticated with another token.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    /// Build an API URL from individually percent-encoded path segments.
    pub fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let url = self.url(segments)?;
        Ok(self.authorize(self.http.request(method, url)))
    }

    /// Request an absolute URL handed out by the API (log streams, downloads).
    pub(crate) fn request_url(&self, method: Method, url: &str) -> ApiResult<RequestBuilder> {
        let url = Url::parse(url).map_err(|e| ApiError::Url(format!("{url}: {e}")))?;
        Ok(self.authorize(self.http.request(method, url)))
    }

    /// Send a request and turn non-2xx responses into typed errors.
    pub(crate) async fn execute(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.http.execute(request).await?;
        let status = response.status();
        debug!(%method, %url, %status, "API request");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        debug!(%status, body = %String::from_utf8_lossy(&body), "API error response");
        Err(ApiError::from_status(status, ErrorPayload::from_bytes(&body)))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let body: Bytes = self.execute(builder).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_unit(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.execute(builder).await?;
        Ok(())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send_json(self.request(Method::GET, segments)?).await
    }

    pub(crate) async fn get_with_query<T, Q>(&self, segments: &[&str], query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::GET, segments)?.query(query))
            .await
    }

    pub(crate) async fn post<B, T>(&self, segments: &[&str], body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, segments)?.json(body))
            .await
    }

    pub(crate) async fn post_unit<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<()> {
        self.send_unit(self.request(Method::POST, segments)?.json(body))
            .await
    }

    pub(crate) async fn put<B, T>(&self, segments: &[&str], body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PUT, segments)?.json(body))
            .await
    }

    pub(crate) async fn put_unit<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<()> {
        self.send_unit(self.request(Method::PUT, segments)?.json(body))
            .await
    }

    pub(crate) async fn delete(&self, segments: &[&str]) -> ApiResult<()> {
        self.send_unit(self.request(Method::DELETE, segments)?).await
    }

    pub(crate) async fn delete_with_body<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<()> {
        self.send_unit(self.request(Method::DELETE, segments)?.json(body))
            .await
    }

    /// Web dashboard URL, used for billing links.
    pub async fn shellyapp_url(&self) -> ApiResult<String> {
        #[derive(serde::Deserialize)]
        struct ShellyApp {
            url: String,
        }

        let response: ShellyApp = self.get(&["shellyapp"]).await?;
        Ok(response.url)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    pub(crate) fn test_client(server: &MockServer) -> Client {
        Client::new(
            &server.base_url(),
            Some("abc".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_encodes_each_segment() {
        let client = Client::new(
            "https://api.example.com/apiv2",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client
            .url(&["apps", "foo-staging", "configs", "config/app.yml"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/apiv2/apps/foo-staging/configs/config%2Fapp.yml"
        );
    }

    #[test]
    fn test_url_with_trailing_slash() {
        let client =
            Client::new("https://api.example.com/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url(&["apps"]).unwrap().as_str(),
            "https://api.example.com/apps"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            Client::new("not a url", None, Duration::from_secs(5)),
            Err(ApiError::Url(_))
        ));
        assert!(matches!(
            Client::new("mailto:bob@example.com", None, Duration::from_secs(5)),
            Err(ApiError::Url(_))
        ));
    }

    #[tokio::test]
    async fn test_sends_auth_and_version_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/shellyapp")
                    .header("authorization", "Bearer abc")
                    .header("shelly-version", VERSION)
                    .header("accept", "application/json");
                then.status(200)
                    .json_body(json!({"url": "https://shellyapp.example.com"}));
            })
            .await;

        let url = test_client(&server).shellyapp_url().await.unwrap();
        assert_eq!(url, "https://shellyapp.example.com");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_classifies_error_responses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/shellyapp");
                then.status(412)
                    .json_body(json!({"required_version": "0.5.0"}));
            })
            .await;

        let err = test_client(&server).shellyapp_url().await.unwrap_err();
        match err {
            ApiError::VersionMismatch(payload) => {
                assert_eq!(payload.get("required_version"), Some("0.5.0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_with_html_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/shellyapp");
                then.status(500).body("<html>oops</html>");
            })
            .await;

        let err = test_client(&server).shellyapp_url().await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status, .. } if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/shellyapp");
                then.status(200).body("not json");
            })
            .await;

        let err = test_client(&server).shellyapp_url().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
