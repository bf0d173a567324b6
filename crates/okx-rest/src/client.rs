//! REST client built on the shared signing primitive

use okx_auth::{iso_millis, Credentials};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{RestError, RestResult};

/// Production REST base URL
const LIVE_URL: &str = "https://www.okx.com";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent header
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: LIVE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

/// Response envelope shared by every endpoint: `{code, msg, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Result code ("0" on success)
    pub code: String,
    /// Human-readable message
    #[serde(default)]
    pub msg: String,
    /// Result rows
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the data rows, mapping a non-zero code to an error
    pub fn into_data(self) -> RestResult<Vec<T>> {
        if self.code == "0" {
            Ok(self.data)
        } else {
            Err(RestError::Api {
                code: self.code,
                message: self.msg,
            })
        }
    }
}

/// REST client for the OKX V5 API
///
/// Public requests need no credentials; signed requests require them
/// and carry the `OK-ACCESS-*` header set. Endpoint methods are
/// marshaling over [`OkxRestClient::get`] and [`OkxRestClient::post`].
///
/// # Example
///
/// ```no_run
/// use okx_rest::OkxRestClient;
/// use okx_auth::Credentials;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let creds = Credentials::from_env()?;
///     let client = OkxRestClient::with_credentials(creds);
///     let balance: Vec<serde_json::Value> =
///         client.get("/api/v5/account/balance", &[]).await?;
///     println!("{:?}", balance);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct OkxRestClient {
    http_client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl OkxRestClient {
    /// Create a client for public endpoints only
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default(), None)
    }

    /// Create a client with credentials for signed requests
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self::with_config(ClientConfig::default(), Some(credentials))
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig, credentials: Option<Credentials>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_deref().unwrap_or("okx-rest/0.1.0"))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: config.base_url,
            credentials,
        }
    }

    /// Check if the client can issue signed requests
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Unsigned GET for public endpoints
    pub async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> RestResult<Vec<T>> {
        let request_path = Self::path_with_query(path, query)?;
        let url = format!("{}{}", self.base_url, request_path);
        debug!("GET {}", url);

        let response: ApiResponse<T> = self.http_client.get(&url).send().await?.json().await?;
        response.into_data()
    }

    /// Signed GET
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> RestResult<Vec<T>> {
        let request_path = Self::path_with_query(path, query)?;
        let url = format!("{}{}", self.base_url, request_path);
        debug!("GET {} (signed)", url);

        let request = self.http_client.get(&url);
        let request = self.sign_request(request, "GET", &request_path, "")?;
        let response: ApiResponse<T> = request.send().await?.json().await?;
        response.into_data()
    }

    /// Signed POST with a JSON body
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> RestResult<Vec<T>> {
        let body_json = serde_json::to_string(body)?;
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} (signed)", url);

        let request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body_json.clone());
        let request = self.sign_request(request, "POST", path, &body_json)?;
        let response: ApiResponse<T> = request.send().await?.json().await?;
        response.into_data()
    }

    /// Attach the `OK-ACCESS-*` header set
    ///
    /// The signature covers `timestamp + method + request_path + body`
    /// with the millisecond ISO-8601 timestamp; the demo-trading marker
    /// header is added for testnet credentials.
    fn sign_request(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> RestResult<reqwest::RequestBuilder> {
        let creds = self.credentials.as_ref().ok_or(RestError::AuthRequired)?;

        let timestamp = iso_millis();
        let signature = creds.sign(&timestamp, method, request_path, body);

        let mut request = request
            .header("OK-ACCESS-KEY", creds.api_key())
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", creds.passphrase());
        if creds.is_testnet() {
            request = request.header("x-simulated-trading", "1");
        }
        Ok(request)
    }

    fn path_with_query(path: &str, query: &[(&str, &str)]) -> RestResult<String> {
        if query.is_empty() {
            return Ok(path.to_string());
        }
        let encoded = serde_urlencoded::to_string(query)?;
        Ok(format!("{}?{}", path, encoded))
    }
}

impl Default for OkxRestClient {
    fn default() -> Self {
        Self::new()
    }
}
