//! Backend API client.
//!
//! Speaks to an MDM-style backend: a paged patch-title catalog, per-title
//! vendor summaries, per-title device reports, and the computer inventory.
//! Every listing drains through [`collect_paged`], so the envelope
//! handling and stop rule are identical at each call site.
//!
//! Token acquisition supports the OAuth client-credentials grant, a
//! basic-auth fallback over two token endpoints, or a pre-acquired bearer
//! token. There is no refresh; a run is single-shot.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{DeviceRecord, TrackedItem};
use crate::paging::collect_paged;

/// Page size for catalog and patch-report listings.
const DEFAULT_PAGE_SIZE: u32 = 200;

/// Page size the inventory endpoint prefers.
const INVENTORY_PAGE_SIZE: u32 = 100;

/// Per-request timeout; resilience beyond this is the caller's problem.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Errors from the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success response; carries the status and body for diagnosis.
    #[error("{context}: HTTP {status}: {body}")]
    Status {
        context: &'static str,
        status: u16,
        body: String,
    },

    /// The response decoded but did not match the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// No configured credential path produced a bearer token.
    #[error("failed to obtain a bearer token")]
    TokenUnavailable,
}

/// How to obtain the bearer token.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// OAuth client-credentials grant against `/api/oauth/token`.
    OAuth {
        client_id: String,
        client_secret: String,
    },

    /// Username/password against the basic token endpoints.
    Basic { username: String, password: String },

    /// A token acquired elsewhere; no token request is made.
    Bearer(String),
}

/// Client for the backend compliance API.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Connect: build the HTTP client and acquire a bearer token.
    pub async fn connect(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let token = match credentials {
            Credentials::Bearer(token) => token,
            Credentials::OAuth {
                client_id,
                client_secret,
            } => fetch_oauth_token(&client, &base_url, &client_id, &client_secret).await?,
            Credentials::Basic { username, password } => {
                fetch_basic_token(&client, &base_url, &username, &password).await?
            }
        };

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Create a client with a custom base URL and token (for testing).
    pub fn with_base_url(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// GET a JSON document, mapping non-success responses to
    /// [`ApiError::Status`] with the body attached.
    async fn get_json(&self, context: &'static str, url: String) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                context,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }

    /// List the full patch-title catalog, sorted by title.
    pub async fn list_titles(&self) -> Result<Vec<TrackedItem>, ApiError> {
        let raw = collect_paged(DEFAULT_PAGE_SIZE, async |page: u32, page_size: u32| {
            let url = format!(
                "{}/api/v2/patch-software-title-configurations?page={}&page-size={}",
                self.base_url, page, page_size
            );
            self.get_json("listing patch titles", url).await
        })
        .await?;

        let mut titles: Vec<TrackedItem> = raw.iter().filter_map(tracked_item_from_value).collect();
        titles.sort_by_key(|t| t.title.to_lowercase());
        Ok(titles)
    }

    /// Vendor-reported patch summary for one title.
    pub async fn patch_summary(&self, title_id: &str) -> Result<PatchSummary, ApiError> {
        let url = format!(
            "{}/api/v2/patch-software-title-configurations/{}/patch-summary",
            self.base_url,
            urlencoding::encode(title_id)
        );
        let value = self.get_json("fetching patch summary", url).await?;
        Ok(summary_from_value(value)?)
    }

    /// Full per-device patch report for one title.
    pub async fn patch_report(&self, title_id: &str) -> Result<Vec<DeviceRecord>, ApiError> {
        let raw = collect_paged(DEFAULT_PAGE_SIZE, async |page: u32, page_size: u32| {
            let url = format!(
                "{}/api/v2/patch-software-title-configurations/{}/patch-report?page={}&page-size={}",
                self.base_url,
                urlencoding::encode(title_id),
                page,
                page_size
            );
            self.get_json("fetching patch report", url).await
        })
        .await?;

        raw.into_iter()
            .map(|row| serde_json::from_value::<DeviceRecord>(row).map_err(ApiError::from))
            .collect()
    }

    /// Computer inventory with the general section (last contact times).
    pub async fn list_inventory(&self) -> Result<Vec<InventoryRecord>, ApiError> {
        let raw = collect_paged(INVENTORY_PAGE_SIZE, async |page: u32, page_size: u32| {
            let url = format!(
                "{}/api/v1/computers-inventory?section={}&page={}&page-size={}",
                self.base_url,
                urlencoding::encode("GENERAL"),
                page,
                page_size
            );
            self.get_json("fetching inventory", url).await
        })
        .await?;

        raw.into_iter()
            .map(|row| serde_json::from_value::<InventoryRecord>(row).map_err(ApiError::from))
            .collect()
    }
}

/// Vendor patch summary for one title.
///
/// Some backends wrap this in a one-element array; [`summary_from_value`]
/// unwraps either shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchSummary {
    /// Vendor-reported latest version.
    #[serde(default, rename = "latestVersion")]
    pub latest_version: String,

    /// Release date of the latest version.
    #[serde(default, rename = "releaseDate")]
    pub release_date: String,

    /// Alternate field name some backends use for the release date.
    #[serde(default, rename = "releaseDateTime")]
    pub release_date_time: String,

    /// Hosts already on the latest version.
    #[serde(default, rename = "hostsOnLatestVersion")]
    pub hosts_on_latest: u64,

    /// Hosts behind the latest version.
    #[serde(default, rename = "hostsOutOfDate")]
    pub hosts_out_of_date: u64,
}

impl PatchSummary {
    /// Release date for report rows: whichever field is populated,
    /// truncated to the date portion.
    pub fn release_date_label(&self) -> String {
        let raw = if !self.release_date.is_empty() {
            &self.release_date
        } else {
            &self.release_date_time
        };
        raw.chars().take(10).collect()
    }
}

/// One inventory row; only the general section matters here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(default)]
    pub general: InventoryGeneral,
}

/// General inventory section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryGeneral {
    /// Last check-in timestamp as reported.
    #[serde(default, rename = "lastContactTime")]
    pub last_contact_time: String,
}

/// Decode a patch summary from a bare object or a one-element array.
fn summary_from_value(value: Value) -> Result<PatchSummary, serde_json::Error> {
    let value = match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Ok(PatchSummary::default());
            }
            items.swap_remove(0)
        }
        other => other,
    };
    serde_json::from_value(value)
}

/// Build a catalog entry from a raw listing row.
///
/// Rows without an identifier are dropped; the display title falls back
/// through the field names different backend versions use.
fn tracked_item_from_value(value: &Value) -> Option<TrackedItem> {
    let id = value.get("id").map(value_to_string).unwrap_or_default();
    if id.is_empty() {
        return None;
    }

    let title = ["displayName", "softwareTitleName", "name"]
        .iter()
        .find_map(|key| {
            value
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("Title {id}"));

    Some(TrackedItem { id, title })
}

/// Coerce a JSON scalar to a string; non-scalars become empty.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// OAuth client-credentials grant.
async fn fetch_oauth_token(
    client: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, ApiError> {
    let url = format!("{base_url}/api/oauth/token");
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];

    let response = client
        .post(&url)
        .form(&params)
        .header("accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ApiError::TokenUnavailable);
    }
    let body: Value = response.json().await?;
    body.get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ApiError::TokenUnavailable)
}

/// Basic-auth token acquisition, trying both endpoint generations.
async fn fetch_basic_token(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<String, ApiError> {
    for endpoint in ["/api/v1/auth/token", "/uapi/auth/tokens"] {
        let url = format!("{base_url}{endpoint}");
        let response = client
            .post(&url)
            .basic_auth(username, Some(password))
            .send()
            .await?;

        if !response.status().is_success() {
            continue;
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let token = body
            .get("token")
            .or_else(|| body.get("bearerToken"))
            .and_then(Value::as_str);
        if let Some(token) = token {
            return Ok(token.to_string());
        }
    }
    Err(ApiError::TokenUnavailable)
}
