//! Pingdom API client
//!
//! Lists the account's checks once at construction and answers per-check
//! availability queries through `/summary.average`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::PingdomCredentials;
use crate::error::SourceError;
use crate::source::UptimeSource;
use crate::uptime::RawAvailability;

pub const DEFAULT_API_URL: &str = "https://api.pingdom.com/api/2.0";

/// `/checks` response
#[derive(Debug, Deserialize)]
struct ChecksResponse {
    checks: Vec<Check>,
}

#[derive(Debug, Deserialize, Clone)]
struct Check {
    id: u64,
    name: String,
}

/// `/summary.average/{id}` response types
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    status: SummaryStatus,
}

#[derive(Debug, Deserialize)]
struct SummaryStatus {
    totalup: f64,
    totaldown: f64,
}

/// Immutable check name to id lookup, built once per client
#[derive(Debug, Clone, Default)]
pub struct CheckDirectory {
    names: Vec<String>,
    ids: HashMap<String, u64>,
}

impl CheckDirectory {
    fn from_checks(checks: Vec<Check>) -> Self {
        let mut names = Vec::with_capacity(checks.len());
        let mut ids = HashMap::with_capacity(checks.len());
        for check in checks {
            if let Entry::Vacant(slot) = ids.entry(check.name.clone()) {
                slot.insert(check.id);
                names.push(check.name);
            }
        }
        Self { names, ids }
    }

    pub fn id(&self, name: &str) -> Option<u64> {
        self.ids.get(name).copied()
    }

    /// Check names in the order the API listed them.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Pingdom API client for making authenticated requests
#[derive(Clone)]
pub struct PingdomApi {
    /// Base URL for the Pingdom API
    api_uri: String,
    /// HTTP client with authentication headers
    client: Client,
    directory: CheckDirectory,
}

impl PingdomApi {
    /// Creates a Pingdom client and loads the check directory
    ///
    /// # Arguments
    ///
    /// * `credentials` - Account email, password and application key
    /// * `api_uri` - The base URL for the Pingdom API (e.g., <https://api.pingdom.com/api/2.0>)
    ///
    /// # Returns
    ///
    /// * `Ok(PingdomApi)` with an immutable check directory
    /// * `Err(SourceError::Unavailable)` if the client cannot be built or checks cannot be listed
    pub async fn connect(credentials: &PingdomCredentials, api_uri: &str) -> Result<Self, SourceError> {
        let basic = BASE64_STANDARD.encode(format!("{}:{}", credentials.email, credentials.password));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Basic {basic}")).map_err(unavailable)?,
        );
        headers.insert(
            "App-Key",
            header::HeaderValue::from_str(&credentials.app_key).map_err(unavailable)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(unavailable)?;

        let checks = list_checks(&client, api_uri).await?;
        info!(count = checks.len(), "Loaded Pingdom checks");

        Ok(PingdomApi {
            api_uri: api_uri.to_string(),
            client,
            directory: CheckDirectory::from_checks(checks),
        })
    }

    pub fn directory(&self) -> &CheckDirectory {
        &self.directory
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        endpoint(&self.api_uri, segments)
    }
}

fn unavailable(error: impl std::fmt::Display) -> SourceError {
    SourceError::Unavailable(error.to_string())
}

fn endpoint(api_uri: &str, segments: &[&str]) -> Result<Url, SourceError> {
    let mut url = Url::parse(api_uri).map_err(unavailable)?;
    url.path_segments_mut()
        .map_err(|_| unavailable("cannot be base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn list_checks(client: &Client, api_uri: &str) -> Result<Vec<Check>, SourceError> {
    let url = endpoint(api_uri, &["checks"])?;
    let resp = client.get(url).send().await.map_err(unavailable)?;
    if !resp.status().is_success() {
        return Err(unavailable(format!(
            "HTTP {} while listing checks",
            resp.status().as_u16()
        )));
    }
    let parsed: ChecksResponse = resp.json().await.map_err(unavailable)?;
    Ok(parsed.checks)
}

#[async_trait]
impl UptimeSource for PingdomApi {
    async fn checks(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.directory.names().to_vec())
    }

    /// Retrieves total up/down seconds for a check over `[from, to)`
    async fn fetch(
        &self,
        check: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RawAvailability, SourceError> {
        let check_id = self
            .directory
            .id(check)
            .ok_or_else(|| SourceError::UnknownCheck(check.to_string()))?;

        let id = check_id.to_string();
        let mut url = self.endpoint(&["summary.average", id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("from", &from.timestamp().to_string())
            .append_pair("to", &to.timestamp().to_string())
            .append_pair("includeuptime", "true");

        debug!(check = check, check_id = check_id, "Fetching summary");
        let resp = self.client.get(url).send().await.map_err(unavailable)?;
        if !resp.status().is_success() {
            return Err(unavailable(format!(
                "HTTP {} from summary.average for check {check}",
                resp.status().as_u16()
            )));
        }

        let parsed: SummaryResponse = resp.json().await.map_err(unavailable)?;
        let status = parsed.summary.status;
        Ok(RawAvailability::new(status.totalup, status.totaldown))
    }
}
