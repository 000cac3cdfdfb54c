use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use tracing::debug;

use crate::model::DonationRecord;

/// Remote transactional store, reachable by a simple insert-row operation.
/// Mockable seam for the queue manager.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert_donation(&self, record: &DonationRecord) -> Result<()>;
}

/// REST client for a hosted-Postgres table-insert API.
#[derive(Clone)]
pub struct RestStore {
    http: Client,
    base_url: Url,
    api_key: String,
    table: String,
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl RestStore {
    pub fn new(base_url: &str, api_key: String, table: String) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid remote base URL")?;
        let http = Client::builder()
            .user_agent("calsync/0.1")
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            table,
        })
    }

    pub fn build_insert_request(&self, record: &DonationRecord) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("rest/v1/{}", self.table))
            .context("invalid remote base URL")?;
        self.http
            .post(endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(record)
            .build()
            .context("failed to build insert request")
    }

    /// Cheap reachability probe; the agent uses it as the connectivity signal.
    pub async fn ping(&self) -> bool {
        let Ok(endpoint) = self.base_url.join("rest/v1/") else {
            return false;
        };
        self.http
            .head(endpoint)
            .header("apikey", &self.api_key)
            .send()
            .await
            .is_ok()
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn insert_donation(&self, record: &DonationRecord) -> Result<()> {
        let request = self.build_insert_request(record)?;
        debug!(url=%request.url(), "inserting donation row");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach remote store")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from remote store: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("remote store error {}: {}", status, body));
        }
        Ok(())
    }
}
