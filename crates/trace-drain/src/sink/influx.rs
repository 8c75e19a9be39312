//! InfluxDB sink
//!
//! Writes batches through the 1.x HTTP API as line protocol:
//!
//! ```text
//! POST {url}/write?db={database}&precision=ns[&rp={retention_policy}]
//! ```
//!
//! The client is built once and reused; it keeps its own connection pool.

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::PointSink;
use crate::batch::Batch;
use crate::config::SinkSettings;
use crate::error::{DrainError, Result};
use crate::point::encode_lines;
use crate::types::SensitiveString;

/// Line protocol writer over HTTP
pub struct InfluxSink {
    client: Client,
    write_url: Url,
    ping_url: Url,
    database: String,
    username: Option<String>,
    password: Option<SensitiveString>,
}

impl InfluxSink {
    /// Build the HTTP client and resolve endpoint URLs
    pub fn new(settings: &SinkSettings) -> Result<Self> {
        let base = Url::parse(&settings.url)
            .map_err(|e| DrainError::config(format!("invalid sink url '{}': {}", settings.url, e)))?;

        let mut write_url = join(&base, "write")?;
        {
            let mut query = write_url.query_pairs_mut();
            query.append_pair("db", &settings.database);
            query.append_pair("precision", "ns");
            if let Some(ref rp) = settings.retention_policy {
                query.append_pair("rp", rp);
            }
        }
        let ping_url = join(&base, "ping")?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| DrainError::connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            write_url,
            ping_url,
            database: settings.database.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    /// Full write endpoint including query parameters
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.username {
            Some(ref username) => request.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret()),
            ),
            None => request,
        }
    }
}

/// Append a path segment, keeping any base path (e.g. behind a proxy)
fn join(base: &Url, segment: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| DrainError::config(format!("sink url '{}' cannot be a base", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

#[async_trait]
impl PointSink for InfluxSink {
    fn name(&self) -> &str {
        &self.database
    }

    async fn write(&self, batch: &Batch) -> Result<()> {
        let body = encode_lines(batch);
        let bytes = body.len();

        let response = self
            .authorize(self.client.post(self.write_url.clone()))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| DrainError::write(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DrainError::write(format!("{} {}", status, text.trim())));
        }

        debug!(points = batch.len(), bytes, database = %self.database, "Batch written");
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.ping_url.clone()))
            .send()
            .await
            .map_err(|e| DrainError::connection(format!("ping failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DrainError::connection(format!(
                "ping returned {}",
                response.status()
            )))
        }
    }
}
