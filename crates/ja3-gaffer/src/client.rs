use crate::config::GafferConfig;
use crate::operation::AddElements;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ja3_domain::{GraphSubmitter, MutationBatch, SubmitError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

/// Operation execution endpoint, relative to the store's base URL.
pub const EXECUTE_PATH: &str = "/rest/v2/graph/operations/execute";

/// HTTP client for the graph store's REST API.
#[derive(Clone, Debug)]
pub struct GafferClient {
    client: reqwest::Client,
    execute_url: Url,
}

impl GafferClient {
    pub fn new(config: &GafferConfig) -> Result<Self> {
        let execute_url = format!("{}{}", config.base_url.trim_end_matches('/'), EXECUTE_PATH);
        let execute_url = Url::parse(&execute_url)
            .with_context(|| format!("Invalid Gaffer URL: {}", config.base_url))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        info!(url = %execute_url, timeout = ?config.timeout, "Created Gaffer client");
        Ok(Self {
            client,
            execute_url,
        })
    }
}

#[async_trait]
impl GraphSubmitter for GafferClient {
    async fn submit(&self, batch: &MutationBatch) -> Result<(), SubmitError> {
        let body = serde_json::to_vec(&AddElements::validated(batch))?;

        debug!(
            url = %self.execute_url,
            elements = batch.len(),
            size_bytes = body.len(),
            "Posting AddElements operation"
        );

        let response = self
            .client
            .post(self.execute_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(format!("{:#}", anyhow::Error::from(e))))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(status = status.as_u16(), error = %e, "Failed to read rejection body");
                    format!("<unreadable body: {:#}>", anyhow::Error::from(e))
                }
            };
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(elements = batch.len(), "Graph store accepted batch");
        Ok(())
    }
}
