use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::models::{GenerateRequest, truncate_error_message};
use super::GenerativeService;

/// モデルゲートウェイへの応答ボディ。
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// モデルゲートウェイHTTPクライアント。
///
/// 単一の `v1/generate` エンドポイントにプロンプトと任意の画像を送り、
/// 生成テキストを受け取る。リトライは行わない（single-attempt-with-fallback）。
#[derive(Debug, Clone)]
pub struct ModelGatewayClient {
    client: Client,
    base_url: Url,
    generate_timeout: Duration,
}

impl ModelGatewayClient {
    /// # Errors
    /// HTTPクライアントの構築、またはベースURLのパースに失敗した場合はエラーを返す。
    pub fn new(base_url: impl Into<String>, generate_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build model-gateway client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid model-gateway base URL")?;

        Ok(Self {
            client,
            base_url,
            generate_timeout,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: Url::parse(&base_url.into()).unwrap(),
            generate_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl GenerativeService for ModelGatewayClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let url = self
            .base_url
            .join("v1/generate")
            .context("failed to build model-gateway generate URL")?;

        debug!(
            prompt_chars = request.prompt.chars().count(),
            has_image = request.image.is_some(),
            "sending generate request to model-gateway"
        );

        let response = self
            .client
            .post(url)
            .json(&request)
            .timeout(self.generate_timeout)
            .send()
            .await
            .context("model-gateway generate request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let truncated_body = truncate_error_message(&body);
            return Err(anyhow!(
                "model-gateway generate endpoint returned error status {status}: {truncated_body}"
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("failed to deserialize model-gateway response")?;

        Ok(body.text)
    }

    async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("health")
            .context("failed to build model-gateway health URL")?;

        self.client
            .get(url)
            .send()
            .await
            .context("model-gateway health request failed")?
            .error_for_status()
            .context("model-gateway health endpoint returned error status")?;

        Ok(())
    }
}
