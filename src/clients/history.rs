use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;

/// 検索履歴シンクへ送る1レコード。
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub user_id: Option<String>,
    pub item_count: usize,
    pub budget: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub outcome: &'static str,
}

/// 履歴記録境界。fire-and-forget であり、失敗しても推薦呼び出しは失敗しない。
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// 1レコードを記録する。
    ///
    /// # Errors
    /// 転送失敗、またはエラーステータスの場合はエラーを返す。
    async fn record(&self, entry: HistoryEntry) -> Result<()>;
}

/// 履歴シンクが構成されていない場合のno-op実装。
#[derive(Debug, Default, Clone)]
pub struct NoopHistorySink;

#[async_trait]
impl HistorySink for NoopHistorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        debug!(
            item_count = entry.item_count,
            budget = entry.budget,
            "history sink disabled, dropping entry"
        );
        Ok(())
    }
}

/// バックエンドの履歴エンドポイントへPOSTする実装。
#[derive(Debug, Clone)]
pub struct HttpHistorySink {
    client: Client,
    endpoint: Url,
}

impl HttpHistorySink {
    /// # Errors
    /// エンドポイントURLのパース、またはHTTPクライアント構築に失敗した場合はエラーを返す。
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(&endpoint.into()).context("invalid history sink URL")?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("failed to build history sink client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl HistorySink for HttpHistorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        self.client
            .post(self.endpoint.clone())
            .json(&entry)
            .send()
            .await
            .context("history sink request failed")?
            .error_for_status()
            .context("history sink returned error status")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_sink_posts_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search-history"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let sink = HttpHistorySink::new(format!("{}/v1/search-history", server.uri())).unwrap();
        sink.record(HistoryEntry {
            user_id: Some("u1".to_string()),
            item_count: 4,
            budget: 20.0,
            note: None,
            outcome: "ok",
        })
        .await
        .expect("record succeeds");
    }

    #[tokio::test]
    async fn noop_sink_always_succeeds() {
        let sink = NoopHistorySink;
        sink.record(HistoryEntry {
            user_id: None,
            item_count: 0,
            budget: 1.0,
            note: None,
            outcome: "ok",
        })
        .await
        .expect("noop always ok");
    }
}
