use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::pipeline::types::PhotoCandidate;

/// 取得済み写真バイト列。
#[derive(Debug, Clone)]
pub struct PhotoBytes {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// 写真供給側の境界。候補のバイト列取得のみを担う。
///
/// パイプラインは最終的に選ばれた写真以外をフル解像度で取得しない。
/// 判定用のサムネイルは `thumbnail_width` 指定で取得する。
#[async_trait]
pub trait PhotoFetcher: Send + Sync {
    /// 候補写真のバイト列を取得する。
    ///
    /// # Errors
    /// URLが不正、転送失敗、エラーステータスの場合はエラーを返す。
    async fn fetch(
        &self,
        candidate: &PhotoCandidate,
        thumbnail_width: Option<u32>,
    ) -> Result<PhotoBytes>;
}

/// `source_url` からHTTPで写真を取得する実装。
#[derive(Debug, Clone)]
pub struct HttpPhotoFetcher {
    client: Client,
}

impl HttpPhotoFetcher {
    /// # Errors
    /// HTTPクライアントの構築に失敗した場合はエラーを返す。
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("failed to build photo fetch client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PhotoFetcher for HttpPhotoFetcher {
    async fn fetch(
        &self,
        candidate: &PhotoCandidate,
        thumbnail_width: Option<u32>,
    ) -> Result<PhotoBytes> {
        let mut url = Url::parse(&candidate.source_url)
            .with_context(|| format!("invalid photo URL for candidate {}", candidate.id))?;
        if let Some(width) = thumbnail_width {
            url.query_pairs_mut().append_pair("w", &width.to_string());
        }

        debug!(
            candidate_id = %candidate.id,
            thumbnail = thumbnail_width.is_some(),
            "fetching photo bytes"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("photo fetch failed for candidate {}", candidate.id))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "photo endpoint returned error status {} for candidate {}",
                response.status(),
                candidate.id
            ));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .context("failed to read photo body")?
            .to_vec();

        Ok(PhotoBytes { bytes, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(url: String) -> PhotoCandidate {
        PhotoCandidate {
            id: "p1".to_string(),
            width_px: 1200,
            height_px: 1400,
            attribution: Vec::new(),
            source_url: url,
            ocr_text: None,
        }
    }

    #[tokio::test]
    async fn fetch_returns_bytes_and_mime_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/p1.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF])
                    .insert_header("content-type", "image/jpeg"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpPhotoFetcher::new(Duration::from_secs(5)).unwrap();
        let photo = fetcher
            .fetch(&candidate(format!("{}/photos/p1.jpg", server.uri())), None)
            .await
            .expect("fetch succeeds");

        assert_eq!(photo.bytes, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(photo.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn fetch_appends_thumbnail_width() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/p1.jpg"))
            .and(query_param("w", "512"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let fetcher = HttpPhotoFetcher::new(Duration::from_secs(5)).unwrap();
        let photo = fetcher
            .fetch(
                &candidate(format!("{}/photos/p1.jpg", server.uri())),
                Some(512),
            )
            .await
            .expect("thumbnail fetch succeeds");

        assert_eq!(photo.bytes.len(), 3);
    }

    #[tokio::test]
    async fn fetch_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/p1.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpPhotoFetcher::new(Duration::from_secs(5)).unwrap();
        let error = fetcher
            .fetch(&candidate(format!("{}/photos/p1.jpg", server.uri())), None)
            .await
            .expect_err("should fail");

        assert!(error.to_string().contains("error status"));
    }
}
