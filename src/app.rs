//! Application wiring: component registry, shared state, router.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api;
use crate::clients::{
    GenerativeService, HistorySink, HttpHistorySink, HttpPhotoFetcher, ModelGatewayClient,
    NoopHistorySink, PhotoFetcher,
};
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::pipeline::cache::RecommendationCache;

/// 全コンポーネントを構築して束ねるレジストリ。
///
/// 起動時に一度だけ構築され、以後は [`AppState`] 経由で共有される。
pub struct ComponentRegistry {
    config: Config,
    generative: Arc<dyn GenerativeService>,
    pipeline: Arc<Pipeline>,
}

impl ComponentRegistry {
    /// # Errors
    /// HTTPクライアントの構築、またはURLのパースに失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let generative: Arc<dyn GenerativeService> = Arc::new(
            ModelGatewayClient::new(
                config.model_gateway_base_url(),
                config.model_gateway_timeout(),
            )
            .context("failed to build model-gateway client")?,
        );

        let photos: Arc<dyn PhotoFetcher> = Arc::new(
            HttpPhotoFetcher::new(config.photo_fetch_timeout())
                .context("failed to build photo fetcher")?,
        );

        let history: Arc<dyn HistorySink> = match config.history_sink_url() {
            Some(url) => {
                info!(%url, "history sink enabled");
                Arc::new(HttpHistorySink::new(url).context("failed to build history sink")?)
            }
            None => Arc::new(NoopHistorySink),
        };

        let cache = Arc::new(RecommendationCache::new());

        let pipeline = Arc::new(Pipeline::new(
            config.clone(),
            Arc::clone(&generative),
            photos,
            history,
            cache,
        ));

        Ok(Self {
            config,
            generative,
            pipeline,
        })
    }
}

/// axum ハンドラ間で共有される状態。クローンは安価。
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ComponentRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            inner: Arc::new(registry),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[must_use]
    pub fn generative(&self) -> &dyn GenerativeService {
        self.inner.generative.as_ref()
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        self.inner.pipeline.as_ref()
    }
}

/// ルーターを組み立てる。
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health/live", get(api::health::live))
        .route("/v1/health/ready", get(api::health::ready))
        .route("/v1/recommendations", post(api::recommend::recommend))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
