use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    model_gateway_base_url: String,
    model_gateway_timeout: Duration,
    generative_enabled: bool,
    photo_fetch_timeout: Duration,
    photo_heuristic_threshold: u8,
    photo_judge_threshold: f64,
    photo_judge_top_k: usize,
    photo_shortlist_size: usize,
    photo_thumbnail_width: u32,
    rank_chunk_size: usize,
    rank_union_cap: usize,
    history_sink_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Menu Planner Worker の設定値を読み込み、検証する。
    ///
    /// # Errors
    /// `MODEL_GATEWAY_BASE_URL` が未設定、もしくは各種値のパースに失敗した場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_gateway_base_url = env_var("MODEL_GATEWAY_BASE_URL")?;
        let http_bind = parse_socket_addr("MENU_WORKER_HTTP_BIND", "0.0.0.0:9010")?;
        let model_gateway_timeout = parse_duration_secs("MODEL_GATEWAY_TIMEOUT_SECS", 60)?;
        let generative_enabled = parse_bool("MENU_GENERATIVE_ENABLED", true)?;

        // Photo selection funnel settings
        let photo_fetch_timeout = parse_duration_secs("MENU_PHOTO_FETCH_TIMEOUT_SECS", 20)?;
        let photo_heuristic_threshold = parse_u8("MENU_PHOTO_HEURISTIC_THRESHOLD", 70)?;
        let photo_judge_threshold = parse_f64("MENU_PHOTO_JUDGE_THRESHOLD", 0.6)?;
        let photo_judge_top_k = parse_usize("MENU_PHOTO_JUDGE_TOP_K", 5)?;
        let photo_shortlist_size = parse_usize("MENU_PHOTO_SHORTLIST_SIZE", 6)?;
        let photo_thumbnail_width = parse_u32("MENU_PHOTO_THUMBNAIL_WIDTH", 512)?;

        // Ranking batch settings: menus above the chunk size are ranked in
        // batches and the union of batch picks is re-ranked in a final pass.
        let rank_chunk_size = parse_usize("MENU_RANK_CHUNK_SIZE", 50)?;
        let rank_union_cap = parse_usize("MENU_RANK_UNION_CAP", 24)?;

        let history_sink_url = env::var("MENU_HISTORY_SINK_URL").ok();

        Ok(Self {
            http_bind,
            model_gateway_base_url,
            model_gateway_timeout,
            generative_enabled,
            photo_fetch_timeout,
            photo_heuristic_threshold,
            photo_judge_threshold,
            photo_judge_top_k,
            photo_shortlist_size,
            photo_thumbnail_width,
            rank_chunk_size,
            rank_union_cap,
            history_sink_url,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn model_gateway_base_url(&self) -> &str {
        &self.model_gateway_base_url
    }

    #[must_use]
    pub fn model_gateway_timeout(&self) -> Duration {
        self.model_gateway_timeout
    }

    #[must_use]
    pub fn generative_enabled(&self) -> bool {
        self.generative_enabled
    }

    #[must_use]
    pub fn photo_fetch_timeout(&self) -> Duration {
        self.photo_fetch_timeout
    }

    #[must_use]
    pub fn photo_heuristic_threshold(&self) -> u8 {
        self.photo_heuristic_threshold
    }

    #[must_use]
    pub fn photo_judge_threshold(&self) -> f64 {
        self.photo_judge_threshold
    }

    #[must_use]
    pub fn photo_judge_top_k(&self) -> usize {
        self.photo_judge_top_k
    }

    #[must_use]
    pub fn photo_shortlist_size(&self) -> usize {
        self.photo_shortlist_size
    }

    #[must_use]
    pub fn photo_thumbnail_width(&self) -> u32 {
        self.photo_thumbnail_width
    }

    #[must_use]
    pub fn rank_chunk_size(&self) -> usize {
        self.rank_chunk_size
    }

    #[must_use]
    pub fn rank_union_cap(&self) -> usize {
        self.rank_union_cap
    }

    #[must_use]
    pub fn history_sink_url(&self) -> Option<&str> {
        self.history_sink_url.as_deref()
    }

    /// テスト用の既定設定。
    #[must_use]
    pub fn for_tests(model_gateway_base_url: impl Into<String>) -> Self {
        Self {
            http_bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            model_gateway_base_url: model_gateway_base_url.into(),
            model_gateway_timeout: Duration::from_secs(5),
            generative_enabled: true,
            photo_fetch_timeout: Duration::from_secs(5),
            photo_heuristic_threshold: 70,
            photo_judge_threshold: 0.6,
            photo_judge_top_k: 5,
            photo_shortlist_size: 6,
            photo_thumbnail_width: 512,
            rank_chunk_size: 50,
            rank_union_cap: 24,
            history_sink_url: None,
        }
    }

    pub fn set_generative_enabled(&mut self, enabled: bool) {
        self.generative_enabled = enabled;
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|err| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(err),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::Invalid {
                name,
                source: anyhow::anyhow!("expected boolean, got {other:?}"),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_u8(name: &'static str, default: u8) -> Result<u8, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_duration_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|err| ConfigError::Invalid {
                name,
                source: anyhow::Error::new(err),
            }),
        Err(_) => Ok(default).map(Duration::from_secs),
    }
}
