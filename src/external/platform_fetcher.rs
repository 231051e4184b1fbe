use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Platform, TrendSignal};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("rate limited by platform")]
    RateLimited,

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Boundary to the concrete per-platform API clients, which live
/// outside this crate. Given a platform and its keyword list, return
/// one validated signal per keyword that currently has data. The
/// coordinator treats this as an opaque async call and wraps it in its
/// own timeout.
#[async_trait]
pub trait PlatformFetcher: Send + Sync {
    async fn fetch_trends(
        &self,
        platform: Platform,
        keywords: &[String],
    ) -> Result<Vec<TrendSignal>, FetchError>;
}
