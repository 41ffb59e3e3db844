pub mod domain;
pub mod error;
pub mod ingest;
pub mod recommend;
pub mod screener;
pub mod service;
pub mod storage;

pub use error::{CoreError, CoreResult};

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub metrics_provider_base_url: Option<String>,
        pub metrics_provider_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                metrics_provider_base_url: std::env::var("METRICS_PROVIDER_BASE_URL").ok(),
                metrics_provider_api_key: std::env::var("METRICS_PROVIDER_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_metrics_provider_base_url(&self) -> anyhow::Result<&str> {
            self.metrics_provider_base_url
                .as_deref()
                .context("METRICS_PROVIDER_BASE_URL is required")
        }
    }
}
