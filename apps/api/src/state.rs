use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::interview::coordinator::TurnCoordinator;
use crate::llm_client::ProviderAdapter;
use crate::sessions::store::InterviewStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Jobs and interview sessions. Postgres in production, in-memory in tests.
    pub store: Arc<dyn InterviewStore>,
    pub s3: S3Client,
    pub llm: ProviderAdapter,
    /// Per-session single-flight + throttle for provider calls. Process-local.
    pub turns: TurnCoordinator,
    pub config: Config,
}
