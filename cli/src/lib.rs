//! Process entrypoints for the exploration platform: `qa-runner`, the
//! per-analysis child process `supervisor` launches, and `qa-admin`, the
//! operator-facing CLI over [`service::QaService`] (spec §6).

pub mod admin_service;
pub mod bus;
pub mod log_format;
pub mod logging;
pub mod service;

pub use admin_service::PlatformService;
pub use bus::EventBus;
pub use service::{QaService, ServiceError, StartAnalysisRequest};
