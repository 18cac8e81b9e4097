//! Workload right-sizing engine
//!
//! This crate provides the core functionality for:
//! - Reducing raw telemetry series to per-container signals
//! - Synthesizing ratio-bounded resource recommendations
//! - Efficiency and monthly cost scoring
//! - Cache-aside reads of upstream telemetry
//! - Concurrent batch analysis with per-workload failure isolation

pub mod cache;
pub mod error;
pub mod extractor;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod request;
pub mod scoring;
pub mod sizing;
pub mod telemetry;

pub use cache::{CacheLayer, CacheStore, CacheTtls, MemoryCacheStore};
pub use error::{CacheError, EngineError, UpstreamError, ValidationError};
pub use models::*;
pub use observability::{render_metrics, EngineMetrics, StructuredLogger};
pub use orchestrator::{OrchestratorConfig, WorkloadOrchestrator, WorkloadOrchestratorBuilder};
pub use request::BatchRequest;
pub use scoring::{CostEstimator, RateTable};
pub use sizing::{RecommendationSynthesizer, SizingConfig};
pub use telemetry::{MetricKind, MetricQuery, TelemetrySource, TimeWindow, WorkloadScope};
