//! Batch analysis of workloads
//!
//! A batch is validated, its workload list resolved, and every workload is
//! then analyzed in its own task. Upstream reads go through the cache layer,
//! a shared call limiter and a per-call timeout. A workload that fails is
//! reported inline and never affects its siblings.

mod replicas;

pub use replicas::{
    estimate as estimate_replicas, ReplicaEstimate, ReplicaMethod, MIN_DISTINCT_PODS,
};

use crate::cache::{cache_key, listing_key, CacheLayer};
use crate::error::{EngineError, UpstreamError};
use crate::extractor::{self, ResourceUnit};
use crate::models::{
    AutoscalerRecommendation, BatchResponse, LabeledSeries, ResourceAmount, WorkloadDescriptor,
    WorkloadFailure, WorkloadMetrics, WorkloadOutcome, POD_LABEL,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::request::BatchRequest;
use crate::scoring::{efficiency_score, CostEstimator, RateTable};
use crate::sizing::{
    ContainerRequests, GuidanceContext, RecommendationSynthesizer, SizingConfig, SizingInputs,
};
use crate::telemetry::{
    DataClass, MetricKind, MetricQuery, TelemetrySource, TimeWindow, WorkloadScope,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default limit for a single upstream read
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Error kind reported for workloads whose task died
pub const INTERNAL_FAILURE_KIND: &str = "internal";

/// Configuration for batch execution
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Limit for each upstream read (default: 10 seconds)
    pub call_timeout: Duration,
    /// Limit for a whole batch; `None` waits for every workload
    pub batch_timeout: Option<Duration>,
    /// Workloads analyzed at once (default: 8)
    pub max_concurrent_workloads: usize,
    /// Upstream reads in flight at once across all workloads (default: 16)
    pub max_concurrent_calls: usize,
    /// Window used to count distinct pods (default: 1 hour)
    pub replica_window_hours: u32,
    /// Distinct pods needed before the pod count is trusted (default: 3)
    pub min_distinct_pods: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            batch_timeout: None,
            max_concurrent_workloads: 8,
            max_concurrent_calls: 16,
            replica_window_hours: 1,
            min_distinct_pods: MIN_DISTINCT_PODS,
        }
    }
}

/// Query identity shared by all workloads of a batch
struct BatchContext {
    project: String,
    cluster: String,
    window: TimeWindow,
}

/// Runs batch analyses against a telemetry source
pub struct WorkloadOrchestrator {
    telemetry: Arc<dyn TelemetrySource>,
    cache: CacheLayer,
    synthesizer: RecommendationSynthesizer,
    costs: CostEstimator,
    config: OrchestratorConfig,
    call_permits: Arc<Semaphore>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl WorkloadOrchestrator {
    pub fn builder() -> WorkloadOrchestratorBuilder {
        WorkloadOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn rates(&self) -> &RateTable {
        self.costs.rates()
    }

    /// Analyze every workload selected by `request`
    ///
    /// Fails as a whole only on validation errors, a failed workload
    /// listing, or an expired batch deadline. Per-workload problems are
    /// returned inline, in the same order as the resolved workload list.
    pub async fn analyze_batch(
        self: &Arc<Self>,
        request: &BatchRequest,
    ) -> Result<BatchResponse, EngineError> {
        request.validate()?;

        let span = info_span!(
            "batch",
            project = %request.project_id,
            cluster = %request.cluster_name,
            hours = request.time_range_hours
        );

        let run = self.execute(request).instrument(span);
        match self.config.batch_timeout {
            Some(limit) => timeout(limit, run).await.map_err(|_| {
                warn!(timeout_ms = limit.as_millis() as u64, "Batch deadline expired");
                EngineError::BatchTimeout(limit)
            })?,
            None => run.await,
        }
    }

    async fn execute(
        self: &Arc<Self>,
        request: &BatchRequest,
    ) -> Result<BatchResponse, EngineError> {
        let started = Instant::now();
        let workloads = self.resolve_workloads(request).await?;
        info!(workloads = workloads.len(), "Resolved workloads");

        let ctx = Arc::new(BatchContext {
            project: request.project_id.clone(),
            cluster: request.cluster_name.clone(),
            window: TimeWindow::last_hours(request.time_range_hours),
        });

        let outcomes = self.run_workloads(ctx, &workloads).await;
        let response = BatchResponse { workloads: outcomes };

        let failed = response.failed_count();
        self.logger.log_batch_complete(
            response.workloads.len() - failed,
            failed,
            started.elapsed(),
        );
        Ok(response)
    }

    async fn resolve_workloads(
        &self,
        request: &BatchRequest,
    ) -> Result<Vec<WorkloadDescriptor>, EngineError> {
        let scope = WorkloadScope {
            project: request.project_id.clone(),
            cluster: request.cluster_name.clone(),
            namespace: request.namespace.clone(),
            workload: request.workload_name.clone(),
        };

        if let Some(listed) = &request.workloads {
            return Ok(listed.iter().filter(|w| scope.contains(w)).cloned().collect());
        }

        let listed: Vec<WorkloadDescriptor> = self
            .cache
            .get_or_fetch(&listing_key(&scope), DataClass::Topology, || {
                self.guarded(self.telemetry.list_workloads(&scope))
            })
            .await?;

        // Sources may ignore the filters
        Ok(listed.into_iter().filter(|w| scope.contains(w)).collect())
    }

    async fn run_workloads(
        self: &Arc<Self>,
        ctx: Arc<BatchContext>,
        workloads: &[WorkloadDescriptor],
    ) -> Vec<WorkloadOutcome> {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_workloads.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, workload) in workloads.iter().cloned().enumerate() {
            let this = Arc::clone(self);
            let ctx = Arc::clone(&ctx);
            let permits = Arc::clone(&permits);
            let span = info_span!(
                "workload",
                namespace = %workload.namespace,
                name = %workload.name
            );

            tasks.spawn(
                async move {
                    let _permit = permits.acquire_owned().await.ok();
                    (idx, this.analyze_workload(&ctx, &workload).await)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<WorkloadOutcome>> = vec![None; workloads.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "Workload task did not complete"),
            }
        }

        slots
            .into_iter()
            .zip(workloads)
            .map(|(slot, workload)| {
                slot.unwrap_or_else(|| {
                    self.metrics.inc_workload_failures(INTERNAL_FAILURE_KIND);
                    let error = "analysis task aborted".to_string();
                    self.logger.log_workload_failure(
                        &workload.namespace,
                        &workload.name,
                        INTERNAL_FAILURE_KIND,
                        &error,
                    );
                    WorkloadOutcome::Failed(WorkloadFailure {
                        name: workload.name.clone(),
                        namespace: workload.namespace.clone(),
                        error,
                        kind: INTERNAL_FAILURE_KIND.to_string(),
                    })
                })
            })
            .collect()
    }

    async fn analyze_workload(
        &self,
        ctx: &BatchContext,
        workload: &WorkloadDescriptor,
    ) -> WorkloadOutcome {
        let started = Instant::now();
        let result = self.compute_metrics(ctx, workload).await;
        self.metrics.observe_workload_latency(started.elapsed());

        match result {
            Ok(metrics) => {
                self.metrics.inc_workloads_analyzed();
                self.logger.log_recommendation(
                    &metrics.namespace,
                    &metrics.name,
                    metrics.source.as_str(),
                    metrics.replica_count,
                    metrics.recommended_request.cpu_millicores,
                    metrics.recommended_request.memory_bytes,
                    metrics.efficiency_score,
                    metrics.potential_monthly_savings,
                );
                WorkloadOutcome::Analyzed(Box::new(metrics))
            }
            Err(e) => {
                self.metrics.inc_workload_failures(e.kind());
                self.logger.log_workload_failure(
                    &workload.namespace,
                    &workload.name,
                    e.kind(),
                    &e.to_string(),
                );
                WorkloadOutcome::Failed(WorkloadFailure {
                    name: workload.name.clone(),
                    namespace: workload.namespace.clone(),
                    error: e.to_string(),
                    kind: e.kind().to_string(),
                })
            }
        }
    }

    async fn compute_metrics(
        &self,
        ctx: &BatchContext,
        workload: &WorkloadDescriptor,
    ) -> Result<WorkloadMetrics, UpstreamError> {
        let window = ctx.window;
        let (
            cpu_request,
            memory_request,
            cpu_usage,
            memory_usage,
            autoscaler_cpu,
            autoscaler_memory,
            replicas,
        ) = tokio::try_join!(
            self.fetch(ctx, workload, MetricKind::CpuRequest, window),
            self.fetch(ctx, workload, MetricKind::MemoryRequest, window),
            self.fetch(ctx, workload, MetricKind::CpuUsage, window),
            self.fetch(ctx, workload, MetricKind::MemoryUsage, window),
            self.fetch(ctx, workload, MetricKind::AutoscalerCpu, window),
            self.fetch(ctx, workload, MetricKind::AutoscalerMemory, window),
            self.resolve_replicas(ctx, workload),
        )?;

        let requests = ContainerRequests::new(
            extractor::per_container_latest(&cpu_request, ResourceUnit::Cpu),
            extractor::per_container_latest(&memory_request, ResourceUnit::Memory),
        );
        let autoscaler = AutoscalerRecommendation::new(
            extractor::per_container_latest(&autoscaler_cpu, ResourceUnit::Cpu),
            extractor::per_container_latest(&autoscaler_memory, ResourceUnit::Memory),
        );
        let current_usage = ResourceAmount::new(
            ResourceUnit::Cpu.convert(extractor::latest_value(&cpu_usage)),
            ResourceUnit::Memory.convert(extractor::latest_value(&memory_usage)),
        );

        let inputs = SizingInputs {
            requests,
            autoscaler,
            cpu_usage,
            memory_usage,
        };
        let recommendation = self.synthesizer.synthesize(&inputs);
        let current_request = inputs.requests.total();

        let recommendation_text = GuidanceContext {
            recommendation: &recommendation,
            current_request,
            current_usage,
        }
        .render();

        let replica_count = replicas.count;
        let per_replica_savings = self
            .costs
            .potential_savings(current_request, recommendation.total);

        debug!(
            replicas = replica_count,
            replica_method = ?replicas.method,
            source = ?recommendation.source,
            "Workload sized"
        );

        Ok(WorkloadMetrics {
            name: workload.name.clone(),
            namespace: workload.namespace.clone(),
            workload_type: workload.workload_type.clone(),
            replica_count,
            current_request,
            current_usage,
            recommended_request: recommendation.total,
            efficiency_score: efficiency_score(current_usage, current_request),
            monthly_cost: self.costs.monthly_cost(current_request, replica_count),
            recommended_monthly_cost: self.costs.monthly_cost(recommendation.total, replica_count),
            potential_monthly_savings: self.costs.scale(per_replica_savings, replica_count),
            recommendation_text,
            ratio_adjustments: recommendation
                .adjustments
                .iter()
                .map(ToString::to_string)
                .collect(),
            source: recommendation.source,
            per_container_detail: recommendation.per_container,
        })
    }

    async fn resolve_replicas(
        &self,
        ctx: &BatchContext,
        workload: &WorkloadDescriptor,
    ) -> Result<ReplicaEstimate, UpstreamError> {
        let window = TimeWindow::new(self.config.replica_window_hours, ctx.window.end);
        let pods = self.fetch(ctx, workload, MetricKind::PodCount, window).await?;
        let distinct = extractor::distinct_label_values(&pods, POD_LABEL).len();

        let metric = if distinct >= self.config.min_distinct_pods {
            None
        } else {
            match self.fetch(ctx, workload, MetricKind::ReplicaCount, window).await {
                Ok(series) => Some(extractor::latest_value(&series)),
                Err(e @ UpstreamError::Timeout(_)) => return Err(e),
                Err(e) => {
                    debug!(error = %e, "Replica metric unavailable, using pod count");
                    None
                }
            }
        };

        Ok(replicas::estimate(
            distinct,
            metric,
            workload.replicas,
            self.config.min_distinct_pods,
        ))
    }

    async fn fetch(
        &self,
        ctx: &BatchContext,
        workload: &WorkloadDescriptor,
        kind: MetricKind,
        window: TimeWindow,
    ) -> Result<Vec<LabeledSeries>, UpstreamError> {
        let query = MetricQuery {
            project: ctx.project.clone(),
            cluster: ctx.cluster.clone(),
            namespace: workload.namespace.clone(),
            workload: workload.name.clone(),
            kind,
            window,
        };
        self.cache
            .get_or_fetch(&cache_key(&query), kind.data_class(), || {
                self.guarded(self.telemetry.query(&query))
            })
            .await
    }

    /// Run one upstream call under the call limiter and the call timeout
    async fn guarded<T, Fut>(&self, call: Fut) -> Result<T, UpstreamError>
    where
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let _permit = self
            .call_permits
            .acquire()
            .await
            .map_err(|_| UpstreamError::Unavailable("call limiter closed".to_string()))?;

        let started = Instant::now();
        let result = timeout(self.config.call_timeout, call).await;
        self.metrics.observe_upstream_latency(started.elapsed());

        match result {
            Ok(inner) => inner,
            Err(_) => {
                self.metrics.inc_upstream_timeouts();
                Err(UpstreamError::Timeout(self.config.call_timeout))
            }
        }
    }
}

/// Builder for a `WorkloadOrchestrator`
pub struct WorkloadOrchestratorBuilder {
    telemetry: Option<Arc<dyn TelemetrySource>>,
    cache: Option<CacheLayer>,
    sizing: SizingConfig,
    rates: RateTable,
    config: OrchestratorConfig,
    instance: String,
}

impl WorkloadOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            telemetry: None,
            cache: None,
            sizing: SizingConfig::default(),
            rates: RateTable::default(),
            config: OrchestratorConfig::default(),
            instance: "wra".to_string(),
        }
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Cache layer to read through; without one every read goes upstream
    pub fn cache(mut self, cache: CacheLayer) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sizing(mut self, sizing: SizingConfig) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn call_timeout(mut self, limit: Duration) -> Self {
        self.config.call_timeout = limit;
        self
    }

    pub fn batch_timeout(mut self, limit: Duration) -> Self {
        self.config.batch_timeout = Some(limit);
        self
    }

    pub fn max_concurrent_workloads(mut self, limit: usize) -> Self {
        self.config.max_concurrent_workloads = limit;
        self
    }

    pub fn max_concurrent_calls(mut self, limit: usize) -> Self {
        self.config.max_concurrent_calls = limit;
        self
    }

    /// Name attached to structured log events
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn build(self) -> anyhow::Result<WorkloadOrchestrator> {
        let telemetry = self
            .telemetry
            .ok_or_else(|| anyhow::anyhow!("Telemetry source is required"))?;
        if self.config.max_concurrent_calls == 0 {
            anyhow::bail!("max_concurrent_calls must be greater than zero");
        }
        if self.config.max_concurrent_workloads == 0 {
            anyhow::bail!("max_concurrent_workloads must be greater than zero");
        }
        if self.config.call_timeout.is_zero() {
            anyhow::bail!("call_timeout must be greater than zero");
        }

        let logger = StructuredLogger::new(self.instance);
        let cache = self
            .cache
            .unwrap_or_else(CacheLayer::disabled)
            .with_logger(logger.clone());

        Ok(WorkloadOrchestrator {
            telemetry,
            cache,
            synthesizer: RecommendationSynthesizer::with_config(self.sizing),
            costs: CostEstimator::new(self.rates),
            call_permits: Arc::new(Semaphore::new(self.config.max_concurrent_calls)),
            config: self.config,
            metrics: EngineMetrics::new(),
            logger,
        })
    }
}

impl Default for WorkloadOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
