//! Top-level runtime: plan, execute, aggregate.
//!
//! [`Lyra`] wires one immutable [`RuntimeConfig`] into the fetcher, the data
//! sources, the LLM client, the stage registry and the scheduler. A run is
//! plan → tasks → scheduled execution → [`RunReport`]; it never returns an
//! error for a failing unit, only a report that names it.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use lyra_core::{Aggregator, Plan, PlanError, RunReport, TaskResult};

use crate::adjust::{ConfidenceWatch, PlanAdjuster};
use crate::config::{ConfigError, RuntimeConfig};
use crate::http::{HttpTransport, ResilientFetcher};
use crate::planner::{LlmPlanner, Planner};
use crate::providers::{
    AzureOpenAiProvider, ChatMessage, CompletionConfig, CompletionResponse, LlmClient,
    LlmProvider, LlmUsage, ProviderError,
};
use crate::scheduler::Scheduler;
use crate::sources::{AlphaFoldClient, UniProtClient};
use crate::stages::StageRegistry;

/// Errors from building or driving the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub plan: Plan,
    /// One result per executed, skipped or inserted task, in task order.
    pub results: Vec<TaskResult>,
    pub report: RunReport,
    /// Cumulative LLM usage of this runtime, including planning.
    pub usage: LlmUsage,
}

/// The assembled pipeline.
pub struct Lyra {
    config: Arc<RuntimeConfig>,
    scheduler: Scheduler,
    planner: Arc<dyn Planner>,
    llm: LlmClient,
    fetcher: ResilientFetcher,
}

impl Lyra {
    /// Build with the production transport and provider.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::builder(config).build()
    }

    pub fn builder(config: RuntimeConfig) -> LyraBuilder {
        LyraBuilder::new(config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run an explicit plan.
    ///
    /// Cached responses never outlive a run: each run starts from an empty
    /// cache, so overlapping runs on one `Lyra` may refetch.
    pub async fn run_plan(&self, plan: &Plan) -> RunOutcome {
        self.fetcher.clear_cache();
        let units = plan.units();
        let tasks = plan.build_tasks();
        info!(
            units = units.len(),
            tasks = tasks.len(),
            depth = ?plan.depth(),
            "Starting run"
        );

        let results = self.scheduler.execute(tasks, &plan.focus_areas).await;
        let report = Aggregator::new().aggregate(&results, &units);
        let counts = report.summary_counts;
        info!(
            requested = counts.total_requested,
            successful = counts.successful,
            partial = counts.partial,
            failed = counts.failed,
            "Run finished"
        );

        RunOutcome {
            plan: plan.clone(),
            results,
            report,
            usage: self.llm.usage(),
        }
    }

    /// Plan a free-text question, then run the plan.
    pub async fn ask(&self, question: &str) -> RunOutcome {
        let plan = self.planner.plan(question).await;
        if plan.is_empty() {
            warn!("Question names no protein, nothing to run");
        }
        self.run_plan(&plan).await
    }
}

impl std::fmt::Debug for Lyra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lyra")
            .field("scheduler", &self.scheduler)
            .field("llm", &self.llm)
            .finish()
    }
}

/// Stands in when no LLM provider is configured.
///
/// Structure-only runs need no model; reasoning stages fail as exceptions.
struct UnconfiguredProvider {
    reason: String,
}

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Builder for [`Lyra`]. Anything not set falls back to production defaults.
pub struct LyraBuilder {
    config: RuntimeConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    provider: Option<Arc<dyn LlmProvider>>,
    adjuster: Option<Arc<dyn PlanAdjuster>>,
    planner: Option<Arc<dyn Planner>>,
}

impl LyraBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            transport: None,
            provider: None,
            adjuster: None,
            planner: None,
        }
    }

    /// Replace the HTTP transport (tests, proxies).
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn adjuster(mut self, adjuster: Arc<dyn PlanAdjuster>) -> Self {
        self.adjuster = Some(adjuster);
        self
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn build(self) -> Result<Lyra, RuntimeError> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let fetcher = match self.transport {
            Some(transport) => ResilientFetcher::with_transport(transport, config.http.clone()),
            None => ResilientFetcher::new(config.http.clone()),
        };

        let provider: Arc<dyn LlmProvider> = match self.provider {
            Some(provider) => provider,
            None => match AzureOpenAiProvider::from_config(&config.llm, fetcher.clone()) {
                Ok(provider) => Arc::new(provider),
                Err(ProviderError::NotConfigured(reason)) => {
                    warn!(reason = %reason, "No LLM provider configured, reasoning stages will fail");
                    Arc::new(UnconfiguredProvider { reason })
                }
                Err(e) => return Err(e.into()),
            },
        };
        let llm = LlmClient::new(provider, config.llm.completion());

        let alphafold = AlphaFoldClient::new(fetcher.clone(), &config.sources.alphafold_base_url);
        let uniprot = UniProtClient::new(fetcher.clone(), &config.sources.uniprot_base_url);
        let registry = StageRegistry::standard(alphafold, uniprot, llm.clone());

        let adjuster = self.adjuster.unwrap_or_else(|| {
            Arc::new(ConfidenceWatch::new(config.execution.low_confidence_threshold))
        });
        let scheduler =
            Scheduler::new(registry, config.execution.clone()).with_adjuster(adjuster);
        let planner = self
            .planner
            .unwrap_or_else(|| Arc::new(LlmPlanner::new(llm.clone())));

        info!(provider = llm.provider_name(), "Runtime ready");
        Ok(Lyra {
            config,
            scheduler,
            planner,
            llm,
            fetcher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::fixtures;
    use crate::testing::{MockProvider, MockTransport};
    use lyra_core::{FailureKind, Stage, TaskStatus};

    fn transport() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .json("prediction/Q8I3H7", fixtures::prediction())
                .json("confidence_v4", fixtures::confidence())
                .json("uniprotkb/Q8I3H7.json", fixtures::uniprot_entry()),
        )
    }

    fn lyra(transport: &Arc<MockTransport>, provider: &Arc<MockProvider>) -> Lyra {
        Lyra::builder(RuntimeConfig::default())
            .transport(transport.clone())
            .provider(provider.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_mixed_run_separates_outcomes() {
        let transport = transport();
        let provider = Arc::new(MockProvider::new(r#"{"verdict": "ok"}"#));
        let lyra = lyra(&transport, &provider);

        let plan = Plan::new(["Q8I3H7", "P12345", "not-an-id"], true);
        let outcome = lyra.run_plan(&plan).await;
        let report = &outcome.report;

        assert_eq!(outcome.results.len(), 15);
        assert_eq!(report.summary_counts.total_requested, 3);
        assert_eq!(report.summary_counts.successful, 1);
        assert_eq!(report.summary_counts.failed, 2);

        let completed = &report.completed[0];
        assert_eq!(completed.unit.as_str(), "Q8I3H7");
        assert_eq!(completed.stage, Stage::Synthesize);
        assert_eq!(completed.result["degraded_inputs"], serde_json::json!([]));

        let not_found = &report.failed_reports[0];
        assert_eq!(not_found.unit.as_str(), "P12345");
        assert_eq!(not_found.error, "Protein P12345 not found in AlphaFold");
        assert_eq!(not_found.error_kind, Some(FailureKind::NotFound));

        let invalid = &report.failed_reports[1];
        assert_eq!(invalid.unit.as_str(), "NOT-AN-ID");
        assert_eq!(invalid.error_kind, Some(FailureKind::Validation));

        // Reason makes two calls, Critique and Synthesize one each.
        assert_eq!(provider.call_count(), 4);
        assert_eq!(outcome.usage.llm_calls, 4);
        // Invalid ids never reach the network; the prediction is fetched once.
        assert_eq!(transport.calls_matching("NOT-AN-ID"), 0);
        assert_eq!(transport.calls_matching("prediction/Q8I3H7"), 1);
    }

    #[tokio::test]
    async fn test_structure_only_without_llm() {
        let transport = transport();
        let lyra = Lyra::builder(RuntimeConfig::default())
            .transport(transport.clone())
            .build()
            .unwrap();

        let outcome = lyra.run_plan(&Plan::new(["Q8I3H7"], false)).await;
        assert!(outcome.report.all_succeeded());
        assert_eq!(outcome.report.completed[0].stage, Stage::AnalyzeStructure);
        assert_eq!(outcome.usage.llm_calls, 0);
    }

    #[tokio::test]
    async fn test_unconfigured_llm_degrades_full_run() {
        let lyra = Lyra::builder(RuntimeConfig::default())
            .transport(transport())
            .build()
            .unwrap();

        let outcome = lyra.run_plan(&Plan::new(["Q8I3H7"], true)).await;
        let failure = &outcome.report.failed_reports[0];
        assert_eq!(failure.failed_at_stage, Stage::Reason);
        assert_eq!(failure.tasks_skipped, vec![Stage::Critique]);
        assert_eq!(failure.additional_failures[0].stage, Stage::Synthesize);
        assert_eq!(outcome.results[4].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_each_run_fetches_afresh() {
        let transport = transport();
        let lyra = lyra(&transport, &Arc::new(MockProvider::new("{}")));
        let plan = Plan::new(["Q8I3H7"], false);

        lyra.run_plan(&plan).await;
        let first_run = transport.call_count();
        let outcome = lyra.run_plan(&plan).await;

        assert!(outcome.report.all_succeeded());
        assert_eq!(first_run, 2);
        assert_eq!(transport.call_count(), 2 * first_run);
        assert_eq!(transport.calls_matching("prediction/Q8I3H7"), 2);
    }

    #[tokio::test]
    async fn test_ask_plans_then_runs() {
        let transport = transport();
        let provider = Arc::new(
            MockProvider::new("{}").reply(
                "research question",
                r#"{"uniprot_ids": ["Q8I3H7"], "requires_full_pipeline": false}"#,
            ),
        );
        let lyra = lyra(&transport, &provider);

        let outcome = lyra.ask("Is the AMA1 structure of Q8I3H7 reliable?").await;
        assert_eq!(outcome.plan.uniprot_ids, vec!["Q8I3H7"]);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.usage.llm_calls, 1);
    }

    #[tokio::test]
    async fn test_empty_plan_yields_empty_report() {
        let lyra = lyra(&transport(), &Arc::new(MockProvider::new("{}")));
        let outcome = lyra.run_plan(&Plan::new(Vec::<String>::new(), true)).await;
        assert!(outcome.report.is_empty());
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.execution.max_concurrent_units = 0;
        let result = Lyra::builder(config).build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
