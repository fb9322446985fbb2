use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lyra_core::{render_report, AnalysisType, Plan};
use lyra_runtime::{Lyra, RunOutcome, RuntimeConfig};

#[derive(Debug, Parser)]
#[command(name = "lyra", version, about = "Failure-aware protein analysis pipeline")]
pub struct Cli {
    /// Runtime configuration (YAML or JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyse the given UniProt accessions
    Run(RunArgs),
    /// Plan a free-text research question, then run the plan
    Ask(AskArgs),
    /// Validate the configuration and print it with defaults filled in
    CheckConfig,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(value_name = "IDS", required_unless_present = "plan")]
    ids: Vec<String>,

    /// Read the plan from a YAML or JSON file instead
    #[arg(long, conflicts_with = "ids")]
    plan: Option<PathBuf>,

    /// Stop after structure analysis
    #[arg(long)]
    structure_only: bool,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct AskArgs {
    #[arg(value_name = "QUESTION", required = true)]
    question: Vec<String>,

    #[arg(long)]
    json: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        init_logging(self.verbose);
        let config = load_config(self.config.as_ref())?;

        match self.command {
            Command::CheckConfig => {
                let yaml = serde_yaml::to_string(&config).context("Failed to render config")?;
                print!("{}", yaml);
                Ok(())
            }
            Command::Run(args) => {
                let plan = args.plan()?;
                let lyra = Lyra::from_config(config).context("Failed to start runtime")?;
                let outcome = lyra.run_plan(&plan).await;
                print_outcome(&outcome, args.json)
            }
            Command::Ask(args) => {
                let lyra = Lyra::from_config(config).context("Failed to start runtime")?;
                let outcome = lyra.ask(&args.question.join(" ")).await;
                print_outcome(&outcome, args.json)
            }
        }
    }
}

impl RunArgs {
    /// The plan to run. Ids given on the command line pass the same schema
    /// checks as a plan file.
    fn plan(&self) -> anyhow::Result<Plan> {
        let plan = match &self.plan {
            Some(path) => Plan::from_file(path)
                .with_context(|| format!("Failed to load plan {}", path.display()))?,
            None => Plan::from_value(serde_json::json!({ "uniprot_ids": self.ids }))
                .context("Invalid identifiers")?,
        };
        if self.structure_only {
            Ok(Plan {
                analysis_type: AnalysisType::StructureOnly,
                requires_full_pipeline: false,
                ..plan
            })
        } else {
            Ok(plan)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate().context("Invalid configuration")?;
    tracing::debug!(path = ?path, "Configuration loaded");
    Ok(config)
}

fn print_outcome(outcome: &RunOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "plan": outcome.plan,
            "results": outcome.results,
            "report": outcome.report,
            "llm_usage": outcome.usage,
        });
        let text = serde_json::to_string_pretty(&value).context("Failed to serialise outcome")?;
        println!("{}", text);
    } else {
        println!("{}", render_report(&outcome.report));
        let usage = &outcome.usage;
        if usage.llm_calls > 0 {
            println!(
                "\n{} LLM calls, {} tokens, ~${:.4}",
                usage.llm_calls, usage.total_tokens, usage.estimated_cost
            );
        }
    }
    Ok(())
}
