use std::time::Instant;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use research_assistant_core::{
    ResearchConfig, ResearchMode, ResearchOrchestrator, ResearchOutcome, ResearchRequest,
    RunLogConfig, RunLogInput, TelemetryOptions, assemble_report, init_telemetry,
    log_research_run,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "research-assistant-cli",
    version,
    about = "Research a topic with a tool-using language model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a topic and print the report.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Research question; repeat for several.
    #[arg(long = "question", required = true)]
    questions: Vec<String>,

    /// Use the multi-step methodology with a larger step budget.
    #[arg(long)]
    advanced: bool,

    /// Print the narrative and sources instead of the full report.
    #[arg(long)]
    no_report: bool,

    /// Append the step-by-step trace.
    #[arg(long)]
    explain: bool,

    /// Emit the result as JSON.
    #[arg(long)]
    json: bool,

    /// Skip writing the run log.
    #[arg(long)]
    no_log: bool,
}

fn main() -> Result<()> {
    init_telemetry(TelemetryOptions::default())?;

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let mode = if args.advanced {
        ResearchMode::Advanced
    } else {
        ResearchMode::Standard
    };
    let request = ResearchRequest::new(args.topic, args.questions, mode)?
        .with_detailed_report(!args.no_report);

    let config = ResearchConfig::from_env()?;
    let orchestrator = ResearchOrchestrator::from_config(&config)?;

    info!(topic = %request.topic(), ?mode, model = %config.llm.model, "starting research");
    let started = Instant::now();
    let outcome = orchestrator.orchestrate_traced(&request).await;

    if !args.no_log {
        let input = RunLogInput::from_result(
            Uuid::new_v4().to_string(),
            &request,
            &outcome.result,
            started.elapsed(),
        );
        if let Err(err) = log_research_run(&RunLogConfig::from_env(), input) {
            warn!(error = %err, "failed to write run log");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&request, &outcome, args.explain);
    }

    if !outcome.result.succeeded() {
        bail!("research failed");
    }
    Ok(())
}

fn print_outcome(request: &ResearchRequest, outcome: &ResearchOutcome, explain: bool) {
    let result = &outcome.result;
    if let Some(report) = assemble_report(request, result) {
        println!("{}", report.render_markdown());
    } else if let Some(narrative) = result.narrative() {
        println!("{narrative}");
        if !result.sources().is_empty() {
            println!("\nSources:");
            for (idx, source) in result.sources().iter().enumerate() {
                println!("  {}. {}", idx + 1, source);
            }
        }
    } else if let Some(error) = result.error() {
        eprintln!("Research failed: {error}");
    }

    if explain {
        println!("\n{}", outcome.trace.render_markdown());
    }
}
