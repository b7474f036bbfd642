use clap::Parser;
use idsearch::io::ImageSampleLoader;
use idsearch::reference::{ZnccScorer, ZnccTemplate, ZnccTemplateBuilder};
use idsearch::{
    DeadlinePolicy, IdentifyConfig, IdentifyError, Identifier, Outcome, Population,
    PreloadPolicy, PreloadReport, SessionReport, SessionStats, TemplateStore,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

type ZnccIdentifier = Identifier<ImageSampleLoader, ZnccTemplateBuilder, ZnccScorer>;

#[derive(Parser, Debug)]
#[command(author, version, about = "idsearch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
    /// Preload once, then read probe paths from stdin (one per line).
    #[arg(long)]
    interactive: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PreloadPolicyConfig {
    Abort,
    Skip,
}

impl From<PreloadPolicyConfig> for PreloadPolicy {
    fn from(value: PreloadPolicyConfig) -> Self {
        match value {
            PreloadPolicyConfig::Abort => PreloadPolicy::Abort,
            PreloadPolicyConfig::Skip => PreloadPolicy::Skip,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct IdentifyConfigJson {
    threshold: f64,
    deadline_ms: u64,
    per_candidate_ms: u64,
    max_deadline_ms: Option<u64>,
    parallelism: usize,
    on_population_error: PreloadPolicyConfig,
}

impl Default for IdentifyConfigJson {
    fn default() -> Self {
        let cfg = IdentifyConfig::default();
        let deadline_ms = match cfg.deadline {
            DeadlinePolicy::Fixed(budget) => budget.as_millis() as u64,
            DeadlinePolicy::Scaled { base, .. } => base.as_millis() as u64,
        };
        Self {
            threshold: cfg.threshold,
            deadline_ms,
            per_candidate_ms: 0,
            max_deadline_ms: None,
            parallelism: 0,
            on_population_error: PreloadPolicyConfig::Abort,
        }
    }
}

impl IdentifyConfigJson {
    fn to_config(&self) -> IdentifyConfig {
        let base = Duration::from_millis(self.deadline_ms);
        let deadline = if self.per_candidate_ms == 0 {
            DeadlinePolicy::Fixed(base)
        } else {
            DeadlinePolicy::Scaled {
                base,
                per_candidate: Duration::from_millis(self.per_candidate_ms),
                max: self.max_deadline_ms.map(Duration::from_millis),
            }
        };
        let defaults = IdentifyConfig::default();
        IdentifyConfig {
            threshold: self.threshold,
            deadline,
            parallelism: match self.parallelism {
                0 => defaults.parallelism,
                n => n,
            },
            preload_policy: self.on_population_error.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    population_dir: String,
    probe_path: String,
    output_path: Option<String>,
    thumbnail_side: usize,
    identify: IdentifyConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            population_dir: String::new(),
            probe_path: String::new(),
            output_path: None,
            thumbnail_side: 32,
            identify: IdentifyConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatsRecord {
    dispatched: usize,
    scored: usize,
    published: usize,
    discarded: usize,
    failed: usize,
    cancelled: usize,
    received: usize,
}

impl From<SessionStats> for StatsRecord {
    fn from(value: SessionStats) -> Self {
        Self {
            dispatched: value.dispatched,
            scored: value.scored,
            published: value.published,
            discarded: value.discarded,
            failed: value.failed,
            cancelled: value.cancelled,
            received: value.received,
        }
    }
}

#[derive(Debug, Serialize)]
struct PreloadRecord {
    templates: usize,
    skipped: Vec<String>,
    elapsed_ms: f64,
}

impl From<&PreloadReport> for PreloadRecord {
    fn from(value: &PreloadReport) -> Self {
        Self {
            templates: value.templates,
            skipped: value
                .skipped
                .iter()
                .map(|(id, err)| format!("{id}: {err}"))
                .collect(),
            elapsed_ms: millis(value.elapsed),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    probe: String,
    outcome: &'static str,
    candidate: Option<String>,
    score: Option<f64>,
    termination: String,
    budget_ms: f64,
    elapsed_ms: f64,
    stats: StatsRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    preload: Option<PreloadRecord>,
}

impl Output {
    fn new(probe: &Path, report: SessionReport, preload: Option<&PreloadReport>) -> Self {
        let (outcome, candidate, score) = match &report.outcome {
            Outcome::Identified(found) => (
                "identified",
                Some(found.candidate.to_string()),
                Some(found.score),
            ),
            Outcome::NotIdentified => ("not_identified", None, None),
            Outcome::TimedOut => ("timed_out", None, None),
        };
        Self {
            probe: probe.display().to_string(),
            outcome,
            candidate,
            score,
            termination: report.termination.to_string(),
            budget_ms: millis(report.budget),
            elapsed_ms: millis(report.elapsed),
            stats: report.stats.into(),
            preload: preload.map(PreloadRecord::from),
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

async fn identify_one(
    identifier: &ZnccIdentifier,
    population: &Population,
    store: &Arc<TemplateStore<ZnccTemplate>>,
    probe_path: &Path,
) -> Result<SessionReport, IdentifyError> {
    let probe = identifier.build_probe(probe_path).await?;
    let exclude = population.id_for_path(probe_path);
    identifier
        .identify_with_store(probe, Arc::clone(store), exclude.as_ref())
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive("idsearch=info".parse()?)
                    .add_directive("idsearch_cli=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.population_dir.is_empty() {
        return Err("population_dir must be set in the config".into());
    }
    if !cli.interactive && config.probe_path.is_empty() {
        return Err("probe_path must be set in the config".into());
    }
    if config.thumbnail_side < 2 {
        return Err("thumbnail_side must be at least 2".into());
    }

    let identifier = Identifier::new(
        ImageSampleLoader,
        ZnccTemplateBuilder::new(config.thumbnail_side),
        ZnccScorer,
    )
    .with_config(config.identify.to_config());

    let population = Population::discover(&config.population_dir)?;
    let (store, preload) = identifier.preload(&population).await?;
    tracing::info!(
        candidates = population.len(),
        templates = preload.templates,
        skipped = preload.skipped.len(),
        elapsed_ms = millis(preload.elapsed),
        "population preloaded"
    );

    if cli.interactive {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let probe_path = PathBuf::from(line.trim());
            if probe_path.as_os_str().is_empty() {
                continue;
            }
            match identify_one(&identifier, &population, &store, &probe_path).await {
                Ok(report) => {
                    let output = Output::new(&probe_path, report, None);
                    println!("{}", serde_json::to_string(&output)?);
                }
                Err(err) => {
                    let record = serde_json::json!({
                        "probe": probe_path.display().to_string(),
                        "error": err.to_string(),
                    });
                    println!("{record}");
                }
            }
        }
        return Ok(());
    }

    let probe_path = PathBuf::from(&config.probe_path);
    let report = identify_one(&identifier, &population, &store, &probe_path).await?;
    let output = Output::new(&probe_path, report, Some(&preload));
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
