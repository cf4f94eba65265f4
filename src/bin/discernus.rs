#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use discernus::document::parse_document;
use discernus::experiment::validate_experiment;
use discernus::framework::validate_framework;
use discernus::gateway::{OpenRouterGateway, RetryingGateway};
use discernus::metrics::fitness::{
    anchor_independence_index, cartographic_resolution, framework_fitness_score,
    territorial_coverage, DEFAULT_VARIANCE_THRESHOLD,
};
use discernus::metrics::orthogonal::quadrant_distribution;
use discernus::registry::validate_hybrid_architecture;
use discernus::runner::{CorpusDocument, ExperimentRunner, RunnerConfig};

#[derive(Parser)]
#[command(name = "discernus", version, about = "Framework validation and fitness scoring CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a framework or experiment document
    Validate {
        /// Markdown document with a machine-readable appendix, or bare YAML
        path: PathBuf,

        /// Treat the document as an experiment rather than a framework
        #[arg(long)]
        experiment: bool,
    },
    /// Compute fitness metrics from a signature matrix JSON (array of rows)
    Fitness {
        /// JSON file holding `[[f64, ...], ...]`
        signatures: PathBuf,

        #[arg(long, default_value_t = DEFAULT_VARIANCE_THRESHOLD)]
        variance_threshold: f64,
    },
    /// Report quadrant occupancy for a 2-column signature matrix JSON
    Quadrants {
        signatures: PathBuf,
    },
    /// Score a corpus against an experiment and write the full report
    Run {
        /// Experiment document
        experiment: PathBuf,

        /// Directory of .txt/.md corpus documents
        #[arg(long)]
        corpus: PathBuf,

        /// Override the experiment's model roster
        #[arg(long)]
        model: Option<String>,

        /// Report output path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path, experiment } => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = parse_document(&text)?;
            let hint = path.file_stem().and_then(|s| s.to_str());

            if experiment {
                let normalized = validate_experiment(&config, hint)?;
                println!(
                    "experiment `{}` valid: framework `{}`, {} anchors, {} axes, {} models",
                    normalized.name,
                    normalized.framework.name,
                    normalized.framework.anchor_count(),
                    normalized.framework.axes.len(),
                    normalized.models.len(),
                );
            } else {
                let normalized = validate_framework(&config, hint)?;
                let compliance = validate_hybrid_architecture(normalized.raw());
                println!(
                    "framework `{}` valid: {} anchors, {} axes, registry completeness {:.2}",
                    normalized.name,
                    normalized.anchor_count(),
                    normalized.axes.len(),
                    compliance.registry.registry_completeness,
                );
                for warning in &compliance.registry.warnings {
                    eprintln!("warning: {warning}");
                }
            }
        }
        Commands::Fitness {
            signatures,
            variance_threshold,
        } => {
            let matrix = load_signatures(&signatures)?;
            let coverage = territorial_coverage(&matrix, variance_threshold);
            let anchor_columns = columns_by_index(&matrix);
            let independence = anchor_independence_index(&anchor_columns);
            let resolution = cartographic_resolution(&matrix, None);
            let fitness = framework_fitness_score(
                coverage.territorial_coverage,
                independence.anchor_independence_index,
                resolution.cartographic_resolution,
                None,
            );
            println!("{}", serde_json::to_string_pretty(&fitness)?);
        }
        Commands::Quadrants { signatures } => {
            let matrix = load_signatures(&signatures)?;
            let distribution = quadrant_distribution(&matrix);
            println!("{}", serde_json::to_string_pretty(&distribution)?);
        }
        Commands::Run {
            experiment,
            corpus,
            model,
            out,
        } => {
            let text = fs::read_to_string(&experiment)
                .with_context(|| format!("reading {}", experiment.display()))?;
            let config = parse_document(&text)?;
            let hint = experiment.file_stem().and_then(|s| s.to_str());
            let normalized = validate_experiment(&config, hint)?;

            let documents = load_corpus(&corpus)?;
            let gateway = RetryingGateway::new(OpenRouterGateway::from_env()?);
            let runner = ExperimentRunner::with_config(
                gateway,
                RunnerConfig {
                    model_override: model,
                    ..RunnerConfig::default()
                },
            );
            let report = runner.run(&normalized, &documents).await?;

            let json = serde_json::to_string_pretty(&report)?;
            match out {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn load_signatures(path: &Path) -> anyhow::Result<Vec<Vec<f64>>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let matrix: Vec<Vec<f64>> = serde_json::from_str(&text)
        .with_context(|| format!("parsing signature matrix from {}", path.display()))?;
    Ok(matrix)
}

/// Transpose a row-major matrix into labeled columns for the independence
/// metric.
fn columns_by_index(matrix: &[Vec<f64>]) -> std::collections::BTreeMap<String, Vec<f64>> {
    let width = matrix.first().map(Vec::len).unwrap_or(0);
    (0..width)
        .map(|i| {
            (
                format!("column_{i}"),
                matrix.iter().map(|row| row.get(i).copied().unwrap_or(0.0)).collect(),
            )
        })
        .collect()
}

fn load_corpus(dir: &Path) -> anyhow::Result<Vec<CorpusDocument>> {
    let mut documents = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading corpus dir {}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    paths.sort();

    for path in paths {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();
        documents.push(CorpusDocument { id, text });
    }

    if documents.is_empty() {
        bail!("no .txt or .md documents found under {}", dir.display());
    }
    Ok(documents)
}
