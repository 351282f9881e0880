//! FMA command line
//!
//! Three subcommands mirroring the pipeline stages: `analyze` a node tree,
//! `classify` collected feedback, `merge` taxonomy files. Configuration
//! failures exit non-zero; per-unit completion failures are recorded by
//! the stages themselves and never abort a run.

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, Command};
use fma_analysis::NodeAnalyzer;
use fma_classify::BatchClassifier;
use fma_core::{AnalysisConfig, ClassifyConfig, NodeTree, Taxonomy};
use fma_llm::client::API_KEY_ENV;
use fma_llm::OpenAiClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_ANALYSIS_DIR: &str = "llm_node_analysis";
const DEFAULT_TAXONOMY_FILE: &str = "default_taxonomy.json";
const DEFAULT_CLASSIFICATION_FILE: &str = "taxonomy_classification.json";
const DEFAULT_MERGED_FILE: &str = "taxonomy_classification_merged.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Command::new("fma")
        .version("0.1.0")
        .about("Failure-mode analysis pipeline")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("analyze")
                .about("Analyze nodes from a tree snapshot and save per-node findings")
                .arg(
                    Arg::new("input-json")
                        .required(true)
                        .help("Path to the JSON snapshot containing the nodes array"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of concurrent completion calls"),
                )
                .arg(
                    Arg::new("max-nodes")
                        .long("max-nodes")
                        .default_value("30")
                        .value_parser(value_parser!(usize))
                        .help("Maximum nodes to analyze; larger trees are sampled (0 disables)"),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .default_value(DEFAULT_ANALYSIS_DIR)
                        .help("Directory receiving <node_id>/input.txt and output.txt"),
                )
                .arg(
                    Arg::new("env-path")
                        .long("env-path")
                        .default_value(".env")
                        .help("Path to a .env file providing the API key"),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify collected feedback into a 2-level taxonomy")
                .arg(
                    Arg::new("feedback-path")
                        .long("feedback-path")
                        .default_value(DEFAULT_ANALYSIS_DIR)
                        .help("Root path containing <node_id>/output.txt feedback files"),
                )
                .arg(
                    Arg::new("taxonomy-path")
                        .long("taxonomy-path")
                        .default_value(DEFAULT_TAXONOMY_FILE)
                        .help("Path to a JSON 2-level taxonomy"),
                )
                .arg(
                    Arg::new("output-filename")
                        .long("output-filename")
                        .default_value(DEFAULT_CLASSIFICATION_FILE)
                        .help("Output JSON filename written under the feedback path"),
                )
                .arg(
                    Arg::new("batch-size")
                        .long("batch-size")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Number of feedbacks per completion call"),
                )
                .arg(
                    Arg::new("max-concurrency")
                        .long("max-concurrency")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of concurrent completion calls"),
                )
                .arg(
                    Arg::new("env-path")
                        .long("env-path")
                        .default_value(".env")
                        .help("Path to a .env file providing the API key"),
                ),
        )
        .subcommand(
            Command::new("merge")
                .about("Merge taxonomy classification JSON files")
                .arg(
                    Arg::new("inputs")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Input JSON files or directories"),
                )
                .arg(
                    Arg::new("recursive")
                        .long("recursive")
                        .action(ArgAction::SetTrue)
                        .help("Recursively scan directories for JSON files"),
                )
                .arg(
                    Arg::new("ignore-errors")
                        .long("ignore-errors")
                        .action(ArgAction::SetTrue)
                        .help("Skip invalid or unreadable files instead of failing"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .default_value(DEFAULT_MERGED_FILE)
                        .help("Output JSON filepath"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("analyze", args)) => {
            let input: PathBuf = args.get_one::<String>("input-json").unwrap().into();
            let output_dir: PathBuf = args.get_one::<String>("output-dir").unwrap().into();
            let env_path = args.get_one::<String>("env-path").unwrap();
            let config = AnalysisConfig::new()
                .with_concurrency(*args.get_one::<usize>("concurrency").unwrap())
                .with_max_nodes(*args.get_one::<usize>("max-nodes").unwrap());

            run_analyze(&input, &output_dir, env_path, config).await
        }
        Some(("classify", args)) => {
            let feedback_path: PathBuf = args.get_one::<String>("feedback-path").unwrap().into();
            let taxonomy_path = args.get_one::<String>("taxonomy-path").unwrap();
            let output_filename = args.get_one::<String>("output-filename").unwrap();
            let env_path = args.get_one::<String>("env-path").unwrap();
            let config = ClassifyConfig::new()
                .with_batch_size(*args.get_one::<usize>("batch-size").unwrap())
                .with_concurrency(*args.get_one::<usize>("max-concurrency").unwrap());

            run_classify(
                &feedback_path,
                taxonomy_path,
                output_filename,
                env_path,
                config,
            )
            .await
        }
        Some(("merge", args)) => {
            let inputs: Vec<PathBuf> = args
                .get_many::<String>("inputs")
                .unwrap()
                .map(PathBuf::from)
                .collect();
            let recursive = args.get_flag("recursive");
            let ignore_errors = args.get_flag("ignore-errors");
            let output: PathBuf = args.get_one::<String>("output").unwrap().into();

            run_merge(&inputs, recursive, ignore_errors, &output)
        }
        _ => unreachable!("subcommand required"),
    }
}

async fn run_analyze(
    input: &Path,
    output_dir: &Path,
    env_path: &str,
    config: AnalysisConfig,
) -> anyhow::Result<()> {
    let client = completion_client(env_path)?;
    let tree = NodeTree::load(input)
        .with_context(|| format!("failed to load node tree from {}", input.display()))?;

    let analyzer = NodeAnalyzer::new(client, config);
    let summary = analyzer.analyze_tree(&tree, output_dir).await?;

    println!(
        "Analyzed {}/{} nodes ({} recorded errors), artifacts in {}",
        summary.attempted,
        summary.total,
        summary.errored,
        output_dir.display()
    );
    Ok(())
}

async fn run_classify(
    feedback_path: &Path,
    taxonomy_path: &str,
    output_filename: &str,
    env_path: &str,
    config: ClassifyConfig,
) -> anyhow::Result<()> {
    let client = completion_client(env_path)?;

    let items = fma_classify::collect(feedback_path)?;
    let taxonomy = Taxonomy::load(taxonomy_path)
        .with_context(|| format!("failed to load taxonomy from {taxonomy_path}"))?;
    if taxonomy_path != DEFAULT_TAXONOMY_FILE {
        eprintln!("Using custom taxonomy: {taxonomy_path}");
    }

    let classifier = BatchClassifier::new(client, config);
    let output = classifier.classify(&items, &taxonomy).await;

    if output.degraded_batches > 0 {
        eprintln!(
            "Warning: {}/{} batches failed and contributed no classifications",
            output.degraded_batches, output.total_batches
        );
    }

    let path = fma_classify::write_classification(feedback_path, output_filename, &output.file)?;
    println!("{}", path.display());
    Ok(())
}

fn run_merge(
    inputs: &[PathBuf],
    recursive: bool,
    ignore_errors: bool,
    output: &Path,
) -> anyhow::Result<()> {
    let files = fma_merge::gather_input_files(inputs, recursive);
    if files.is_empty() {
        bail!("no input JSON files found");
    }

    let merged = fma_merge::merge(&files, ignore_errors)?;
    fma_merge::write_merged(output, &merged)?;

    let shown = output
        .canonicalize()
        .unwrap_or_else(|_| output.to_path_buf());
    println!("{}", shown.display());
    Ok(())
}

/// Build the completion client, loading the API key from a .env file when
/// the environment does not already carry one
fn completion_client(env_path: &str) -> anyhow::Result<Arc<OpenAiClient>> {
    if std::env::var(API_KEY_ENV).is_err() && dotenvy::from_path(env_path).is_ok() {
        tracing::debug!(path = env_path, "loaded environment file");
    }
    let client = OpenAiClient::from_env()
        .with_context(|| format!("{API_KEY_ENV} not found; set it or provide an env file"))?;
    Ok(Arc::new(client))
}
