//! bnet - discrete Bayesian network inference and learning.
//!
//! Reads a network file (JSON or TOML), applies evidence, and prints
//! posterior marginals, structural checks, or learned parameters.

use std::path::PathBuf;

use bn_common::error::format_error_human;
use bn_common::{Error, OutputFormat, Result, StructuredError};
use bn_core::config::{load_config, ConfigOptions};
use bn_core::exit_codes::ExitCode;
use bn_core::inference::{infer_marginals, Engine};
use bn_core::learning::{log_likelihood, Dataset, MaximumLikelihoodLearner};
use bn_core::logging::{generate_run_id, init_logging, LogConfig, LogLevel};
use bn_core::network::NetworkFile;
use bn_core::report::{CheckReport, InferenceReport, LearnReport, Provenance, Report};
use clap::{Args, Parser, Subcommand};
use tracing::info;

/// Discrete Bayesian network inference
#[derive(Parser)]
#[command(name = "bnet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Inference config file (TOML)
    #[arg(long, global = true, env = "BNET_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Seed for the sampling engines
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute posterior marginals given evidence
    Infer(InferArgs),

    /// Estimate CPTs from complete data
    Learn(LearnArgs),

    /// Validate a network file and report its structure
    Check(CheckArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct InferArgs {
    /// Network file (.json or .toml)
    network: PathBuf,

    /// Inference engine
    #[arg(long, short = 'e', value_enum, default_value_t = Engine::Belief)]
    engine: Engine,

    /// Samples to draw (sampling engines only)
    #[arg(long, short = 'n')]
    iterations: Option<usize>,

    /// Observed state, as NAME=STATE; STATE is a state name or index
    #[arg(long = "evidence", value_parser = parse_observation)]
    evidence: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct LearnArgs {
    /// Network file providing the structure
    network: PathBuf,

    /// Training data: one row of state indices per line
    #[arg(long, short = 'd')]
    dataset: PathBuf,

    /// Pseudo-count added to every CPT cell
    #[arg(long, default_value_t = 1.0, value_parser = parse_smoothing, allow_hyphen_values = true)]
    smoothing: f64,

    /// Write the learned network here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Network file (.json or .toml)
    network: PathBuf,
}

fn parse_observation(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((node, state)) if !node.trim().is_empty() && !state.trim().is_empty() => {
            Ok((node.trim().to_string(), state.trim().to_string()))
        }
        _ => Err(format!("expected NAME=STATE, got '{raw}'")),
    }
}

fn parse_smoothing(raw: &str) -> std::result::Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(format!("smoothing must be a finite number >= 0, got '{raw}'")),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    let level = if cli.global.quiet {
        LogLevel::Error
    } else {
        LogLevel::from_verbosity(cli.global.verbose)
    };
    let explicit = (cli.global.quiet || cli.global.verbose > 0).then_some(level);
    init_logging(&LogConfig::from_env(explicit, None));

    let result = match &cli.command {
        Commands::Infer(args) => run_infer(&cli.global, args),
        Commands::Learn(args) => run_learn(&cli.global, args),
        Commands::Check(args) => run_check(&cli.global, args),
        Commands::Version => {
            print_version(&cli.global);
            Ok(ExitCode::Clean)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => report_error(&cli.global, &err),
    };
    std::process::exit(exit_code.as_i32());
}

fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    let code = ExitCode::from(err);
    match global.format {
        OutputFormat::Json => println!("{}", StructuredError::from(err).to_json()),
        _ => eprintln!("{}", format_error_human(err)),
    }
    code
}

fn emit(global: &GlobalOpts, report: &impl Report) -> Result<ExitCode> {
    print!("{}", report.render(global.format)?);
    if global.format == OutputFormat::Json {
        println!();
    }
    Ok(ExitCode::Clean)
}

fn run_infer(global: &GlobalOpts, args: &InferArgs) -> Result<ExitCode> {
    let run_id = generate_run_id();
    let mut resolved = load_config(&ConfigOptions {
        config_path: global.config.clone(),
    })?;
    if let Some(seed) = global.seed {
        resolved.config.sampling.seed = Some(seed);
    }
    if let Some(iterations) = args.iterations {
        resolved.config.sampling.iterations = iterations;
    }
    resolved.config.validate()?;

    let (file, digest) = NetworkFile::load(&args.network)?;
    let mut net = file.build()?;
    for (name, state) in &args.evidence {
        let node = file.node_index(name)?;
        net.set_evidence(node, file.state_index(node, state)?)?;
    }
    info!(
        run_id = %run_id,
        network = %args.network.display(),
        engine = %args.engine,
        evidence = net.evidence_nodes().len(),
        "running inference"
    );

    let outcome = infer_marginals(&net, args.engine, &resolved.config)?;
    let provenance = Provenance::new(run_id, &file, digest).with_config(&resolved);
    let report = InferenceReport::new(provenance, &file, &net, &outcome)?;
    emit(global, &report)
}

fn run_learn(global: &GlobalOpts, args: &LearnArgs) -> Result<ExitCode> {
    let run_id = generate_run_id();
    let (mut file, digest) = NetworkFile::load(&args.network)?;
    let net = file.build()?;
    let data = Dataset::from_path(&args.dataset)?;
    info!(run_id = %run_id, rows = data.len(), "learning parameters");

    let learner = MaximumLikelihoodLearner::new(args.smoothing);
    let learned = learner.fit(&net, &data)?;
    file.update_probabilities(&learned)?;
    let json = file.to_json_pretty()?;

    match &args.output {
        None => {
            println!("{json}");
            Ok(ExitCode::Clean)
        }
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))?;
            let report = LearnReport {
                provenance: Provenance::new(run_id, &file, digest),
                rows: data.len(),
                smoothing: args.smoothing,
                log_likelihood_before: log_likelihood(&net, &data)?,
                log_likelihood_after: log_likelihood(&learned, &data)?,
                output: path.display().to_string(),
            };
            emit(global, &report)
        }
    }
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> Result<ExitCode> {
    let (file, digest) = NetworkFile::load(&args.network)?;
    let net = file.build()?;
    let report = CheckReport::new(Provenance::new(generate_run_id(), &file, digest), &net)?;
    emit(global, &report)
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => {
            let info = serde_json::json!({
                "bnet_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
                "schema_version": bn_core::report::SCHEMA_VERSION,
            });
            println!("{info:#}");
        }
        _ => println!("bnet {}", env!("CARGO_PKG_VERSION")),
    }
}
