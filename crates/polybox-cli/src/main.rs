//! Polybox CLI
//!
//! Command-line front end for the polybox engine: run jobs, list the
//! registered languages, and smoke-test the installed toolchains.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polybox::{
    EXAMPLE_CONFIG, Engine, EngineConfig, JobRequest, Language, Registry, ResourceLimits, TestSpec,
};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polybox")]
#[command(about = "A sandboxed multi-language code runner")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: polybox.toml)
        #[arg(short, long, default_value = "polybox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a source file, or a full JSON job file
    Run {
        /// Source file to run
        #[arg(value_name = "FILE", required_unless_present = "job")]
        source: Option<PathBuf>,

        /// Language key (e.g. c, c++, python)
        #[arg(short, long, required_unless_present = "job")]
        language: Option<String>,

        /// JSON job file describing the full request
        #[arg(short, long, conflicts_with_all = ["source", "language", "input"])]
        job: Option<PathBuf>,

        /// File fed to the program's stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// CPU time limit in seconds for each test
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Memory limit in KB for each test
        #[arg(short, long)]
        memory_limit: Option<u64>,

        /// Emit compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// List registered languages with their probed tool versions
    Languages,

    /// Run the reference program of each registered language
    Check {
        /// Restrict the check to these languages
        languages: Vec<String>,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        EngineConfig::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        EngineConfig::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            source,
            language,
            job,
            input,
            time_limit,
            memory_limit,
            compact,
        } => {
            let engine = Engine::new(config, Registry::discover());
            let request = build_request(
                source.as_deref(),
                language.as_deref(),
                job.as_deref(),
                input.as_deref(),
                time_limit,
                memory_limit,
            )
            .await?;
            run_job(&engine, request, compact).await
        }
        Commands::Languages => {
            let engine = Engine::new(config, Registry::discover());
            list_languages(&engine);
            Ok(())
        }
        Commands::Check { languages } => {
            let engine = Engine::new(config, Registry::discover());
            run_checks(&engine, &languages).await
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn build_request(
    source: Option<&Path>,
    language: Option<&str>,
    job: Option<&Path>,
    input: Option<&Path>,
    time_limit: Option<f64>,
    memory_limit: Option<u64>,
) -> Result<JobRequest> {
    if let Some(job_path) = job {
        let bytes = tokio::fs::read(job_path)
            .await
            .context("failed to read job file")?;
        let request: JobRequest =
            serde_json::from_slice(&bytes).context("failed to parse job file")?;
        return Ok(request);
    }

    // clap guarantees source and language are present without --job
    let source_path = source.context("source file is required")?;
    let language = language.context("language is required")?;

    let source_bytes = tokio::fs::read(source_path)
        .await
        .context("failed to read source file")?;

    let mut request = JobRequest::new(language, source_bytes);
    request.execute = ResourceLimits {
        time: time_limit,
        mem: memory_limit,
        ..Default::default()
    };

    if let Some(input_path) = input {
        let stdin = tokio::fs::read(input_path)
            .await
            .context("failed to read input file")?;
        request.tests = vec![TestSpec {
            stdin: Some(stdin.into()),
            ..Default::default()
        }];
    }

    Ok(request)
}

async fn run_job(engine: &Engine, request: JobRequest, compact: bool) -> Result<()> {
    let report = engine.run(request).await.context("job failed")?;

    let rendered = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{rendered}");

    let compile_ok = report
        .compile
        .as_ref()
        .map(|phase| phase.meta.is_success())
        .unwrap_or(true);
    let tests_ok = report
        .tests
        .as_ref()
        .map(|tests| tests.iter().all(|t| t.meta.is_success()))
        .unwrap_or(false);

    if compile_ok && tests_ok {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages(engine: &Engine) {
    let registry = engine.registry();
    if registry.is_empty() {
        println!("No languages available on this host.");
        return;
    }

    println!("Available languages:\n");
    for (key, language) in registry.languages() {
        let kind = match language {
            Language::Pipeline(_) => "pipeline",
            Language::Simple(d) if d.is_compiled() => "compiled",
            Language::Simple(_) => "interpreted",
        };
        println!("  {:<12} {} ({})", key, language.name(), kind);

        for (cmd, info) in registry.programs(language) {
            let version = info.version.unwrap_or_else(|| "unknown".to_owned());
            println!("      {cmd:<12} {version}");
        }
    }
}

async fn run_checks(engine: &Engine, languages: &[String]) -> Result<()> {
    let keys: Vec<String> = if languages.is_empty() {
        engine
            .registry()
            .languages()
            .iter()
            .map(|(k, _)| (*k).to_owned())
            .collect()
    } else {
        languages.to_vec()
    };

    if keys.is_empty() {
        println!("No languages to check.");
        return Ok(());
    }

    let mut failures = 0usize;
    for key in &keys {
        let outcome = engine
            .check(key)
            .await
            .with_context(|| format!("check failed to run for '{key}'"))?;

        if outcome.passed {
            println!("  {key:<12} PASS");
        } else {
            failures += 1;
            println!("  {key:<12} FAIL");
            if let Some(compile) = &outcome.report.compile {
                let stderr = String::from_utf8_lossy(&compile.stderr);
                if !stderr.trim().is_empty() {
                    println!("      compile stderr: {}", stderr.trim_end());
                }
            }
        }
    }

    println!("\n{} checked, {} failed", keys.len(), failures);
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn show_config(config: &EngineConfig) {
    println!("Isolate binary: {}", config.isolate_binary().display());
    println!(
        "Box range: {}..{}",
        config.boxes.start,
        config.boxes.start + config.boxes.count
    );
    println!();
    println!("Compile limits:");
    print_limits(&config.compile_limits);
    println!();
    println!("Execute limits:");
    print_limits(&config.execute_limits);
    println!();
    println!("Global allowed dirs: {}", config.allowed_dirs.len());
    for mount in &config.allowed_dirs {
        println!("  {} -> {}", mount.source, mount.target);
    }
}

fn print_limits(limits: &ResourceLimits) {
    println!("  time:       {:?} s", limits.time);
    println!("  wall-time:  {:?} s", limits.wall_time);
    println!("  mem:        {:?} KB", limits.mem);
    println!("  processes:  {:?}", limits.processes);
    println!("  fsize:      {:?} KB", limits.fsize);
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
