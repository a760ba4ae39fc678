//! `swarm` - run the refactoring pipeline from the command line

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use swarm_core::{BatchRunner, Credentials, Orchestrator, StageContext, SwarmConfig, DEFAULT_CONCURRENCY};
use swarm_log::{check_file, ExperimentLog};
use swarm_tools::{GeminiClient, LocalWorkspace};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_MISSING_CREDENTIALS: u8 = 2;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("swarm")
        .version(swarm_core::VERSION)
        .about("Auditor / Fixer / Judge refactoring swarm")
        .subcommand_required(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit diagnostics as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run the pipeline on one file")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Source file to repair"),
                )
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("batch")
                .about("Run the pipeline on every Python file under a directory")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory to scan"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .short('j')
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Files processed at once"),
                )
                .arg(config_arg),
        )
        .subcommand(
            Command::new("validate-logs")
                .about("Check that every prompt entry of the experiment log is complete")
                .arg(
                    Arg::new("path")
                        .value_parser(value_parser!(PathBuf))
                        .help("Experiment log file"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    let result = match matches.subcommand() {
        Some(("run", args)) => run_file(args).await,
        Some(("batch", args)) => run_batch(args).await,
        Some(("validate-logs", args)) => validate_logs(args),
        _ => Ok(EXIT_FAILURE),
    };

    ExitCode::from(result.unwrap_or_else(|err| {
        tracing::error!("{err:#}");
        eprintln!("error: {err:#}");
        EXIT_FAILURE
    }))
}

/// Shared collaborators, or the exit code when credentials are missing
fn build_context(args: &ArgMatches) -> Result<Result<StageContext, u8>> {
    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(Err(EXIT_MISSING_CREDENTIALS));
        }
    };

    let config = SwarmConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("failed to load configuration")?;
    let log = ExperimentLog::open(&config.log_path)
        .with_context(|| format!("failed to open experiment log {}", config.log_path.display()))?;
    let inference = GeminiClient::new(&credentials).context("failed to create inference client")?;
    let workspace = LocalWorkspace::new(&config.sandbox_root);

    tracing::info!(
        model = %config.model,
        sandbox = %workspace.root().display(),
        log = %config.log_path.display(),
        "swarm configured"
    );

    Ok(Ok(StageContext::new(
        Arc::new(inference),
        Arc::new(workspace),
        Arc::new(log),
        Arc::new(config),
    )))
}

async fn run_file(args: &ArgMatches) -> Result<u8> {
    let ctx = match build_context(args)? {
        Ok(ctx) => ctx,
        Err(code) => return Ok(code),
    };
    let file = args
        .get_one::<PathBuf>("file")
        .context("missing file argument")?;

    let report = Orchestrator::new(ctx).run(file).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(EXIT_SUCCESS)
}

async fn run_batch(args: &ArgMatches) -> Result<u8> {
    let ctx = match build_context(args)? {
        Ok(ctx) => ctx,
        Err(code) => return Ok(code),
    };
    let dir = args.get_one::<PathBuf>("dir").context("missing dir argument")?;
    let concurrency = args
        .get_one::<usize>("concurrency")
        .copied()
        .unwrap_or(DEFAULT_CONCURRENCY);

    let files = python_sources(dir);
    if files.is_empty() {
        println!("No Python files found under {}", dir.display());
        return Ok(EXIT_SUCCESS);
    }

    let batch = BatchRunner::new(ctx)
        .with_concurrency(concurrency)
        .run(files)
        .await;

    for report in &batch.reports {
        println!("{:<10} {}", report.final_state.to_string(), report.file);
    }
    println!();
    println!("Done: {}  Escalated: {}", batch.done(), batch.escalated());
    Ok(EXIT_SUCCESS)
}

fn validate_logs(args: &ArgMatches) -> Result<u8> {
    let path = args.get_one::<PathBuf>("path").cloned().unwrap_or_else(|| {
        SwarmConfig::default()
            .with_env_overrides(|key| std::env::var(key).ok())
            .log_path
    });

    let Some(report) = check_file(&path)? else {
        println!("No experiment log at {}; nothing to check", path.display());
        return Ok(EXIT_SUCCESS);
    };

    if report.is_ok() {
        println!("OK: {} entries checked in {}", report.entries, path.display());
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "FAILED: {} violation(s) in {} entries ({})",
        report.violations.len(),
        report.entries,
        path.display()
    );
    for violation in &report.violations {
        println!("  - {violation}");
    }
    Ok(EXIT_FAILURE)
}

/// Python sources under `dir`, test files excluded, in path order
fn python_sources(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "py"))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| !name.starts_with("test_") && !name.ends_with("_test.py"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn batch_concurrency_is_parsed() {
        let matches = cli()
            .try_get_matches_from(["swarm", "batch", "sandbox", "-j", "8", "--json"])
            .unwrap();
        assert!(matches.get_flag("json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "batch");
        assert_eq!(args.get_one::<usize>("concurrency"), Some(&8));
    }

    #[test]
    fn python_sources_skip_tests_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("pkg")).unwrap();
        for name in ["calc.py", "test_calc.py", "notes.txt", "pkg/util.py", "pkg/util_test.py"] {
            std::fs::write(root.join(name), "").unwrap();
        }

        let files: Vec<_> = python_sources(root)
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(files, vec![PathBuf::from("calc.py"), PathBuf::from("pkg/util.py")]);
    }

    #[test]
    fn validate_logs_accepts_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let matches = cli()
            .try_get_matches_from(["swarm", "validate-logs", missing.to_str().unwrap()])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(validate_logs(args).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn validate_logs_flags_incomplete_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(
            &path,
            r#"[{"agent_name": "Fixer_Agent", "model_used": "m", "action": "FIX",
                 "details": {"input_prompt": "p"}, "status": "SUCCESS",
                 "timestamp": "2025-01-01T00:00:00Z"}]"#,
        )
        .unwrap();
        let matches = cli()
            .try_get_matches_from(["swarm", "validate-logs", path.to_str().unwrap()])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(validate_logs(args).unwrap(), EXIT_FAILURE);
    }
}
