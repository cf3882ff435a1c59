//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Map, Value, json};
use thiserror::Error;

use governance_audit::audit::report::{
    AuditReport, CheckStatus, KpiStatus, ReportAssembler, ReportStatus,
};
use governance_audit::audit::{
    AuditContext, beads_boundary, namespace_boundary, secret_scan, shell_embedding,
    vision_alignment,
};
use governance_audit::benchmark::client::{DryRunClient, HttpModelClient, ModelClient};
use governance_audit::benchmark::runner::{self, BenchmarkOptions};
use governance_audit::core::config::Config;
use governance_audit::core::errors::GvaError;
use governance_audit::core::paths::resolve_absolute_path;
use governance_audit::index::artifact_id::infer_filename;
use governance_audit::index::rebuild::IndexFormat;
use governance_audit::index::store::{ArtifactStore, parse_object};
use governance_audit::logger::jsonl::ActivityLog;
use governance_audit::policy::table::PolicyTable;

/// Structural governance auditor for agent-maintained repositories.
#[derive(Debug, Parser)]
#[command(
    name = "gva",
    author,
    version,
    about = "Governance Audit - track-only structural auditors",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Repository root the audits inspect.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    repo_root: PathBuf,
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run one track-only audit and write its report.
    Audit(AuditArgs),
    /// Commit session artifacts.
    Session(SessionArgs),
    /// Commit scene documents.
    Scene(SceneArgs),
    /// Validate scenes, session artifacts, and indexes.
    Validate,
    /// Rebuild every session index.
    Reindex(ReindexArgs),
    /// Print the filename inferred for an artifact id.
    InferFilename(InferFilenameArgs),
    /// Run the structural legibility benchmark.
    Benchmark(BenchmarkArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct AuditArgs {
    #[command(subcommand)]
    kind: AuditKind,
}

#[derive(Debug, Clone, Subcommand)]
enum AuditKind {
    /// Registry churn and merge-queue materialization guardrails.
    BeadsBoundary(BeadsArgs),
    /// Credential-shaped strings in tracked files.
    SecretScan(SecretArgs),
    /// Python heredocs embedded in bash scripts.
    ShellEmbedding(OutFileArgs),
    /// Namespace declarations on mutating tools.
    NamespaceBoundary(OutFileArgs),
    /// Principle-link KPI over session artifacts.
    VisionAlignment(VisionArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct OutFileArgs {
    /// Report path (relative paths resolve against the repo root).
    #[arg(long, value_name = "PATH")]
    out_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct BeadsArgs {
    /// Authority registry JSON.
    #[arg(long, value_name = "PATH")]
    registry_file: Option<PathBuf>,
    /// Merge queue JSON.
    #[arg(long, value_name = "PATH")]
    merge_queue_file: Option<PathBuf>,
    #[command(flatten)]
    out: OutFileArgs,
}

#[derive(Debug, Clone, Args, Default)]
struct SecretArgs {
    /// Stop storing matches after N.
    #[arg(long, value_name = "N")]
    max_matches: Option<usize>,
    #[command(flatten)]
    out: OutFileArgs,
}

#[derive(Debug, Clone, Args, Default)]
struct VisionArgs {
    /// Session artifact root.
    #[arg(long, value_name = "DIR")]
    sessions_dir: Option<PathBuf>,
    #[command(flatten)]
    out: OutFileArgs,
}

#[derive(Debug, Clone, Args)]
struct SessionArgs {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum SessionCommand {
    /// Write a session artifact and rebuild indexes.
    Commit(SessionCommitArgs),
}

#[derive(Debug, Clone, Args)]
struct SessionCommitArgs {
    /// Tool directory under sessions/.
    #[arg(long)]
    tool: String,
    /// Explicit filename instead of one inferred from the artifact id.
    #[arg(long, value_name = "NAME")]
    filename: Option<String>,
    /// Read the artifact from a file instead of stdin.
    #[arg(long, value_name = "PATH")]
    json_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct SceneArgs {
    #[command(subcommand)]
    command: SceneCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum SceneCommand {
    /// Write scenes/<slug>.scene.json.
    Commit(SceneCommitArgs),
}

#[derive(Debug, Clone, Args)]
struct SceneCommitArgs {
    /// Scene name; slugified into the filename.
    #[arg(long)]
    name: String,
    /// Read the scene from a file instead of stdin.
    #[arg(long, value_name = "PATH")]
    json_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ReindexArgs {
    /// Index format (defaults to the configured one).
    #[arg(long, value_name = "FORMAT")]
    format: Option<IndexFormat>,
}

#[derive(Debug, Clone, Args)]
struct InferFilenameArgs {
    /// Artifact id, e.g. artifact/codex_2026_02_11_kpi_review.
    artifact_id: String,
}

#[derive(Debug, Clone, Args, Default)]
struct BenchmarkArgs {
    /// Run directory name (defaults to a timestamped slug).
    #[arg(long, value_name = "SLUG")]
    run_slug: Option<String>,
    /// File to include in the corpus context (repeatable).
    #[arg(long = "context-file", value_name = "PATH")]
    context_files: Vec<PathBuf>,
    /// Inline context appended after the files.
    #[arg(long, value_name = "TEXT", default_value = "")]
    context: String,
    /// Model name.
    #[arg(long)]
    model: Option<String>,
    /// OpenAI-compatible API base URL.
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    top_p: Option<f64>,
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Per-request timeout.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
    /// Prompt set version recorded in the result.
    #[arg(long)]
    prompt_version: Option<String>,
    /// Directory that receives run folders.
    #[arg(long, value_name = "DIR")]
    output_root: Option<PathBuf>,
    /// Use placeholder responses; no network access.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Show the config file location.
    Path,
    /// Print the effective configuration and its hash.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<GvaError> for CliError {
    fn from(err: GvaError) -> Self {
        match err {
            GvaError::Serialization { .. } => Self::Internal(err.to_string()),
            e if e.is_user_error() => Self::User(e.to_string()),
            e => Self::Runtime(e.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Audit(args) => run_audit(cli, &args.kind),
        Command::Session(args) => match &args.command {
            SessionCommand::Commit(commit) => run_session_commit(cli, commit),
        },
        Command::Scene(args) => match &args.command {
            SceneCommand::Commit(commit) => run_scene_commit(cli, commit),
        },
        Command::Validate => run_validate(cli),
        Command::Reindex(args) => run_reindex(cli, args),
        Command::InferFilename(args) => {
            let name = infer_filename(&args.artifact_id, Utc::now().date_naive())?;
            match output_mode(cli) {
                OutputMode::Human => println!("{name}"),
                OutputMode::Json => write_json_line(&json!({
                    "command": "infer-filename",
                    "artifact_id": args.artifact_id,
                    "filename": name,
                }))?,
            }
            Ok(())
        }
        Command::Benchmark(args) => run_benchmark(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

/// Loaded once per invocation and shared by every command.
struct Session {
    repo_root: PathBuf,
    config: Config,
    log: ActivityLog,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let repo_root = resolve_absolute_path(&cli.repo_root);
        if !repo_root.is_dir() {
            return Err(CliError::User(format!(
                "repo root is not a directory: {}",
                repo_root.display()
            )));
        }
        let config = Config::load(&repo_root, cli.config.as_deref())?;
        let log = ActivityLog::from_config(&config.logging);
        Ok(Self {
            repo_root,
            config,
            log,
        })
    }

    fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.repo_root, &self.config.index)
    }
}

fn run_audit(cli: &Cli, kind: &AuditKind) -> Result<(), CliError> {
    let mut session = Session::open(cli)?;
    let policy = PolicyTable::from_config(&session.config.policy, &session.config.secrets)?;
    let ctx = AuditContext {
        repo_root: &session.repo_root,
        config: &session.config,
        policy: &policy,
        assembler: ReportAssembler::new(&session.config.report, Utc::now()),
    };
    let log = &mut session.log;

    let (report, out_file) = match kind {
        AuditKind::BeadsBoundary(args) => {
            let opts = beads_boundary::BeadsOptions {
                registry_file: args.registry_file.clone(),
                merge_queue_file: args.merge_queue_file.clone(),
            };
            let report = beads_boundary::run(&ctx, log, &opts)?;
            let out = args
                .out
                .out_file
                .clone()
                .unwrap_or_else(|| beads_boundary::default_out_file(&ctx));
            (report, out)
        }
        AuditKind::SecretScan(args) => (
            secret_scan::run(&ctx, log, args.max_matches)?,
            out_or(&args.out, &ctx.config.secrets.out_file),
        ),
        AuditKind::ShellEmbedding(args) => (
            shell_embedding::run(&ctx, log)?,
            out_or(args, &ctx.config.shell.out_file),
        ),
        AuditKind::NamespaceBoundary(args) => (
            namespace_boundary::run(&ctx, log)?,
            out_or(args, &ctx.config.namespace.out_file),
        ),
        AuditKind::VisionAlignment(args) => (
            vision_alignment::run(&ctx, log, args.sessions_dir.as_deref())?,
            out_or(&args.out, &ctx.config.vision.out_file),
        ),
    };

    let written = ctx.write_report(&report, &out_file, log)?;
    emit_report(cli, &report, &ctx.display(&written))
}

fn out_or(args: &OutFileArgs, configured: &Path) -> PathBuf {
    args.out_file
        .clone()
        .unwrap_or_else(|| configured.to_path_buf())
}

fn emit_report(cli: &Cli, report: &AuditReport, written: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(report.to_json_pretty()?.as_bytes())?;
    stdout.flush()?;

    if !cli.quiet {
        let label = report.status.as_str();
        let status = match report.status {
            ReportStatus::Check(CheckStatus::Ok) | ReportStatus::Kpi(KpiStatus::Pass | KpiStatus::Stretch) => {
                label.green()
            }
            ReportStatus::Check(CheckStatus::Warning) | ReportStatus::Kpi(KpiStatus::Fail) => label.yellow(),
            ReportStatus::Check(CheckStatus::InsufficientInput) => label.red(),
        };
        eprintln!("{} [{status}] -> {written}", report.artifact_id);
    }
    Ok(())
}

fn read_document(json_file: Option<&Path>) -> Result<Map<String, Value>, CliError> {
    match json_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::User(format!("cannot read {}: {e}", path.display())))?;
            Ok(parse_object(&text, path)?)
        }
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(parse_object(&text, Path::new("<stdin>"))?)
        }
    }
}

fn run_session_commit(cli: &Cli, args: &SessionCommitArgs) -> Result<(), CliError> {
    let mut session = Session::open(cli)?;
    let artifact = read_document(args.json_file.as_deref())?;
    let path = session.store().commit_session(
        &args.tool,
        &artifact,
        args.filename.as_deref(),
        Utc::now().date_naive(),
        &mut session.log,
    )?;
    emit_written(cli, "session commit", &path)
}

fn run_scene_commit(cli: &Cli, args: &SceneCommitArgs) -> Result<(), CliError> {
    let mut session = Session::open(cli)?;
    let scene = read_document(args.json_file.as_deref())?;
    let path = session
        .store()
        .commit_scene(&args.name, &scene, &mut session.log)?;
    emit_written(cli, "scene commit", &path)
}

fn emit_written(cli: &Cli, command: &str, path: &Path) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                println!("{} {}", "Wrote".green(), path.display());
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": command,
            "path": path.to_string_lossy(),
        }))?,
    }
    Ok(())
}

fn run_validate(cli: &Cli) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let report = session.store().validate();

    match output_mode(cli) {
        OutputMode::Human => {
            for error in &report.errors {
                eprintln!("{} {error}", "ERROR".red());
            }
            if report.is_ok() {
                println!(
                    "{} {} files checked",
                    "Validation passed.".green(),
                    report.files_checked
                );
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "validate",
            "valid": report.is_ok(),
            "files_checked": report.files_checked,
            "errors": report.errors,
        }))?,
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(CliError::User(format!(
            "validation failed with {} error(s)",
            report.errors.len()
        )))
    }
}

fn run_reindex(cli: &Cli, args: &ReindexArgs) -> Result<(), CliError> {
    let mut session = Session::open(cli)?;
    let mut store = session.store();
    if let Some(format) = args.format {
        store = store.with_format(format);
    }
    let outcomes = store.reindex(&mut session.log)?;

    match output_mode(cli) {
        OutputMode::Human => {
            if outcomes.is_empty() {
                println!("No session directories under {}", store.sessions_dir().display());
            }
            for outcome in &outcomes {
                println!(
                    "{} {} ({} entries)",
                    "Indexed".green(),
                    outcome.index_path.display(),
                    outcome.entries
                );
                if cli.verbose {
                    for skipped in &outcome.skipped {
                        println!("  {} {}", "skipped".yellow(), skipped.display());
                    }
                }
            }
        }
        OutputMode::Json => {
            let indexes: Vec<Value> = outcomes
                .iter()
                .map(|o| {
                    json!({
                        "path": o.index_path.to_string_lossy(),
                        "entries": o.entries,
                        "skipped": o.skipped.len(),
                    })
                })
                .collect();
            write_json_line(&json!({"command": "reindex", "indexes": indexes}))?;
        }
    }
    Ok(())
}

fn run_benchmark(cli: &Cli, args: &BenchmarkArgs) -> Result<(), CliError> {
    let mut session = Session::open(cli)?;
    let mut cfg = session.config.benchmark.clone();
    if let Some(model) = &args.model {
        cfg.model.clone_from(model);
    }
    if let Some(api_base) = &args.api_base {
        cfg.api_base.clone_from(api_base);
    }
    if let Some(temperature) = args.temperature {
        cfg.temperature = temperature;
    }
    if let Some(top_p) = args.top_p {
        cfg.top_p = top_p;
    }
    if let Some(max_tokens) = args.max_tokens {
        cfg.max_tokens = max_tokens;
    }
    if let Some(timeout) = args.timeout {
        cfg.timeout_secs = timeout;
    }
    if let Some(version) = &args.prompt_version {
        cfg.prompt_version.clone_from(version);
    }
    if let Some(root) = &args.output_root {
        cfg.output_root.clone_from(root);
    }

    let opts = BenchmarkOptions {
        run_slug: args.run_slug.clone(),
        context_files: args.context_files.clone(),
        inline_context: args.context.clone(),
        dry_run: args.dry_run,
    };

    let client: Box<dyn ModelClient> = if args.dry_run {
        Box::new(DryRunClient)
    } else {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CliError::User("OPENAI_API_KEY is not set (use --dry-run to skip)".to_string())
            })?;
        Box::new(HttpModelClient::new(&cfg, api_key)?)
    };

    let summary = runner::run(
        &session.repo_root,
        &cfg,
        &opts,
        client.as_ref(),
        Utc::now(),
        &mut session.log,
    )?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{} {}", "Benchmark complete:".green(), summary.run_dir.display());
            println!("  aggregate_score: {}", summary.aggregate_score);
            println!("  confidence: {}", summary.confidence);
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "benchmark",
            "run_dir": summary.run_dir.to_string_lossy(),
            "aggregate_score": summary.aggregate_score,
            "confidence": summary.confidence.as_str(),
            "dry_run": args.dry_run,
        }))?,
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let repo_root = resolve_absolute_path(&cli.repo_root);
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| Config::default_path(&repo_root));
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": exists,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(&repo_root, cli.config.as_deref())?;
            let hash = config.stable_hash()?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("# hash: {hash}");
                    println!("{toml_str}");
                }
                OutputMode::Json => write_json_line(&json!({
                    "command": "config show",
                    "hash": hash,
                    "config": serde_json::to_value(&config)?,
                }))?,
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(&repo_root, cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": true,
                        "hash": hash,
                    }))?,
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("{} {e}", "Configuration is INVALID:".red()),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "error": e.to_string(),
                        "code": e.code(),
                    }))?,
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("GVA_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
