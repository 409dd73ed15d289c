//! rowtask CLI - resumable, crash-safe row transformation

mod config;
mod errors;

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use rowtask::{Operation, Registry, RunStatistics, Step, Table, Task, Workflow};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }

    fn debug(self, msg: &str) {
        if matches!(self, Verbosity::Verbose) {
            println!("[debug] {msg}");
        }
    }

    fn result(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }
}

/// How a task run reports back.
struct RunOptions<'a> {
    report: Option<&'a Path>,
    progress: bool,
    verbosity: Verbosity,
}

/// Parse `--set key=value`.
///
/// Values that look like JSON lists, objects or quoted strings are parsed as
/// JSON. Anything else, including text that fails to parse, is kept as a
/// plain string, so `--set separator=0` and `--set template={a}-{b}` stay text.
fn parse_key_value(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }

    let text = || serde_json::Value::String(value.to_string());
    let value = if value.starts_with(['[', '{', '"']) {
        serde_json::from_str(value).unwrap_or_else(|_| text())
    } else {
        text()
    };
    Ok((key.to_string(), value))
}

#[derive(Parser)]
#[command(name = "rowtask")]
#[command(about = "Resumable, crash-safe row transformation for CSV files", long_about = None)]
struct Cli {
    /// Verbose output (show debug info and per-row failures)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Do not show a progress bar
    #[arg(long, global = true)]
    no_progress: bool,

    /// Path to config file (default: ~/.config/rowtask/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available operations
    List,

    /// Apply one operation to every row of a CSV file
    ///
    /// If OUTPUT already exists the run resumes from it: rows that already
    /// have a result are kept, all others are processed again.
    Apply {
        /// Input CSV file (with header)
        input: PathBuf,

        /// Output CSV file
        output: PathBuf,

        /// Operation id (see `rowtask list`)
        #[arg(long = "op", required_unless_present = "preset", conflicts_with = "preset")]
        operation: Option<String>,

        /// Use a preset from the config file
        #[arg(long)]
        preset: Option<String>,

        /// Set an operation option (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        options: Vec<(String, serde_json::Value)>,

        /// Column names to use instead of the input's header (comma-separated)
        #[arg(long, value_delimiter = ',')]
        column_names: Option<Vec<String>>,

        /// Write run statistics as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run a workflow file
    Run {
        /// Workflow file (YAML, TOML, or JSON)
        workflow: PathBuf,

        /// Write run statistics as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the columns and size of a CSV file
    Inspect {
        /// CSV file (with header)
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man page
    Manpage,

    /// List presets from the config file
    Presets,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config file
    let config = if let Some(ref path) = cli.config {
        Config::load_from_path(Some(path.clone()))
    } else {
        Config::load()
    };

    // Apply config defaults, CLI flags override
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || config.defaults.quiet;
    let verbosity = Verbosity::from_flags(verbose, quiet);
    init_tracing(verbosity);

    let mut registry = Registry::new();
    rowtask_ops::register_all(&mut registry);

    let progress = config.defaults.progress && !cli.no_progress && !quiet;

    match cli.command {
        Commands::List => cmd_list(&registry, verbosity),
        Commands::Apply {
            input,
            output,
            operation,
            preset,
            options,
            column_names,
            report,
        } => {
            let step = match (operation, preset) {
                (Some(id), _) => Step::new(id),
                (None, Some(name)) => config.get_preset(&name).cloned().ok_or_else(|| {
                    let names: Vec<&str> = config.presets.keys().map(String::as_str).collect();
                    anyhow!(errors::unknown_preset_error(&name, &names))
                })?,
                (None, None) => bail!("Either --op or --preset is required"),
            };
            let opts = RunOptions {
                report: report.as_deref(),
                progress,
                verbosity,
            };
            cmd_apply(&registry, input, output, step, options, column_names, &opts)
        }
        Commands::Run { workflow, report } => {
            let opts = RunOptions {
                report: report.as_deref(),
                progress,
                verbosity,
            };
            cmd_run(&registry, &workflow, &opts)
        }
        Commands::Inspect { file } => cmd_inspect(&file, verbosity),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rowtask", &mut std::io::stdout());
            Ok(())
        }
        Commands::Manpage => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            Ok(())
        }
        Commands::Presets => cmd_presets(&config, verbosity),
    }
}

/// Logs go to stderr; `--quiet` silences them, `--verbose` opens them up.
fn init_tracing(v: Verbosity) {
    let filter = match v {
        Verbosity::Quiet => EnvFilter::new("off"),
        Verbosity::Verbose => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
        }
        Verbosity::Normal => EnvFilter::new("warn"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_list(registry: &Registry, v: Verbosity) -> Result<()> {
    v.info("Available operations:\n");

    for decl in registry.declarations() {
        v.info(&format!("  {}", decl.id));
        if !decl.description.is_empty() {
            v.info(&format!("    {}", decl.description));
        }
        for (name, option) in &decl.options {
            let marker = if option.required { " (required)" } else { "" };
            v.info(&format!("    --set {name}=...{marker}  {}", option.description));
        }
        v.info("");
    }

    v.info(&format!("Total: {} operations", registry.len()));
    Ok(())
}

fn cmd_presets(config: &Config, v: Verbosity) -> Result<()> {
    if config.presets.is_empty() {
        v.info("No presets defined.");
    } else {
        v.info("Presets:\n");
        for (name, step) in &config.presets {
            v.info(&format!(
                "  {:<16} {} {}",
                name,
                step.operation,
                config::describe_options(step)
            ));
        }
    }

    if let Some(path) = Config::default_path() {
        v.info(&format!("\nConfig file: {}", path.display()));
    }

    Ok(())
}

fn cmd_apply(
    registry: &Registry,
    input: PathBuf,
    output: PathBuf,
    mut step: Step,
    options: Vec<(String, serde_json::Value)>,
    column_names: Option<Vec<String>>,
    opts: &RunOptions,
) -> Result<()> {
    for (key, value) in options {
        step.options.insert(key, value);
    }
    ensure_known(registry, std::slice::from_ref(&step))?;

    let operation = registry
        .build(&step)
        .with_context(|| format!("Cannot configure '{}'", step.operation))?;

    let mut task = Task::new(input, output, operation);
    if let Some(names) = column_names {
        task = task.with_column_names(names);
    }

    opts.verbosity.debug(&format!("Operation: {}", task.operation().name()));
    run_task(&task, opts)
}

fn cmd_run(registry: &Registry, workflow_path: &Path, opts: &RunOptions) -> Result<()> {
    let data = std::fs::read(workflow_path)
        .map_err(|e| anyhow!(errors::file_read_error(workflow_path, &e)))?;
    let mut workflow = Workflow::from_bytes(&data, workflow_path.to_str())
        .with_context(|| format!("Invalid workflow {}", workflow_path.display()))?;

    // Paths in a workflow are relative to the workflow file
    let base = workflow_path.parent().unwrap_or(Path::new(""));
    workflow.input = workflow.input.map(|p| resolve(base, &p));
    workflow.output = workflow.output.map(|p| resolve(base, &p));

    ensure_known(registry, &workflow.steps)?;

    opts.verbosity
        .info(&format!("Running workflow: {}", workflow_path.display()));
    for step in &workflow.steps {
        opts.verbosity.debug(&format!(
            "  step: {} {}",
            step.label(),
            config::describe_options(step)
        ));
    }

    let task = workflow.into_task(registry)?;
    run_task(&task, opts)
}

fn cmd_inspect(path: &Path, v: Verbosity) -> Result<()> {
    std::fs::metadata(path).map_err(|e| anyhow!(errors::file_read_error(path, &e)))?;
    let table = Table::load(path)?;

    let columns = table.column_order();
    let sparse = table
        .iter()
        .filter(|row| row.len() < columns.len())
        .count();

    v.result(&format!("File:    {}", path.display()));
    v.result(&format!("Columns: {} ({})", columns.len(), columns.join(", ")));
    v.result(&format!("Rows:    {}", table.len()));
    if sparse > 0 {
        v.result(&format!("Short rows: {sparse} (missing trailing fields)"));
    }
    Ok(())
}

fn resolve(base: &Path, path: &str) -> String {
    let path = Path::new(path);
    if path.is_absolute() {
        path.display().to_string()
    } else {
        base.join(path).display().to_string()
    }
}

/// Fail early, with a suggestion, on operation ids nobody registered.
fn ensure_known(registry: &Registry, steps: &[Step]) -> Result<()> {
    for step in steps {
        if registry.get_decl(&step.operation).is_none() {
            bail!(errors::unknown_operation_error(&step.operation, registry));
        }
    }
    Ok(())
}

fn run_task<O: Operation>(task: &Task<O>, opts: &RunOptions) -> Result<()> {
    let v = opts.verbosity;

    if task.is_resuming() {
        v.info(&format!("Resuming from {}", task.output().display()));
    } else {
        std::fs::metadata(task.input())
            .map_err(|e| anyhow!(errors::file_read_error(task.input(), &e)))?;
    }

    let pb = if opts.progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} rows {msg}")?
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let outcome = task.run_with_progress(|stats, total| {
        pb.set_length(total as u64);
        pb.set_position(stats.total() as u64);
        if stats.failed > 0 {
            pb.set_message(format!("({} failed)", stats.failed));
        }
    });
    pb.finish_and_clear();

    match outcome {
        Ok(stats) => {
            write_report(opts.report, &stats)?;
            report_failures(&stats, v);
            v.result(&format!("{}: {}", task.output().display(), stats));
            Ok(())
        }
        Err(rowtask::Error::Aborted {
            row,
            statistics,
            source,
        }) => {
            write_report(opts.report, &statistics)?;
            report_failures(&statistics, v);
            v.result(&format!("{}: {}", task.output().display(), statistics));
            Err(anyhow!(
                "Run aborted at row {row}: {source}\n\nAll rows were saved to {}. Run the same command again to resume.",
                task.output().display()
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn report_failures(stats: &RunStatistics, v: Verbosity) {
    for failure in &stats.errors {
        v.debug(&format!("row {}: {}", failure.row, failure.message));
    }
}

fn write_report(path: Option<&Path>, stats: &RunStatistics) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_vec_pretty(stats)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("output=visit_id").unwrap(),
            ("output".to_string(), json!("visit_id"))
        );
        assert_eq!(
            parse_key_value("columns=[\"a\",\"b\"]").unwrap(),
            ("columns".to_string(), json!(["a", "b"]))
        );
        assert_eq!(
            parse_key_value("separator=0").unwrap(),
            ("separator".to_string(), json!("0"))
        );
        assert_eq!(
            parse_key_value("separator=").unwrap(),
            ("separator".to_string(), json!(""))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
        assert_eq!(
            parse_key_value("template={a}-{b}").unwrap(),
            ("template".to_string(), json!("{a}-{b}"))
        );
    }

    #[test]
    fn test_resolve_relative_to_workflow() {
        let base = Path::new("flows");
        assert_eq!(resolve(base, "in.csv"), Path::new("flows").join("in.csv").display().to_string());
        let abs = std::env::temp_dir().join("x.csv").display().to_string();
        assert_eq!(resolve(base, &abs), abs);
    }

    #[test]
    fn test_cli_parses_apply() {
        let cli = Cli::try_parse_from([
            "rowtask", "apply", "in.csv", "out.csv", "--op", "concat", "--set",
            "columns=a,b", "--column-names", "a,b",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply {
                operation,
                options,
                column_names,
                ..
            } => {
                assert_eq!(operation.as_deref(), Some("concat"));
                assert_eq!(options, [("columns".to_string(), json!("a,b"))]);
                assert_eq!(column_names.unwrap(), ["a", "b"]);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_cli_requires_op_or_preset() {
        assert!(Cli::try_parse_from(["rowtask", "apply", "in.csv", "out.csv"]).is_err());
        assert!(
            Cli::try_parse_from([
                "rowtask", "apply", "in.csv", "out.csv", "--op", "concat", "--preset", "p"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
