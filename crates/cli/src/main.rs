// ncm - NCM product-code reconciliation
//
// Thin adapter: resolves paths and settings, loads the tables, and hands the
// records to the batch runner. All matching logic lives in ncm-recon.

mod exit_codes;
mod lookup;
mod merge;
mod report;
mod run;
mod signal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use ncm_config::ConfigError;
use ncm_io::IoError;
use ncm_recon::ReconError;

use exit_codes::{io_exit_code, recon_exit_code, EXIT_CONFIG_INVALID, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "ncm")]
#[command(about = "Reconcile product NCM codes against the official reference table")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign a valid code to every product (exact match, then AI)
    #[command(after_help = "\
Examples:
  ncm run ncm.toml
  ncm run --reference tabela_ncm.xlsx --products produtos.xlsx --output final.xlsx
  ncm run ncm.toml --no-ai --json
  ncm run ncm.toml --resume final.xlsx")]
    Run(RunArgs),

    /// Fill missing descriptions from each product's code
    #[command(after_help = "\
Examples:
  ncm describe --reference tabela_ncm.xlsx --products itens.xlsx --output itens_descritos.xlsx")]
    Describe(RunArgs),

    /// Fill empty codes in one product table from another, by product name
    #[command(after_help = "\
Examples:
  ncm merge --primary cadastro.xlsx --source reconciliado.xlsx --output cadastro_final.xlsx")]
    Merge {
        /// Table whose empty codes get filled
        #[arg(long)]
        primary: PathBuf,

        /// Table to copy codes from
        #[arg(long)]
        source: PathBuf,

        /// Output file (.csv or .xlsx)
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Print the merge summary as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Find the reference entry for one code, falling back to its ancestors
    #[command(after_help = "\
Examples:
  ncm lookup 0101.21.00 --reference tabela_ncm.xlsx
  ncm lookup 1203 --reference tabela_ncm.csv --json")]
    Lookup {
        /// Code as typed (punctuation ignored)
        code: String,

        /// Reference table
        #[arg(long, env = "NCM_REFERENCE")]
        reference: PathBuf,

        /// Worksheet in the reference file
        #[arg(long)]
        sheet: Option<String>,

        /// Compare raw digits instead of right-padding to 8
        #[arg(long)]
        raw: bool,

        #[arg(long)]
        json: bool,
    },

    /// Check a run config without running it
    #[command(after_help = "\
Examples:
  ncm validate ncm.toml")]
    Validate {
        config: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Run config (.toml). Flags below override its paths.
    pub config: Option<PathBuf>,

    /// Reference table (code + description)
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Products table
    #[arg(long)]
    pub products: Option<PathBuf>,

    /// Resolved output (.csv or .xlsx); rewritten at every checkpoint
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Pending output (default: <output>.pending.<ext>)
    #[arg(long)]
    pub pending: Option<PathBuf>,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Carry over rows already resolved in a previous output
    #[arg(long, value_name = "PREVIOUS_OUTPUT")]
    pub resume: Option<PathBuf>,

    /// Skip the AI step; unmatched records go to pending
    #[arg(long)]
    pub no_ai: bool,

    /// Records between checkpoints
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Exit with a distinct code when records are left pending
    #[arg(long)]
    pub fail_on_pending: bool,

    /// Print the run report as JSON to stdout
    #[arg(long)]
    pub json: bool,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  ncm-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
        "\nreport_schema: 1",
    )
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "warn,ncm=info",
        (false, 1) => "warn,ncm=debug",
        (false, _) => "warn,ncm=trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args, ncm_io::WriteMode::Codes, cli.quiet),
        Commands::Describe(args) => run::cmd_run(args, ncm_io::WriteMode::Descriptions, cli.quiet),
        Commands::Merge { primary, source, output, json } => merge::cmd_merge(primary, source, output, json),
        Commands::Lookup { code, reference, sheet, raw, json } => {
            lookup::cmd_lookup(code, reference, sheet, raw, json)
        }
        Commands::Validate { config, json } => cmd_validate(config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(err: ConfigError) -> Self {
        Self::new(EXIT_CONFIG_INVALID, err.to_string())
    }

    pub fn io(err: IoError) -> Self {
        let hint = match &err {
            IoError::Recon(ReconError::MissingColumn { .. }) => {
                Some("name the column explicitly in the run config ([reference] / [products])".to_string())
            }
            IoError::NoSheet { .. } => Some("check the sheet name, or omit it to use the first sheet".to_string()),
            IoError::RowMismatch { .. } => {
                Some("--resume needs the output of a run over the same products table".to_string())
            }
            _ => None,
        };
        Self { code: io_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn recon(err: ReconError) -> Self {
        Self::new(recon_exit_code(&err), err.to_string())
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(path: PathBuf, json: bool) -> Result<(), CliError> {
    use ncm_config::{ResolvedClassifierConfig, RunConfig};

    let config = RunConfig::load(&path).map_err(CliError::config)?;
    let classifier = ResolvedClassifierConfig::from_settings(&config.classifier);

    let missing: Vec<String> = [&config.reference.file, &config.products.file]
        .into_iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();

    if json {
        let out = serde_json::json!({
            "schema_version": report::SCHEMA_VERSION,
            "config": path.display().to_string(),
            "name": config.name,
            "status": if missing.is_empty() { "ok" } else { "missing_inputs" },
            "missing_inputs": missing,
            "reference": config.reference.file.display().to_string(),
            "products": config.products.file.display().to_string(),
            "resolved": config.output.resolved.display().to_string(),
            "pending": config.output.pending.display().to_string(),
            "engine": config.engine,
            "classifier": {
                "provider": classifier.provider.name(),
                "model": classifier.model,
                "status": classifier.status.as_str(),
                "key_source": classifier.key_source.as_str(),
            },
        });
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::new(exit_codes::EXIT_ERROR, e.to_string()))?;
        println!("{text}");
    } else {
        eprintln!("config:     {}", path.display());
        if !config.name.is_empty() {
            eprintln!("name:       {}", config.name);
        }
        eprintln!("reference:  {}", config.reference.file.display());
        eprintln!("products:   {}", config.products.file.display());
        eprintln!("resolved:   {}", config.output.resolved.display());
        eprintln!("pending:    {}", config.output.pending.display());
        eprintln!(
            "classifier: {} ({})",
            classifier.provider.name(),
            classifier.status.as_str()
        );
        if let Some(reason) = &classifier.blocking_reason {
            eprintln!("            {reason}");
        }
    }

    if !missing.is_empty() {
        return Err(CliError::new(
            exit_codes::EXIT_INPUT,
            format!("input file(s) not found: {}", missing.join(", ")),
        ));
    }
    if !json {
        eprintln!("config OK");
    }
    Ok(())
}
