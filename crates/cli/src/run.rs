//! `ncm run` / `ncm describe`: checkpointed batch over the products table.

use std::path::Path;
use std::time::Instant;

use ncm_config::ai::ClassifierStatus;
use ncm_config::{Provider, ResolvedClassifierConfig, RunConfig};
use ncm_io::{apply_resume, hash_file, load_products, load_reference, TablePersister, WriteMode};
use ncm_recon::{BatchRunner, CancelToken, Describer, Reconcile, Resolver, RunSummary};

use crate::exit_codes::{EXIT_AI_MISSING_KEY, EXIT_AI_SETUP, EXIT_INTERRUPTED, EXIT_PENDING};
use crate::report::{ReportMeta, ReportOutputs, RunReport, SCHEMA_VERSION};
use crate::{CliError, RunArgs};

/// Config from the file (if any) with command-line overrides applied.
pub fn build_config(args: &RunArgs) -> Result<RunConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path).map_err(CliError::config)?,
        None => {
            let (Some(reference), Some(products), Some(output)) =
                (&args.reference, &args.products, &args.output)
            else {
                return Err(CliError::args("without a config file, --reference, --products and --output are required")
                    .with_hint("ncm run --reference tabela.xlsx --products produtos.xlsx --output final.xlsx"));
            };
            RunConfig::from_paths(reference.clone(), products.clone(), output.clone())
        }
    };

    if args.config.is_some() {
        if let Some(p) = &args.reference {
            config.reference.file = p.clone();
        }
        if let Some(p) = &args.products {
            config.products.file = p.clone();
        }
        if let Some(p) = &args.output {
            config.output = ncm_config::OutputSettings {
                report: config.output.report.take(),
                ..ncm_config::OutputSettings::for_resolved(p.clone())
            };
        }
    }
    if let Some(p) = &args.pending {
        config.output.pending = p.clone();
    }
    if let Some(p) = &args.report {
        config.output.report = Some(p.clone());
    }
    if let Some(n) = args.checkpoint_every {
        config.engine.checkpoint_every = n;
    }
    if args.no_ai {
        config.classifier.provider = Provider::None;
    }

    config.validate().map_err(CliError::config)?;
    Ok(config)
}

fn mode_name(mode: WriteMode) -> &'static str {
    match mode {
        WriteMode::Codes => "codes",
        WriteMode::Descriptions => "descriptions",
    }
}

pub fn cmd_run(args: RunArgs, mode: WriteMode, quiet: bool) -> Result<(), CliError> {
    let config = build_config(&args)?;
    let started_at = chrono::Utc::now();
    let start = Instant::now();

    // Before any table is loaded.
    let mut classifier = match mode {
        WriteMode::Codes => Some(open_classifier(&config)?),
        WriteMode::Descriptions => None,
    };

    let reference_blake3 = hash_file(&config.reference.file).map_err(CliError::io)?;
    let index = load_reference(&config.reference).map_err(CliError::io)?;
    let stats = index.stats();
    log::info!(
        "reference: {} row(s), {} code(s), {} malformed, {} description conflict(s)",
        stats.rows,
        stats.distinct_codes,
        stats.malformed_rows,
        stats.conflicts.len()
    );

    let (products, mut records) = load_products(&config.products, mode).map_err(CliError::io)?;
    log::info!("products: {} record(s) from {}", records.len(), config.products.file.display());

    if let Some(previous) = &args.resume {
        apply_resume(&mut records, previous, &products, mode, &index).map_err(CliError::io)?;
    }

    let cancel = CancelToken::new();
    crate::signal::install(&cancel);

    let mut sink = TablePersister::new(&products, mode, &config.output);
    let runner = BatchRunner::new(config.engine.checkpoint_every).with_cancel(cancel);

    let classifier_name;
    let summary = match classifier.as_mut() {
        Some(classifier) => {
            classifier_name = classifier.name().to_string();
            let mut resolver = Resolver::new(&index, classifier.as_mut(), &config.engine);
            execute(&runner, &mut records, &mut resolver, &mut sink)?
        }
        None => {
            classifier_name = "none".to_string();
            let mut describer = Describer::new(&index, config.engine.prefix_mode);
            execute(&runner, &mut records, &mut describer, &mut sink)?
        }
    };

    let pending_written = summary.pending > 0 && !summary.interrupted;
    let report = RunReport {
        meta: ReportMeta {
            schema_version: SCHEMA_VERSION,
            name: config.name.clone(),
            mode: mode_name(mode),
            engine_version: env!("CARGO_PKG_VERSION"),
            started_at: started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            duration_ms: start.elapsed().as_millis() as u64,
            classifier: classifier_name,
            reference_file: config.reference.file.display().to_string(),
            reference_blake3,
            products_file: config.products.file.display().to_string(),
            resumed_from: args.resume.as_ref().map(|p| p.display().to_string()),
        },
        summary,
        reference: index.stats().clone(),
        outputs: ReportOutputs {
            resolved: config.output.resolved.display().to_string(),
            pending: pending_written.then(|| config.output.pending.display().to_string()),
        },
    };

    if let Some(path) = &config.output.report {
        report.save(path)?;
    }
    if args.json {
        println!("{}", report.to_json()?);
    }
    if !quiet {
        print_summary(&report.summary, mode, &config.output.resolved, report.outputs.pending.as_deref());
    }

    let s = &report.summary;
    if s.interrupted {
        return Err(CliError::new(
            EXIT_INTERRUPTED,
            format!(
                "interrupted; progress saved to {}",
                config.output.resolved.display()
            ),
        )
        .with_hint(format!(
            "continue with --resume {}",
            config.output.resolved.display()
        )));
    }
    if args.fail_on_pending && s.pending > 0 {
        return Err(CliError::new(EXIT_PENDING, format!("{} record(s) pending", s.pending)));
    }
    Ok(())
}

fn execute(
    runner: &BatchRunner,
    records: &mut [ncm_recon::ProductRecord],
    reconcile: &mut dyn Reconcile,
    sink: &mut TablePersister,
) -> Result<RunSummary, CliError> {
    runner.run(records, reconcile, sink).map_err(CliError::recon)
}

/// Gateway for code mode. A missing key is fatal here rather than silently
/// running offline.
fn open_classifier(config: &RunConfig) -> Result<Box<dyn ncm_recon::Classifier>, CliError> {
    let resolved = ResolvedClassifierConfig::from_settings(&config.classifier);
    log::debug!("classifier: {resolved:?}");
    if resolved.status == ClassifierStatus::MissingKey {
        return Err(CliError::new(
            EXIT_AI_MISSING_KEY,
            resolved
                .blocking_reason
                .clone()
                .unwrap_or_else(|| "classifier API key missing".to_string()),
        )
        .with_hint("or pass --no-ai to send unmatched records to pending"));
    }
    ncm_classifier::from_config(&resolved).map_err(|e| CliError::new(EXIT_AI_SETUP, e.to_string()))
}

fn print_summary(s: &RunSummary, mode: WriteMode, resolved: &Path, pending: Option<&str>) {
    let what = mode_name(mode);
    eprintln!(
        "{} record(s): {} resolved, {} pending, {} skipped, {} carried over",
        s.total, s.resolved, s.pending, s.skipped, s.carried_over
    );
    for (tier, count) in &s.tier_counts {
        eprintln!("  {tier:<18} {count}");
    }
    if s.rejected_codes > 0 || s.rejected_proposals > 0 {
        eprintln!(
            "rejected: {} existing code(s), {} classifier proposal(s)",
            s.rejected_codes, s.rejected_proposals
        );
    }
    eprintln!("{what} written to {}", resolved.display());
    if let Some(p) = pending {
        eprintln!("pending written to {p}");
    }
}
