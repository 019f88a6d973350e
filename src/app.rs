//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the ctrl-c handler, builds the
//! gateway and dispatches the subcommand.

use anyhow::Result;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use relocator::cli::{Args, Command};
use relocator::config::{self, Config, LoadedConfig};
use relocator::output as out;
use relocator::relocate::{ApplyOptions, apply_plan, write_rollback_plan};
use relocator::rotate::{RotateOptions, rotate_move_dir};
use relocator::scan::{CorruptionProbe, InventoryOptions, run_inventory};
use relocator::snapshot::{SnapshotOptions, write_snapshot};
use relocator::{RelocateError, gateway_from_config, shutdown};

use crate::logging::init_tracing;

fn print_config(args: &Args, loaded: &LoadedConfig) -> Result<()> {
    let location = config::config_location(args.config.as_deref());
    let cfg = &loaded.config;
    let drives: serde_json::Map<String, serde_json::Value> = cfg
        .drives
        .iter()
        .map(|(letter, root)| (letter.to_string(), json!(root.display().to_string())))
        .collect();
    out::print_result(&json!({
        "config_path": location.map(|(p, _)| p.display().to_string()),
        "loaded_from": loaded.source.as_ref().map(|p| p.display().to_string()),
        "ops_root": cfg.ops_root.display().to_string(),
        "log_level": cfg.log_level.to_string(),
        "log_file": cfg.log_file.as_ref().map(|p| p.display().to_string()),
        "backend": cfg.backend.to_string(),
        "pwsh_exe": cfg.pwsh_exe,
        "on_dst_exists": cfg.on_dst_exists.as_str(),
        "corruption_read_bytes": cfg.corruption_read_bytes,
        "scan_retry_count": cfg.scan_retry_count,
        "extensions": cfg.extensions,
        "drives": drives,
    }))?;
    Ok(())
}

fn dispatch(args: &Args, cfg: &Config) -> Result<()> {
    match &args.command {
        // Answered in run() before logging is initialized.
        Command::PrintConfig => {}
        Command::Rotate(a) => {
            let report = rotate_move_dir(
                &cfg.ops_root.join("move"),
                &RotateOptions {
                    keep_batches: a.keep_batches,
                    ttl_days: a.ttl_days,
                },
            )?;
            out::print_result(&report)?;
        }
        Command::RollbackPlan(a) => {
            let report = write_rollback_plan(&a.audit, a.out.as_deref())?;
            if !report.source_complete {
                out::print_warn("audit has no _meta_end; the rollback plan covers only the entries present");
            }
            out::print_info(&format!(
                "apply {} to undo run {}",
                report.out_jsonl.display(),
                report.run_id
            ));
            out::print_result(&report)?;
        }
        Command::Inventory(a) => {
            let gw = gateway_from_config(cfg)?;
            let mut opts = InventoryOptions::new(a.roots.clone(), &cfg.ops_root);
            opts.extensions = cfg.extensions.clone();
            opts.detect_corruption = a.detect_corruption;
            opts.read_bytes = cfg.corruption_read_bytes;
            opts.retry_count = cfg.scan_retry_count;
            opts.out = a.out.clone();
            let report = run_inventory(&*gw, &opts)?;
            out::print_success(&format!(
                "inventory of {} files written to {}",
                report.files,
                report.out_jsonl.display()
            ));
            out::print_result(&report)?;
        }
        Command::Snapshot(a) => {
            let gw = gateway_from_config(cfg)?;
            let mut opts = SnapshotOptions::new(a.root.clone(), &cfg.ops_root);
            opts.hash = a.hash;
            opts.limit = a.limit;
            opts.out = a.out.clone();
            opts.retry_count = cfg.scan_retry_count;
            opts.probe = a
                .detect_corruption
                .then(|| CorruptionProbe::new(cfg.corruption_read_bytes));
            let report = write_snapshot(&*gw, &opts)?;
            out::print_success(&format!(
                "snapshot of {} files written to {}",
                report.files,
                report.out_jsonl.display()
            ));
            out::print_result(&report)?;
        }
        Command::Apply(a) => {
            let gw = gateway_from_config(cfg)?;
            let opts = ApplyOptions {
                ops_root: cfg.ops_root.clone(),
                dry_run: a.dry_run,
                on_dst_exists: cfg.on_dst_exists,
                out: a.out.clone(),
                lease: a.lease,
            };
            let report = apply_plan(&*gw, &a.plan, &opts)?;
            if report.summary.interrupted {
                out::print_warn("run interrupted; remaining plan entries were not attempted");
            } else if report.summary.failed == 0 && report.summary.malformed == 0 {
                out::print_success(&format!("{} entries applied", report.summary.ok));
            } else {
                out::print_warn(&format!(
                    "{} ok, {} failed, {} malformed; see {}",
                    report.summary.ok,
                    report.summary.failed,
                    report.summary.malformed,
                    report.out_jsonl.display()
                ));
            }
            out::print_result(&report)?;
        }
    }
    Ok(())
}

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    let mut loaded = config::load_config(args.config.as_deref()).inspect_err(|e| {
        out::print_error(&format!("Failed to load config: {e:#}"));
    })?;
    args.apply_overrides(&mut loaded.config);

    if matches!(args.command, Command::PrintConfig) {
        return print_config(&args, &loaded);
    }
    let cfg = loaded.config;

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)
        .inspect_err(|e| out::print_error(&format!("Failed to initialize logging: {e}")))?;

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        let installed = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing the current entry...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        });
        if let Err(e) = installed {
            out::print_warn(&format!("Could not install interrupt handler: {e}"));
        }
    }

    debug!(?args, "starting relocator");
    let result = dispatch(&args, &cfg);
    if let Err(e) = &result {
        match e.downcast_ref::<RelocateError>() {
            Some(re) => error!(code = re.code(), error = %re, "run failed"),
            None => error!(error = ?e, "run failed"),
        }
        out::print_error(&format!("{e:#}"));
    }

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}
