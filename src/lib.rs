// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{BatchFile, load_and_validate};
use crate::errors::ProcgateError;
use crate::exec::ConcurrentProcessManager;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - batch file loading
/// - the concurrent process manager
/// - per-task output printing
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let batch_path = PathBuf::from(&args.batch);
    let mut batch = load_and_validate(&batch_path)
        .with_context(|| format!("loading batch file {}", batch_path.display()))?;

    if let Some(par) = args.parallelism {
        if par == 0 {
            return Err(ProcgateError::ConfigError(
                "--parallelism must be >= 1 (got 0)".to_string(),
            )
            .into());
        }
        batch.parallelism = par;
    }

    if args.dry_run {
        print_dry_run(&batch);
        return Ok(());
    }

    run_batch(batch).await
}

/// Run every task in `batch`, printing each output block to stdout.
///
/// A run error in any task fails the batch; findings (non-zero exit with
/// output) are printed like any other output.
pub async fn run_batch(batch: BatchFile) -> Result<()> {
    let mut manager =
        ConcurrentProcessManager::new(batch.parallelism)?.with_timeout(batch.timeout);

    // First Ctrl-C → stop admitting queued tasks and let running ones finish.
    // Second Ctrl-C → kill running processes too.
    {
        let gate = manager.gate().clone();
        let cancel = manager.cancellation_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; finishing running tasks (press again to kill them)");
            gate.close();

            if tokio::signal::ctrl_c().await.is_ok() {
                info!("second Ctrl+C received; cancelling batch");
                cancel.cancel();
            }
        });
    }

    info!(
        tasks = batch.tasks.len(),
        parallelism = batch.parallelism,
        "running batch"
    );

    for task in batch.tasks {
        let name = task.name;
        manager
            .submit_invocation(task.invocation, move |res| {
                let output = res.with_context(|| format!("task '{name}' failed"))?;
                print_block(&name, &output)
                    .with_context(|| format!("writing output of task '{name}'"))?;
                Ok(())
            })
            .await;
    }

    manager.join().await?;
    debug!("batch complete");
    Ok(())
}

fn print_block(name: &str, output: &[u8]) -> std::io::Result<()> {
    // One locked write per task keeps blocks from interleaving.
    let mut block = format!("== {name} ==\n").into_bytes();
    block.extend_from_slice(output);
    if !output.ends_with(b"\n") && !output.is_empty() {
        block.push(b'\n');
    }

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(&block)?;
    lock.flush()
}

/// Simple dry-run output: print limits and the tasks that would run.
fn print_dry_run(batch: &BatchFile) {
    println!("procgate dry-run");
    println!("  parallelism = {}", batch.parallelism);
    if let Some(timeout) = batch.timeout {
        println!("  timeout = {timeout:?}");
    }
    println!();

    println!("tasks ({}):", batch.tasks.len());
    for task in &batch.tasks {
        println!("  - {}", task.name);
        println!("      exe: {}", task.invocation.exe);
        if !task.invocation.args.is_empty() {
            println!("      args: {:?}", task.invocation.args);
        }
        println!("      stdin: {} bytes", task.invocation.stdin.len());
    }

    debug!("dry-run complete (no execution)");
}
