// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod errors;
pub mod exec;
pub mod launch;
pub mod logging;
pub mod output;
pub mod record;
pub mod types;

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::command::{CommandBuilder, Target};
use crate::config::{ConfigFile, RemoteSettings, load_or_default};
use crate::exec::remote::{OpenSshTransport, SessionPool};
use crate::exec::{CancelMethod, Executors, LocalExecutor, RemoteExecutor, RunRequest, cancel};
use crate::launch::{AsyncLauncher, MarkerFile, Watchdog, WatchdogExit, spawn_idle_sweeper};
use crate::record::{ProcessRegistry, RecordHandle, RecordSnapshot, Termination};

/// Build the production executor pair: local child processes plus OpenSSH
/// control-master sessions for remote targets.
pub fn build_executors(remote: &RemoteSettings) -> Executors {
    let transport = Arc::new(OpenSshTransport::new(remote.ssh.clone()));
    let pool = Arc::new(SessionPool::new(transport, remote.pool));
    Executors::new(
        LocalExecutor::new(),
        RemoteExecutor::new(pool, remote.read_timeout),
    )
}

/// High-level entry point used by `main.rs`.
///
/// Loads config, builds the command for the chosen target, launches it in
/// the background and streams the record until the exit status settles.
/// Returns the process exit code to use.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(&args.config)?;

    let target = match &args.target {
        Some(name) => cfg.target(name)?.clone(),
        None => Target::Local,
    };
    let builder = CommandBuilder::new(cfg.escalation.clone());
    let command = builder
        .build_for(&args.command, &target)
        .context("building command")?;

    if args.dry_run {
        print_dry_run(&cfg, &target, &command);
        return Ok(0);
    }

    let executors = build_executors(&cfg.remote);
    let registry = ProcessRegistry::new();
    let launcher = AsyncLauncher::new(registry.clone(), executors, cfg.limits);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_idle_sweeper(
        registry.clone(),
        cfg.watchdog.record_ttl,
        cfg.watchdog.sweep_interval,
        shutdown.child_token(),
    );

    let id = args.id.clone().unwrap_or_else(default_record_id);
    let request = RunRequest::new(id.clone(), command, target).with_options(cfg.output);

    let handle = launcher.launch(request)?;
    let watchdog = args.done_marker.clone().map(|path| {
        Watchdog::spawn_with_token(
            registry.clone(),
            id.clone(),
            MarkerFile(path),
            cfg.watchdog.check,
            shutdown.child_token(),
        )
    });
    let record = registry.lookup(&id)?;
    info!(record = %id, "command launched");

    let cancel_method = CancelMethod::from_escalation(&cfg.escalation);
    let poll_interval = Duration::from_millis(args.poll_interval.max(1));
    let snapshot = follow(&id, &record, &cancel_method, poll_interval, !args.json).await?;

    let termination = handle.wait().await?;
    debug!(record = %id, ?termination, "launch settled");

    if let Some(watchdog) = watchdog {
        await_watchdog(&id, watchdog).await;
    }

    shutdown.cancel();
    let _ = sweeper.await;

    if args.json {
        let json = serde_json::to_string_pretty(&snapshot).context("serializing snapshot")?;
        println!("{json}");
    }

    Ok(exit_code_for(termination))
}

/// Poll `record` until its exit status is set, echoing new lines when
/// `stream` is set. The first Ctrl-C cancels the tracked process.
async fn follow(
    id: &str,
    record: &RecordHandle,
    method: &CancelMethod,
    poll_interval: Duration,
    stream: bool,
) -> Result<RecordSnapshot> {
    let mut printed = (0usize, 0usize);
    let mut cancel_requested = false;

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    continue;
                }
                match cancel(id, record, method).await {
                    Ok(()) => info!(record = %id, "Ctrl+C received; cancelling command"),
                    Err(e) => warn!(record = %id, error = %e, "Ctrl+C received but command could not be cancelled"),
                }
            }
            _ = ticker.tick() => {
                // Lines and status are read under one lock, so a settled
                // status means every line has been seen.
                let (stdout, stderr, settled) = record.with(|r| {
                    (
                        r.stdout().get(printed.0..).map(<[String]>::to_vec).unwrap_or_default(),
                        r.stderr().get(printed.1..).map(<[String]>::to_vec).unwrap_or_default(),
                        r.exit_status().is_some(),
                    )
                });
                printed.0 += stdout.len();
                printed.1 += stderr.len();

                if stream {
                    emit(&mut std::io::stdout().lock(), &stdout)?;
                    emit(&mut std::io::stderr().lock(), &stderr)?;
                }
                if settled {
                    return Ok(record.snapshot());
                }
            }
        }
    }
}

fn emit(out: &mut impl Write, lines: &[String]) -> Result<()> {
    for line in lines {
        out.write_all(line.as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

async fn await_watchdog(id: &str, watchdog: Watchdog) {
    info!(record = %id, "command returned; waiting for done marker");
    let token = watchdog.token().clone();
    let join = watchdog.join();
    tokio::pin!(join);

    let finished = tokio::select! {
        exit = &mut join => Some(exit),
        _ = tokio::signal::ctrl_c() => None,
    };
    let exit = match finished {
        Some(exit) => exit,
        None => {
            token.cancel();
            join.await
        }
    };
    match exit {
        WatchdogExit::Completed => info!(record = %id, "done marker appeared"),
        WatchdogExit::Expired => warn!(record = %id, "gave up waiting for done marker"),
        WatchdogExit::Cancelled => debug!(record = %id, "stopped waiting for done marker"),
    }
}

/// Exit code for the binary: the command's own status, or 1 for sentinels.
pub fn exit_code_for(termination: Termination) -> i32 {
    match termination {
        Termination::Exited(code) => code,
        _ => 1,
    }
}

fn default_record_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("run-{}-{millis}", std::process::id())
}

/// Dry-run output: config summary and the final command vector.
fn print_dry_run(cfg: &ConfigFile, target: &Target, command: &[String]) {
    println!("execmon dry-run");
    println!("  config.max_workers = {}", cfg.limits.max_workers);
    println!("  config.max_queued = {}", cfg.limits.max_queued);
    println!("  config.clear_on_reload = {}", cfg.output.clear_on_reload);
    println!("  config.end_in_newlines = {}", cfg.output.end_in_newlines);
    println!();

    println!("target: {}", target.kind());
    if let Target::Remote(remote) = target {
        println!("  host: {}", remote.host);
        println!("  user: {}", remote.user);
        if let Some(port) = remote.port {
            println!("  port: {port}");
        }
        println!("  read_timeout: {:?}", cfg.remote.read_timeout);
    }
    println!("argv: {command:?}");

    debug!("dry-run complete (no execution)");
}
