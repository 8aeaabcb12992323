use crate::driver::BenchDriver;
use crate::model::{ModeSpec, RunConfig, RunEvent};
use crate::{render, storage, text_summary};
use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::io::Write;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "fib-bench",
    version,
    about = "Drive fibdrv benchmark runs and plot denoised kernel runtime curves"
)]
pub struct Cli {
    /// Path to the benchmark executable (receives the mode id as its argument)
    #[arg(long, default_value = "./client_test")]
    pub exe: std::path::PathBuf,

    /// Comma-separated mode ids to benchmark, in plot order
    #[arg(long, default_value = "0,1,2")]
    pub modes: String,

    /// Repeated trials per mode
    #[arg(long, default_value_t = 50)]
    pub trials: usize,

    /// Z-score threshold for the per-position outlier filter
    #[arg(long, default_value_t = 2.0)]
    pub threshold: f64,

    /// Pin benchmark runs to this CPU core via taskset (omit to disable pinning)
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Use --sudo true or --sudo false to toggle running the executable via sudo
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sudo: bool,

    /// Per-trial timeout for the benchmark executable
    #[arg(long, default_value = "10s")]
    pub trial_timeout: humantime::Duration,

    /// Output image path for the runtime plot
    #[arg(long, default_value = "runtime.png")]
    pub output: std::path::PathBuf,

    /// Use --plot true or --plot false to toggle writing the plot image
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub plot: bool,

    /// Print the full run report as JSON instead of a text summary
    #[arg(long)]
    pub json: bool,

    /// Export the run report as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Export the aggregated curves as CSV
    #[arg(long)]
    pub export_csv: Option<std::path::PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Attach custom comments to this run
    #[arg(long)]
    pub comments: Option<String>,
}

/// Generate a random id for this benchmark run.
fn gen_run_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

/// Parse the --modes argument into labeled mode specs, preserving order.
fn parse_modes(modes: &str) -> Result<Vec<ModeSpec>> {
    let parsed: Vec<ModeSpec> = modes
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map(ModeSpec::with_default_label)
                .with_context(|| format!("invalid mode id {part:?}"))
        })
        .collect::<Result<_>>()?;
    if parsed.is_empty() {
        anyhow::bail!("--modes selected no modes");
    }
    Ok(parsed)
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    if args.trials == 0 {
        anyhow::bail!("--trials must be at least 1");
    }
    Ok(RunConfig {
        run_id: gen_run_id(),
        executable: args.exe.clone(),
        modes: parse_modes(&args.modes)?,
        trials: args.trials,
        threshold: args.threshold,
        cpu: args.cpu,
        use_sudo: args.sudo,
        trial_timeout: Duration::from(args.trial_timeout),
        comments: args.comments.clone(),
    })
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let cancel = Arc::new(AtomicBool::new(false));

    // Ctrl-C listener: flags cancellation, the driver stops between trials.
    let ctrl_c_handle = {
        let cancel = cancel.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
                let _ = out_tx.send(OutputLine::Stderr(
                    "Interrupt received, stopping after the current trial".into(),
                ));
            }
        })
    };

    let driver = BenchDriver::new(cfg);
    let driver_cancel = cancel.clone();
    let handle = tokio::spawn(async move { driver.run(event_tx, driver_cancel).await });

    while let Some(event) = event_rx.recv().await {
        match event {
            RunEvent::ModeStarted { mode, trials } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "== mode {} ({}): {} trial(s) ==",
                    mode.id, mode.label, trials
                )));
            }
            RunEvent::TrialCompleted {
                mode_id,
                trial,
                trials,
                samples,
            } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "mode {}: trial {}/{} ({} samples)",
                    mode_id,
                    trial + 1,
                    trials,
                    samples
                )));
            }
            RunEvent::ModeAggregated { mode_id, positions } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "mode {}: aggregated {} position(s)",
                    mode_id, positions
                )));
            }
            RunEvent::Info(info) => {
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
            }
        }
    }

    let report = handle
        .await
        .context("driver task failed")?
        .context("benchmark run failed")?;

    // Abort the signal listener before finishing; dropping its JoinHandle
    // would leave the task alive waiting for a signal.
    ctrl_c_handle.abort();

    if args.plot {
        render::render_curves(&report.curves, &args.output)?;
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "Wrote plot: {}",
            args.output.display()
        )));
    }

    handle_exports(&args, &report)?;

    if args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&report)?));
    } else {
        for line in text_summary::build_text_summary(&report).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    if args.auto_save {
        if let Ok(path) = storage::save_report(&report) {
            let _ = out_tx.send(OutputLine::Stderr(format!("Saved: {}", path.display())));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Handle export operations (JSON and CSV) for any output mode.
fn handle_exports(args: &Cli, report: &crate::model::RunReport) -> Result<()> {
    if let Some(path) = args.export_json.as_deref() {
        storage::export_json(path, report)?;
    }
    if let Some(path) = args.export_csv.as_deref() {
        storage::export_csv(path, report)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes_preserves_order_and_labels() {
        let modes = parse_modes("2, 0,4").unwrap();
        let ids: Vec<u32> = modes.iter().map(|mode| mode.id).collect();
        assert_eq!(ids, vec![2, 0, 4]);
        assert_eq!(modes[0].label, "clz_fast_doubling");
    }

    #[test]
    fn parse_modes_rejects_garbage_and_empty() {
        assert!(parse_modes("1,x").is_err());
        assert!(parse_modes("").is_err());
        assert!(parse_modes(" , ").is_err());
    }

    #[test]
    fn build_config_rejects_zero_trials() {
        let args = Cli::parse_from(["fib-bench", "--trials", "0"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn default_args_match_the_original_invocation_shape() {
        let args = Cli::parse_from(["fib-bench"]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.executable, std::path::PathBuf::from("./client_test"));
        assert_eq!(cfg.trials, 50);
        assert_eq!(cfg.threshold, 2.0);
        assert!(cfg.use_sudo);
        assert_eq!(cfg.modes.len(), 3);
    }
}
