//! Benchmark driver: runs the external executable once per trial, parses
//! each run's output into a measurement row, and reduces the per-mode
//! matrix to one denoised curve.

mod parse;

use crate::model::{InfoEvent, ModeCurve, ModeSpec, RunConfig, RunEvent, RunReport};
use crate::stats::MeasurementMatrix;
use anyhow::{anyhow, bail, Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::process::Command;
use tokio::sync::mpsc;

pub struct BenchDriver {
    cfg: RunConfig,
    scratch_path: PathBuf,
}

impl BenchDriver {
    pub fn new(cfg: RunConfig) -> Self {
        // One transient output file per run, overwritten each trial.
        let scratch_path = std::env::temp_dir().join(format!("fib-bench-{}.txt", cfg.run_id));
        Self { cfg, scratch_path }
    }

    /// Run every configured mode sequentially and reduce each mode's trial
    /// matrix to a curve. Trials are never parallelized; concurrent runs
    /// would perturb the timings being measured.
    pub async fn run(
        self,
        event_tx: mpsc::UnboundedSender<RunEvent>,
        cancel: Arc<AtomicBool>,
    ) -> Result<RunReport> {
        if let Some(cpu) = self.cfg.cpu {
            let _ = event_tx.send(RunEvent::Info(InfoEvent::PinnedCpu { cpu }));
        }
        if self.cfg.use_sudo {
            let _ = event_tx.send(RunEvent::Info(InfoEvent::Elevated));
        }

        let result = self.collect_curves(&event_tx, &cancel).await;
        // Scratch file is transient; remove it on success and failure alike.
        let _ = std::fs::remove_file(&self.scratch_path);
        let curves = result?;

        Ok(RunReport {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            run_id: self.cfg.run_id.clone(),
            executable: self.cfg.executable.display().to_string(),
            trials: self.cfg.trials,
            threshold: self.cfg.threshold,
            cpu: self.cfg.cpu,
            comments: self.cfg.comments.clone(),
            curves,
        })
    }

    async fn collect_curves(
        &self,
        event_tx: &mpsc::UnboundedSender<RunEvent>,
        cancel: &AtomicBool,
    ) -> Result<Vec<ModeCurve>> {
        let mut curves = Vec::with_capacity(self.cfg.modes.len());
        for mode in &self.cfg.modes {
            let _ = event_tx.send(RunEvent::ModeStarted {
                mode: mode.clone(),
                trials: self.cfg.trials,
            });

            let curve = self
                .run_mode(mode, event_tx, cancel)
                .await
                .with_context(|| format!("mode {} ({})", mode.id, mode.label))?;
            let _ = event_tx.send(RunEvent::ModeAggregated {
                mode_id: mode.id,
                positions: curve.values.len(),
            });
            curves.push(curve);
        }
        Ok(curves)
    }

    async fn run_mode(
        &self,
        mode: &ModeSpec,
        event_tx: &mpsc::UnboundedSender<RunEvent>,
        cancel: &AtomicBool,
    ) -> Result<ModeCurve> {
        let mut rows = Vec::with_capacity(self.cfg.trials);
        for trial in 0..self.cfg.trials {
            if cancel.load(Ordering::Relaxed) {
                bail!("run cancelled");
            }
            let row = self
                .run_trial(mode.id)
                .await
                .with_context(|| format!("trial {trial}"))?;
            let _ = event_tx.send(RunEvent::TrialCompleted {
                mode_id: mode.id,
                trial,
                trials: self.cfg.trials,
                samples: row.len(),
            });
            rows.push(row);
        }

        let matrix = MeasurementMatrix::from_rows(rows)?;
        let values = matrix.aggregate(self.cfg.threshold)?;
        Ok(ModeCurve {
            id: mode.id,
            label: mode.label.clone(),
            values,
        })
    }

    /// Launch the benchmark once, capture its stdout into the scratch file,
    /// and parse it back as one measurement row.
    async fn run_trial(&self, mode_id: u32) -> Result<Vec<f64>> {
        let argv = self.invocation(mode_id);
        let out_file = std::fs::File::create(&self.scratch_path).with_context(|| {
            format!("failed to create scratch file {}", self.scratch_path.display())
        })?;

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::from(out_file))
            .stderr(Stdio::null())
            // A timed-out trial drops the status future; the child must
            // die with it instead of running on and perturbing the machine.
            .kill_on_drop(true);

        let status = tokio::time::timeout(self.cfg.trial_timeout, cmd.status())
            .await
            .map_err(|_| {
                anyhow!(
                    "timed out after {}",
                    humantime::format_duration(self.cfg.trial_timeout)
                )
            })?
            .with_context(|| format!("failed to launch {:?}", argv[0]))?;
        if !status.success() {
            bail!("benchmark executable exited with {status}");
        }

        let text = tokio::fs::read_to_string(&self.scratch_path)
            .await
            .with_context(|| {
                format!("failed to read trial output {}", self.scratch_path.display())
            })?;
        let row = parse::parse_samples(&text)?;
        if row.is_empty() {
            bail!("benchmark executable produced no samples");
        }
        Ok(row)
    }

    /// Assemble the full argv, wrapping the executable in `sudo` and
    /// `taskset -c <cpu>` as configured. The mode id is the benchmark's
    /// single argument.
    fn invocation(&self, mode_id: u32) -> Vec<OsString> {
        let mut argv = Vec::new();
        if self.cfg.use_sudo {
            argv.push(OsString::from("sudo"));
        }
        if let Some(cpu) = self.cfg.cpu {
            argv.push(OsString::from("taskset"));
            argv.push(OsString::from("-c"));
            argv.push(OsString::from(cpu.to_string()));
        }
        argv.push(self.cfg.executable.clone().into_os_string());
        argv.push(OsString::from(mode_id.to_string()));
        argv
    }
}
