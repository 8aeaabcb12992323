use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Display labels for the fibdrv client_test modes, in mode-id order.
const MODE_LABELS: &[(u32, &str)] = &[
    (0, "iteration"),
    (1, "fast_doubling"),
    (2, "clz_fast_doubling"),
    (3, "bn_normal"),
    (4, "bn_fast_doubling"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_id: String,
    pub executable: PathBuf,
    pub modes: Vec<ModeSpec>,
    pub trials: usize,
    pub threshold: f64,
    pub cpu: Option<u32>,
    pub use_sudo: bool,
    #[serde(with = "humantime_serde")]
    pub trial_timeout: Duration,
    #[serde(default)]
    pub comments: Option<String>,
}

/// One benchmark configuration: the mode id passed to the external
/// executable plus the label shown on the plot and in summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSpec {
    pub id: u32,
    pub label: String,
}

impl ModeSpec {
    /// Build a mode with its well-known fibdrv label, or a generated one.
    pub fn with_default_label(id: u32) -> Self {
        let label = MODE_LABELS
            .iter()
            .find(|(mode_id, _)| *mode_id == id)
            .map(|(_, label)| (*label).to_string())
            .unwrap_or_else(|| format!("mode {id}"));
        Self { id, label }
    }
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    ModeStarted {
        mode: ModeSpec,
        trials: usize,
    },
    TrialCompleted {
        mode_id: u32,
        trial: usize,
        trials: usize,
        samples: usize,
    },
    ModeAggregated {
        mode_id: u32,
        positions: usize,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the driver and consumed by the CLI layer.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    PinnedCpu { cpu: u32 },
    Elevated,
}

impl InfoEvent {
    /// Render a human-readable message for the CLI layer.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::PinnedCpu { cpu } => {
                format!("Pinning benchmark runs to CPU {}", cpu)
            }
            InfoEvent::Elevated => "Running the benchmark executable via sudo".to_string(),
        }
    }
}

/// Denoised runtime curve for one mode: one value per position index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeCurve {
    pub id: u32,
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default)]
    pub timestamp_utc: String,
    pub run_id: String,
    pub executable: String,
    pub trials: usize,
    pub threshold: f64,
    pub cpu: Option<u32>,
    #[serde(default)]
    pub comments: Option<String>,
    pub curves: Vec<ModeCurve>,
}
