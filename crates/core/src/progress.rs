//! Progress translation: raw generator updates into stage / ETA fields.
//!
//! The canonical input is a structured [`ProgressUpdate`]. Generators that
//! can only emit log lines go through [`ProgressUpdate::from_message`], which
//! recognises stages by keyword and diffusion steps by a `step <i>/<n>`
//! pattern.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::job::{JobRecord, LogLevel};
use crate::types::Timestamp;

static STEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss]tep (\d+)/(\d+)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Named phase of a generation run, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    #[serde(rename = "Initializing")]
    Initializing,
    #[serde(rename = "Loading Model")]
    LoadingModel,
    #[serde(rename = "Preparing")]
    Preparing,
    #[serde(rename = "Processing Prompt")]
    ProcessingPrompt,
    #[serde(rename = "Generating Latents")]
    GeneratingLatents,
    #[serde(rename = "Diffusion Steps")]
    DiffusionSteps,
    #[serde(rename = "Rendering Frames")]
    RenderingFrames,
    #[serde(rename = "Finalizing Video")]
    FinalizingVideo,
}

impl Stage {
    /// All stages, in match priority (and pipeline) order.
    pub const ALL: [Stage; 8] = [
        Stage::Initializing,
        Stage::LoadingModel,
        Stage::Preparing,
        Stage::ProcessingPrompt,
        Stage::GeneratingLatents,
        Stage::DiffusionSteps,
        Stage::RenderingFrames,
        Stage::FinalizingVideo,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::LoadingModel => "Loading Model",
            Self::Preparing => "Preparing",
            Self::ProcessingPrompt => "Processing Prompt",
            Self::GeneratingLatents => "Generating Latents",
            Self::DiffusionSteps => "Diffusion Steps",
            Self::RenderingFrames => "Rendering Frames",
            Self::FinalizingVideo => "Finalizing Video",
        }
    }

    /// Slice of the overall 0-100 percent scale owned by this stage.
    pub fn percent_range(self) -> (f64, f64) {
        match self {
            Self::Initializing => (0.0, 5.0),
            Self::LoadingModel => (5.0, 15.0),
            Self::Preparing => (15.0, 20.0),
            Self::ProcessingPrompt => (20.0, 25.0),
            Self::GeneratingLatents => (25.0, 30.0),
            Self::DiffusionSteps => (30.0, 90.0),
            Self::RenderingFrames => (90.0, 95.0),
            Self::FinalizingVideo => (95.0, 100.0),
        }
    }

    /// Case-sensitive substrings that identify this stage in a log line.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Initializing => &["Initializing"],
            Self::LoadingModel => &["Loading"],
            Self::Preparing => &["Preparing"],
            Self::ProcessingPrompt => &["Processing", "Encoding"],
            Self::GeneratingLatents => &["Generating", "latent"],
            Self::DiffusionSteps => &["Diffusion", "step"],
            Self::RenderingFrames => &["Rendering", "frame"],
            Self::FinalizingVideo => &["Finalizing", "saving", "Saving"],
        }
    }

    /// First stage whose keywords occur in `message`.
    pub fn match_message(message: &str) -> Option<Stage> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.keywords().iter().any(|kw| message.contains(kw)))
    }

    /// Stage whose sub-range contains `percent`.
    pub fn for_percent(percent: f64) -> Stage {
        let percent = clamp_percent(percent);
        Self::ALL
            .into_iter()
            .find(|stage| percent < stage.percent_range().1)
            .unwrap_or(Stage::FinalizingVideo)
    }

    /// Linear position of `percent` inside this stage's sub-range, 0-100.
    pub fn interpolate(self, percent: f64) -> f64 {
        let (start, end) = self.percent_range();
        clamp_percent((percent - start) / (end - start) * 100.0)
    }
}

/// Clamp to `[0, 100]`, mapping NaN to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// One progress report from a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Overall completion, 0-100.
    pub percent: f64,
    pub stage: Stage,
    /// Completion within `stage`; derived from `percent` when absent.
    pub stage_progress: Option<f64>,
    pub message: Option<String>,
}

impl ProgressUpdate {
    /// Structured update for a known stage.
    pub fn new(stage: Stage, percent: f64) -> Self {
        Self {
            percent,
            stage,
            stage_progress: None,
            message: None,
        }
    }

    pub fn with_stage_progress(mut self, stage_progress: f64) -> Self {
        self.stage_progress = Some(stage_progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Interpret a free-text progress line.
    ///
    /// Keyword matching picks the stage; unmatched lines fall back to the
    /// stage owning `percent`. For diffusion lines a `step i/n` fragment sets
    /// the in-stage progress directly.
    pub fn from_message(percent: f64, message: &str) -> Self {
        let stage = Stage::match_message(message).unwrap_or_else(|| Stage::for_percent(percent));

        let stage_progress = if stage == Stage::DiffusionSteps {
            parse_step(message).map(|(step, total)| step as f64 / total as f64 * 100.0)
        } else {
            None
        };

        Self {
            percent,
            stage,
            stage_progress,
            message: Some(message.to_string()),
        }
    }
}

/// Extract `(step, total)` from a `step <i>/<n>` fragment; `n == 0` is ignored.
fn parse_step(message: &str) -> Option<(u64, u64)> {
    let caps = STEP_RE.captures(message)?;
    let step: u64 = caps.get(1)?.as_str().parse().ok()?;
    let total: u64 = caps.get(2)?.as_str().parse().ok()?;
    (total > 0).then_some((step, total))
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Remaining time from the elapsed time and the overall percent.
///
/// `None` when nothing has been reported yet (`percent <= 0`) or the
/// percent is too small to extrapolate from.
pub fn estimate_remaining_secs(elapsed_secs: f64, percent: f64) -> Option<u64> {
    if percent <= 0.0 || percent.is_nan() || elapsed_secs.is_nan() {
        return None;
    }
    let total = elapsed_secs / (percent / 100.0);
    if !total.is_finite() {
        return None;
    }
    Some((total - elapsed_secs).max(0.0).round() as u64)
}

/// Write an update into a job record (latest call wins).
pub fn apply_progress(record: &mut JobRecord, update: &ProgressUpdate, now: Timestamp) {
    let percent = clamp_percent(update.percent);
    let stage_progress = update
        .stage_progress
        .map(clamp_percent)
        .unwrap_or_else(|| update.stage.interpolate(percent));

    record.progress_percent = percent;
    record.current_stage = Some(update.stage);
    record.stage_progress = stage_progress;
    record.estimated_remaining_seconds = record
        .elapsed_secs(now)
        .and_then(|elapsed| estimate_remaining_secs(elapsed, percent));

    if let Some(message) = &update.message {
        if record.message.as_deref() != Some(message.as_str()) {
            record.push_log(now, LogLevel::Progress, message.clone());
        }
        record.message = Some(message.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::params::GenerationParams;
    use crate::types::new_job_id;

    fn running_record(started_secs_ago: i64) -> (JobRecord, Timestamp) {
        let now = Utc::now();
        let mut record = JobRecord::new(new_job_id(), GenerationParams::new("p"), 0, now);
        record.status = crate::job::JobStatus::Running;
        record.queue_position = None;
        record.started_at = Some(now - Duration::seconds(started_secs_ago));
        (record, now)
    }

    // -----------------------------------------------------------------------
    // Stage matching
    // -----------------------------------------------------------------------

    #[test]
    fn diffusion_step_message() {
        let update = ProgressUpdate::from_message(42.0, "Diffusion step 10/50");
        assert_eq!(update.stage, Stage::DiffusionSteps);
        assert_eq!(update.stage_progress, Some(20.0));
    }

    #[test]
    fn first_match_wins() {
        // "Loading" precedes "frame" in the stage order.
        let update = ProgressUpdate::from_message(10.0, "Loading frame decoder");
        assert_eq!(update.stage, Stage::LoadingModel);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(Stage::match_message("initializing runtime"), None);
        assert_eq!(
            Stage::match_message("Initializing runtime"),
            Some(Stage::Initializing)
        );
    }

    #[test]
    fn keyword_aliases() {
        assert_eq!(
            Stage::match_message("Encoding text"),
            Some(Stage::ProcessingPrompt)
        );
        assert_eq!(
            Stage::match_message("sampling latent noise"),
            Some(Stage::GeneratingLatents)
        );
        assert_eq!(
            Stage::match_message("writing frame 12"),
            Some(Stage::RenderingFrames)
        );
        assert_eq!(
            Stage::match_message("saving mp4"),
            Some(Stage::FinalizingVideo)
        );
    }

    #[test]
    fn unmatched_message_uses_percent_range() {
        let update = ProgressUpdate::from_message(92.0, "working...");
        assert_eq!(update.stage, Stage::RenderingFrames);
        assert_eq!(update.stage_progress, None);
    }

    #[test]
    fn diffusion_without_step_interpolates() {
        let (mut record, now) = running_record(10);
        let update = ProgressUpdate::from_message(60.0, "Diffusion running");
        apply_progress(&mut record, &update, now);
        assert_eq!(record.current_stage, Some(Stage::DiffusionSteps));
        assert!((record.stage_progress - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_steps_is_ignored() {
        let update = ProgressUpdate::from_message(40.0, "Diffusion step 3/0");
        assert_eq!(update.stage_progress, None);
    }

    #[test]
    fn for_percent_boundaries() {
        assert_eq!(Stage::for_percent(0.0), Stage::Initializing);
        assert_eq!(Stage::for_percent(5.0), Stage::LoadingModel);
        assert_eq!(Stage::for_percent(89.9), Stage::DiffusionSteps);
        assert_eq!(Stage::for_percent(100.0), Stage::FinalizingVideo);
        assert_eq!(Stage::for_percent(250.0), Stage::FinalizingVideo);
    }

    #[test]
    fn ranges_cover_the_whole_scale() {
        let mut expected_start = 0.0;
        for stage in Stage::ALL {
            let (start, end) = stage.percent_range();
            assert_eq!(start, expected_start, "{}", stage.name());
            assert!(end > start);
            expected_start = end;
        }
        assert_eq!(expected_start, 100.0);
    }

    // -----------------------------------------------------------------------
    // Application
    // -----------------------------------------------------------------------

    #[test]
    fn stage_progress_is_clamped() {
        let (mut record, now) = running_record(10);
        // Percent below the stage's range would interpolate negative.
        let update = ProgressUpdate::from_message(2.0, "Rendering output");
        apply_progress(&mut record, &update, now);
        assert_eq!(record.current_stage, Some(Stage::RenderingFrames));
        assert_eq!(record.stage_progress, 0.0);

        let update = ProgressUpdate::new(Stage::Preparing, 18.0).with_stage_progress(140.0);
        apply_progress(&mut record, &update, now);
        assert_eq!(record.stage_progress, 100.0);
    }

    #[test]
    fn latest_update_wins_without_monotonic_enforcement() {
        let (mut record, now) = running_record(10);
        apply_progress(&mut record, &ProgressUpdate::from_message(70.0, "Diffusion step 40/50"), now);
        apply_progress(&mut record, &ProgressUpdate::from_message(8.0, "Loading weights"), now);
        assert_eq!(record.progress_percent, 8.0);
        assert_eq!(record.current_stage, Some(Stage::LoadingModel));
    }

    #[test]
    fn eta_from_elapsed_and_percent() {
        let (mut record, now) = running_record(30);
        apply_progress(&mut record, &ProgressUpdate::new(Stage::DiffusionSteps, 25.0), now);
        // 30s for 25% -> 120s total -> 90s remaining.
        assert_eq!(record.estimated_remaining_seconds, Some(90));
    }

    #[test]
    fn eta_omitted_at_zero_percent() {
        let (mut record, now) = running_record(30);
        apply_progress(&mut record, &ProgressUpdate::new(Stage::Initializing, 0.0), now);
        assert_eq!(record.estimated_remaining_seconds, None);
    }

    #[test]
    fn eta_omitted_without_start() {
        let now = Utc::now();
        let mut record = JobRecord::new(new_job_id(), GenerationParams::new("p"), 0, now);
        apply_progress(&mut record, &ProgressUpdate::new(Stage::Preparing, 50.0), now);
        assert_eq!(record.estimated_remaining_seconds, None);
    }

    #[test]
    fn eta_never_negative() {
        assert_eq!(estimate_remaining_secs(10.0, 100.0), Some(0));
        assert_eq!(estimate_remaining_secs(10.0, 150.0), Some(0));
        assert_eq!(estimate_remaining_secs(10.0, -5.0), None);
    }

    #[test]
    fn eta_omitted_for_vanishing_percent() {
        assert_eq!(estimate_remaining_secs(10.0, f64::MIN_POSITIVE), None);
        assert_eq!(estimate_remaining_secs(10.0, 1e-9), Some(1_000_000_000_000 - 10));
    }

    #[test]
    fn repeated_message_is_logged_once() {
        let (mut record, now) = running_record(5);
        let before = record.logs.len();
        let update = ProgressUpdate::from_message(12.0, "Loading weights");
        apply_progress(&mut record, &update, now);
        apply_progress(&mut record, &update, now);
        assert_eq!(record.logs.len(), before + 1);
        assert_eq!(record.message.as_deref(), Some("Loading weights"));
    }

    #[test]
    fn stage_serializes_display_name() {
        assert_eq!(
            serde_json::to_value(Stage::DiffusionSteps).unwrap(),
            serde_json::json!("Diffusion Steps")
        );
    }
}
