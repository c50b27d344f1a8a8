//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::lifecycle::{RunOutcome, RunSummary};
use crate::domain::config::Settings;
use crate::domain::remote::CommandResult;
use crate::domain::session::{
    LifecycleState, LiveHandle, ReleaseCause, ReleaseStatus, SessionRecord, TeardownReport,
};
use crate::domain::workload::Workload;
use crate::output::OutputContext;

/// Captured output longer than this is cut to its last lines.
const MAX_OUTPUT_LINES: usize = 20;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.info(&format!("ephem v{version}"));
    }

    /// Render the workload menu.
    pub fn render_workloads(&self, catalog: &[Workload], custom_image: Option<&str>) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("Workloads:");
        for workload in catalog {
            let image = match workload {
                Workload::Custom => custom_image.unwrap_or("--image required"),
                _ => workload.default_image().unwrap_or_default(),
            };
            println!(
                "    {}  {:<7} {}  {}",
                workload.label().style(self.ctx.styles.resource),
                workload.name(),
                workload.description(),
                format!("({image})").style(self.ctx.styles.muted),
            );
        }
    }

    /// Render every setting with its effective value.
    pub fn render_settings(&self, settings: &Settings, path: &Path) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("Settings:");
        let entries = settings.entries();
        let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in entries {
            println!("    {:<width$}  {value}", key.style(self.ctx.styles.muted));
        }
        println!();
        self.ctx.kv("Config file:", &path.display().to_string());
    }

    pub fn render_setting_updated(&self, key: &str, value: &str) {
        self.ctx.success(&format!("Set {key} = {value}"));
    }

    /// Render the persisted session record.
    pub fn render_status(&self, record: Option<&SessionRecord>) {
        if self.ctx.quiet {
            return;
        }
        let Some(record) = record else {
            self.ctx.info("No recorded session.");
            return;
        };
        self.ctx.kv("Session:", &record.session_id);
        self.ctx.kv("Phase:", phase_display(record.phase));
        self.ctx.kv("Region:", &record.region);
        if let Some(workload) = &record.workload {
            self.ctx.kv("Workload:", workload);
        }
        self.ctx.kv(
            "Updated:",
            &record.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );

        if record.has_resources() {
            println!();
            self.ctx.header("Resources:");
            for handle in &record.live {
                self.render_handle(handle, "live");
            }
            for handle in &record.unreleased {
                self.render_handle(handle, "release failed");
            }
            println!();
            self.ctx.info("Run: ephem cleanup");
        }
    }

    fn render_handle(&self, handle: &LiveHandle, note: &str) {
        println!(
            "    {} {}  {}",
            handle.resource.kind(),
            handle.resource.id().style(self.ctx.styles.resource),
            note.style(self.ctx.styles.muted),
        );
    }

    /// Render each remote command with its captured output.
    pub fn render_commands(&self, results: &[CommandResult]) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Remote commands:");
        for result in results {
            if result.succeeded() {
                self.ctx.success(&result.command);
            } else {
                let status = result
                    .exit_status
                    .map_or_else(|| "killed".to_string(), |c| format!("exit {c}"));
                self.ctx.warn(&format!("{} ({status})", result.command));
            }
            self.render_captured(&result.stdout);
            self.render_captured(&result.stderr);
        }
        println!();
    }

    fn render_captured(&self, text: &str) {
        let lines: Vec<&str> = text.lines().collect();
        let skip = lines.len().saturating_sub(MAX_OUTPUT_LINES);
        if skip > 0 {
            println!(
                "      {}",
                format!("... {skip} earlier lines").style(self.ctx.styles.captured)
            );
        }
        for line in &lines[skip..] {
            println!("      {}", line.style(self.ctx.styles.captured));
        }
    }

    pub fn render_release_prompt(&self, hold_secs: Option<u64>) {
        match hold_secs {
            Some(secs) => self.ctx.info(&format!(
                "Workload is up. Releasing in {secs}s, or press Enter to release now."
            )),
            None => self
                .ctx
                .info("Workload is up. Press Enter (or Ctrl-C) to release it."),
        }
    }

    /// Render the end of a run: teardown status, then the outcome.
    pub fn render_run(&self, summary: &RunSummary) {
        self.render_teardown(&summary.teardown);
        match &summary.outcome {
            RunOutcome::Released { cause } => {
                let how = match cause {
                    ReleaseCause::Operator => "on request",
                    ReleaseCause::HoldElapsed => "after the hold elapsed",
                    ReleaseCause::Signal => "on signal",
                };
                if summary.teardown.is_clean() {
                    self.ctx.success(&format!(
                        "Workload {} ({}) released {how}",
                        summary.workload, summary.image
                    ));
                }
            }
            RunOutcome::Failed { message, .. } => self.ctx.error(message),
            RunOutcome::Interrupted => self.ctx.warn("Interrupted"),
        }
    }

    pub fn render_cleanup(&self, session_id: &str, report: &TeardownReport) {
        self.render_teardown(report);
        if report.is_clean() {
            self.ctx.success(&format!("Session {session_id} cleaned up"));
        }
    }

    fn render_teardown(&self, report: &TeardownReport) {
        if report.is_clean() {
            return;
        }
        // Failures are never quiet: something may still be billing.
        for release in &report.releases {
            if release.status == ReleaseStatus::Failed {
                self.ctx
                    .error(&format!("{} {} was not released", release.resource, release.id));
            }
        }
        for warning in report.warnings() {
            self.ctx.error(&warning.to_string());
        }
        self.ctx
            .error("Some resources may still exist. Run: ephem cleanup");
    }
}

fn phase_display(phase: LifecycleState) -> &'static str {
    match phase {
        LifecycleState::Idle => "idle",
        LifecycleState::CredentialAcquired => "credential acquired",
        LifecycleState::InstanceAcquired => "instance acquired",
        LifecycleState::Configured => "configured",
        LifecycleState::Failing => "failing",
        LifecycleState::Releasing => "releasing",
        LifecycleState::Released => "released",
    }
}
