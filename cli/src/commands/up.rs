//! `ephem up`: provision, configure, wait for release, tear down.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::cancel::Cancellation;
use crate::application::services::lifecycle::{LifecycleController, LifecyclePorts};
use crate::application::services::{cleanup, prerequisites, settings};
use crate::domain::error::WorkloadError;
use crate::domain::resources::generate_resource_name;
use crate::domain::workload::{CATALOG, Workload, WorkloadSelection};
use crate::infra::aws::AwsCliCompute;
use crate::infra::clock::TokioClock;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::key_store::FsKeyStore;
use crate::infra::signals;
use crate::infra::ssh::OpenSshClient;
use crate::infra::trigger::StdinTrigger;
use crate::output::reporter::TerminalReporter;

/// Arguments for the up command.
#[derive(Args)]
pub struct UpArgs {
    /// Workload to run: a (nginx), b (mysql) or c (custom). Prompts if omitted
    pub workload: Option<String>,

    /// Docker image to run instead of the workload's default
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Release automatically after this many seconds
    #[arg(long, value_name = "SECS")]
    pub hold: Option<u64>,
}

/// Run the up command.
///
/// # Errors
///
/// Returns an error if a precondition fails before anything is created.
/// Failures after that are reported in the run summary and the exit code.
pub async fn run(app: &AppContext, args: UpArgs) -> Result<ExitCode> {
    let runner = TokioCommandRunner::default();
    let tools = prerequisites::check(&runner).await?;
    tracing::info!(aws_cli = %tools.aws_cli, ssh = %tools.ssh, "host tools found");

    cleanup::ensure_no_leftover(&app.session_store).await?;
    let settings = settings::load_settings(&app.settings_store)?;
    let workload = select_workload(app, args.workload.as_deref())?;
    let selection = WorkloadSelection::resolve(
        workload,
        args.image.as_deref(),
        settings.workloads.custom_image.as_deref(),
    )?;

    let compute = AwsCliCompute::new(
        runner.clone(),
        settings.region.clone(),
        settings.profile.clone(),
    );
    let shell = OpenSshClient::new(runner);
    let keys = FsKeyStore::new()?;
    let clock = TokioClock::new();

    let cancel = Cancellation::new();
    let listener = signals::spawn_listener(cancel.clone()).context("installing signal handlers")?;

    let ports = LifecyclePorts {
        compute: &compute,
        keys: &keys,
        shell: &shell,
        store: &app.session_store,
        clock: &clock,
    };
    let session_id = generate_resource_name();
    tracing::info!(session = %session_id, workload = %selection.workload(), image = selection.image(), "starting run");
    app.output.header(&format!(
        "Session {session_id}: {} ({})",
        selection.workload(),
        selection.image()
    ));

    let mut controller = LifecycleController::new(ports, &settings, cancel, session_id);
    let mut trigger = StdinTrigger::new(args.hold.map(Duration::from_secs));
    let renderer = app.renderer();
    let summary = {
        let reporter = TerminalReporter::new(&app.output);
        controller
            .run(&selection, &mut trigger, &reporter, |results| {
                renderer.render_commands(results);
                renderer.render_release_prompt(args.hold);
            })
            .await
    };
    listener.abort();

    renderer.render_run(&summary)?;
    Ok(ExitCode::from(summary.exit_code()))
}

fn select_workload(app: &AppContext, given: Option<&str>) -> Result<Workload> {
    if let Some(given) = given {
        return Ok(given.parse()?);
    }
    let items: Vec<String> = CATALOG
        .iter()
        .map(|w| format!("{}) {:<7} {}", w.label(), w.name(), w.description()))
        .collect();
    let Some(index) = app.choose("Choose a workload", &items)? else {
        return Err(WorkloadError::NotSelected.into());
    };
    CATALOG
        .get(index)
        .copied()
        .context("selection out of range")
}
