//! `ephem cleanup`: release whatever a previous run left behind.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::lifecycle::{LifecycleController, LifecyclePorts};
use crate::application::services::{cleanup, prerequisites, settings};
use crate::infra::aws::AwsCliCompute;
use crate::infra::clock::TokioClock;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::key_store::FsKeyStore;
use crate::infra::ssh::OpenSshClient;
use crate::output::reporter::TerminalReporter;

/// Run the cleanup command.
///
/// The provider calls go to the region and profile stored in the record,
/// not the current settings.
///
/// # Errors
///
/// Returns an error if there is no recorded session or a prerequisite is
/// missing.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let record = cleanup::load_for_cleanup(&app.session_store).await?;
    if !app.confirm(
        &format!("Release the resources of session {}?", record.session_id),
        true,
    )? {
        app.output.info("Cleanup cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let runner = TokioCommandRunner::default();
    prerequisites::check(&runner).await?;
    let settings = settings::load_settings(&app.settings_store)?;

    let compute = AwsCliCompute::new(runner.clone(), record.region.clone(), record.profile.clone());
    let shell = OpenSshClient::new(runner);
    let keys = FsKeyStore::new()?;
    let clock = TokioClock::new();
    let ports = LifecyclePorts {
        compute: &compute,
        keys: &keys,
        shell: &shell,
        store: &app.session_store,
        clock: &clock,
    };

    let mut controller = LifecycleController::resume(ports, &settings, &record);
    let report = {
        let reporter = TerminalReporter::new(&app.output);
        controller.teardown(&reporter).await
    };

    app.renderer().render_cleanup(&record.session_id, &report)?;
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
