//! `ephem status`: show the recorded session, if any.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::cleanup;

/// Run the status command.
///
/// # Errors
///
/// Returns an error if the session record exists but cannot be read.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let record = cleanup::find_leftover(&app.session_store).await?;
    app.renderer().render_status(record.as_ref())?;
    Ok(ExitCode::SUCCESS)
}
