//! Application service: leftover session use-cases.
//!
//! A session record that survives a run means something may still exist on
//! the provider. `up` refuses to start over one; `cleanup` releases it.

use anyhow::Result;

use crate::application::ports::SessionStore;
use crate::domain::error::SessionError;
use crate::domain::session::SessionRecord;

/// Load the recorded session, if any.
///
/// A record with nothing left in it is stale and is removed.
///
/// # Errors
///
/// Returns an error if the record exists but cannot be read or parsed.
pub async fn find_leftover(store: &impl SessionStore) -> Result<Option<SessionRecord>> {
    match store.load_async().await? {
        Some(record) if record.has_resources() => Ok(Some(record)),
        Some(record) => {
            tracing::debug!(session = %record.session_id, "removing empty session record");
            store.clear_async().await?;
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Fail if a previous session still has resources recorded.
///
/// # Errors
///
/// Returns [`SessionError::Leftover`] when a non-empty record exists.
pub async fn ensure_no_leftover(store: &impl SessionStore) -> Result<()> {
    if let Some(record) = find_leftover(store).await? {
        return Err(SessionError::Leftover {
            session_id: record.session_id,
        }
        .into());
    }
    Ok(())
}

/// Load the record `cleanup` should release.
///
/// # Errors
///
/// Returns [`SessionError::NothingRecorded`] when there is nothing to do.
pub async fn load_for_cleanup(store: &impl SessionStore) -> Result<SessionRecord> {
    find_leftover(store)
        .await?
        .ok_or_else(|| SessionError::NothingRecorded.into())
}
