//! Shared helpers for command handlers.

use std::path::Path;

use school_core::{Identity, SessionController};

use crate::error::CliError;

/// Resume the stored session, failing with `NotLoggedIn` when none exists.
///
/// This opens the push socket and loads the notification snapshot.
pub async fn resume_session(controller: &SessionController) -> Result<Identity, CliError> {
    controller.resume().await?.ok_or(CliError::NotLoggedIn)
}

/// Install the stored credential on the request client only. No socket.
pub fn resume_credential(controller: &SessionController) -> Result<Identity, CliError> {
    controller
        .client()
        .resume()
        .map_err(school_core::CoreError::from)?
        .ok_or(CliError::NotLoggedIn)
}

/// Read and parse a JSON file for `--data-file`.
pub fn read_json_file(path: &Path) -> Result<serde_json::Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "data-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
