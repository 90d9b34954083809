//! Command dispatch: bridges CLI args -> session controller -> output formatting.

pub mod config_cmd;
pub mod notifications;
pub mod request;
pub mod session;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => session::login(resolved, args, global).await,
        Command::Logout => session::logout(resolved, global).await,
        Command::Whoami => session::whoami(resolved, global),
        Command::Request(args) => request::handle(resolved, args, global).await,
        Command::Notifications(args) => notifications::handle(resolved, args, global).await,
        // Handled before a profile is resolved.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
