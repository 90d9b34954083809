//! Notification commands: list, watch, read, read-all.

use std::collections::HashSet;

use school_core::{NotificationId, SessionController, SessionState};
use tracing::{debug, info};

use crate::cli::{GlobalOpts, NotificationsArgs, NotificationsCommand};
use crate::commands::util::resume_session;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output::{self, NotificationRow};

pub async fn handle(
    resolved: &Resolved,
    args: NotificationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let controller = resolved.controller()?;
    resume_session(&controller).await?;

    let result = match args.command {
        NotificationsCommand::List { unread } => {
            list(&controller, unread, global);
            Ok(())
        }
        NotificationsCommand::Watch => watch(&controller, global).await,
        NotificationsCommand::Read { id } => read(&controller, &id, global).await,
        NotificationsCommand::ReadAll => read_all(&controller, global).await,
    };

    shutdown(&controller).await;
    result
}

fn list(controller: &SessionController, unread_only: bool, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let snapshot = controller.notifications();
    let data: Vec<_> = snapshot
        .iter()
        .filter(|n| !unread_only || !n.read)
        .map(|n| n.as_ref().clone())
        .collect();

    let out = output::render_list(
        &global.output,
        &data,
        |n| NotificationRow::new(n, color),
        |n| n.id.to_string(),
    );
    output::print_output(&out, global.quiet);
}

async fn read(controller: &SessionController, raw_id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let id: NotificationId = raw_id.parse().map_err(|_| CliError::Validation {
        field: "id".into(),
        reason: format!("not a notification id: {raw_id}"),
    })?;
    let Some(existing) = controller.notifications().iter().find(|n| n.id == id).cloned() else {
        return Err(CliError::NotificationNotFound { id: raw_id.into() });
    };

    let changed = controller.mark_read(&id).await?;
    if !global.quiet {
        if changed {
            eprintln!("Marked '{}' read", existing.message);
        } else {
            eprintln!("'{}' was already read", existing.message);
        }
    }
    Ok(())
}

async fn read_all(controller: &SessionController, global: &GlobalOpts) -> Result<(), CliError> {
    let flipped = controller.mark_all_read().await?;
    if !global.quiet {
        eprintln!("Marked {flipped} notification(s) read");
    }
    Ok(())
}

/// Print the current list, then every new notification as it arrives.
///
/// Returns when interrupted (Ctrl-C) or when the session ends; an ended
/// session is reported as an error so scripts see a non-zero exit.
async fn watch(controller: &SessionController, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut stream = controller.subscribe_notifications();
    let mut session = controller.session_state();

    let mut seen: HashSet<NotificationId> = HashSet::new();
    for n in stream.current().iter().rev() {
        seen.insert(n.id.clone());
        output::print_output(&output::notification_line(n, color), global.quiet);
    }
    info!(unread = controller.unread_count(), "watching notifications");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                return Ok(());
            }
            changed = session.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = session.borrow_and_update().clone();
                if let SessionState::Ended(reason) = state {
                    return Err(CliError::SessionEnded { reason: reason.to_string() });
                }
            }
            snapshot = stream.changed() => {
                let Some(snapshot) = snapshot else {
                    return Ok(());
                };
                // Newest first; print oldest unseen first.
                for n in snapshot.iter().rev() {
                    if seen.insert(n.id.clone()) {
                        output::print_output(&output::notification_line(n, color), global.quiet);
                    }
                }
            }
        }
    }
}

/// Release the socket without discarding the stored session.
async fn shutdown(controller: &SessionController) {
    if controller.state().is_active() {
        controller.close().await;
    }
}
