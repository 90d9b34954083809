//! login / logout / whoami.

use dialoguer::Input;
use secrecy::SecretString;

use school_core::Identity;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::commands::util::{prompt_err, resume_credential};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

pub async fn login(resolved: &Resolved, args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let email = match args.email.or_else(|| resolved.profile.email.clone()) {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(prompt_err)?,
    };

    let password = match args.password_env {
        Some(var) => std::env::var(&var).map_err(|_| CliError::Validation {
            field: "password-env".into(),
            reason: format!("environment variable {var} is not set"),
        })?,
        None => rpassword::prompt_password("Password: ").map_err(prompt_err)?,
    };
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }

    let controller = resolved.controller()?;
    let identity = controller
        .client()
        .login(&email, &SecretString::from(password))
        .await
        .map_err(school_core::CoreError::from)?;

    if resolved.uses_memory_store() && !global.quiet {
        eprintln!("note: profile '{}' keeps sessions in memory only", resolved.profile_name);
    }
    render_identity(&identity, global);
    Ok(())
}

pub async fn logout(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let controller = resolved.controller()?;
    controller.logout().await?;
    if !global.quiet {
        eprintln!("Logged out of profile '{}'", resolved.profile_name);
    }
    Ok(())
}

pub fn whoami(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let controller = resolved.controller()?;
    let identity = resume_credential(&controller)?;
    render_identity(&identity, global);
    Ok(())
}

fn render_identity(identity: &Identity, global: &GlobalOpts) {
    let out = output::render_single(
        &global.output,
        identity,
        |i| {
            format!(
                "Name:   {}\nEmail:  {}\nRole:   {}\nID:     {}",
                i.display_name, i.email, i.role, i.id
            )
        },
        |i| i.email.clone(),
    );
    output::print_output(&out, global.quiet);
}
