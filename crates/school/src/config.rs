//! Profile resolution with CLI flag overrides.
//!
//! `school-config` owns the TOML types; this module layers `--server`,
//! `--insecure`, and `--timeout` over them and picks the session store.

use std::path::PathBuf;

use school_config::{Config, Profile, SessionStoreKind};
use school_core::{SessionConfig, SessionController};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command needs to talk to the server.
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub session: SessionConfig,
}

/// Path of the config file in use.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(school_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(school_config::load_config_from(&config_path(global))?)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default(global: &GlobalOpts) -> Config {
    load_config(global).unwrap_or_default()
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Resolve the active profile, applying flag overrides.
///
/// With no matching profile, `--server` alone is enough: an ad-hoc
/// profile is built around it.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match (cfg.profiles.get(&profile_name), global.server.as_deref()) {
        (Some(profile), _) => profile.clone(),
        (None, Some(server)) => Profile::new(server),
        (None, None) if global.profile.is_some() => {
            let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };

    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let session = school_config::profile_to_session_config(&profile, &cfg.defaults)?;
    Ok(Resolved {
        profile_name,
        profile,
        session,
    })
}

impl Resolved {
    /// Build a controller backed by the profile's session store.
    pub fn controller(&self) -> Result<SessionController, CliError> {
        let store = school_config::build_session_store(&self.profile, &self.profile_name);
        Ok(SessionController::new(self.session.clone(), store)?)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.profile.session_store == SessionStoreKind::Memory
    }
}
