//! Config subcommand handlers.

use dialoguer::{Input, Select};

use school_config::{Config, Profile, SessionStoreKind};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, StoreKindArg};
use crate::commands::util::prompt_err;
use crate::config;
use crate::error::CliError;
use crate::output;

impl From<StoreKindArg> for SessionStoreKind {
    fn from(arg: StoreKindArg) -> Self {
        match arg {
            StoreKindArg::Keyring => Self::Keyring,
            StoreKindArg::File => Self::File,
            StoreKindArg::Memory => Self::Memory,
        }
    }
}

fn save(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    Ok(school_config::save_config_to(cfg, &config::config_path(global))?)
}

/// Insert a profile, making it the default when it is the first one.
fn upsert_profile(cfg: &mut Config, name: &str, profile: Profile) {
    if cfg.profiles.is_empty() {
        cfg.default_profile = Some(name.into());
    }
    cfg.profiles.insert(name.into(), profile);
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = config::load_config(global)?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{e}")),
                |c| c.default_profile.clone().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), false);
            Ok(())
        }

        ConfigCommand::AddProfile {
            name,
            url,
            email,
            store,
        } => {
            url::Url::parse(&url).map_err(|e| CliError::Validation {
                field: "server".into(),
                reason: format!("invalid URL: {e}"),
            })?;
            let mut cfg = config::load_config_or_default(global);
            let mut profile = Profile::new(url);
            profile.email = email;
            profile.session_store = store.into();
            upsert_profile(&mut cfg, &name, profile);
            save(&cfg, global)?;
            if !global.quiet {
                eprintln!("Profile '{name}' saved");
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config(global)?;
            if !cfg.profiles.contains_key(&name) {
                let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                names.sort_unstable();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: names.join(", "),
                });
            }
            cfg.default_profile = Some(name.clone());
            save(&cfg, global)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default(global);
            let mut names: Vec<String> = cfg.profiles.keys().cloned().collect();
            names.sort_unstable();
            let default = cfg.default_profile.unwrap_or_default();
            let out = names
                .iter()
                .map(|n| {
                    let marker = if *n == default { "*" } else { " " };
                    format!("{marker} {n}")
                })
                .collect::<Vec<_>>()
                .join("\n");
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path(global);
    eprintln!("school -- configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("Server URL")
        .default("http://localhost:8000".into())
        .validate_with(|input: &String| {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("invalid URL: {e}"))
        })
        .interact_text()
        .map_err(prompt_err)?;

    let email: String = Input::new()
        .with_prompt("Email (optional)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let store_choices = &[
        "Session file in the data directory (default)",
        "System keyring",
        "Memory only (log in every time)",
    ];
    let store = match Select::new()
        .with_prompt("Where to keep the session?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?
    {
        1 => SessionStoreKind::Keyring,
        2 => SessionStoreKind::Memory,
        _ => SessionStoreKind::File,
    };

    let mut profile = Profile::new(server);
    profile.email = (!email.is_empty()).then_some(email);
    profile.session_store = store;

    let mut cfg = config::load_config_or_default(global);
    upsert_profile(&mut cfg, &profile_name, profile);
    cfg.default_profile = Some(profile_name.clone());
    save(&cfg, global)?;

    eprintln!("\nConfiguration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Next: school login");
    Ok(())
}
