use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use comment::{
    default_config_path, filter, init_config, load_config, set_config_value, unset_config_value,
    Commenter, Config, ConfigError, LineOperation, Overrides, Settings, TitleRule, Uncommenter,
};

type Resolver =
    fn(&HashMap<String, Config>, Option<&str>, &Overrides) -> Result<Settings, ConfigError>;

const SETTING_KEYS: [&str; 3] = ["comment", "hrulewidth", "filler"];

/// Add, remove or format comment strings on lines read from standard input
#[derive(Parser)]
#[command(name = "comment", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Named profile from the config file
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Verbose mode
    #[arg(long, global = true)]
    verbose: bool,

    /// Quiet mode
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Add a comment string to the beginning of each line
    #[command(visible_alias = "com")]
    Comment {
        /// Comment string to use instead of the configured one
        #[arg(allow_hyphen_values = true)]
        prefix: Option<String>,
    },

    /// Remove every occurrence of the comment string from each line
    #[command(visible_alias = "ucom")]
    Uncomment {
        /// Comment string to use instead of the configured one
        #[arg(allow_hyphen_values = true)]
        prefix: Option<String>,
    },

    /// Center each non-blank line between filler characters
    #[command(visible_alias = "ht")]
    Htitle {
        /// Comment string whose length is taken off the rule width
        #[arg(allow_hyphen_values = true)]
        prefix: Option<String>,

        /// Filler character to use instead of the configured one
        #[arg(allow_hyphen_values = true)]
        filler: Option<String>,
    },

    /// Write default settings into the config file, keeping existing values
    Init,

    /// Inspect or edit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved settings
    Show,

    /// Print the config file path
    Path,

    /// Store a setting in the config file (in the --profile section if given)
    Set {
        /// Setting name
        #[arg(value_parser = SETTING_KEYS)]
        key: String,

        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Remove a setting from the config file (from the --profile section if given)
    Unset {
        /// Setting name
        #[arg(value_parser = SETTING_KEYS)]
        key: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity flags
    if cli.verbose {
        env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .init();
    } else if cli.quiet {
        env_logger::builder()
            .filter_level(LevelFilter::Error)
            .init();
    } else {
        env_logger::builder().filter_level(LevelFilter::Warn).init();
    }

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    debug!("Using config file {}", config_path.display());
    let profile = cli.profile.as_deref();

    match cli.command {
        Command::Comment { prefix } => {
            let overrides = Overrides {
                prefix,
                filler: None,
            };
            let settings =
                resolve_settings(&config_path, profile, overrides, Settings::resolve_prefix)?;
            run_filter(&Commenter, &settings)
        }
        Command::Uncomment { prefix } => {
            let overrides = Overrides {
                prefix,
                filler: None,
            };
            let settings =
                resolve_settings(&config_path, profile, overrides, Settings::resolve_prefix)?;
            run_filter(&Uncommenter, &settings)
        }
        Command::Htitle { prefix, filler } => {
            let overrides = Overrides { prefix, filler };
            let settings = resolve_settings(&config_path, profile, overrides, Settings::resolve)?;
            run_filter(&TitleRule, &settings)
        }
        Command::Init => init_config(&config_path)
            .with_context(|| format!("could not initialize {}", config_path.display())),
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let settings = resolve_settings(
                    &config_path,
                    profile,
                    Overrides::default(),
                    Settings::resolve,
                )?;
                let yaml = serde_yaml::to_string(&settings).context("could not render settings")?;
                print!("{}", yaml);
                Ok(())
            }
            ConfigAction::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                set_config_value(&config_path, profile, &key, &value)
                    .with_context(|| format!("could not set {}", key))
            }
            ConfigAction::Unset { key } => unset_config_value(&config_path, profile, &key)
                .with_context(|| format!("could not unset {}", key)),
        },
    }
}

/// Loads the config file and resolves the settings for this invocation.
fn resolve_settings(
    path: &Path,
    profile: Option<&str>,
    overrides: Overrides,
    resolver: Resolver,
) -> Result<Settings> {
    let configs = load_config(path)?;
    let settings = resolver(&configs, profile, &overrides)?;
    debug!("Resolved settings: {:?}", settings);
    Ok(settings)
}

fn run_filter(op: &dyn LineOperation, settings: &Settings) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    match filter(op, settings, stdin.lock(), stdout.lock()) {
        Ok(_) => Ok(()),
        Err(e) if e.is_broken_pipe() => {
            debug!("Output closed early: {:#}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
