//! Holds the configuration file schema (`Config`), the resolved per-invocation
//! `Settings`, and the functions that load, resolve, initialize and edit them.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

/// Comment string used when nothing else is configured. Title rules always start with it.
pub const DEFAULT_COMMENT: &str = "// ";
pub const DEFAULT_RULE_WIDTH: usize = 72;
pub const DEFAULT_FILLER: char = '-';
pub const MAX_RULE_WIDTH: usize = 4096;

pub const DEFAULT_CONFIG_KEY: &str = "base";

// Top-level keys that belong to the base profile rather than naming a profile.
const CONFIG_FIELDS: &[&str] = &["comment", "hrulewidth", "filler"];

/// One group of settings as written in the configuration file.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// String added to or removed from each line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Target width of a title rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hrulewidth: Option<RuleWidth>,
    /// Character repeated around a title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filler: Option<String>,
}

/// `hrulewidth` may be written as a number or as a numeric string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RuleWidth {
    Number(i64),
    Text(String),
}

impl RuleWidth {
    fn to_width(&self) -> Result<usize, ConfigError> {
        let parsed = match self {
            RuleWidth::Number(n) => usize::try_from(*n).ok(),
            RuleWidth::Text(s) => s.trim().parse::<usize>().ok(),
        };
        match parsed {
            Some(width) if (1..=MAX_RULE_WIDTH).contains(&width) => Ok(width),
            _ => Err(ConfigError::InvalidWidth(self.to_string())),
        }
    }
}

impl std::fmt::Display for RuleWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleWidth::Number(n) => write!(f, "{}", n),
            RuleWidth::Text(s) => f.write_str(s),
        }
    }
}

impl Config {
    /// Returns a copy of `self` with every field that `other` sets replaced.
    pub fn merged(&self, other: &Config) -> Config {
        Config {
            comment: other.comment.clone().or_else(|| self.comment.clone()),
            hrulewidth: other.hrulewidth.clone().or_else(|| self.hrulewidth.clone()),
            filler: other.filler.clone().or_else(|| self.filler.clone()),
        }
    }
}

/// Immutable settings for one invocation, fed to every line transform.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Settings {
    #[serde(rename = "comment")]
    pub prefix: String,
    #[serde(rename = "hrulewidth")]
    pub rule_width: usize,
    pub filler: char,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_COMMENT.to_string(),
            rule_width: DEFAULT_RULE_WIDTH,
            filler: DEFAULT_FILLER,
        }
    }
}

/// Values given as positional arguments on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub prefix: Option<String>,
    pub filler: Option<String>,
}

/// Merges the selected profile over the base profile.
fn layered(
    configs: &HashMap<String, Config>,
    profile: Option<&str>,
) -> Result<Config, ConfigError> {
    let base = configs
        .get(DEFAULT_CONFIG_KEY)
        .cloned()
        .unwrap_or_default();

    match profile {
        Some(name) => {
            let named = configs
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;
            Ok(base.merged(named))
        }
        None => Ok(base),
    }
}

fn layered_prefix(layered: &Config, overrides: &Overrides) -> String {
    overrides
        .prefix
        .clone()
        .or_else(|| layered.comment.clone())
        .unwrap_or_else(|| DEFAULT_COMMENT.to_string())
}

impl Settings {
    /// Layers defaults, the base profile, the selected profile and the
    /// command-line overrides, then validates the result.
    pub fn resolve(
        configs: &HashMap<String, Config>,
        profile: Option<&str>,
        overrides: &Overrides,
    ) -> Result<Settings, ConfigError> {
        let layered = layered(configs, profile)?;
        let prefix = layered_prefix(&layered, overrides);

        let rule_width = match &layered.hrulewidth {
            Some(width) => width.to_width()?,
            None => DEFAULT_RULE_WIDTH,
        };

        let filler = match overrides.filler.as_deref().or(layered.filler.as_deref()) {
            Some(raw) => parse_filler(raw)?,
            None => DEFAULT_FILLER,
        };

        Ok(Settings {
            prefix,
            rule_width,
            filler,
        })
    }

    /// Like [`Settings::resolve`], but only the comment string is read.
    ///
    /// `comment` and `uncomment` never look at the rule width or the filler,
    /// so those keep their defaults and a bad value for them is not an error.
    pub fn resolve_prefix(
        configs: &HashMap<String, Config>,
        profile: Option<&str>,
        overrides: &Overrides,
    ) -> Result<Settings, ConfigError> {
        let layered = layered(configs, profile)?;
        Ok(Settings {
            prefix: layered_prefix(&layered, overrides),
            ..Settings::default()
        })
    }
}

fn parse_filler(raw: &str) -> Result<char, ConfigError> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::InvalidFiller(raw.to_string())),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file '{}'", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config file '{}' must contain a mapping at the top level", .0.display())]
    NotAMapping(PathBuf),
    #[error("profile '{0}' not found in config file")]
    UnknownProfile(String),
    #[error("hrulewidth must be a positive integer no greater than 4096, got '{0}'")]
    InvalidWidth(String),
    #[error("filler must be exactly one character, got '{0}'")]
    InvalidFiller(String),
    #[error("unknown setting '{0}', expected one of: comment, hrulewidth, filler")]
    UnknownKey(String),
    #[error("'{0}' is a setting name and cannot be used as a profile")]
    ReservedProfile(String),
    #[error("profile '{0}' in config file is not a mapping")]
    ProfileNotAMapping(String),
    #[error("failed to write config file '{}'", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize config")]
    Serialize(#[source] serde_yaml::Error),
}

/// Location of the configuration file when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(mut root) => {
            root.push("comment");
            root.push("config.yaml");
            root
        }
        None => PathBuf::from("comment.yaml"),
    }
}

/// Reads the top-level mapping of a config file. An empty file is an empty mapping.
fn read_mapping(path: &Path) -> Result<Mapping, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ConfigError::NotAMapping(path.to_path_buf())),
    }
}

/// Loads every profile from the config file at `path`.
///
/// Top-level `comment`, `hrulewidth` and `filler` keys form the `base` profile;
/// any other key names a profile of its own. A missing file yields an empty
/// `base` profile, so the built-in defaults apply.
pub fn load_config(path: &Path) -> Result<HashMap<String, Config>, ConfigError> {
    let mut configs = HashMap::new();

    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        configs.insert(DEFAULT_CONFIG_KEY.to_string(), Config::default());
        return Ok(configs);
    }

    let mapping = read_mapping(path)?;
    let parse_err = |source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut base_map = Mapping::new();
    for (key, value) in mapping {
        let Some(key_str) = key.as_str() else {
            warn!("Ignoring non-string key {:?} in {}", key, path.display());
            continue;
        };
        if CONFIG_FIELDS.contains(&key_str) {
            base_map.insert(key, value);
        } else {
            let named: Config = serde_yaml::from_value(value).map_err(parse_err)?;
            configs.insert(key_str.to_string(), named);
        }
    }

    let base: Config = serde_yaml::from_value(Value::Mapping(base_map)).map_err(parse_err)?;
    configs
        .entry(DEFAULT_CONFIG_KEY.to_string())
        .and_modify(|named_base| *named_base = named_base.merged(&base))
        .or_insert(base);

    debug!("Loaded {} profile(s) from {}", configs.len(), path.display());
    Ok(configs)
}

/// Writes the default settings into the config file at `path`.
///
/// Keys that already hold a value are kept, as are named profiles. Parent
/// directories are created as needed.
pub fn init_config(path: &Path) -> Result<(), ConfigError> {
    let mut mapping = if path.exists() {
        read_mapping(path)?
    } else {
        Mapping::new()
    };

    let defaults = [
        ("comment", Value::from(DEFAULT_COMMENT)),
        ("hrulewidth", Value::from(DEFAULT_RULE_WIDTH as u64)),
        ("filler", Value::from(DEFAULT_FILLER.to_string())),
    ];
    for (key, value) in defaults {
        if matches!(mapping.get(key), None | Some(Value::Null)) {
            debug!("Setting {} to its default", key);
            mapping.insert(Value::from(key), value);
        }
    }

    write_mapping(path, mapping)?;
    info!("Wrote configuration to {}", path.display());
    Ok(())
}

/// Stores one setting in the config file, in the base profile or in `profile`.
///
/// The value is checked with the same rules used when resolving settings;
/// `hrulewidth` is written as a number. A missing profile is created.
pub fn set_config_value(
    path: &Path,
    profile: Option<&str>,
    key: &str,
    raw: &str,
) -> Result<(), ConfigError> {
    let value = config_value(key, raw)?;
    let mut mapping = if path.exists() {
        read_mapping(path)?
    } else {
        Mapping::new()
    };

    profile_mapping(&mut mapping, profile, true)?.insert(Value::from(key), value);
    write_mapping(path, mapping)?;

    info!("Set {} in {}", key, path.display());
    Ok(())
}

/// Removes one setting from the base profile or from `profile`, so the
/// built-in default (or the base value) applies again.
pub fn unset_config_value(
    path: &Path,
    profile: Option<&str>,
    key: &str,
) -> Result<(), ConfigError> {
    if !CONFIG_FIELDS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    if !path.exists() {
        debug!("No config file at {}, nothing to unset", path.display());
        return Ok(());
    }

    let mut mapping = read_mapping(path)?;
    if profile_mapping(&mut mapping, profile, false)?.remove(key).is_none() {
        warn!("{} is not set in {}", key, path.display());
        return Ok(());
    }
    write_mapping(path, mapping)?;

    info!("Unset {} in {}", key, path.display());
    Ok(())
}

fn config_value(key: &str, raw: &str) -> Result<Value, ConfigError> {
    match key {
        "comment" => Ok(Value::from(raw)),
        "hrulewidth" => {
            let width = RuleWidth::Text(raw.to_string()).to_width()?;
            Ok(Value::from(width as u64))
        }
        "filler" => Ok(Value::from(parse_filler(raw)?.to_string())),
        _ => Err(ConfigError::UnknownKey(key.to_string())),
    }
}

/// Finds the mapping that holds the settings of `profile`; the top level for
/// the base profile.
fn profile_mapping<'a>(
    mapping: &'a mut Mapping,
    profile: Option<&str>,
    create: bool,
) -> Result<&'a mut Mapping, ConfigError> {
    let name = match profile {
        Some(name) if name != DEFAULT_CONFIG_KEY => name,
        _ => return Ok(mapping),
    };
    if CONFIG_FIELDS.contains(&name) {
        return Err(ConfigError::ReservedProfile(name.to_string()));
    }

    if matches!(mapping.get(name), None | Some(Value::Null)) {
        if !create {
            return Err(ConfigError::UnknownProfile(name.to_string()));
        }
        mapping.insert(Value::from(name), Value::Mapping(Mapping::new()));
    }

    match mapping.get_mut(name) {
        Some(Value::Mapping(profile_map)) => Ok(profile_map),
        _ => Err(ConfigError::ProfileNotAMapping(name.to_string())),
    }
}

fn write_mapping(path: &Path, mapping: Mapping) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(&Value::Mapping(mapping)).map_err(ConfigError::Serialize)?;

    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }
    fs::write(path, yaml).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles(entries: &[(&str, Config)]) -> HashMap<String, Config> {
        entries
            .iter()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect()
    }

    #[test]
    fn resolve_with_nothing_configured_uses_defaults() {
        let settings = Settings::resolve(&HashMap::new(), None, &Overrides::default()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn profile_overrides_base_field_by_field() {
        let configs = profiles(&[
            (
                DEFAULT_CONFIG_KEY,
                Config {
                    comment: Some("# ".into()),
                    hrulewidth: Some(RuleWidth::Number(80)),
                    filler: None,
                },
            ),
            (
                "sql",
                Config {
                    comment: Some("-- ".into()),
                    ..Config::default()
                },
            ),
        ]);

        let settings = Settings::resolve(&configs, Some("sql"), &Overrides::default()).unwrap();
        assert_eq!(settings.prefix, "-- ");
        assert_eq!(settings.rule_width, 80);
        assert_eq!(settings.filler, DEFAULT_FILLER);
    }

    #[test]
    fn positional_overrides_win() {
        let configs = profiles(&[(
            DEFAULT_CONFIG_KEY,
            Config {
                comment: Some("# ".into()),
                hrulewidth: None,
                filler: Some("=".into()),
            },
        )]);
        let overrides = Overrides {
            prefix: Some("; ".into()),
            filler: Some("*".into()),
        };

        let settings = Settings::resolve(&configs, None, &overrides).unwrap();
        assert_eq!(settings.prefix, "; ");
        assert_eq!(settings.filler, '*');
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = Settings::resolve(&HashMap::new(), Some("lua"), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "lua"));
    }

    #[test]
    fn width_accepts_numeric_strings() {
        assert_eq!(RuleWidth::Text("72".into()).to_width().unwrap(), 72);
        assert_eq!(RuleWidth::Number(40).to_width().unwrap(), 40);
    }

    #[test]
    fn prefix_only_resolution_ignores_bad_rule_settings() {
        let configs = profiles(&[(
            DEFAULT_CONFIG_KEY,
            Config {
                comment: Some("# ".into()),
                hrulewidth: Some(RuleWidth::Text("wide".into())),
                filler: Some("==".into()),
            },
        )]);

        assert!(Settings::resolve(&configs, None, &Overrides::default()).is_err());
        let settings =
            Settings::resolve_prefix(&configs, None, &Overrides::default()).unwrap();
        assert_eq!(settings.prefix, "# ");
    }

    #[test]
    fn prefix_only_resolution_still_checks_profile() {
        let err = Settings::resolve_prefix(&HashMap::new(), Some("lua"), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(_)));
    }

    #[test]
    fn width_has_an_upper_bound() {
        assert_eq!(
            RuleWidth::Number(MAX_RULE_WIDTH as i64).to_width().unwrap(),
            MAX_RULE_WIDTH
        );
        assert!(matches!(
            RuleWidth::Text("1000000000000".into()).to_width(),
            Err(ConfigError::InvalidWidth(_))
        ));
    }

    #[test]
    fn width_rejects_zero_negative_and_text() {
        for width in [
            RuleWidth::Number(0),
            RuleWidth::Number(-3),
            RuleWidth::Number(MAX_RULE_WIDTH as i64 + 1),
            RuleWidth::Text("wide".into()),
        ] {
            assert!(matches!(
                width.to_width(),
                Err(ConfigError::InvalidWidth(_))
            ));
        }
    }

    #[test]
    fn filler_must_be_one_character() {
        assert_eq!(parse_filler("=").unwrap(), '=');
        assert_eq!(parse_filler("─").unwrap(), '─');
        assert!(matches!(parse_filler(""), Err(ConfigError::InvalidFiller(_))));
        assert!(matches!(parse_filler("-="), Err(ConfigError::InvalidFiller(_))));
    }

    #[test]
    fn settings_serialize_with_config_field_names() {
        let yaml = serde_yaml::to_string(&Settings::default()).unwrap();
        assert!(yaml.contains("comment: '// '") || yaml.contains("comment: \"// \""));
        assert!(yaml.contains("hrulewidth: 72"));
        assert!(yaml.contains("filler: '-'") || yaml.contains("filler: \"-\""));
    }
}
