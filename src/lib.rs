//! Line filters for comment strings: add a prefix to every line, strip it
//! again, or turn lines into centered title rules.

pub mod config;
pub mod stream;
pub mod traits;
pub mod transform;

pub use config::{
    default_config_path, init_config, load_config, set_config_value, unset_config_value, Config,
    ConfigError, Overrides, RuleWidth, Settings, DEFAULT_COMMENT, DEFAULT_CONFIG_KEY,
    DEFAULT_FILLER, DEFAULT_RULE_WIDTH, MAX_RULE_WIDTH,
};
pub use stream::{filter, StreamError};
pub use traits::LineOperation;
pub use transform::{title_sides, Commenter, TitleRule, Uncommenter};
