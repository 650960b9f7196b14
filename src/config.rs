//! Per-thread defaults read while operations are compiled.
//!
//! Changing the config only affects schemas compiled afterwards: an operation
//! that is already cached on a node keeps the settings it was built with.
use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::path_de;

/// What an object schema does with keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeys {
    /// Drop them from the parsed value.
    #[default]
    Strip,
    /// Fail with an excess-field error.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Policy for objects that did not pick one with `strict()`/`strip()`.
    pub unknown_keys: UnknownKeys,
}

impl Config {
    /// Read a config document such as `{"unknownKeys": "strict"}`. Omitted
    /// settings keep their defaults.
    pub fn from_json_str(src: &str) -> anyhow::Result<Config> {
        let config = path_de::from_str_with_path(src)?;
        Ok(config)
    }
}

thread_local! {
    static GLOBAL: RefCell<Config> = RefCell::new(Config::default());
}

pub fn set_global_config(config: Config) {
    tracing::debug!(?config, "global config replaced");
    GLOBAL.with(|global| *global.borrow_mut() = config);
}

pub fn global_config() -> Config {
    GLOBAL.with(|global| global.borrow().clone())
}

pub fn reset_global_config() {
    set_global_config(Config::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_partial_documents() {
        assert_eq!(Config::from_json_str("{}").unwrap(), Config::default());
        let strict = Config::from_json_str(r#"{"unknownKeys": "strict"}"#).unwrap();
        assert_eq!(strict.unknown_keys, UnknownKeys::Strict);
    }

    #[test]
    fn bad_documents_name_the_offending_key() {
        let error = Config::from_json_str(r#"{"unknownKeys": "sometimes"}"#).unwrap_err();
        assert!(error.to_string().contains("unknownKeys"), "{error}");
    }

    #[test]
    fn global_config_is_replaceable() {
        set_global_config(Config { unknown_keys: UnknownKeys::Strict });
        assert_eq!(global_config().unknown_keys, UnknownKeys::Strict);
        reset_global_config();
        assert_eq!(global_config(), Config::default());
    }
}
