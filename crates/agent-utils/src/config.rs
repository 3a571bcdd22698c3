//! Environment configuration helpers
//!
//! Configuration structs across the workspace read their values through
//! these helpers so that blank variables behave like unset ones. [`Env`]
//! wraps any lookup function, which lets callers feed values from a map
//! instead of the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when an environment variable holds an unparsable value
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// The variable is set but its value cannot be parsed
    #[error("Invalid value '{value}' for {key}: {detail}")]
    Invalid {
        key: String,
        value: String,
        detail: String,
    },
}

/// Load a `.env` file from the current directory or its parents
///
/// Returns the path of the loaded file. A missing file is not an error.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env file");
            Some(path)
        }
        Err(_) => None,
    }
}

fn process_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Variable reader over a lookup function
pub struct Env<F = fn(&str) -> Option<String>> {
    lookup: F,
}

impl Env {
    /// Read from the process environment
    pub fn process() -> Self {
        Self {
            lookup: process_var,
        }
    }
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Read from an arbitrary lookup
    pub fn from_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    /// Read a variable, treating empty or whitespace-only values as unset
    pub fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Read the first of several variables that is set
    pub fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.var(key))
    }

    /// Read and parse a variable
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, EnvError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.var(key) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|e| EnvError::Invalid {
                key: key.to_string(),
                value,
                detail: e.to_string(),
            }),
        }
    }
}

/// [`Env::var`] on the process environment
pub fn env_var(key: &str) -> Option<String> {
    Env::process().var(key)
}

/// [`Env::first`] on the process environment
pub fn env_first(keys: &[&str]) -> Option<String> {
    Env::process().first(keys)
}

/// [`Env::parse`] on the process environment
pub fn env_parse<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Env::process().parse(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Env<impl Fn(&str) -> Option<String>> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Env::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_blank_is_unset() {
        let env = env(&[("BLANK", "   "), ("PADDED", "  value ")]);
        assert_eq!(env.var("BLANK"), None);
        assert_eq!(env.var("PADDED"), Some("value".to_string()));
        assert_eq!(env.var("MISSING"), None);
    }

    #[test]
    fn test_first_picks_first_set() {
        let env = env(&[("B", "second"), ("C", "third")]);
        assert_eq!(env.first(&["A", "B", "C"]), Some("second".to_string()));
        assert_eq!(env.first(&["A"]), None);
    }

    #[test]
    fn test_parse() {
        let env = env(&[("NUM", "42"), ("BAD", "forty-two")]);
        assert_eq!(env.parse::<u32>("NUM"), Ok(Some(42)));
        assert_eq!(env.parse::<u32>("MISSING"), Ok(None));

        let err = env.parse::<u32>("BAD").unwrap_err();
        assert!(err.to_string().starts_with("Invalid value 'forty-two' for BAD"));
    }

    #[test]
    fn test_process_lookup_reads_unset_as_none() {
        assert_eq!(env_var("AGENT_UTILS_SURELY_UNSET_VARIABLE"), None);
        assert_eq!(env_parse::<u32>("AGENT_UTILS_SURELY_UNSET_VARIABLE"), Ok(None));
    }
}
