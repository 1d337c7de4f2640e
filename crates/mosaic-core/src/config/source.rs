//! Where credentials and endpoints come from.
//!
//! Production code reads the process environment; tests and embedders can
//! hand the registry a plain map instead.

use std::collections::HashMap;

/// A key/value lookup for provider credentials and endpoints.
///
/// Blank values are reported as absent.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads `std::env`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        non_blank(std::env::var(key).ok())
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        non_blank(HashMap::get(self, key).cloned())
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
