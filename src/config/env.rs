use std::collections::HashMap;

/// Read access to environment variables.
///
/// Resolution consults the environment through this trait so it can run
/// against a fixed snapshot instead of the live process environment.
pub trait EnvLookup {
    fn var(&self, key: &str) -> Option<String>;

    /// Value of `key`, treating an empty value as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }

    /// Boolean value of `key`; unparsable values are treated as unset.
    fn flag(&self, key: &str) -> Option<bool> {
        self.non_empty(key).and_then(|value| parse_bool(&value))
    }
}

/// The live process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Parse the boolean spellings accepted in environment variables.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
