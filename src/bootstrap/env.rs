//! Environment mode — controls whether variable lookups see the process
//! environment.
//!
//! In [`EnvMode::Legacy`] any name that was never defined falls back to the
//! environment variable of the same name.  [`EnvMode::Strict`] turns that
//! fallback off: only names defined explicitly through [`Variables::define`]
//! resolve.  The bootstrapper always switches to strict mode before anything
//! reads a variable.

use std::collections::HashMap;

/// How undefined variable names are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvMode {
    /// Undefined names fall back to the process environment.
    #[default]
    Legacy,
    /// Only explicitly defined names resolve.
    Strict,
}

impl EnvMode {
    pub fn label(self) -> &'static str {
        match self {
            EnvMode::Legacy => "legacy",
            EnvMode::Strict => "strict",
        }
    }
}

/// Named string variables shared by the modules.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    mode: EnvMode,
    defined: HashMap<String, String>,
}

impl Variables {
    pub fn new(mode: EnvMode) -> Self {
        Self {
            mode,
            defined: HashMap::new(),
        }
    }

    pub fn mode(&self) -> EnvMode {
        self.mode
    }

    /// Switch to strict mode.  Already-defined names are kept.
    pub fn disable_legacy_env(&mut self) {
        self.mode = EnvMode::Strict;
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.defined.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(v) = self.defined.get(name) {
            return Some(v.clone());
        }
        match self.mode {
            EnvMode::Legacy => std::env::var(name).ok(),
            EnvMode::Strict => None,
        }
    }

    /// Replace every `${NAME}` in `input` with its value.  Unresolved names
    /// are left in place verbatim.
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // Unterminated reference — keep the tail as-is.
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &after[..end];
            match self.get(name) {
                Some(value) => out.push_str(&value),
                None => {
                    tracing::warn!("unresolved variable ${{{name}}} ({} env mode)", self.mode.label());
                    out.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_mode_ignores_process_environment() {
        // PATH is set in every reasonable test environment.
        let legacy = Variables::new(EnvMode::Legacy);
        assert!(legacy.get("PATH").is_some());

        let mut strict = legacy.clone();
        strict.disable_legacy_env();
        assert_eq!(strict.mode(), EnvMode::Strict);
        assert_eq!(strict.get("PATH"), None);
    }

    #[test]
    fn defined_names_survive_mode_switch() {
        let mut vars = Variables::default();
        vars.define("HOME", "/home/urist");
        vars.disable_legacy_env();
        assert_eq!(vars.get("HOME").as_deref(), Some("/home/urist"));
    }

    #[test]
    fn expand_substitutes_known_and_keeps_unknown() {
        let mut vars = Variables::new(EnvMode::Strict);
        vars.define("HOME", "/home/urist");
        assert_eq!(vars.expand("${HOME}/blueprints"), "/home/urist/blueprints");
        assert_eq!(vars.expand("${NOPE}/x"), "${NOPE}/x");
        assert_eq!(vars.expand("plain"), "plain");
        assert_eq!(vars.expand("a${HOME"), "a${HOME");
    }
}
