//! Lowering options
//!
//! Options arrive as the JSON object a plugin host passes through, e.g.
//! `{"inlineHelpers": false, "target": "es5"}`. Missing keys take their
//! defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which runtime the emitted helpers may assume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Native `Promise`, `Symbol.iterator` and `Symbol.asyncIterator`
    #[default]
    Es2015,
    /// Maximally compatible helpers: index-based array iteration and guarded
    /// `Symbol` lookups
    Es5,
}

/// Options recognized by the lowering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Emit helper declarations into the output instead of importing them
    pub inline_helpers: bool,
    /// Lift synthesized closures that capture nothing local to unit level
    pub hoist: bool,
    /// Helper variants to emit
    pub target: Target,
    /// Module the helpers are imported from when not inlined
    pub helper_module: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            inline_helpers: true,
            hoist: false,
            target: Target::Es2015,
            helper_module: "awaitless/helpers".to_string(),
        }
    }
}

impl Options {
    /// Parse options from a JSON object
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_hoist(mut self, hoist: bool) -> Self {
        self.hoist = hoist;
        self
    }

    pub fn with_inline_helpers(mut self, inline_helpers: bool) -> Self {
        self.inline_helpers = inline_helpers;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.inline_helpers);
        assert!(!options.hoist);
        assert_eq!(options.target, Target::Es2015);
    }

    #[test]
    fn test_from_json_camel_case() {
        let options =
            Options::from_json(r#"{"inlineHelpers": false, "hoist": true, "target": "es5"}"#)
                .expect("valid options");
        assert!(!options.inline_helpers);
        assert!(options.hoist);
        assert_eq!(options.target, Target::Es5);
        assert_eq!(options.helper_module, "awaitless/helpers");
    }

    #[test]
    fn test_from_json_empty_object() {
        let options = Options::from_json("{}").expect("valid options");
        assert_eq!(options, Options::default());
    }

    #[test]
    fn test_from_json_rejects_unknown_target() {
        assert!(Options::from_json(r#"{"target": "es3"}"#).is_err());
    }
}
