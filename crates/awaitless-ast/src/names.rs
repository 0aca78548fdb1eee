//! Collision-free name generation for one output unit
//!
//! Generated names start with an underscore and are numbered from the second
//! use of a hint: `_temp`, `_temp2`, `_temp3`. A name is never handed out
//! twice and never collides with a name spelled in the input.

use crate::ast::{Identifier, Program};
use crate::scope::collect_names;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    used: FxHashSet<String>,
    counters: FxHashMap<String, u32>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every name spelled anywhere in `program`
    pub fn for_program(program: &Program) -> Self {
        Self {
            used: collect_names(program),
            counters: FxHashMap::default(),
        }
    }

    /// Mark a name as taken
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Generate a fresh identifier derived from `hint`
    pub fn fresh(&mut self, hint: &str) -> Identifier {
        Identifier::synthetic(self.fresh_name(hint))
    }

    pub fn fresh_name(&mut self, hint: &str) -> String {
        let base = sanitize(hint);
        let counter = self.counters.entry(base.clone()).or_insert(1);
        loop {
            let candidate = if *counter == 1 {
                base.clone()
            } else {
                format!("{}{}", base, counter)
            };
            *counter += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Take `name` itself when free, otherwise a numbered variant of it
    pub fn claim(&mut self, name: &str) -> String {
        if self.used.insert(name.to_string()) {
            return name.to_string();
        }
        let counter = self.counters.entry(name.to_string()).or_insert(2);
        loop {
            let candidate = format!("{}{}", name, counter);
            *counter += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// `_` followed by the identifier characters of `hint`, trailing digits
/// removed so numbering stays readable
fn sanitize(hint: &str) -> String {
    let trimmed = hint.trim_start_matches('_');
    let mut base: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    while base.ends_with(|c: char| c.is_ascii_digit()) {
        base.pop();
    }
    if base.is_empty() {
        base.push_str("temp");
    }
    format!("_{}", base)
}
