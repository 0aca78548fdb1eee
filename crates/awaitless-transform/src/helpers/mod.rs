//! Runtime helper registry
//!
//! Lowered code calls a fixed set of small combinators (`_await`, `_for`,
//! `_switch`, ...). The registry hands out one stable, collision-free local
//! name per helper and unit, remembers which helpers (and their dependencies)
//! were used, and finally produces either their declarations or a single
//! import of them.

mod catalogue;

use awaitless_ast::ast::{Expression, Statement};
use awaitless_ast::build::{ident, import};
use awaitless_ast::NameGenerator;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::config::{Options, Target};

/// One runtime helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Helper {
    Empty,
    Await,
    AwaitIgnored,
    Call,
    CallIgnored,
    Invoke,
    Continue,
    Catch,
    Finally,
    FinallyRethrows,
    Rethrow,
    For,
    Do,
    ForTo,
    ForIn,
    ForOwn,
    ForOf,
    ForAwaitOf,
    Switch,
}

impl Helper {
    /// Every helper, in the order declarations are emitted
    pub const ALL: [Helper; 19] = [
        Helper::Empty,
        Helper::Await,
        Helper::AwaitIgnored,
        Helper::Call,
        Helper::CallIgnored,
        Helper::Invoke,
        Helper::Continue,
        Helper::Catch,
        Helper::Finally,
        Helper::FinallyRethrows,
        Helper::Rethrow,
        Helper::For,
        Helper::Do,
        Helper::ForTo,
        Helper::ForIn,
        Helper::ForOwn,
        Helper::ForOf,
        Helper::ForAwaitOf,
        Helper::Switch,
    ];

    /// Exported name of the helper
    pub fn canonical_name(self) -> &'static str {
        match self {
            Helper::Empty => "_empty",
            Helper::Await => "_await",
            Helper::AwaitIgnored => "_awaitIgnored",
            Helper::Call => "_call",
            Helper::CallIgnored => "_callIgnored",
            Helper::Invoke => "_invoke",
            Helper::Continue => "_continue",
            Helper::Catch => "_catch",
            Helper::Finally => "_finally",
            Helper::FinallyRethrows => "_finallyRethrows",
            Helper::Rethrow => "_rethrow",
            Helper::For => "_for",
            Helper::Do => "_do",
            Helper::ForTo => "_forTo",
            Helper::ForIn => "_forIn",
            Helper::ForOwn => "_forOwn",
            Helper::ForOf => "_forOf",
            Helper::ForAwaitOf => "_forAwaitOf",
            Helper::Switch => "_switch",
        }
    }

    /// Helpers referenced from this helper's body
    pub fn dependencies(self, target: Target) -> &'static [Helper] {
        match (self, target) {
            (Helper::AwaitIgnored, _) => &[Helper::Empty],
            (Helper::CallIgnored, _) => &[Helper::Call, Helper::Empty],
            (Helper::Do, _) | (Helper::ForTo, _) | (Helper::ForAwaitOf, _) => &[Helper::For],
            (Helper::ForIn, _) | (Helper::ForOwn, _) => &[Helper::ForTo],
            (Helper::ForOf, Target::Es2015) => &[Helper::For],
            (Helper::ForOf, Target::Es5) => &[Helper::For, Helper::ForTo],
            _ => &[],
        }
    }
}

/// Resolved local names of the helpers used by one unit
#[derive(Debug, Default)]
pub(crate) struct HelperNames {
    names: FxHashMap<Helper, String>,
}

impl HelperNames {
    pub(crate) fn name(&self, helper: Helper) -> &str {
        self.names
            .get(&helper)
            .map(String::as_str)
            .unwrap_or(helper.canonical_name())
    }

    pub(crate) fn expr(&self, helper: Helper) -> Expression {
        ident(self.name(helper))
    }
}

/// Tracks helper usage for one output unit
#[derive(Debug)]
pub struct HelperRegistry {
    target: Target,
    inline: bool,
    module: String,
    used: HelperNames,
}

impl HelperRegistry {
    pub fn new(options: &Options) -> Self {
        Self {
            target: options.target,
            inline: options.inline_helpers,
            module: options.helper_module.clone(),
            used: HelperNames::default(),
        }
    }

    /// Reference `helper` from lowered code, recording it and everything it
    /// depends on
    pub fn reference(&mut self, helper: Helper, names: &mut NameGenerator) -> Expression {
        self.require(helper, names);
        self.used.expr(helper)
    }

    fn require(&mut self, helper: Helper, names: &mut NameGenerator) {
        if self.used.names.contains_key(&helper) {
            return;
        }
        let name = names.claim(helper.canonical_name());
        trace!(helper = helper.canonical_name(), name = %name, "registered helper");
        self.used.names.insert(helper, name);
        for dependency in helper.dependencies(self.target) {
            self.require(*dependency, names);
        }
    }

    pub fn is_used(&self, helper: Helper) -> bool {
        self.used.names.contains_key(&helper)
    }

    /// Local name the unit uses for `helper`, if it was referenced
    pub fn local_name(&self, helper: Helper) -> Option<&str> {
        self.used.names.get(&helper).map(String::as_str)
    }

    /// Used helpers in declaration order
    pub fn used(&self) -> Vec<Helper> {
        Helper::ALL
            .iter()
            .copied()
            .filter(|helper| self.is_used(*helper))
            .collect()
    }

    /// Statements that bring the used helpers into scope: their declarations,
    /// or one import from the helper module
    pub fn finish(self) -> Vec<Statement> {
        let used = self.used();
        if used.is_empty() {
            return Vec::new();
        }
        if self.inline {
            used.into_iter()
                .map(|helper| catalogue::declare(helper, self.target, &self.used))
                .collect()
        } else {
            let specifiers = used
                .iter()
                .map(|helper| (helper.canonical_name(), self.used.name(*helper)))
                .collect();
            vec![import(specifiers, &self.module)]
        }
    }
}
