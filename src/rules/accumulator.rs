//! Rule Accumulator: collects `(rule, error)` events into a rule list
//! plus an aggregated error.

use std::fmt;

use crate::types::PolicyRule;

/// A join of zero or more errors surfaced during rule gathering. `None`
/// error () collapses to nothing, one error passes through unwrapped, and
/// more than one is joined with `", "` and wrapped in `[...]`.
#[derive(Debug)]
pub struct JoinedError(Vec<String>);

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => Ok(()),
            1 => write!(f, "{}", self.0[0]),
            _ => write!(f, "[{}]", self.0.join(", ")),
        }
    }
}

impl std::error::Error for JoinedError {}

impl JoinedError {
    /// Builds a `JoinedError` directly from already-stringified messages,
    /// for callers joining sub-resolver errors outside an `Accumulator`
    /// (e.g. the Global-Role Resolver's `cluster_rules` projection).
    pub fn from_strings(errors: Vec<String>) -> Self {
        Self(errors)
    }
}

/// Single-threaded collector used by every resolver in this module.
#[derive(Default)]
pub struct Accumulator {
    rules: Vec<PolicyRule>,
    errors: Vec<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `rule` (if any) in visitation order and `err` (if any) to the
    /// internal error list. Always returns `true` — the return value is a
    /// short-circuit hook reserved for higher-level visitors.
    pub fn visit(&mut self, rule: Option<PolicyRule>, err: Option<impl ToString>) -> bool {
        if let Some(rule) = rule {
            self.rules.push(rule);
        }
        if let Some(err) = err {
            self.errors.push(err.to_string());
        }
        true
    }

    pub fn visit_rules(&mut self, rules: impl IntoIterator<Item = PolicyRule>) -> bool {
        self.rules.extend(rules);
        true
    }

    pub fn visit_error(&mut self, err: impl ToString) -> bool {
        self.errors.push(err.to_string());
        true
    }

    /// `None` when no error was collected, the sole error when exactly one
    /// was, and a `JoinedError` otherwise.
    pub fn error(&self) -> Option<JoinedError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(JoinedError(self.errors.clone()))
        }
    }

    pub fn into_rules(self) -> Vec<PolicyRule> {
        self.rules
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Consumes the accumulator, returning its rules and the joined error
    /// (if any) — the `(rules, err)` partial-result pair every resolver
    /// returns.
    pub fn finish(self) -> (Vec<PolicyRule>, Option<JoinedError>) {
        let err = self.error();
        (self.rules, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_errors_yields_none() {
        let acc = Accumulator::new();
        assert!(acc.error().is_none());
    }

    #[test]
    fn single_error_passes_through_unwrapped() {
        let mut acc = Accumulator::new();
        acc.visit_error("boom");
        assert_eq!(acc.error().unwrap().to_string(), "boom");
    }

    #[test]
    fn multiple_errors_are_joined_and_bracketed() {
        let mut acc = Accumulator::new();
        acc.visit_error("first");
        acc.visit_error("second");
        assert_eq!(acc.error().unwrap().to_string(), "[first, second]");
    }

    #[test]
    fn visit_always_returns_true() {
        let mut acc = Accumulator::new();
        assert!(acc.visit(None::<PolicyRule>, None::<String>));
        assert!(acc.visit(Some(PolicyRule::default()), Some("err")));
    }
}
