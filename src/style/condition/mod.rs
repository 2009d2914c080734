//! Conditional styling: feature formulas compiled to their full solution set.
//!
//! A rule's formula is enumerated once. A candidate relationship matches when
//! its own presence condition holds under at least one of those solutions;
//! features the rule never mentions count as `false`.

mod formula;
mod solver;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, VizError};

pub use formula::Formula;
pub use solver::{Assignment, Enumeration, Solver, enumerate_solutions};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolutionSet {
    formula: String,
    solutions: Vec<Assignment>,
}

impl SolutionSet {
    pub fn compile(formula: &str, max_solutions: usize) -> Result<Self> {
        let parsed = Formula::parse(formula)?;
        match enumerate_solutions(&parsed, max_solutions) {
            Enumeration::Complete(solutions) => {
                debug!(formula = %parsed, solutions = solutions.len(), "compiled condition");
                Ok(Self {
                    formula: formula.to_owned(),
                    solutions,
                })
            }
            Enumeration::LimitExceeded => Err(VizError::SolverLimit {
                formula: formula.to_owned(),
                limit: max_solutions,
            }),
        }
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn solutions(&self) -> &[Assignment] {
        &self.solutions
    }

    pub fn admits(&self, candidate: &Formula) -> bool {
        self.solutions.iter().any(|assignment| {
            candidate.evaluate(&|name: &str| assignment.contains(name))
        })
    }
}

/// Per-resolver memo of compiled rule formulas and parsed candidate conditions.
/// Formulas that fail to compile are remembered as `None` and never match.
#[derive(Clone, Debug, Default)]
pub struct ConditionCache {
    compiled: HashMap<String, Option<Arc<SolutionSet>>>,
    candidates: HashMap<String, Option<Arc<Formula>>>,
}

impl ConditionCache {
    pub fn compiled(&mut self, formula: &str, max_solutions: usize) -> Option<Arc<SolutionSet>> {
        if let Some(entry) = self.compiled.get(formula) {
            return entry.clone();
        }

        let entry = match SolutionSet::compile(formula, max_solutions) {
            Ok(set) => Some(Arc::new(set)),
            Err(error) => {
                warn!(%error, "conditional style rule disabled");
                None
            }
        };
        self.compiled.insert(formula.to_owned(), entry.clone());
        entry
    }

    pub fn candidate(&mut self, condition: &str) -> Option<Arc<Formula>> {
        if let Some(entry) = self.candidates.get(condition) {
            return entry.clone();
        }

        let entry = match Formula::parse(condition) {
            Ok(formula) => Some(Arc::new(formula)),
            Err(error) => {
                debug!(%error, condition, "unparseable presence condition");
                None
            }
        };
        self.candidates.insert(condition.to_owned(), entry.clone());
        entry
    }

    /// Whether a rule with `rule_formula` applies to an item whose presence
    /// condition is `condition`.
    pub fn matches(&mut self, rule_formula: &str, condition: &str, max_solutions: usize) -> bool {
        let Some(solutions) = self.compiled(rule_formula, max_solutions) else {
            return false;
        };
        let Some(candidate) = self.candidate(condition) else {
            return false;
        };
        solutions.admits(&candidate)
    }

    pub fn clear(&mut self) {
        self.compiled.clear();
        self.candidates.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_a_matches_candidate_a_but_not_not_a() {
        let mut cache = ConditionCache::default();
        assert!(cache.matches("A", "A", 64));
        assert!(!cache.matches("A", "!A", 64));
    }

    #[test]
    fn conjunctive_rule_admits_weaker_candidate() {
        let mut cache = ConditionCache::default();
        assert!(cache.matches("A*B", "A", 64));
        assert!(cache.matches("A /\\ B", "B \\/ C", 64));
        assert!(!cache.matches("A /\\ B", "C", 64));
    }

    #[test]
    fn unknown_candidate_features_evaluate_false() {
        let mut cache = ConditionCache::default();
        assert!(cache.matches("A", "A /\\ !Z", 64));
        assert!(!cache.matches("A", "A /\\ Z", 64));
    }

    #[test]
    fn true_candidate_matches_any_satisfiable_rule() {
        let mut cache = ConditionCache::default();
        assert!(cache.matches("A \\/ B", "true", 64));
        assert!(!cache.matches("A /\\ !A", "true", 64));
    }

    #[test]
    fn over_limit_rule_never_matches() {
        let mut cache = ConditionCache::default();
        let formula = "A \\/ B \\/ C \\/ D";
        assert!(matches!(
            SolutionSet::compile(formula, 4),
            Err(VizError::SolverLimit { limit: 4, .. })
        ));
        assert!(!cache.matches(formula, "A", 4));
    }

    #[test]
    fn malformed_inputs_never_match() {
        let mut cache = ConditionCache::default();
        assert!(!cache.matches("A /\\", "A", 64));
        assert!(!cache.matches("A", "(A", 64));
    }

    #[test]
    fn compiled_sets_are_shared() {
        let mut cache = ConditionCache::default();
        let first = cache.compiled("A \\/ B", 64).expect("compiles");
        let second = cache.compiled("A \\/ B", 64).expect("compiles");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.solutions().len(), 3);
        assert_eq!(first.formula(), "A \\/ B");
    }
}
