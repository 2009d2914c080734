use std::collections::BTreeSet;

use super::formula::Formula;

/// One satisfying assignment, stored as the set of variables assigned `true`.
pub type Assignment = BTreeSet<String>;

/// Outcome of a bounded enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enumeration {
    Complete(Vec<Assignment>),
    LimitExceeded,
}

/// Backtracking solver over a fixed variable order with a growing list of
/// forbidden complete assignments.
pub struct Solver<'a> {
    formula: &'a Formula,
    variables: Vec<String>,
    forbidden: Vec<Vec<bool>>,
    steps: usize,
    step_limit: usize,
}

impl<'a> Solver<'a> {
    pub fn new(formula: &'a Formula, step_limit: usize) -> Self {
        Self {
            formula,
            variables: formula.variables().into_iter().collect(),
            forbidden: Vec::new(),
            steps: 0,
            step_limit,
        }
    }

    pub fn exhausted_budget(&self) -> bool {
        self.steps >= self.step_limit
    }

    /// Next satisfying assignment that has not been forbidden yet.
    pub fn solve(&mut self) -> Option<Vec<bool>> {
        let mut partial = vec![None; self.variables.len()];
        self.search(0, &mut partial)
    }

    pub fn forbid(&mut self, solution: Vec<bool>) {
        self.forbidden.push(solution);
    }

    fn search(&mut self, depth: usize, partial: &mut Vec<Option<bool>>) -> Option<Vec<bool>> {
        self.steps += 1;
        if self.exhausted_budget() {
            return None;
        }

        let verdict = {
            let variables = &self.variables;
            let snapshot = &*partial;
            self.formula.evaluate_partial(&|name: &str| {
                variables
                    .binary_search_by(|candidate| candidate.as_str().cmp(name))
                    .ok()
                    .and_then(|index| snapshot[index])
            })
        };
        if verdict == Some(false) {
            return None;
        }

        if depth == partial.len() {
            let complete = partial.iter().map(|value| value.unwrap_or(false)).collect::<Vec<_>>();
            if verdict == Some(true) && !self.forbidden.contains(&complete) {
                return Some(complete);
            }
            return None;
        }

        for value in [false, true] {
            partial[depth] = Some(value);
            if let Some(found) = self.search(depth + 1, partial) {
                return Some(found);
            }
        }
        partial[depth] = None;
        None
    }

    fn assignment(&self, solution: &[bool]) -> Assignment {
        self.variables
            .iter()
            .zip(solution)
            .filter(|(_, value)| **value)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Enumerates every satisfying assignment by repeatedly solving and
/// forbidding the solution just found.
pub fn enumerate_solutions(formula: &Formula, max_solutions: usize) -> Enumeration {
    let step_limit = max_solutions
        .saturating_mul(formula.variables().len().max(1) + 1)
        .saturating_mul(64);
    let mut solver = Solver::new(formula, step_limit);
    let mut solutions = Vec::new();

    while let Some(solution) = solver.solve() {
        if solutions.len() >= max_solutions {
            return Enumeration::LimitExceeded;
        }
        solutions.push(solver.assignment(&solution));
        solver.forbid(solution);
    }

    if solver.exhausted_budget() {
        return Enumeration::LimitExceeded;
    }
    Enumeration::Complete(solutions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solutions(text: &str) -> Vec<Vec<String>> {
        let formula = Formula::parse(text).expect("valid formula");
        match enumerate_solutions(&formula, 64) {
            Enumeration::Complete(found) => found
                .into_iter()
                .map(|assignment| assignment.into_iter().collect())
                .collect(),
            Enumeration::LimitExceeded => panic!("limit exceeded for {text}"),
        }
    }

    #[test]
    fn conjunction_has_single_solution() {
        assert_eq!(solutions("A*B"), vec![vec!["A".to_owned(), "B".to_owned()]]);
    }

    #[test]
    fn disjunction_enumerates_all_three() {
        let mut found = solutions("A \\/ B");
        found.sort();
        assert_eq!(
            found,
            vec![
                vec!["A".to_owned()],
                vec!["A".to_owned(), "B".to_owned()],
                vec!["B".to_owned()],
            ]
        );
    }

    #[test]
    fn contradiction_has_no_solutions() {
        assert!(solutions("A /\\ !A").is_empty());
    }

    #[test]
    fn constant_true_has_the_empty_solution() {
        assert_eq!(solutions("true"), vec![Vec::<String>::new()]);
    }

    #[test]
    fn wide_disjunction_hits_the_cap() {
        let text = (0..12).map(|index| format!("F{index}")).collect::<Vec<_>>().join(" \\/ ");
        let formula = Formula::parse(&text).expect("valid formula");
        assert_eq!(enumerate_solutions(&formula, 100), Enumeration::LimitExceeded);
    }
}
