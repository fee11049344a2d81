//! Enumeration of substitution tuples.
//!
//! Independent mode walks parameters in declaration order and, for each, every
//! payload in wordlist order: `k * n` tuples. Combinatorial mode is an odometer
//! over the wordlist index of each parameter, the first parameter turning
//! slowest: `n ^ k` tuples. Both are lazy and forward-only, with the total
//! known up front.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::core::{FuzzMode, SENTINEL_VALUE};
use crate::error::ConfigError;
use crate::utils::wordlist::Wordlist;

/// The ordered, unique set of parameter names being fuzzed plus the mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    names: Vec<String>,
    mode: FuzzMode,
}

impl ParameterSet {
    /// Validates the name list against the requested mode.
    pub fn new(names: Vec<String>, combinatorial: bool) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Err(ConfigError::NoParameters);
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateParameter(name.clone()));
            }
        }

        if combinatorial && names.len() == 1 {
            return Err(ConfigError::CombinatorialNeedsMultiple);
        }
        if !combinatorial && names.len() > 1 {
            return Err(ConfigError::MultipleNeedCombinatorial(names.len()));
        }

        Ok(Self {
            names,
            mode: FuzzMode::from_flag(combinatorial),
        })
    }

    /// Splits a comma-separated list, dropping empty entries.
    pub fn parse_names(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mode(&self) -> FuzzMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub name: String,
    pub value: String,
    /// `false` when the value is the independent-mode sentinel.
    pub active: bool,
}

impl Assignment {
    pub fn active(name: &str, value: &str) -> Self {
        Self { name: name.to_string(), value: value.to_string(), active: true }
    }

    pub fn sentinel(name: &str) -> Self {
        Self { name: name.to_string(), value: SENTINEL_VALUE.to_string(), active: false }
    }
}

/// Parameter name to payload mapping for one iteration, in parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutionTuple {
    assignments: Vec<Assignment>,
}

impl SubstitutionTuple {
    pub fn new(assignments: Vec<Assignment>) -> Self {
        Self { assignments }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn active(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| a.active)
    }

    /// Active parameter names joined with ` & `.
    pub fn param_label(&self) -> String {
        self.active().map(|a| a.name.as_str()).collect::<Vec<_>>().join(" & ")
    }

    /// The payload for a single active parameter, or `(v1, v2, ...)` for several.
    pub fn payload_label(&self) -> String {
        let values: Vec<&str> = self.active().map(|a| a.value.as_str()).collect();
        match values.as_slice() {
            [single] => single.to_string(),
            many => format!("({})", many.join(", ")),
        }
    }
}

/// One enumerated tuple with its 1-based position in the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub index: usize,
    pub tuple: SubstitutionTuple,
}

pub struct CombinationGenerator {
    names: Arc<[String]>,
    wordlist: Arc<Wordlist>,
    mode: FuzzMode,
    total: usize,
    emitted: usize,
    /// Independent: `[param, payload]`. Combinatorial: one payload index per parameter.
    cursor: Vec<usize>,
}

impl CombinationGenerator {
    pub fn new(params: &ParameterSet, wordlist: Arc<Wordlist>) -> Result<Self, ConfigError> {
        let k = params.len();
        let n = wordlist.len();
        let too_many = || ConfigError::TooManyCombinations { params: k, payloads: n };

        let (total, cursor) = match params.mode() {
            FuzzMode::Independent => (k.checked_mul(n).ok_or_else(too_many)?, vec![0, 0]),
            FuzzMode::Combinatorial => {
                let exp = u32::try_from(k).map_err(|_| too_many())?;
                (n.checked_pow(exp).ok_or_else(too_many)?, vec![0; k])
            }
        };

        Ok(Self {
            names: params.names().to_vec().into(),
            wordlist,
            mode: params.mode(),
            total,
            emitted: 0,
            cursor,
        })
    }

    /// Number of tuples the full enumeration yields.
    pub fn total(&self) -> usize {
        self.total
    }

    fn independent_tuple(&self) -> SubstitutionTuple {
        let (param, payload) = (self.cursor[0], self.cursor[1]);
        let value = &self.wordlist.payloads()[payload];
        let assignments = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if i == param {
                    Assignment::active(name, value)
                } else {
                    Assignment::sentinel(name)
                }
            })
            .collect();
        SubstitutionTuple::new(assignments)
    }

    fn combinatorial_tuple(&self) -> SubstitutionTuple {
        let payloads = self.wordlist.payloads();
        let assignments = self
            .names
            .iter()
            .zip(&self.cursor)
            .map(|(name, &i)| Assignment::active(name, &payloads[i]))
            .collect();
        SubstitutionTuple::new(assignments)
    }

    fn advance(&mut self) {
        let n = self.wordlist.len();
        match self.mode {
            FuzzMode::Independent => {
                self.cursor[1] += 1;
                if self.cursor[1] == n {
                    self.cursor[1] = 0;
                    self.cursor[0] += 1;
                }
            }
            FuzzMode::Combinatorial => {
                for slot in self.cursor.iter_mut().rev() {
                    *slot += 1;
                    if *slot < n {
                        return;
                    }
                    *slot = 0;
                }
            }
        }
    }
}

impl Iterator for CombinationGenerator {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.total {
            return None;
        }
        let tuple = match self.mode {
            FuzzMode::Independent => self.independent_tuple(),
            FuzzMode::Combinatorial => self.combinatorial_tuple(),
        };
        self.emitted += 1;
        self.advance();
        Some(Combination { index: self.emitted, tuple })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.emitted;
        (left, Some(left))
    }
}

impl ExactSizeIterator for CombinationGenerator {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn value_of<'a>(tuple: &'a SubstitutionTuple, name: &str) -> &'a str {
        tuple
            .assignments()
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
            .unwrap()
    }

    fn wordlist(list: &[&str]) -> Arc<Wordlist> {
        Arc::new(Wordlist::from_payloads(list.iter().map(|s| s.to_string()).collect()))
    }

    #[test]
    fn test_single_parameter_with_combinatorial_flag_is_rejected() {
        let err = ParameterSet::new(names(&["id"]), true).unwrap_err();
        assert!(matches!(err, ConfigError::CombinatorialNeedsMultiple));
    }

    #[test]
    fn test_multiple_parameters_without_combinatorial_flag_is_rejected() {
        let err = ParameterSet::new(names(&["id", "role"]), false).unwrap_err();
        assert!(matches!(err, ConfigError::MultipleNeedCombinatorial(2)));
    }

    #[test]
    fn test_empty_and_duplicate_parameters_are_rejected() {
        assert!(matches!(ParameterSet::new(vec![], false), Err(ConfigError::NoParameters)));
        assert!(matches!(
            ParameterSet::new(names(&["a", "b", "a"]), true),
            Err(ConfigError::DuplicateParameter(name)) if name == "a"
        ));
    }

    #[test]
    fn test_parse_names_drops_blanks() {
        assert_eq!(ParameterSet::parse_names(" id, ,role ,"), names(&["id", "role"]));
    }

    #[test]
    fn test_independent_single_parameter_walks_wordlist() {
        let params = ParameterSet::new(names(&["id"]), false).unwrap();
        let gen = CombinationGenerator::new(&params, wordlist(&["1", "2", "3"])).unwrap();
        assert_eq!(gen.total(), 3);

        let combos: Vec<Combination> = gen.collect();
        let values: Vec<&str> = combos.iter().map(|c| value_of(&c.tuple, "id")).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
        let indexes: Vec<usize> = combos.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn test_independent_tuples_hold_one_payload_and_sentinels() {
        // Independent mode with several parameters is reachable directly
        // through the generator even though ParameterSet forbids it.
        let params = ParameterSet {
            names: names(&["a", "b", "c"]),
            mode: FuzzMode::Independent,
        };
        let gen = CombinationGenerator::new(&params, wordlist(&["x", "y"])).unwrap();
        assert_eq!(gen.total(), 6);

        let combos: Vec<Combination> = gen.collect();
        assert_eq!(combos.len(), 6);
        for combo in &combos {
            let active: Vec<&Assignment> = combo.tuple.active().collect();
            assert_eq!(active.len(), 1);
            let sentinels = combo
                .tuple
                .assignments()
                .iter()
                .filter(|a| !a.active && a.value == SENTINEL_VALUE)
                .count();
            assert_eq!(sentinels, 2);
        }
        assert_eq!(combos[0].tuple.param_label(), "a");
        assert_eq!(combos[2].tuple.param_label(), "b");
        assert_eq!(combos[3].tuple.payload_label(), "y");
    }

    #[test]
    fn test_combinatorial_is_full_cross_product_first_parameter_slowest() {
        let params = ParameterSet::new(names(&["id", "role"]), true).unwrap();
        let gen = CombinationGenerator::new(&params, wordlist(&["1", "2"])).unwrap();
        assert_eq!(gen.total(), 4);

        let pairs: Vec<(String, String)> = gen
            .map(|c| {
                (
                    value_of(&c.tuple, "id").to_string(),
                    value_of(&c.tuple, "role").to_string(),
                )
            })
            .collect();
        let expected = [("1", "1"), ("1", "2"), ("2", "1"), ("2", "2")];
        assert_eq!(
            pairs,
            expected
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_combinatorial_has_no_duplicates_and_is_reproducible() {
        let params = ParameterSet::new(names(&["a", "b", "c"]), true).unwrap();
        let list = wordlist(&["p", "q", "r"]);

        let first: Vec<Combination> = CombinationGenerator::new(&params, Arc::clone(&list)).unwrap().collect();
        let second: Vec<Combination> = CombinationGenerator::new(&params, list).unwrap().collect();
        assert_eq!(first.len(), 27);
        assert_eq!(first, second);

        let unique: HashSet<String> = first.iter().map(|c| c.tuple.payload_label()).collect();
        assert_eq!(unique.len(), 27);
        assert_eq!(first[0].tuple.payload_label(), "(p, p, p)");
        assert_eq!(first[26].tuple.payload_label(), "(r, r, r)");
        assert_eq!(first[1].tuple.param_label(), "a & b & c");
    }

    #[test]
    fn test_total_overflow_is_a_config_error() {
        let params = ParameterSet::new((0..64).map(|i| format!("p{}", i)).collect(), true).unwrap();
        let err = CombinationGenerator::new(&params, wordlist(&["1", "2", "3", "4"])).err().unwrap();
        assert!(matches!(err, ConfigError::TooManyCombinations { params: 64, payloads: 4 }));
    }

    #[test]
    fn test_size_hint_tracks_remaining() {
        let params = ParameterSet::new(names(&["id"]), false).unwrap();
        let mut gen = CombinationGenerator::new(&params, wordlist(&["1", "2", "3"])).unwrap();
        gen.next();
        assert_eq!(gen.len(), 2);
    }
}
