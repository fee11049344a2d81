//! Baseline deviation classification.
//!
//! Both bodies are compared structurally when they parse as JSON: object keys
//! are unordered, arrays ignore both order and repetition at every depth, and one
//! top-level key can be excluded (the field being fuzzed is expected to echo
//! its payload). Anything that does not parse falls back to a length check.

use serde::Serialize;
use serde_json::Value;

use crate::http::ResponseSnapshot;

/// Captured once before the first substitution; every outcome is compared to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineSnapshot {
    pub status: u16,
    pub body: String,
}

impl BaselineSnapshot {
    pub fn new(status: u16, body: &str) -> Self {
        Self { status, body: body.to_string() }
    }

    pub fn length(&self) -> usize {
        self.body.chars().count()
    }

    pub fn classify(&self, response: &ResponseSnapshot, excluded_field: Option<&str>) -> Classification {
        is_interesting(self.status, &self.body, response.status, &response.body, excluded_field)
    }
}

impl From<&ResponseSnapshot> for BaselineSnapshot {
    fn from(response: &ResponseSnapshot) -> Self {
        Self::new(response.status, &response.body)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub status_changed: bool,
    pub body_changed: bool,
}

impl Classification {
    pub fn is_interesting(&self) -> bool {
        self.status_changed || self.body_changed
    }
}

pub fn is_interesting(
    baseline_status: u16,
    baseline_body: &str,
    current_status: u16,
    current_body: &str,
    excluded_field: Option<&str>,
) -> Classification {
    let status_changed = current_status != baseline_status;

    let body_changed = match (
        serde_json::from_str::<Value>(baseline_body),
        serde_json::from_str::<Value>(current_body),
    ) {
        (Ok(base), Ok(current)) => !json_equal_excluding(&base, &current, excluded_field),
        _ => current_body.chars().count() != baseline_body.chars().count(),
    };

    Classification { status_changed, body_changed }
}

fn json_equal_excluding(base: &Value, current: &Value, excluded_field: Option<&str>) -> bool {
    match (base, current, excluded_field) {
        (Value::Object(a), Value::Object(b), Some(field)) => {
            let keys_a = a.keys().filter(|k| k.as_str() != field);
            let count_a = keys_a.clone().count();
            let count_b = b.keys().filter(|k| k.as_str() != field).count();
            count_a == count_b
                && keys_a.into_iter().all(|k| match b.get(k) {
                    Some(v) => json_equal(&a[k], v),
                    None => false,
                })
        }
        _ => json_equal(base, current),
    }
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_equal(v, w)))
        }
        (Value::Array(x), Value::Array(y)) => arrays_equal_unordered(x, y),
        _ => a == b,
    }
}

/// Order and repetition are ignored: every element of either array has an
/// equal element somewhere in the other.
fn arrays_equal_unordered(x: &[Value], y: &[Value]) -> bool {
    let covered = |from: &[Value], to: &[Value]| from.iter().all(|item| to.iter().any(|c| json_equal(item, c)));
    covered(x, y) && covered(y, x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(bs: u16, bb: &str, cs: u16, cb: &str, excluded: Option<&str>) -> (bool, bool) {
        let c = is_interesting(bs, bb, cs, cb, excluded);
        (c.status_changed, c.body_changed)
    }

    #[test]
    fn test_identical_json_is_not_interesting() {
        assert_eq!(check(200, r#"{"a":1}"#, 200, r#"{"a":1}"#, None), (false, false));
    }

    #[test]
    fn test_status_change_only() {
        assert_eq!(check(200, r#"{"a":1}"#, 404, r#"{"a":1}"#, None), (true, false));
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        assert_eq!(check(200, r#"{"a":1,"b":2}"#, 200, r#"{"b":2,"a":1}"#, None), (false, false));
    }

    #[test]
    fn test_excluded_field_is_ignored() {
        assert_eq!(check(200, r#"{"a":"x"}"#, 200, r#"{"a":"y"}"#, Some("a")), (false, false));
        assert_eq!(check(200, r#"{"a":"x","b":1}"#, 200, r#"{"a":"y","b":2}"#, Some("a")), (false, true));
    }

    #[test]
    fn test_excluded_field_missing_on_one_side() {
        assert_eq!(check(200, r#"{"a":"x","b":1}"#, 200, r#"{"b":1}"#, Some("a")), (false, false));
        assert_eq!(check(200, r#"{"b":1}"#, 200, r#"{"a":"y"}"#, Some("a")), (false, true));
    }

    #[test]
    fn test_exclusion_applies_only_at_top_level() {
        assert_eq!(
            check(200, r#"{"n":{"a":1}}"#, 200, r#"{"n":{"a":2}}"#, Some("a")),
            (false, true)
        );
    }

    #[test]
    fn test_non_json_falls_back_to_length() {
        assert_eq!(check(200, "plaintext", 200, "plaintext!", None), (false, true));
        assert_eq!(check(200, "plaintext", 200, "PLAINTEXT", None), (false, false));
        assert_eq!(check(200, r#"{"a":1}"#, 500, "<html>", None), (true, true));
    }

    #[test]
    fn test_arrays_ignore_order_and_repetition() {
        assert_eq!(check(200, "[1,2,2,3]", 200, "[3,2,1,2]", None), (false, false));
        assert_eq!(check(200, "[1,2,2]", 200, "[1,1,2]", None), (false, false));
        assert_eq!(check(200, r#"{"ids":[1]}"#, 200, r#"{"ids":[1,1]}"#, None), (false, false));
        assert_eq!(check(200, "[1,2]", 200, "[1,2,3]", None), (false, true));
        assert_eq!(check(200, "[1,2]", 200, "[]", None), (false, true));
        assert_eq!(
            check(200, r#"{"l":[{"x":1},{"y":[2,1]}]}"#, 200, r#"{"l":[{"y":[1,2]},{"x":1}]}"#, None),
            (false, false)
        );
    }

    #[test]
    fn test_type_change_is_a_body_change() {
        assert_eq!(check(200, r#"{"a":1}"#, 200, r#"{"a":"1"}"#, None), (false, true));
    }

    #[test]
    fn test_baseline_snapshot_classify() {
        let baseline = BaselineSnapshot::new(200, r#"{"id":"<<FUZZ_id>>","ok":true}"#);
        let response = ResponseSnapshot::new(200, r#"{"ok":true,"id":"7"}"#);
        assert!(!baseline.classify(&response, Some("id")).is_interesting());
        assert!(baseline.classify(&response, None).is_interesting());
    }
}
