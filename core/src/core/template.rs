use serde::{Deserialize, Serialize};

use crate::core::generator::SubstitutionTuple;
use crate::core::token_for;

/// A request with `<<FUZZ_name>>` placeholders in its URL and/or body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTemplate {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    /// Headers carried by the template itself, e.g. ones an endpoint requires.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl RequestTemplate {
    pub fn new(method: &str, url: &str, body: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            body: body.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Whether `name`'s token appears in the URL or the body.
    pub fn uses_parameter(&self, name: &str) -> bool {
        let token = token_for(name);
        self.url.contains(&token) || self.body.contains(&token)
    }

    /// Names from `params` whose token appears in neither template, in input order.
    pub fn unused_parameters<'a>(&self, params: &'a [String]) -> Vec<&'a str> {
        params
            .iter()
            .filter(|p| !self.uses_parameter(p))
            .map(|p| p.as_str())
            .collect()
    }

    /// Resolves every token in the tuple into a concrete `(url, body)` pair.
    /// Values are inserted verbatim, without any escaping.
    pub fn substitute(&self, tuple: &SubstitutionTuple) -> (String, String) {
        let mut url = self.url.clone();
        let mut body = self.body.clone();
        for assignment in tuple.assignments() {
            let token = token_for(&assignment.name);
            url = url.replace(&token, &assignment.value);
            body = body.replace(&token, &assignment.value);
        }
        (url, body)
    }
}
