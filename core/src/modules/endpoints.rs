//! Resolved endpoint descriptors and their conversion into request templates.
//!
//! Descriptors come from an API-document parser outside this crate and are
//! read here as JSON. Path parameters appear as `{name}` in the URL; body
//! parameters as `<<FUZZ_name>>` in the body template.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::template::RequestTemplate;
use crate::core::token_for;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointParam {
    pub name: String,
    pub location: ParamLocation,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body_template: String,
    #[serde(default)]
    pub params: Vec<EndpointParam>,
    /// Required headers; a value of the form `<<...>>` must be supplied by the operator.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl EndpointDescriptor {
    pub fn params_at(&self, location: ParamLocation) -> impl Iterator<Item = &EndpointParam> {
        self.params.iter().filter(move |p| p.location == location)
    }

    /// Header names whose value is still a placeholder.
    pub fn unresolved_headers(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(_, v)| is_placeholder(v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Builds the run's template: selected parameters become fuzz tokens, every
    /// other declared parameter takes its static value, and placeholder
    /// headers take the supplied value (or are dropped when none is given).
    pub fn resolve(
        &self,
        base_url: &str,
        selected: &[String],
        static_values: &HashMap<String, String>,
        header_values: &HashMap<String, String>,
    ) -> Result<RequestTemplate, ConfigError> {
        let unknown: Vec<String> = selected
            .iter()
            .filter(|name| !self.params.iter().any(|p| &p.name == *name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownParameter(unknown));
        }

        let is_selected = |name: &str| selected.iter().any(|s| s == name);
        let static_value = |name: &str| {
            static_values
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| ConfigError::MissingStaticValue(name.to_string()))
        };

        let mut url = format!("{}{}", base_url.trim_end_matches('/'), self.url);
        for param in self.params_at(ParamLocation::Path) {
            let segment = format!("{{{}}}", param.name);
            let value = if is_selected(&param.name) {
                token_for(&param.name)
            } else {
                static_value(&param.name)?.to_string()
            };
            url = url.replace(&segment, &value);
        }

        // Fuzzed query parameters first, static ones after, as the CLI always did.
        let mut query = Vec::new();
        for param in self.params_at(ParamLocation::Query).filter(|p| is_selected(&p.name)) {
            query.push(format!("{}={}", param.name, token_for(&param.name)));
        }
        for param in self.params_at(ParamLocation::Query).filter(|p| !is_selected(&p.name)) {
            query.push(format!("{}={}", param.name, static_value(&param.name)?));
        }
        if !query.is_empty() {
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{}{}{}", url, separator, query.join("&"));
        }

        let mut body = self.body_template.clone();
        for param in self.params_at(ParamLocation::Body).filter(|p| !is_selected(&p.name)) {
            body = body.replace(&token_for(&param.name), static_value(&param.name)?);
        }

        let mut template = RequestTemplate::new(&self.method, &url, &body);
        for (key, value) in &self.headers {
            if !is_placeholder(value) {
                template = template.with_header(key, value);
            } else if let Some(supplied) = header_values.get(key) {
                template = template.with_header(key, supplied);
            }
        }
        Ok(template)
    }

    /// Multi-line listing used by dry runs.
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}\n  Params:\n", self.method, self.url);
        for p in &self.params {
            let location = format!("{:?}", p.location).to_lowercase();
            match &p.enum_values {
                Some(values) => out.push_str(&format!(
                    "    - {} ({}) [enum: {}]\n",
                    p.name,
                    location,
                    values.join(", ")
                )),
                None => out.push_str(&format!("    - {} ({})\n", p.name, location)),
            }
        }
        out.push_str(&format!("  Body template: {}\n", self.body_template));
        if !self.headers.is_empty() {
            out.push_str("  Required headers:\n");
            for (k, v) in &self.headers {
                out.push_str(&format!("    - {}: {}\n", k, v));
            }
        }
        out
    }
}

fn is_placeholder(value: &str) -> bool {
    value.contains("<<") && value.contains(">>")
}

/// Loads descriptor files, keeping each parsed file for the life of the catalog.
#[derive(Debug, Default)]
pub struct EndpointCatalog {
    cache: HashMap<PathBuf, Arc<Vec<EndpointDescriptor>>>,
}

impl EndpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> anyhow::Result<Arc<Vec<EndpointDescriptor>>> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(Arc::clone(hit));
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read endpoints file {}", path.display()))?;
        let endpoints: Vec<EndpointDescriptor> = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse endpoints file {}", path.display()))?;
        let endpoints = Arc::new(endpoints);
        self.cache.insert(path.to_path_buf(), Arc::clone(&endpoints));
        Ok(endpoints)
    }
}
