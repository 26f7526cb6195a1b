//! Per-run variable store and parameter substitution

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::value::Multivar;
use crate::domain::EngineError;

/// Request input, seeded by the caller
pub const INPUT_VAR: &str = "_input";
/// Designated workflow output
pub const RESPONSE_VAR: &str = "_response";
/// Current chunk text, seeded per ingestion chunk
pub const CHUNK_VAR: &str = "_chunk";
/// Source document reference, seeded per ingestion chunk
pub const REF_VAR: &str = "_ref";
/// Current import batch id
pub const BATCH_VAR: &str = "_batch";

/// Named variables for one workflow run or one ingestion chunk
///
/// Created fresh per run and discarded afterwards. Later binds to the same
/// name replace earlier ones.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct VarStore {
    vars: HashMap<String, Multivar>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Multivar) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Multivar> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolve a raw param value to a variable or a literal
    ///
    /// A value is a variable reference only when it is exactly `$name`: a
    /// single `$`, in prefix position. Anything else (`x$a`, `$$a`, `a b`)
    /// is a literal. This is a deliberate heuristic, not a template syntax;
    /// prompts get full substitution via [`render_prompt`](Self::render_prompt).
    pub fn substitute(&self, value: &str) -> Result<Multivar, EngineError> {
        if !value.starts_with('$') || value.matches('$').count() > 1 {
            return Ok(Multivar::text(value));
        }

        let name = &value[1..];
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::unbound(name))
    }

    /// Fetch a required param and substitute it
    pub fn resolve_param(
        &self,
        key: &str,
        params: &HashMap<String, String>,
    ) -> Result<Multivar, EngineError> {
        let value = params
            .get(key)
            .ok_or_else(|| EngineError::param_missing(key))?;

        self.substitute(value)
    }

    /// Fetch an optional param; absent keys resolve to `None`
    pub fn resolve_param_opt(
        &self,
        key: &str,
        params: &HashMap<String, String>,
    ) -> Result<Option<Multivar>, EngineError> {
        match params.get(key) {
            Some(value) => Ok(Some(self.substitute(value)?)),
            None => Ok(None),
        }
    }

    /// Replace `$name` with the variable's text for every bound variable
    /// that has a non-empty text form, at every occurrence
    ///
    /// Longer names substitute first so `$doc` never clobbers an occurrence
    /// of `$doc2`.
    pub fn render_prompt(&self, prompt: &str) -> String {
        let mut substitutable: Vec<(&str, String)> = self
            .vars
            .iter()
            .filter_map(|(name, value)| {
                value
                    .text_repr()
                    .map(|text| (name.as_str(), text.into_owned()))
            })
            .collect();

        substitutable.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut rendered = prompt.to_string();
        for (name, text) in substitutable {
            rendered = rendered.replace(&format!("${}", name), &text);
        }

        rendered
    }
}
