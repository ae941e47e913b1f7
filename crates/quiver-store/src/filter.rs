//! Declarative filters evaluated against JSON documents.
//!
//! A [`Filter`] is a conjunction of field conditions built with a fluent
//! API and compiled once per query into a [`CompiledFilter`], so regex
//! patterns are parsed a single time regardless of how many documents are
//! scanned.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use quiver_core::error::{QuiverError, Result};
use quiver_core::types::Document;

/// A single field condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Field value equals the given value. A missing field only matches
    /// `null`.
    Eq(String, Value),
    /// Field value is a string matching the given regular expression.
    Regex {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// Field value is one of the given values.
    In(String, Vec<Value>),
}

/// A conjunction of conditions. The empty filter matches every document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// A filter that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    /// Require `field` to be a string matching `pattern`.
    pub fn regex(
        mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        case_insensitive: bool,
    ) -> Self {
        self.conditions.push(Condition::Regex {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive,
        });
        self
    }

    /// Require `field` to equal one of `values`.
    pub fn one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(field.into(), values));
        self
    }

    /// True if no conditions have been added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Compile the filter, parsing regex patterns.
    ///
    /// Fails if any regex pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilter> {
        let mut matchers = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let matcher = match condition {
                Condition::Eq(field, value) => Matcher::Eq(field.clone(), value.clone()),
                Condition::Regex {
                    field,
                    pattern,
                    case_insensitive,
                } => {
                    let regex = RegexBuilder::new(pattern)
                        .case_insensitive(*case_insensitive)
                        .build()
                        .map_err(|e| {
                            QuiverError::Store(format!("Invalid filter pattern '{}': {}", pattern, e))
                        })?;
                    Matcher::Regex(field.clone(), regex)
                }
                Condition::In(field, values) => Matcher::In(field.clone(), values.clone()),
            };
            matchers.push(matcher);
        }
        Ok(CompiledFilter { matchers })
    }
}

#[derive(Debug)]
enum Matcher {
    Eq(String, Value),
    Regex(String, Regex),
    In(String, Vec<Value>),
}

/// A filter with its regex patterns pre-parsed, ready for repeated
/// evaluation.
#[derive(Debug)]
pub struct CompiledFilter {
    matchers: Vec<Matcher>,
}

impl CompiledFilter {
    /// True if the document satisfies every condition.
    pub fn matches(&self, document: &Document) -> bool {
        self.matchers.iter().all(|matcher| match matcher {
            Matcher::Eq(field, value) => {
                document.get(field).unwrap_or(&Value::Null) == value
            }
            Matcher::Regex(field, regex) => document
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|text| regex.is_match(text)),
            Matcher::In(field, values) => {
                let actual = document.get(field).unwrap_or(&Value::Null);
                values.iter().any(|v| v == actual)
            }
        })
    }
}
