//! Declarative form validation
//!
//! Each field carries an ordered list of rules; the first failing rule
//! produces that field's message. Rules other than `Required` pass on an
//! empty value.

use crate::errors::{FieldError, Result, ShelfError};
use std::collections::BTreeMap;

/// Submitted form values by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    values: BTreeMap<String, String>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    /// Value of `field`, empty when missing
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    MinLength(usize),
    /// Must equal the value of the named field
    EqualTo(String),
}

impl Rule {
    pub fn default_message(&self) -> String {
        match self {
            Rule::Required => "This field is required.".to_string(),
            Rule::Email => "Please enter a valid email address.".to_string(),
            Rule::MinLength(n) => format!("Please enter at least {} characters.", n),
            Rule::EqualTo(_) => "Please enter the same value again.".to_string(),
        }
    }

    fn check(&self, value: &str, form: &Form) -> bool {
        match self {
            Rule::Required => !value.trim().is_empty(),
            Rule::Email => is_email(value),
            Rule::MinLength(n) => value.chars().count() >= *n,
            Rule::EqualTo(other) => value == form.get(other),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    rule: Rule,
    message: Option<String>,
}

/// Rules for a set of fields, checked in declaration order
#[derive(Debug, Clone, Default)]
pub struct Validator {
    fields: Vec<(String, Vec<FieldRule>)>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `rule` to `field`
    pub fn rule(self, field: &str, rule: Rule) -> Self {
        self.push(field, rule, None)
    }

    /// Append `rule` to `field` with a custom message
    pub fn rule_with_message(self, field: &str, rule: Rule, message: &str) -> Self {
        self.push(field, rule, Some(message.to_string()))
    }

    fn push(mut self, field: &str, rule: Rule, message: Option<String>) -> Self {
        let entry = FieldRule { rule, message };
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, rules)) => rules.push(entry),
            None => self.fields.push((field.to_string(), vec![entry])),
        }
        self
    }

    /// One error per failing field
    pub fn errors(&self, form: &Form) -> Vec<FieldError> {
        self.fields
            .iter()
            .filter_map(|(field, rules)| {
                let value = form.get(field);
                rules
                    .iter()
                    .filter(|r| r.rule == Rule::Required || !value.is_empty())
                    .find(|r| !r.rule.check(value, form))
                    .map(|r| {
                        let message = r.message.clone().unwrap_or_else(|| r.rule.default_message());
                        FieldError::new(field.clone(), message)
                    })
            })
            .collect()
    }

    pub fn validate(&self, form: &Form) -> Result<()> {
        let errors = self.errors(form);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ShelfError::ValidationError(errors))
        }
    }
}

/// Loose address check: one `@`, a non-empty local part and a dotless or
/// dotted hostname of alphanumeric labels.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));
    let domain_ok = !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    local_ok && domain_ok
}
