//! Row validation rules.
//!
//! A [`RuleSet`] maps column names to ordered rule lists. Rule lists are
//! written as pipe-delimited strings (`"required|email|max:255"`), so they can
//! be declared in configuration as easily as in code.

use crate::models::RowPayload;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A single validation rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must be present.
    Required,
    /// Value may be null. Documents intent; null already passes other rules.
    Nullable,
    /// Value must be text. Always true for CSV input.
    String,
    /// Value must look like an email address.
    Email,
    /// Value must parse as a signed integer.
    Integer,
    /// Value must parse as a finite number.
    Numeric,
    /// Value must be one of `0`, `1`, `true`, `false`.
    Boolean,
    /// Minimum length, or minimum value for numeric columns.
    Min(f64),
    /// Maximum length, or maximum value for numeric columns.
    Max(f64),
    /// Value must be one of the listed options.
    In(Vec<String>),
    /// Value must match the pattern.
    Regex(Regex),
    /// Value must be a `YYYY-MM-DD` calendar date.
    Date,
}

impl Rule {
    /// Parses one rule token such as `max:255` or `in:a,b`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown rules or bad arguments.
    pub fn parse(token: &str) -> Result<Self> {
        let (name, arg) = match token.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (token.trim(), None),
        };

        match (name.to_lowercase().as_str(), arg) {
            ("required", None) => Ok(Self::Required),
            ("nullable", None) => Ok(Self::Nullable),
            ("string", None) => Ok(Self::String),
            ("email", None) => Ok(Self::Email),
            ("integer" | "int", None) => Ok(Self::Integer),
            ("numeric", None) => Ok(Self::Numeric),
            ("boolean" | "bool", None) => Ok(Self::Boolean),
            ("date", None) => Ok(Self::Date),
            ("min", Some(n)) => parse_bound(token, n).map(Self::Min),
            ("max", Some(n)) => parse_bound(token, n).map(Self::Max),
            ("in", Some(list)) => Ok(Self::In(
                list.split(',').map(|s| s.trim().to_string()).collect(),
            )),
            ("regex", Some(pattern)) => Regex::new(pattern)
                .map(Self::Regex)
                .map_err(|e| Error::InvalidInput(format!("rule '{token}': {e}"))),
            _ => Err(Error::InvalidInput(format!("unknown rule '{token}'"))),
        }
    }

    const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Numeric)
    }
}

fn parse_bound(token: &str, n: &str) -> Result<f64> {
    n.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::InvalidInput(format!("rule '{token}': bound must be a number")))
}

/// Validation rules for the columns of one type.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, Vec<Rule>>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rules for a column from a pipe-delimited string.
    ///
    /// # Errors
    ///
    /// Returns an error if any token fails to parse.
    pub fn rule(mut self, column: impl Into<String>, definition: &str) -> Result<Self> {
        let parsed = definition
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Rule::parse)
            .collect::<Result<Vec<_>>>()?;
        self.rules.entry(column.into()).or_default().extend(parsed);
        Ok(self)
    }

    /// Builds a rule set from a column → rule-string map.
    ///
    /// # Errors
    ///
    /// Returns an error if any rule string fails to parse.
    pub fn from_map<'a, I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        definitions
            .into_iter()
            .try_fold(Self::new(), |set, (column, definition)| {
                set.rule(column.clone(), definition)
            })
    }

    /// Returns the columns that carry rules.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Returns the rules for a column.
    #[must_use]
    pub fn rules_for(&self, column: &str) -> &[Rule] {
        self.rules.get(column).map_or(&[], Vec::as_slice)
    }

    /// Returns true if no column carries rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Structured validation diagnostics: column → messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Creates an empty error bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message for a column.
    pub fn add(&mut self, column: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(column.into())
            .or_default()
            .push(message.into());
    }

    /// Returns true if no messages were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the messages for a column.
    #[must_use]
    pub fn messages(&self, column: &str) -> &[String] {
        self.errors.get(column).map_or(&[], Vec::as_slice)
    }

    /// Serializes the diagnostics as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.errors).unwrap_or_else(|_| format!("{:?}", self.errors))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validates a row payload against a rule set.
pub trait Validator: Send + Sync {
    /// Returns `Ok(())` when every rule passes.
    ///
    /// # Errors
    ///
    /// Returns the collected diagnostics when any rule fails.
    fn validate(
        &self,
        payload: &RowPayload,
        rules: &RuleSet,
    ) -> std::result::Result<(), ValidationErrors>;
}

/// Default [`Validator`] evaluating [`Rule`]s.
///
/// Null values pass every rule except [`Rule::Required`]. All failing rules
/// of a column are reported, not only the first.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn check(column: &str, value: &str, rule: &Rule, numeric: bool) -> Option<String> {
        let ok = match rule {
            Rule::Required | Rule::Nullable | Rule::String => true,
            Rule::Email => is_valid_email(value),
            Rule::Integer => value.trim().parse::<i64>().is_ok(),
            Rule::Numeric => parse_number(value).is_some(),
            Rule::Boolean => matches!(
                value.to_lowercase().as_str(),
                "0" | "1" | "true" | "false"
            ),
            Rule::Min(min) => measure(value, numeric).is_some_and(|m| m >= *min),
            Rule::Max(max) => measure(value, numeric).is_some_and(|m| m <= *max),
            Rule::In(options) => options.iter().any(|o| o == value),
            Rule::Regex(re) => re.is_match(value),
            Rule::Date => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        };

        if ok {
            return None;
        }

        Some(match rule {
            Rule::Email => format!("The {column} field must be a valid email address."),
            Rule::Integer => format!("The {column} field must be an integer."),
            Rule::Numeric => format!("The {column} field must be a number."),
            Rule::Boolean => format!("The {column} field must be true or false."),
            Rule::Min(n) if numeric => format!("The {column} field must be at least {n}."),
            Rule::Min(n) => format!("The {column} field must be at least {n} characters."),
            Rule::Max(n) if numeric => {
                format!("The {column} field must not be greater than {n}.")
            },
            Rule::Max(n) => {
                format!("The {column} field must not be greater than {n} characters.")
            },
            Rule::In(_) => format!("The selected {column} is invalid."),
            Rule::Regex(_) => format!("The {column} field format is invalid."),
            Rule::Date => format!("The {column} field must be a valid date."),
            Rule::Required | Rule::Nullable | Rule::String => String::new(),
        })
    }
}

impl Validator for RuleValidator {
    fn validate(
        &self,
        payload: &RowPayload,
        rules: &RuleSet,
    ) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (column, column_rules) in &rules.rules {
            let value = payload.get(column);
            let numeric = column_rules.iter().any(Rule::is_numeric);

            let Some(value) = value else {
                if column_rules.iter().any(|r| matches!(r, Rule::Required)) {
                    errors.add(column, format!("The {column} field is required."));
                }
                continue;
            };

            for rule in column_rules {
                if let Some(message) = Self::check(column, value, rule, numeric) {
                    errors.add(column, message);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[allow(clippy::cast_precision_loss)]
fn measure(value: &str, numeric: bool) -> Option<f64> {
    if numeric {
        parse_number(value)
    } else {
        Some(value.chars().count() as f64)
    }
}

/// Basic email shape check: one `@`, non-empty local part, dotted domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let domain_parts: Vec<&str> = domain.split('.').collect();
    domain_parts.len() >= 2 && domain_parts.iter().all(|part| !part.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn payload(pairs: &[(&str, &str)]) -> RowPayload {
        let headers: Vec<&str> = pairs.iter().map(|(h, _)| *h).collect();
        let fields: Vec<&str> = pairs.iter().map(|(_, f)| *f).collect();
        RowPayload::from_record(&headers, &fields)
    }

    fn check(definition: &str, value: &str) -> bool {
        let rules = RuleSet::new().rule("field", definition).unwrap();
        RuleValidator::new()
            .validate(&payload(&[("field", value)]), &rules)
            .is_ok()
    }

    #[test_case("required", "x", true ; "required present")]
    #[test_case("required", "", false ; "required empty")]
    #[test_case("email", "ada@example.com", true ; "email ok")]
    #[test_case("email", "ada@example", false ; "email no dot")]
    #[test_case("email", "not-an-email", false ; "email no at")]
    #[test_case("email", "a b@example.com", false ; "email whitespace")]
    #[test_case("email", "", true ; "email null passes")]
    #[test_case("integer", "-42", true ; "integer ok")]
    #[test_case("integer", "4.2", false ; "integer fraction")]
    #[test_case("numeric", "4.2", true ; "numeric ok")]
    #[test_case("numeric", "NaN", false ; "numeric nan")]
    #[test_case("boolean", "TRUE", true ; "boolean ok")]
    #[test_case("boolean", "yes", false ; "boolean bad")]
    #[test_case("max:3", "abcd", false ; "max length")]
    #[test_case("min:2", "ab", true ; "min length")]
    #[test_case("integer|min:18", "17", false ; "min value")]
    #[test_case("numeric|max:10", "9.5", true ; "max value")]
    #[test_case("in:draft,live", "live", true ; "in ok")]
    #[test_case("in:draft,live", "gone", false ; "in bad")]
    #[test_case("regex:^[A-Z]{3}$", "ABC", true ; "regex ok")]
    #[test_case("regex:^[A-Z]{3}$", "abc", false ; "regex bad")]
    #[test_case("date", "2025-09-11", true ; "date ok")]
    #[test_case("date", "2025-13-01", false ; "date bad")]
    #[test_case("nullable|string", "", true ; "nullable")]
    fn test_rules(definition: &str, value: &str, expected: bool) {
        assert_eq!(check(definition, value), expected);
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let result = RuleSet::new().rule("x", "required|shiny");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_bad_bound_rejected() {
        assert!(Rule::parse("max:lots").is_err());
        assert!(Rule::parse("regex:(").is_err());
    }

    #[test]
    fn test_errors_are_structured() {
        let rules = RuleSet::new()
            .rule("name", "required")
            .unwrap()
            .rule("email", "required|email")
            .unwrap();
        let errors = RuleValidator::new()
            .validate(&payload(&[("name", ""), ("email", "bad")]), &rules)
            .unwrap_err();

        assert_eq!(errors.messages("name"), ["The name field is required."]);
        assert_eq!(
            errors.messages("email"),
            ["The email field must be a valid email address."]
        );
        assert_eq!(
            errors.to_json(),
            r#"{"email":["The email field must be a valid email address."],"name":["The name field is required."]}"#
        );
    }

    #[test]
    fn test_missing_column_counts_as_null() {
        let rules = RuleSet::new().rule("email", "required").unwrap();
        let result = RuleValidator::new().validate(&payload(&[("name", "Ada")]), &rules);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_map() {
        let mut definitions = BTreeMap::new();
        definitions.insert("email".to_string(), "required|email".to_string());
        definitions.insert("age".to_string(), "integer".to_string());
        let rules = RuleSet::from_map(&definitions).unwrap();
        assert_eq!(rules.columns().collect::<Vec<_>>(), ["age", "email"]);
        assert_eq!(rules.rules_for("email").len(), 2);
        assert!(rules.rules_for("missing").is_empty());
    }
}
