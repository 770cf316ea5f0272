//! Attribute-based predicates for message contexts.

use super::Predicate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read access to string attributes carried by a context.
pub trait MessageAttributes {
    /// Returns the attribute value for `key`, if present.
    fn attribute(&self, key: &str) -> Option<&str>;
}

impl MessageAttributes for std::collections::HashMap<String, String> {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// A rule applied to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRule {
    /// The attribute must equal the value.
    Equals(String),
    /// The attribute must equal one of the values.
    OneOf(Vec<String>),
    /// The attribute must not equal the value. A missing attribute passes.
    AnythingBut(String),
    /// The attribute must not equal any of the values. A missing attribute passes.
    AnythingButOneOf(Vec<String>),
}

impl AttributeRule {
    /// Checks the rule against an attribute value.
    #[must_use]
    pub fn accepts(&self, value: Option<&str>) -> bool {
        match self {
            Self::Equals(expected) => value == Some(expected.as_str()),
            Self::OneOf(allowed) => value.is_some_and(|v| allowed.iter().any(|a| a == v)),
            Self::AnythingBut(rejected) => value != Some(rejected.as_str()),
            Self::AnythingButOneOf(rejected) => {
                value.map_or(true, |v| rejected.iter().all(|r| r != v))
            }
        }
    }
}

/// Matches contexts whose attributes satisfy every rule.
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    #[serde(default)]
    rules: BTreeMap<String, AttributeRule>,
}

impl AttributeFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for an attribute, replacing any previous one.
    #[must_use]
    pub fn rule(mut self, key: impl Into<String>, rule: AttributeRule) -> Self {
        self.rules.insert(key.into(), rule);
        self
    }

    /// Requires an attribute to equal `value`.
    #[must_use]
    pub fn equals(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.rule(key, AttributeRule::Equals(value.into()))
    }

    /// Requires an attribute to be one of `values`.
    #[must_use]
    pub fn one_of<I, S>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(key, AttributeRule::OneOf(values.into_iter().map(Into::into).collect()))
    }

    /// Requires an attribute not to equal `value`.
    #[must_use]
    pub fn anything_but(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.rule(key, AttributeRule::AnythingBut(value.into()))
    }

    /// Requires an attribute not to be any of `values`.
    #[must_use]
    pub fn anything_but_one_of<I, S>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(
            key,
            AttributeRule::AnythingButOneOf(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the filter has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks every rule against the attributes.
    #[must_use]
    pub fn accepts(&self, attributes: &impl MessageAttributes) -> bool {
        self.rules
            .iter()
            .all(|(key, rule)| rule.accepts(attributes.attribute(key)))
    }
}

impl<C> Predicate<C> for AttributeFilter
where
    C: MessageAttributes,
{
    fn matches(&self, ctx: &C) -> bool {
        self.accepts(ctx)
    }
}
