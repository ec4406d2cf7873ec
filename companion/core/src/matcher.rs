//! Matcher
//!
//! Compiles a rule table once and answers "which rule handles this text".
//! Rules are tried in table order and the first hit wins; no match is the
//! normal signal to fall through to the API or a default reply.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::rules::{RulePriority, RuleSpec, STANDARD_RULES};

/// Errors building a matcher
#[derive(Debug, Error)]
pub enum MatcherError {
    /// A rule pattern failed to compile
    #[error("invalid pattern for rule '{name}': {source}")]
    InvalidPattern {
        /// Rule name
        name: &'static str,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },
}

/// A compiled rule
#[derive(Debug)]
pub struct Rule {
    spec: RuleSpec,
    regex: Regex,
}

impl Rule {
    /// Rule identifier
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Tier
    #[must_use]
    pub fn priority(&self) -> RulePriority {
        self.spec.priority
    }

    /// The uncompiled rule (pattern and generator)
    #[must_use]
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Whether the rule fires for normalized `text`
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Ordered, compiled rule table
#[derive(Debug)]
pub struct Matcher {
    rules: Vec<Rule>,
}

impl Matcher {
    /// Compile `specs` in the given order
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError::InvalidPattern`] naming the first rule whose
    /// pattern does not compile.
    pub fn new(specs: &[RuleSpec]) -> Result<Self, MatcherError> {
        let rules = specs
            .iter()
            .map(|spec| {
                RegexBuilder::new(spec.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| Rule { spec: *spec, regex })
                    .map_err(|source| MatcherError::InvalidPattern {
                        name: spec.name,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(rules = rules.len(), "Compiled rule table");
        Ok(Self { rules })
    }

    /// Matcher over the built-in table
    ///
    /// # Errors
    ///
    /// Only if a built-in pattern is malformed.
    pub fn standard() -> Result<Self, MatcherError> {
        Self::new(STANDARD_RULES)
    }

    /// First rule matching normalized `text`
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.is_match(text))
    }

    /// First safety rule matching normalized `text`
    #[must_use]
    pub fn lookup_safety(&self, text: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.priority() == RulePriority::Safety)
            .find(|rule| rule.is_match(text))
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in match order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

/// Prepare raw input for matching
///
/// Lower-cases, trims, folds French diacritics to ASCII and straightens
/// typographic apostrophes, so "Ça va ?" and "ca va ?" hit the same rule.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'î' | 'ï' | 'í' => out.push('i'),
            'ô' | 'ö' | 'ó' => out.push('o'),
            'ù' | 'û' | 'ü' | 'ú' => out.push('u'),
            'ÿ' => out.push('y'),
            'ç' => out.push('c'),
            'ñ' => out.push('n'),
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            '\u{2019}' | '\u{2018}' | '`' => out.push('\''),
            other => out.push(other),
        }
    }
    out
}
