//! Literal / regular expression rule atoms (`#...`)

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::tokenizer::{is_emoji_only, remove_diacritics, tokenize};

/// Joiners that may appear between emoji in raw text
const EMOJI_GLUE: [char; 2] = ['\u{FE0F}', '\u{200D}'];

fn default_true() -> bool {
    true
}

/// Structured pattern atom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Regular expression source
    pub pattern: String,
    /// Match against the tokenized text instead of the raw one
    #[serde(default = "default_true")]
    pub tokenized: bool,
    /// A full match explains the whole text (no redundant-intent handicap)
    #[serde(default)]
    pub full_match: bool,
}

/// Compiled literal pattern with its matching flags
#[derive(Debug, Clone)]
pub struct RegexpComparator {
    source: String,
    regex: Option<Regex>,
    /// Matched against the tokenized text (otherwise the raw text)
    pub uses_tokenized_text: bool,
    /// Pattern is anchored to the whole text
    pub is_full_match: bool,
}

impl RegexpComparator {
    /// Compile a `#` expression (without the leading hash)
    ///
    /// - emoji only: `^[<code points>]+$` against the raw text
    /// - closing hash (`#hel+o#`): free case-insensitive regex, partial match
    /// - otherwise: `|`-separated literal alternatives, each a full match
    pub fn from_expression(expression: &str) -> Self {
        if is_emoji_only(&remove_diacritics(expression)) {
            return Self::emoji(expression);
        }

        if expression.chars().count() > 1 && expression.ends_with('#') {
            let inner = &expression[..expression.len() - 1];
            return Self {
                source: expression.to_string(),
                regex: compile_with_fallback(inner),
                uses_tokenized_text: true,
                is_full_match: false,
            };
        }

        let alternatives: Vec<String> = expression
            .split('|')
            .map(tokenize)
            .filter(|alternative| !alternative.is_empty())
            .map(|alternative| format!("^{}$", regex::escape(&alternative)))
            .collect();

        let regex = if alternatives.is_empty() {
            tracing::warn!(pattern = %expression, "Literal pattern has no matchable alternative");
            None
        } else {
            compile_with_fallback(&alternatives.join("|"))
        };

        Self {
            source: expression.to_string(),
            regex,
            uses_tokenized_text: true,
            is_full_match: true,
        }
    }

    /// Compile a structured pattern atom
    pub fn from_rule(rule: &PatternRule) -> Self {
        Self {
            source: rule.pattern.clone(),
            regex: compile_with_fallback(&rule.pattern),
            uses_tokenized_text: rule.tokenized,
            is_full_match: rule.full_match,
        }
    }

    fn emoji(expression: &str) -> Self {
        let mut class = String::new();
        let mut seen = Vec::new();
        for c in expression.chars().chain(EMOJI_GLUE) {
            if !seen.contains(&c) {
                seen.push(c);
                class.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
            }
        }

        Self {
            source: expression.to_string(),
            regex: Regex::new(&format!("^[{}]+$", class)).ok(),
            uses_tokenized_text: false,
            is_full_match: true,
        }
    }

    /// Source expression as written in the rule
    pub fn source(&self) -> &str {
        &self.source
    }

    /// False when the pattern could not be compiled and never matches
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// Test the pattern against the appropriate text variant
    pub fn is_match(&self, raw: &str, tokenized: &str) -> bool {
        let subject = if self.uses_tokenized_text {
            tokenized
        } else {
            raw
        };
        self.regex
            .as_ref()
            .map(|regex| regex.is_match(subject))
            .unwrap_or(false)
    }
}

/// Compile case-insensitively; on failure strip disallowed characters and retry
fn compile_with_fallback(source: &str) -> Option<Regex> {
    let build = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build();

    match build(source) {
        Ok(regex) => Some(regex),
        Err(err) => {
            let stripped: String = source
                .to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '|' || *c == '-')
                .collect();

            let retried = if stripped.trim_matches('|').is_empty() {
                None
            } else {
                build(&stripped).ok()
            };

            tracing::warn!(
                pattern = %source,
                fallback = %stripped,
                recovered = retried.is_some(),
                "Invalid rule pattern: {}",
                err
            );
            retried
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(expression: &str, text: &str) -> bool {
        RegexpComparator::from_expression(expression).is_match(text, &tokenize(text))
    }

    #[test]
    fn test_literal_alternatives() {
        assert!(matches("hello|hi", "Hello!"));
        assert!(matches("hello|hi", "hi"));
        assert!(!matches("hello|hi", "hi there"));
        assert!(matches("Good Morning", "good   morning"));
        assert!(matches("kůň", "kun"));

        let comparator = RegexpComparator::from_expression("hello|hi");
        assert!(comparator.uses_tokenized_text);
        assert!(comparator.is_full_match);
    }

    #[test]
    fn test_closing_hash_is_free_regex() {
        let comparator = RegexpComparator::from_expression("hel+o#");
        assert!(!comparator.is_full_match);
        assert!(comparator.is_match("well HELLLO there", "well-helllo-there"));
        assert!(!comparator.is_match("help", "help"));
    }

    #[test]
    fn test_emoji_pattern_matches_raw_text() {
        let comparator = RegexpComparator::from_expression("👍");
        assert!(!comparator.uses_tokenized_text);
        assert!(comparator.is_match("👍", ""));
        assert!(comparator.is_match("👍👍", ""));
        assert!(!comparator.is_match("👍 ok", "ok"));
        assert!(!comparator.is_match("👎", ""));
    }

    #[test]
    fn test_invalid_regex_falls_back() {
        let comparator = RegexpComparator::from_expression("abc(#");
        assert!(comparator.is_valid());
        assert!(comparator.is_match("xabcx", "xabcx"));

        let comparator = RegexpComparator::from_expression("(((#");
        assert!(!comparator.is_valid());
        assert!(!comparator.is_match("(((", ""));
    }

    #[test]
    fn test_structured_pattern() {
        let comparator = RegexpComparator::from_rule(&PatternRule {
            pattern: r"^\d{3}$".to_string(),
            tokenized: false,
            full_match: true,
        });
        assert!(comparator.is_match("123", "123"));
        assert!(!comparator.is_match("1234", "1234"));
    }

    #[test]
    fn test_pattern_without_alternatives_never_matches() {
        let comparator = RegexpComparator::from_expression("???");
        assert!(!comparator.is_valid());
        assert!(!comparator.is_match("", ""));
    }
}
