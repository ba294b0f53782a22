//! Backend-legal resource names
//!
//! [`sanitize`] is total and idempotent: any input yields a name that
//! satisfies the rule, and sanitizing that name again changes nothing.

use crate::types::Node;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Characters a kind accepts in its names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Charset {
    /// `[a-z0-9]`; disallowed characters are dropped
    LowerAlphanumeric,
    /// `[a-z0-9-]`; disallowed characters become a single hyphen
    LowerAlphanumericHyphen,
}

/// Format constraints for one kind's names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NamingRule {
    pub charset: Charset,
    pub min_len: usize,
    pub max_len: usize,
    pub must_start_with_letter: bool,
    /// Hint only; uniqueness is enforced by the backend
    pub globally_unique: bool,
    pub lead_prefix: &'static str,
    pub pad_suffix: &'static str,
}

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static ALNUM: Pattern = LazyLock::new(|| Regex::new(r"^[a-z0-9]+$"));
static ALNUM_LETTER_FIRST: Pattern = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*$"));
static HYPHENATED: Pattern = LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$"));
static HYPHENATED_LETTER_FIRST: Pattern = LazyLock::new(|| Regex::new(r"^[a-z](?:[a-z0-9-]*[a-z0-9])?$"));

impl NamingRule {
    /// Regular expression describing the character layout (length is checked separately)
    pub fn pattern(&self) -> &'static str {
        self.regex().as_ref().map_or("", Regex::as_str)
    }

    fn regex(&self) -> &'static Result<Regex, regex::Error> {
        let pattern: &'static Pattern = match (self.charset, self.must_start_with_letter) {
            (Charset::LowerAlphanumeric, false) => &ALNUM,
            (Charset::LowerAlphanumeric, true) => &ALNUM_LETTER_FIRST,
            (Charset::LowerAlphanumericHyphen, false) => &HYPHENATED,
            (Charset::LowerAlphanumericHyphen, true) => &HYPHENATED_LETTER_FIRST,
        };
        LazyLock::force(pattern)
    }
}

/// Turn a logical name into one the backend accepts
pub fn sanitize(raw: &str, rule: &NamingRule) -> String {
    let lowered = raw.to_ascii_lowercase();
    let mut name = match rule.charset {
        Charset::LowerAlphanumeric => lowered
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .collect(),
        Charset::LowerAlphanumericHyphen => collapse_hyphens(&lowered),
    };

    if rule.must_start_with_letter && !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name.insert_str(0, rule.lead_prefix);
    }

    // Only ASCII survives filtering, so byte truncation is safe
    name.truncate(rule.max_len);
    while name.ends_with('-') {
        name.pop();
    }

    let mut pad = rule.pad_suffix.chars().cycle();
    while name.len() < rule.min_len {
        name.push(pad.next().unwrap_or('x'));
    }

    name
}

/// Whether `name` already satisfies the rule
pub fn conforms(name: &str, rule: &NamingRule) -> bool {
    if name.len() < rule.min_len || name.len() > rule.max_len || name.contains("--") {
        return false;
    }
    rule.regex().as_ref().is_ok_and(|re| re.is_match(name))
}

/// The name requested for a node, honoring the kind's override property
pub fn requested_name(node: &Node) -> &str {
    node.kind
        .descriptor()
        .name_override
        .and_then(|key| node.property_str(key))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| node.logical_name())
}

/// Sanitized backend name for a node
pub fn physical_name(node: &Node) -> String {
    sanitize(requested_name(node), &node.kind.descriptor().naming)
}

fn collapse_hyphens(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
