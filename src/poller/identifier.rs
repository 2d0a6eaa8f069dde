//! Resource identifier parsing and extraction from free-form tool output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Five lowercase-alphanumeric groups, lengths 5-5-5-5-3.
const IDENTIFIER_BODY: &str = "[a-z0-9]{5}-[a-z0-9]{5}-[a-z0-9]{5}-[a-z0-9]{5}-[a-z0-9]{3}";

static EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{IDENTIFIER_BODY}$")).expect("identifier pattern is valid")
});

// Bounded on both sides so that longer hyphenated runs (account principals,
// a sixth group, an overlong last group) never yield a truncated match.
static EMBEDDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "(?:^|[^A-Za-z0-9-])({IDENTIFIER_BODY})(?:$|[^A-Za-z0-9-])"
    ))
    .expect("identifier pattern is valid")
});

// CSI escape sequences (colors, cursor movement) emitted by tools that
// ignore NO_COLOR.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("escape pattern is valid")
});

/// Error returned when a string is not a well-formed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed identifier '{0}': expected five hyphen-separated groups of lengths 5-5-5-5-3")]
pub struct IdentifierError(pub String);

/// A platform-assigned resource identifier, e.g. `rrkah-fqaaa-aaaaa-aaaaq-cai`.
///
/// Can only be constructed from a string that matches the identifier shape
/// exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if EXACT.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(IdentifierError(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier observed for a named resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedIdentifier {
    pub resource: String,
    pub id: Identifier,
}

impl ObservedIdentifier {
    pub fn new(resource: impl Into<String>, id: Identifier) -> Self {
        Self {
            resource: resource.into(),
            id,
        }
    }
}

/// Extract the first well-formed identifier embedded in `text`.
///
/// Diagnostic noise is expected to precede the real identifier in the tool's
/// output, so the first match wins. Terminal escape sequences are stripped
/// first, so colored output yields the same identifier as plain output.
pub fn extract_identifier(text: &str) -> Option<Identifier> {
    let plain = ANSI_ESCAPE.replace_all(text, "");
    EMBEDDED
        .captures(&plain)
        .and_then(|caps| caps.get(1))
        .map(|m| Identifier(m.as_str().to_string()))
}
