//! Token claims read by the gatekeeper.

use serde::{Deserialize, Serialize};

/// `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "https://api"`
    Single(String),
    /// `"aud": ["https://api", "https://other"]`
    Many(Vec<String>),
}

impl Audience {
    /// Whether `expected` is one of the audiences.
    #[must_use]
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }

    /// All audiences as a slice-like iterator.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Self::Single(aud) => std::slice::from_ref(aud),
            Self::Many(auds) => auds,
        };
        items.iter().map(String::as_str)
    }
}

/// Registered claims the gatekeeper looks at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    /// Expired relative to `now` (Unix seconds). Tokens without `exp` never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }

    /// Not yet valid relative to `now`. Tokens without `nbf` are valid immediately.
    #[must_use]
    pub fn is_premature_at(&self, now: i64) -> bool {
        self.nbf.is_some_and(|nbf| nbf > now)
    }

    /// Whether the audience claim names `expected`.
    #[must_use]
    pub fn has_audience(&self, expected: &str) -> bool {
        self.aud.as_ref().is_some_and(|aud| aud.contains(expected))
    }
}
