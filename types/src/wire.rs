//! Pairing endpoint payload.

use serde::{Deserialize, Serialize};

/// `result` value the endpoint uses when two elements cannot be combined.
pub const NOTHING_RESULT: &str = "Nothing";

/// Body of `GET /api/infinite-craft/pair`.
///
/// Fields are optional on decode so a partial body still yields an element
/// with the missing parts unset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PairResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default, rename = "isNew")]
    pub is_new: Option<bool>,
}

impl PairResponse {
    pub fn new(result: impl Into<String>, emoji: impl Into<String>, is_new: bool) -> Self {
        Self {
            result: Some(result.into()),
            emoji: Some(emoji.into()),
            is_new: Some(is_new),
        }
    }

    /// `{"result":"Nothing","emoji":"","isNew":false}`
    #[must_use]
    pub fn nothing() -> Self {
        Self::new(NOTHING_RESULT, "", false)
    }

    /// True only for a body that is exactly the failure sentinel.
    #[must_use]
    pub fn is_nothing(&self) -> bool {
        *self == Self::nothing()
    }
}
