//! Game elements and the capability interface over them.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::DiscoveryRecord;

/// Capability interface for element types the client can produce.
///
/// The client never names a concrete element type; it constructs results,
/// renders them, and converts them to records through this trait. [`Element`]
/// is the default implementation, and any other implementation can be
/// substituted when the client is built.
///
/// Equality between elements is defined by [`CraftElement::name`] alone.
pub trait CraftElement: Clone + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Build an element from its raw parts. All-`None` yields the "nothing" element.
    fn from_parts(
        name: Option<String>,
        emoji: Option<String>,
        is_first_discovery: Option<bool>,
    ) -> Self;

    fn name(&self) -> Option<&str>;

    fn emoji(&self) -> Option<&str>;

    fn is_first_discovery(&self) -> Option<bool>;

    /// The result of a pairing that produced nothing.
    #[must_use]
    fn nothing() -> Self {
        Self::from_parts(None, None, None)
    }

    /// True when every field is unset.
    fn is_nothing(&self) -> bool {
        self.name().is_none() && self.emoji().is_none() && self.is_first_discovery().is_none()
    }

    /// True when every field is set.
    fn is_complete(&self) -> bool {
        self.name().is_some() && self.emoji().is_some() && self.is_first_discovery().is_some()
    }

    #[must_use]
    fn from_record(record: &DiscoveryRecord) -> Self {
        Self::from_parts(
            Some(record.name.clone()),
            record.emoji.clone(),
            Some(record.is_first_discovery),
        )
    }

    /// Persisted form of this element. `None` for elements without a name.
    fn to_record(&self) -> Option<DiscoveryRecord> {
        let name = self.name()?;
        Some(DiscoveryRecord {
            name: name.to_string(),
            emoji: self.emoji().map(ToString::to_string),
            is_first_discovery: self.is_first_discovery().unwrap_or(false),
        })
    }
}

/// A named entity in the game, optionally tagged with an emoji and a
/// first-discovery flag.
///
/// Immutable after construction. Two elements with the same name are the
/// same entity regardless of emoji:
///
/// ```
/// use craft_types::Element;
///
/// let fire = Element::new("Fire").with_emoji("🔥");
/// assert_eq!(fire, Element::new("Fire"));
/// assert_eq!(fire.to_string(), "🔥 Fire");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Element {
    name: Option<String>,
    emoji: Option<String>,
    is_first_discovery: Option<bool>,
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            emoji: None,
            is_first_discovery: None,
        }
    }

    #[must_use]
    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    #[must_use]
    pub fn with_first_discovery(mut self, first: bool) -> Self {
        self.is_first_discovery = Some(first);
        self
    }
}

impl CraftElement for Element {
    fn from_parts(
        name: Option<String>,
        emoji: Option<String>,
        is_first_discovery: Option<bool>,
    ) -> Self {
        Self {
            name,
            emoji,
            is_first_discovery,
        }
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn emoji(&self) -> Option<&str> {
        self.emoji.as_deref()
    }

    fn is_first_discovery(&self) -> Option<bool> {
        self.is_first_discovery
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = self.name.as_deref() else {
            return f.write_str("Nothing");
        };
        match self.emoji.as_deref() {
            Some(emoji) if !emoji.is_empty() => write!(f, "{emoji} {name}"),
            _ => f.write_str(name),
        }
    }
}

impl From<&str> for Element {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
