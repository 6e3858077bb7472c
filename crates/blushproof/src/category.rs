//! Category labels attached to blushlist and searchterm entries.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Labels shipped with the built-in lists. These are safe to show to users.
pub const SHIPPED_CATEGORIES: &[&str] = &[
    "adult",
    "gossip",
    "drugs-and-alcohol-related",
    "gambling",
    "gaming",
    "medical",
    "social",
];

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("Invalid regex pattern"));

/// A category label such as `social` or the internal `user` sentinel.
///
/// Deserializing goes through [`Category::parse`], so labels read back from
/// storage are validated like any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Label reserved for entries the user added with "blush this site".
    pub const USER_LABEL: &'static str = "user";

    /// Parse and validate a label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCategory`] if the label is not lowercase
    /// alphanumerics and dashes starting with a letter.
    pub fn parse(label: &str) -> Result<Self> {
        if LABEL_RE.is_match(label) {
            Ok(Self(label.to_string()))
        } else {
            Err(Error::InvalidCategory {
                label: label.to_string(),
            })
        }
    }

    /// The `user` category.
    #[must_use]
    pub fn user() -> Self {
        Self(Self::USER_LABEL.to_string())
    }

    /// Whether this is the `user` sentinel. User entries never count toward
    /// category amnesty and survive list upgrades.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.0 == Self::USER_LABEL
    }

    /// Whether this label is one of [`SHIPPED_CATEGORIES`].
    #[must_use]
    pub fn is_shipped(&self) -> bool {
        SHIPPED_CATEGORIES.contains(&self.0.as_str())
    }

    /// The label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        Self::parse(&label)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.0
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_labels() {
        for label in SHIPPED_CATEGORIES {
            let category = Category::parse(label).unwrap();
            assert_eq!(category.as_str(), *label);
            assert!(category.is_shipped());
        }
        assert!(Category::parse("testing").is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_labels() {
        assert!(Category::parse("").is_err());
        assert!(Category::parse("Social").is_err());
        assert!(Category::parse("has space").is_err());
        assert!(Category::parse("-leading").is_err());
        assert!(Category::parse("9lives").is_err());
    }

    #[test]
    fn test_user_category() {
        let user = Category::user();
        assert!(user.is_user());
        assert!(!user.is_shipped());
        assert_eq!(user.to_string(), "user");
        assert!(!Category::parse("social").unwrap().is_user());
    }

    #[test]
    fn test_serde_is_a_plain_string() {
        let category = Category::parse("gaming").unwrap();
        assert_eq!(serde_json::to_string(&category).unwrap(), "\"gaming\"");
        let back: Category = serde_json::from_str("\"gaming\"").unwrap();
        assert_eq!(back, category);
    }

    #[test]
    fn test_deserialize_validates_label() {
        assert!(serde_json::from_str::<Category>("\"Not A Label!\"").is_err());
        assert!(serde_json::from_str::<Category>("\"\"").is_err());
        let user: Category = serde_json::from_str("\"user\"").unwrap();
        assert!(user.is_user());
    }
}
