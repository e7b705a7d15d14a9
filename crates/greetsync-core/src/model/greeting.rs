// ── Greeting domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── GreetingId ──────────────────────────────────────────────────────

/// Server-assigned greeting identity.
///
/// Opaque; numeric ids from the wire are carried as their decimal string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GreetingId(String);

impl GreetingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A record is only cacheable once the server has given it an id.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for GreetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GreetingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GreetingId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for GreetingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Author ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
}

impl Author {
    /// Display name, falling back to "first last".
    pub fn name(&self) -> String {
        if self.display_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_owned()
        } else {
            self.display_name.clone()
        }
    }
}

// ── Greeting ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub id: GreetingId,
    pub text: String,
    /// Presentation tag, e.g. `"info"` or `"warning"`.
    pub variant: Option<String>,
    pub author: Option<Author>,
    pub updated_by: Option<Author>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Greeting {
    pub fn is_valid(&self) -> bool {
        self.id.is_valid()
    }

    /// Ordering key: last update, else creation time.
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// Editable fields of a greeting, as handed to an edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingDraft {
    pub id: GreetingId,
    pub text: String,
    pub variant: Option<String>,
}

impl From<&Greeting> for GreetingDraft {
    fn from(g: &Greeting) -> Self {
        Self {
            id: g.id.clone(),
            text: g.text.clone(),
            variant: g.variant.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn blank_ids_are_invalid() {
        assert!(!GreetingId::default().is_valid());
        assert!(!GreetingId::from("  ").is_valid());
        assert!(GreetingId::from("g1").is_valid());
    }

    #[test]
    fn recency_prefers_update_time() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        let updated = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).single();
        let mut greeting = Greeting {
            created_at: created,
            ..Greeting::default()
        };
        assert_eq!(greeting.recency(), created);

        greeting.updated_at = updated;
        assert_eq!(greeting.recency(), updated);
    }

    #[test]
    fn author_name_fallback() {
        let author = Author {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            ..Author::default()
        };
        assert_eq!(author.name(), "Ada Lovelace");
    }
}
