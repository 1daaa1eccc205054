//! Opaque identifier newtypes.
//!
//! `TrackKey`, `SourceId`, and `ProviderId` wrap `String` so they cannot be
//! interchanged at call sites (source wiring one for another is a frequent
//! bug class once there are more than two stringly-typed fields in scope).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_newtype!(SourceId);
string_newtype!(ProviderId);

/// Canonical identity used for cache keys and dedup.
///
/// Derivation: if a stable service-native ID exists, `svc:<id>`; otherwise
/// the normalized `"<artist> – <title>"`. Use [`TrackKey::from_service_id`]
/// or [`TrackKey::normalize`] rather than constructing directly, so every
/// caller goes through the same shared normalization rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackKey(String);

impl TrackKey {
    pub fn from_service_id(id: &str) -> Self {
        Self(format!("svc:{id}"))
    }

    /// Builds a `TrackKey` from artist/title when no service-native ID is
    /// available: lowercased, punctuation folded, parenthetical variants
    /// such as `(Remastered 2011)` stripped.
    pub fn normalize(artist: &str, title: &str) -> Self {
        let fold = |s: &str| -> String {
            let mut out = String::with_capacity(s.len());
            let mut depth: i32 = 0;
            for ch in s.chars() {
                match ch {
                    '(' | '[' => depth += 1,
                    ')' | ']' => depth = (depth - 1).max(0),
                    _ if depth > 0 => {}
                    c if c.is_alphanumeric() || c.is_whitespace() => {
                        out.push(c.to_ascii_lowercase())
                    }
                    _ => {}
                }
            }
            out.split_whitespace().collect::<Vec<_>>().join(" ")
        };
        Self(format!("{} – {}", fold(artist), fold(title)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TrackKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_parentheticals_and_folds_case() {
        let a = TrackKey::normalize("Eagles", "Hotel California (Remastered 2011)");
        let b = TrackKey::normalize("EAGLES", "hotel california");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_is_round_trippable_given_same_inputs() {
        let a = TrackKey::normalize("Daft Punk", "One More Time");
        let b = TrackKey::normalize("Daft Punk", "One More Time");
        assert_eq!(a, b);
    }

    #[test]
    fn from_service_id_is_distinct_namespace() {
        let svc = TrackKey::from_service_id("abc123");
        assert_eq!(svc.as_str(), "svc:abc123");
    }
}
