//! Type-safe identifiers for Onestop entities.
//!
//! All identifiers use Arc<str> for cheap cloning and minimal memory overhead.
//! An [`OnestopId`] has the shape `{type}-{geohash}-{name}` and never exceeds
//! [`ONESTOP_LENGTH`] bytes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::types::EntityKind;

/// Maximum length of an Onestop identifier.
pub const ONESTOP_LENGTH: usize = 64;

/// Reserved separator inside the name component.
pub const SEPARATOR: char = '~';

macro_rules! impl_identifier {
    ($name:ident) => {
        #[derive(Clone, Debug)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer).map(Self::from)
            }
        }
    };
}

impl_identifier!(OnestopId);
impl_identifier!(SourceIdentifier);

impl OnestopId {
    /// Join kind prefix, geohash and mangled name, truncating the name
    /// component so the result fits in [`ONESTOP_LENGTH`].
    ///
    /// A trailing `~N` disambiguator on the name is kept intact; the part of
    /// the name before it is shortened instead.
    pub fn assemble(kind: EntityKind, geohash: &str, mangled: &str) -> Self {
        let prefix = format!("{}-{}-", kind.prefix(), geohash);
        let budget = ONESTOP_LENGTH.saturating_sub(prefix.len());

        if mangled.len() <= budget {
            return Self::new(format!("{prefix}{mangled}"));
        }

        let name = match split_disambiguator(mangled) {
            Some((base, suffix)) if suffix.len() < budget => {
                format!("{}{}", truncate(base, budget - suffix.len()), suffix)
            }
            _ => truncate(mangled, budget).to_string(),
        };
        Self::new(format!("{prefix}{name}"))
    }

    /// Entity kind encoded in the leading type character.
    pub fn kind(&self) -> Option<EntityKind> {
        let mut chars = self.0.chars();
        let kind = chars.next().and_then(EntityKind::from_prefix)?;
        (chars.next() == Some('-')).then_some(kind)
    }

    pub fn geohash(&self) -> Option<&str> {
        self.0.split('-').nth(1)
    }

    /// Name component; may itself contain hyphen-free separators only.
    pub fn name_component(&self) -> Option<&str> {
        self.0.splitn(3, '-').nth(2)
    }
}

impl SourceIdentifier {
    /// Qualify a native record id with the feed it came from.
    pub fn scoped(feed: &str, native: &str) -> Self {
        Self::new(format!("{feed}:{native}"))
    }
}

/// Split `base~123` into (`base`, `~123`).
fn split_disambiguator(mangled: &str) -> Option<(&str, &str)> {
    let pos = mangled.rfind(SEPARATOR)?;
    let digits = &mangled[pos + SEPARATOR.len_utf8()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(mangled.split_at(pos))
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max)
        .last()
        .unwrap_or(0);
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_equality() {
        let id1 = OnestopId::new("s-9qscwx8n60-nyecountyairportdemo");
        let id2 = OnestopId::new("s-9qscwx8n60-nyecountyairportdemo");
        let id3 = id1.clone();

        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert!(Arc::ptr_eq(&id1.0, &id3.0)); // Clone shares Arc
    }

    #[test]
    fn test_identifier_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(SourceIdentifier::new("test:BULLFROG"), 42);

        assert_eq!(map.get(&SourceIdentifier::new("test:BULLFROG")), Some(&42));
    }

    #[test]
    fn test_assemble() {
        let id = OnestopId::assemble(EntityKind::Operator, "9qs", "demotransitauthority");
        assert_eq!(id.as_str(), "o-9qs-demotransitauthority");
        assert_eq!(id.kind(), Some(EntityKind::Operator));
        assert_eq!(id.geohash(), Some("9qs"));
        assert_eq!(id.name_component(), Some("demotransitauthority"));
    }

    #[test]
    fn test_assemble_truncates_name_tail() {
        let name = "maximumlength".repeat(10);
        let id = OnestopId::assemble(EntityKind::Feed, "9qs", &name);

        assert_eq!(id.as_str().len(), ONESTOP_LENGTH);
        assert!(id.as_str().starts_with("f-9qs-maximumlength"));
    }

    #[test]
    fn test_assemble_keeps_disambiguator() {
        let name = format!("{}~12", "longroutename".repeat(8));
        let id = OnestopId::assemble(EntityKind::Route, "9qscy", &name);

        assert!(id.as_str().len() <= ONESTOP_LENGTH);
        assert!(id.as_str().starts_with("r-9qscy-longroutename"));
        assert!(id.as_str().ends_with("~12"));
    }

    #[test]
    fn test_kind_requires_hyphen() {
        assert_eq!(OnestopId::new("none").kind(), None);
        assert_eq!(OnestopId::new("s-9q-x").kind(), Some(EntityKind::Stop));
    }

    #[test]
    fn test_scoped_source_identifier() {
        let id = SourceIdentifier::scoped("test", "FUR_CREEK_RES");
        assert_eq!(format!("{}", id), "test:FUR_CREEK_RES");
    }
}
