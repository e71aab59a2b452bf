//! Identity atoms
//!
//! TreeId, SpeciesId, SectorId: keys in the `trees`, `species` and `sectors`
//! collections. Creator: who registered a tree (email or display name).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, IdKind, InvalidId};

/// Characters the realtime database refuses inside a key.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '$', '#', '[', ']', '/'];

fn validate_key(kind: IdKind, raw: String) -> Result<String, CoreError> {
    let reject = |raw: String, reason: String| -> CoreError {
        InvalidId { kind, raw, reason }.into()
    };
    if raw.is_empty() {
        return Err(reject(raw, "empty".into()));
    }
    if let Some(c) = raw.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(reject(raw, format!("contains `{c}`")));
    }
    if raw.chars().any(|c| c.is_ascii_control()) {
        return Err(reject(raw, "contains a control character".into()));
    }
    Ok(raw)
}

macro_rules! collection_key {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
                validate_key($kind, raw.into()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

collection_key!(
    /// Key of a document in the `trees` collection.
    TreeId,
    IdKind::Tree
);
collection_key!(
    /// Key of a document in the `species` collection.
    SpeciesId,
    IdKind::Species
);
collection_key!(
    /// Key of a document in the `sectors` collection.
    SectorId,
    IdKind::Sector
);

/// Who registered a tree: the session's email, or its display name.
///
/// Only rejects empty/whitespace-only values.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Creator(String);

impl Creator {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.trim().is_empty() {
            Err(InvalidId {
                kind: IdKind::Creator,
                raw: s,
                reason: "empty".into(),
            }
            .into())
        } else {
            Ok(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Creator({:?})", self.0)
    }
}

impl fmt::Display for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Creator {
    type Error = CoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Creator::new(s)
    }
}

impl From<Creator> for String {
    fn from(c: Creator) -> String {
        c.0
    }
}
