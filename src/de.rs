//! Serde helpers for model fields whose storage type differs between backends.
//!
//! `SQLite` has no boolean type and hands back `0`/`1`:
//!
//! ```rust
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     #[serde(deserialize_with = "sql_mapper::de::flexible_bool")]
//!     is_active: bool,
//! }
//!
//! let user: User = serde_json::from_str(r#"{"is_active": 1}"#).unwrap();
//! assert!(user.is_active);
//! ```

use serde::Deserialize;
use serde::de::{Deserializer, Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn to_bool<E: Error>(value: BoolLike) -> Result<bool, E> {
    match value {
        BoolLike::Bool(b) => Ok(b),
        BoolLike::Int(0) => Ok(false),
        BoolLike::Int(1) => Ok(true),
        BoolLike::Int(other) => Err(E::custom(format!("expected 0 or 1, got {other}"))),
        BoolLike::Text(text) => match text.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(E::custom(format!("expected a boolean, got `{text}`"))),
        },
    }
}

/// Accept `true`/`false`, `0`/`1`, or their text forms.
///
/// # Errors
/// Fails for any other value.
pub fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    to_bool(BoolLike::deserialize(deserializer)?)
}

/// [`flexible_bool`] for nullable columns.
///
/// # Errors
/// Fails for any value that is neither null nor boolean-like.
pub fn flexible_bool_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<bool>, D::Error> {
    Option::<BoolLike>::deserialize(deserializer)?
        .map(to_bool)
        .transpose()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Flags {
        #[serde(deserialize_with = "super::flexible_bool")]
        a: bool,
        #[serde(default, deserialize_with = "super::flexible_bool_opt")]
        b: Option<bool>,
    }

    #[test]
    fn accepts_ints_and_text() {
        let f: Flags = serde_json::from_str(r#"{"a": 0, "b": "t"}"#).unwrap();
        assert!(!f.a);
        assert_eq!(f.b, Some(true));
        let f: Flags = serde_json::from_str(r#"{"a": true, "b": null}"#).unwrap();
        assert!(f.a);
        assert_eq!(f.b, None);
        assert!(serde_json::from_str::<Flags>(r#"{"a": 2}"#).is_err());
    }
}
