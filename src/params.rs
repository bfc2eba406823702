//! Named parameter maps bound to `:name` placeholders.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;
use crate::types::RowValues;

/// Values for the named placeholders of one statement execution.
///
/// Unused entries are ignored; a placeholder with no entry fails the call with
/// [`SqlMapperError::MissingParameter`] before anything reaches the driver.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = named_params! { "id" => 7, "active" => true };
/// assert_eq!(params.get("id"), Some(&RowValues::Int(7)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams {
    values: BTreeMap<String, RowValues>,
}

impl NamedParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RowValues>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.values.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameter names, sorted. Logged instead of the values themselves.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Build parameters from the fields of any serializable struct or map.
    ///
    /// `Option::None` fields bind as NULL; nested structs and sequences bind as JSON.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ParameterError` if the value does not serialize to a JSON
    /// object, or `SqlMapperError::RowMapping` if serialization itself fails.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, SqlMapperError> {
        match serde_json::to_value(value)? {
            JsonValue::Object(map) => {
                let mut params = NamedParams::new();
                for (name, value) in map {
                    params.insert(name, RowValues::from_json(value)?);
                }
                Ok(params)
            }
            other => Err(SqlMapperError::ParameterError(format!(
                "expected a struct or map of parameters, got {other}"
            ))),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for NamedParams
where
    K: Into<String>,
    V: Into<RowValues>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = NamedParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<K, V> Extend<(K, V)> for NamedParams
where
    K: Into<String>,
    V: Into<RowValues>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Build a [`NamedParams`] from `"name" => value` pairs.
#[macro_export]
macro_rules! named_params {
    () => {
        $crate::params::NamedParams::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::params::NamedParams::new()$(.bind($name, $value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct UserUpdate {
        name: Option<String>,
        email: Option<String>,
        is_active: bool,
    }

    #[test]
    fn from_serialize_maps_fields() {
        let update = UserUpdate {
            name: Some("kim".into()),
            email: None,
            is_active: true,
        };
        let params = NamedParams::from_serialize(&update).unwrap();
        assert_eq!(params.get("name"), Some(&RowValues::Text("kim".into())));
        assert_eq!(params.get("email"), Some(&RowValues::Null));
        assert_eq!(params.get("is_active"), Some(&RowValues::Bool(true)));
        assert_eq!(params.names().collect::<Vec<_>>(), ["email", "is_active", "name"]);
    }

    #[test]
    fn from_serialize_rejects_scalars() {
        let err = NamedParams::from_serialize(&5).unwrap_err();
        assert!(matches!(err, SqlMapperError::ParameterError(_)));
    }

    #[test]
    fn macro_and_iterator_agree() {
        let a = named_params! { "limit" => 10, "skip" => 0 };
        let b: NamedParams = [("skip", 0), ("limit", 10)].into_iter().collect();
        assert_eq!(a, b);
        assert!(named_params!().is_empty());
    }
}
