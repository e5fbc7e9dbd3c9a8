//! Typed option values for plugin declarations.
//!
//! [`Value`] is a closed set of shapes the fragment renderer understands.
//! Loosely typed input (parsed TOML) is converted with [`Value::from_toml`],
//! which rejects every other shape up front so rendering never has to.

use std::fmt;

use crate::error::ValidationError;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Text, rendered double-quoted.
    String(String),
    /// Signed integer, rendered in decimal.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Rendered as bare `true` / `false`.
    Boolean(bool),
}

/// An option value: a scalar, a list of scalars, a nested table, or a
/// repeated table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single leaf value.
    Scalar(Scalar),
    /// An inline list of leaf values.
    ScalarList(Vec<Scalar>),
    /// A nested table, rendered as `[path.key]`.
    Mapping(Table),
    /// A list of tables, rendered as one `[[path.key]]` per element.
    Tables(Vec<Table>),
}

/// An insertion-ordered mapping from key to [`Value`].
///
/// # Examples
///
/// ```
/// use telegraf_conf::value::{Table, Value};
///
/// let mut table = Table::new();
/// table.insert("field", "status");
/// table.insert("dest", "status_code");
/// table.insert("field", "state");
///
/// let keys: Vec<&str> = table.keys().collect();
/// assert_eq!(keys, ["field", "dest"]);
/// assert_eq!(table.get("field"), Some(&Value::from("state")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    entries: Vec<(String, Value)>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert `value` under `key`.
    ///
    /// A new key is appended. An existing key keeps its position and has its
    /// value replaced; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Convert a parsed TOML table, keeping its key order.
    ///
    /// `path` is the dotted location of the table, used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedValueKind`] if any nested value
    /// has a shape [`Value`] cannot represent.
    pub fn from_toml(table: &toml::Table, path: &str) -> Result<Self, ValidationError> {
        let mut out = Self::new();
        for (key, value) in table {
            let converted = Value::from_toml(value, &child_path(path, key))?;
            out.insert(key.as_str(), converted);
        }
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

impl Value {
    /// Convert a parsed TOML value.
    ///
    /// Arrays must be homogeneous: either all tables (a repeated table) or all
    /// scalars (an inline list). An empty array becomes an empty repeated
    /// table, which renders nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedValueKind`] for datetimes, arrays
    /// of arrays, and arrays that mix tables with scalars.
    pub fn from_toml(value: &toml::Value, path: &str) -> Result<Self, ValidationError> {
        match value {
            toml::Value::Table(table) => Table::from_toml(table, path).map(Self::Mapping),
            toml::Value::Array(items) => array_from_toml(items, path),
            other => scalar_from_toml(other, path).map(Self::Scalar),
        }
    }
}

fn array_from_toml(items: &[toml::Value], path: &str) -> Result<Value, ValidationError> {
    let tables: Vec<&toml::Table> = items.iter().filter_map(toml::Value::as_table).collect();
    if tables.len() == items.len() {
        return tables
            .iter()
            .enumerate()
            .map(|(i, table)| Table::from_toml(table, &child_path(path, &i.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Tables);
    }
    if !tables.is_empty() {
        return Err(ValidationError::UnsupportedValueKind {
            path: path.to_string(),
            kind: "array mixing tables and scalars",
        });
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| scalar_from_toml(item, &child_path(path, &i.to_string())))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::ScalarList)
}

fn scalar_from_toml(value: &toml::Value, path: &str) -> Result<Scalar, ValidationError> {
    let kind = match value {
        toml::Value::String(s) => return Ok(Scalar::String(s.clone())),
        toml::Value::Integer(i) => return Ok(Scalar::Integer(*i)),
        toml::Value::Float(f) => return Ok(Scalar::Float(*f)),
        toml::Value::Boolean(b) => return Ok(Scalar::Boolean(*b)),
        toml::Value::Datetime(_) => "datetime",
        toml::Value::Array(_) => "array of arrays",
        toml::Value::Table(_) => "table inside a scalar list",
    };
    Err(ValidationError::UnsupportedValueKind {
        path: path.to_string(),
        kind,
    })
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

impl fmt::Display for Scalar {
    /// Human-readable form used in log messages (not the TOML encoding).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

macro_rules! value_from_scalar {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::Scalar(v.into())
                }
            }
        )+
    };
}

value_from_scalar!(&str, String, i64, i32, f64, bool, Scalar);

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Self::Mapping(t)
    }
}

impl From<Vec<Table>> for Value {
    fn from(ts: Vec<Table>) -> Self {
        Self::Tables(ts)
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(items: Vec<Scalar>) -> Self {
        Self::ScalarList(items)
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn parse(src: &str) -> toml::Table {
        src.parse::<toml::Table>().expect("valid toml")
    }

    #[test]
    fn insert_preserves_first_position_on_overwrite() {
        let mut t = Table::new();
        t.insert("a", 1);
        t.insert("b", 2);
        let old = t.insert("a", 3);
        assert_eq!(old, Some(Value::from(1)));
        assert_eq!(t.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(t.get("a"), Some(&Value::from(3)));
    }

    #[test]
    fn from_toml_keeps_key_order() {
        let src = parse("zeta = 1\nalpha = 2\nmid = 3\n");
        let t = Table::from_toml(&src, "").unwrap();
        assert_eq!(t.keys().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn from_toml_scalars() {
        let src = parse("s = \"x\"\ni = 7\nf = 1.5\nb = true\n");
        let t = Table::from_toml(&src, "").unwrap();
        assert_eq!(t.get("s"), Some(&Value::from("x")));
        assert_eq!(t.get("i"), Some(&Value::from(7)));
        assert_eq!(t.get("f"), Some(&Value::from(1.5)));
        assert_eq!(t.get("b"), Some(&Value::from(true)));
    }

    #[test]
    fn from_toml_array_of_tables_is_repeated_table() {
        let src = parse("[[tags]]\nkey = \"a\"\n[[tags]]\nkey = \"b\"\n");
        let t = Table::from_toml(&src, "").unwrap();
        let Some(Value::Tables(tags)) = t.get("tags") else {
            panic!("expected repeated table, got {:?}", t.get("tags"));
        };
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].get("key"), Some(&Value::from("b")));
    }

    #[test]
    fn from_toml_inline_table_is_mapping() {
        let src = parse("value_mappings = { green = 1, amber = 2 }\n");
        let t = Table::from_toml(&src, "").unwrap();
        assert!(matches!(t.get("value_mappings"), Some(Value::Mapping(m)) if m.len() == 2));
    }

    #[test]
    fn from_toml_scalar_list() {
        let src = parse("fields = [\"a\", \"b\"]\n");
        let t = Table::from_toml(&src, "").unwrap();
        assert_eq!(
            t.get("fields"),
            Some(&Value::ScalarList(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn from_toml_empty_array_is_empty_repeated_table() {
        let src = parse("fields = []\n");
        let t = Table::from_toml(&src, "").unwrap();
        assert_eq!(t.get("fields"), Some(&Value::Tables(vec![])));
    }

    #[test]
    fn from_toml_rejects_array_of_arrays() {
        let src = parse("matrix = [[1, 2], [3]]\n");
        let err = Table::from_toml(&src, "opts").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedValueKind {
                path: "opts.matrix.0".to_string(),
                kind: "array of arrays",
            }
        );
    }

    #[test]
    fn from_toml_rejects_mixed_array() {
        let src = parse("mixed = [1, { a = 1 }]\n");
        let err = Table::from_toml(&src, "").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedValueKind { ref path, .. } if path == "mixed"
        ));
    }

    #[test]
    fn from_toml_rejects_datetime() {
        let src = parse("since = 1979-05-27T07:32:00Z\n");
        let err = Table::from_toml(&src, "").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedValueKind { kind: "datetime", .. }
        ));
    }

    #[test]
    fn nested_error_path_points_at_element() {
        let src = parse("[[mapping]]\nfield = \"x\"\n[[mapping]]\nwhen = 2020-01-01\n");
        let err = Table::from_toml(&src, "").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedValueKind { ref path, .. } if path == "mapping.1.when"
        ));
    }

    #[test]
    fn collect_into_table() {
        let t: Table = [("green", 1), ("amber", 2)].into_iter().collect();
        assert_eq!(t.keys().collect::<Vec<_>>(), ["green", "amber"]);
    }
}
