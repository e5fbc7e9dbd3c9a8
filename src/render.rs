//! Canonical TOML rendering of option values.
//!
//! Output is a pure function of the input: keys and elements keep
//! declaration order, and nothing is sorted. Layout rules:
//!
//! - a [`Value::Mapping`] becomes a `[section.path]` block, left out when it
//!   holds only sub-tables,
//! - a [`Value::Tables`] list becomes one `[[section.path]]` block per element,
//! - scalars and scalar lists become `key = value` lines inside their parent's
//!   block, ahead of any nested tables,
//! - empty mappings and empty lists emit nothing.
//!
//! Blocks are separated by a blank line.

use std::fmt;

use crate::error::ValidationError;
use crate::value::{Scalar, Table, Value};

/// A dotted section path such as `processors.regex.tags`.
///
/// Segments are stored unescaped and quoted on display when they are not
/// TOML bare keys.
///
/// # Examples
///
/// ```
/// use telegraf_conf::render::SectionPath;
///
/// let path = SectionPath::parse("processors.enum").child("mapping");
/// assert_eq!(path.to_string(), "processors.enum.mapping");
/// assert_eq!(SectionPath::parse("inputs").child("a b").to_string(), r#"inputs."a b""#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPath {
    segments: Vec<String>,
}

impl SectionPath {
    /// The empty path (document root).
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Split a dotted string into segments. Empty segments are dropped.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Return this path extended by one segment.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self { segments }
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Split into the parent path and the last segment.
    fn split_last(&self) -> Option<(Self, &str)> {
        let (leaf, parent) = self.segments.split_last()?;
        Some((
            Self {
                segments: parent.to_vec(),
            },
            leaf.as_str(),
        ))
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&format_key(segment))?;
        }
        Ok(())
    }
}

/// Render `value` under `path`.
///
/// A scalar or scalar list renders as `leaf = value` under a `[parent]`
/// header (no header when the path has a single segment). Rendering the root
/// path omits the header of the top-level table.
///
/// # Errors
///
/// Returns [`ValidationError::UnsupportedValueKind`] for a scalar or scalar
/// list at the root path, since there is no key to assign it to.
///
/// # Examples
///
/// ```
/// use telegraf_conf::render::{SectionPath, render};
/// use telegraf_conf::value::{Table, Value};
///
/// let tags = Value::Tables(vec![
///     Table::new().with("key", "foo").with("pattern", r"^a*b+\d$"),
/// ]);
/// let text = render(&SectionPath::parse("processors.regex.tags"), &tags)?;
/// assert_eq!(
///     text,
///     "[[processors.regex.tags]]\nkey = \"foo\"\npattern = \"^a*b+\\\\d$\"\n"
/// );
/// # Ok::<(), telegraf_conf::error::ValidationError>(())
/// ```
pub fn render(path: &SectionPath, value: &Value) -> Result<String, ValidationError> {
    let mut writer = Writer::default();
    match value {
        Value::Mapping(table) => {
            if !table.is_empty() {
                writer.table(path, table, Header::for_path(path, Header::Single));
            }
        }
        Value::Tables(tables) => {
            for table in tables {
                writer.table(path, table, Header::for_path(path, Header::Array));
            }
        }
        Value::Scalar(_) | Value::ScalarList(_) => {
            let Some((parent, leaf)) = path.split_last() else {
                return Err(ValidationError::UnsupportedValueKind {
                    path: "(root)".to_string(),
                    kind: "scalar without a key",
                });
            };
            let table = Table::new().with(leaf, value.clone());
            writer.table(&parent, &table, Header::for_path(&parent, Header::Single));
        }
    }
    Ok(writer.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Header {
    None,
    Single,
    Array,
}

impl Header {
    fn for_path(path: &SectionPath, header: Self) -> Self {
        if path.is_root() { Self::None } else { header }
    }
}

/// Accumulates rendered blocks in output order.
#[derive(Debug, Default)]
struct Writer {
    blocks: Vec<String>,
}

impl Writer {
    fn table(&mut self, path: &SectionPath, table: &Table, header: Header) {
        let mut lines = String::new();
        for (key, value) in table.iter() {
            let inline = match value {
                Value::Scalar(scalar) => format_scalar(scalar),
                Value::ScalarList(items) => format_list(items),
                Value::Mapping(_) | Value::Tables(_) => continue,
            };
            lines.push_str(&format!("{} = {inline}\n", format_key(key)));
        }
        // A `[[...]]` header counts an instance even when empty. A `[...]`
        // header with no keys adds nothing its sub-tables do not imply.
        let block = match header {
            Header::Array => format!("[[{path}]]\n{lines}"),
            Header::Single if !lines.is_empty() => format!("[{path}]\n{lines}"),
            Header::Single | Header::None => lines,
        };
        if !block.is_empty() {
            self.blocks.push(block);
        }

        // Sub-tables must follow every inline key of the parent.
        for (key, value) in table.iter() {
            match value {
                Value::Mapping(child) if !child.is_empty() => {
                    self.table(&path.child(key), child, Header::Single);
                }
                Value::Tables(children) => {
                    let child_path = path.child(key);
                    for child in children {
                        self.table(&child_path, child, Header::Array);
                    }
                }
                _ => {}
            }
        }
    }

    fn finish(self) -> String {
        self.blocks.join("\n")
    }
}

/// Format a scalar as a TOML inline value.
#[must_use]
pub fn format_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => quote(s),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(x) if x.is_nan() => "nan".to_string(),
        // Debug keeps a fractional part or exponent ("1.0", "1e20", "inf").
        Scalar::Float(x) => format!("{x:?}"),
        Scalar::Boolean(b) => b.to_string(),
    }
}

fn format_list(items: &[Scalar]) -> String {
    let inner: Vec<String> = items.iter().map(format_scalar).collect();
    format!("[{}]", inner.join(", "))
}

/// Format a key, quoting it unless it is a TOML bare key.
fn format_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare { key.to_string() } else { quote(key) }
}

/// Quote a string as a TOML basic string.
///
/// Only `\`, `"` and control characters are escaped.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn path(s: &str) -> SectionPath {
        SectionPath::parse(s)
    }

    fn render(path: &SectionPath, value: &Value) -> String {
        super::render(path, value).unwrap()
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    #[test]
    fn strings_escape_backslash_and_quote_only() {
        assert_eq!(format_scalar(&"^a*b+\\d$".into()), r#""^a*b+\\d$""#);
        assert_eq!(format_scalar(&"say \"hi\"".into()), r#""say \"hi\"""#);
        assert_eq!(format_scalar(&"c${1}d".into()), r#""c${1}d""#);
    }

    #[test]
    fn backslash_sequences_in_input_are_escaped_once() {
        // Input holds two characters: a backslash and 'n'.
        assert_eq!(format_scalar(&"\\n".into()), r#""\\n""#);
    }

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(format_scalar(&"a\nb\tc".into()), r#""a\nb\tc""#);
        assert_eq!(format_scalar(&"\u{1}".into()), r#""\u0001""#);
    }

    #[test]
    fn numbers_and_booleans_are_bare() {
        assert_eq!(format_scalar(&Scalar::Integer(-42)), "-42");
        assert_eq!(format_scalar(&Scalar::Float(1.0)), "1.0");
        assert_eq!(format_scalar(&Scalar::Float(0.25)), "0.25");
        assert_eq!(format_scalar(&Scalar::Float(f64::INFINITY)), "inf");
        assert_eq!(format_scalar(&Scalar::Float(f64::NEG_INFINITY)), "-inf");
        assert_eq!(format_scalar(&Scalar::Float(f64::NAN)), "nan");
        assert_eq!(format_scalar(&Scalar::Boolean(true)), "true");
        assert_eq!(format_scalar(&Scalar::Boolean(false)), "false");
    }

    #[test]
    fn non_bare_keys_are_quoted() {
        assert_eq!(format_key("status_code"), "status_code");
        assert_eq!(format_key("x-forwarded"), "x-forwarded");
        assert_eq!(format_key("a.b"), r#""a.b""#);
        assert_eq!(format_key(""), r#""""#);
    }

    // -----------------------------------------------------------------------
    // Tables
    // -----------------------------------------------------------------------

    #[test]
    fn mapping_renders_single_header_in_insertion_order() {
        let table = Table::new().with("c", 3).with("a", 1).with("b", 2);
        let out = render(&path("processors.x"), &Value::Mapping(table));
        assert_eq!(out, "[processors.x]\nc = 3\na = 1\nb = 2\n");
    }

    #[test]
    fn ordering_is_stable_across_calls() {
        let table = Table::new().with("a", 1).with("b", 2).with("c", 3);
        let value = Value::Mapping(table);
        let first = render(&path("s"), &value);
        for _ in 0..10 {
            assert_eq!(render(&path("s"), &value), first);
        }
    }

    #[test]
    fn repeated_table_renders_one_header_per_element() {
        let tags = Value::Tables(vec![
            Table::new().with("key", "foo").with("pattern", "a"),
            Table::new().with("key", "bar"),
        ]);
        let out = render(&path("processors.regex.tags"), &tags);
        assert_eq!(
            out,
            "[[processors.regex.tags]]\nkey = \"foo\"\npattern = \"a\"\n\n\
             [[processors.regex.tags]]\nkey = \"bar\"\n"
        );
        assert_eq!(out.matches("[[processors.regex.tags]]").count(), 2);
    }

    #[test]
    fn nested_mapping_follows_parent_inline_keys() {
        let mappings: Table = [("green", 1), ("amber", 2), ("red", 3)].into_iter().collect();
        let element = Table::new()
            .with("field", "status")
            .with("value_mappings", mappings)
            .with("dest", "status_code");
        let out = render(&path("processors.enum.mapping"), &Value::Tables(vec![element]));
        assert_eq!(
            out,
            "[[processors.enum.mapping]]\nfield = \"status\"\ndest = \"status_code\"\n\n\
             [processors.enum.mapping.value_mappings]\ngreen = 1\namber = 2\nred = 3\n"
        );
    }

    #[test]
    fn scalar_list_renders_inline() {
        let table = Table::new().with(
            "fields",
            Value::ScalarList(vec!["a".into(), Scalar::Integer(1), Scalar::Boolean(false)]),
        );
        let out = render(&path("p"), &Value::Mapping(table));
        assert_eq!(out, "[p]\nfields = [\"a\", 1, false]\n");
    }

    #[test]
    fn empty_mapping_and_empty_list_emit_nothing() {
        assert_eq!(render(&path("p"), &Value::Mapping(Table::new())), "");
        assert_eq!(render(&path("p"), &Value::Tables(vec![])), "");
        let table = Table::new()
            .with("a", 1)
            .with("empty_map", Table::new())
            .with("empty_list", Value::Tables(vec![]));
        assert_eq!(render(&path("p"), &Value::Mapping(table)), "[p]\na = 1\n");
    }

    #[test]
    fn empty_repeated_element_keeps_its_header() {
        let out = render(&path("processors.dedup"), &Value::Tables(vec![Table::new()]));
        assert_eq!(out, "[[processors.dedup]]\n");
    }

    #[test]
    fn mapping_with_only_subtables_has_no_bare_header() {
        let inner = Table::new().with("x", 1);
        let outer = Table::new().with("inner", inner);
        let out = render(&path("a"), &Value::Mapping(outer));
        assert_eq!(out, "[a.inner]\nx = 1\n");

        let nested = Table::new().with("mid", Table::new().with("leaf", Table::new().with("v", 1)));
        let out = render(&path("a"), &Value::Mapping(nested));
        assert_eq!(out, "[a.mid.leaf]\nv = 1\n");
    }

    #[test]
    fn parsed_output_keeps_subtables_without_parent_header() {
        let inner = Table::new().with("x", 1);
        let element = Table::new().with("sub", Table::new().with("inner", inner));
        let out = render(&path("processors.p"), &Value::Tables(vec![element]));
        assert_eq!(out, "[[processors.p]]\n\n[processors.p.sub.inner]\nx = 1\n");
        let parsed: toml::Table = out.parse().unwrap();
        assert_eq!(parsed["processors"]["p"][0]["sub"]["inner"]["x"].as_integer(), Some(1));
    }

    #[test]
    fn scalar_at_path_renders_under_parent() {
        assert_eq!(
            render(&path("processors.regex.order"), &Value::from(1)),
            "[processors.regex]\norder = 1\n"
        );
        assert_eq!(render(&path("debug"), &Value::from(true)), "debug = true\n");
    }

    #[test]
    fn scalar_at_root_is_rejected() {
        let err = super::render(&SectionPath::root(), &Value::from(true)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedValueKind {
                kind: "scalar without a key",
                ..
            }
        ));
        assert!(super::render(&SectionPath::root(), &Value::ScalarList(vec![])).is_err());
    }

    #[test]
    fn root_mapping_has_no_header() {
        let table = Table::new().with("interval", "10s").with("sub", Table::new().with("a", 1));
        let out = render(&SectionPath::root(), &Value::Mapping(table));
        assert_eq!(out, "interval = \"10s\"\n\n[sub]\na = 1\n");
    }

    #[test]
    fn deep_nesting_builds_dotted_headers() {
        let leaf = Table::new().with("v", 1);
        let mid = Table::new().with("leaf", Value::Tables(vec![leaf]));
        let top = Table::new().with("mid", mid);
        let out = render(&path("a"), &Value::Tables(vec![top]));
        assert_eq!(out, "[[a]]\n\n[[a.mid.leaf]]\nv = 1\n");
    }
}
