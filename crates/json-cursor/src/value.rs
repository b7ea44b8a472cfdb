use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;

/// An object value. Uses [`IndexMap`] so that key order matches document
/// order; inserting a duplicate key overwrites the value in place.
pub type JsonObject = IndexMap<String, JsonValue>;

/// A JSON number which preserves the digit sequence from the source document.
///
/// Converting to `f64` can lose precision, and a field that is never consumed
/// numerically should not pay that cost. Conversion happens on demand via
/// [`as_f64`](JsonNumber::as_f64) and [`as_i64`](JsonNumber::as_i64);
/// equality and display both use the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonNumber {
    text: Box<str>,
}

impl JsonNumber {
    pub(crate) fn from_text(text: &str) -> Self {
        JsonNumber { text: text.into() }
    }

    /// The number exactly as it appeared in the document.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The number as an `f64`. May round for numbers with more precision
    /// than a double can carry.
    pub fn as_f64(&self) -> f64 {
        // The tokenizer only produces grammatically valid number text, and
        // f64 parsing accepts every such literal (overflowing to infinity).
        self.text.parse().expect("tokenizer validated number text")
    }

    /// The number as an `i64`, if it is an integer literal in range.
    pub fn as_i64(&self) -> Option<i64> {
        if self.text.contains(['.', 'e', 'E']) {
            return None;
        }
        self.text.parse().ok()
    }
}

impl fmt::Display for JsonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A fully materialized JSON value, independent of the input stream. Safe to
/// retain after the traversal has advanced.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Boolean(bool),
    Number(JsonNumber),
    String(String),
    Array(Vec<JsonValue>),
    Object(JsonObject),
}

const NULL: () = ();

pub trait InnerAsRef {
    fn json_value_as(v: &JsonValue) -> Option<&Self>;
}

macro_rules! impl_inner_ref {
    ($to:ty, $pat:pat => $val:expr) => {
        impl InnerAsRef for $to {
            fn json_value_as(v: &JsonValue) -> Option<&$to> {
                use JsonValue::*;
                match v {
                    $pat => Some($val),
                    _ => None,
                }
            }
        }
    };
}

impl_inner_ref!(JsonNumber, Number(n) => n);
impl_inner_ref!(bool, Boolean(b) => b);
impl_inner_ref!(String, String(s) => s);
impl_inner_ref!((), Null => &NULL);
impl_inner_ref!(Vec<JsonValue>, Array(a) => a);
impl_inner_ref!(JsonObject, Object(o) => o);

impl JsonValue {
    /// Borrows the inner value if it has the requested type.
    ///
    /// ```
    /// use json_cursor::{JsonObject, JsonValue};
    ///
    /// let v = JsonValue::String("hi".to_string());
    /// assert_eq!(v.get::<String>().map(String::as_str), Some("hi"));
    /// assert!(v.get::<JsonObject>().is_none());
    /// ```
    pub fn get<T: InnerAsRef>(&self) -> Option<&T> {
        T::json_value_as(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, JsonValue::Boolean(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, JsonValue::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JsonValue::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, JsonValue::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsonValue::Object(_))
    }
}

impl<'a> Index<&'a str> for JsonValue {
    type Output = JsonValue;

    fn index(&self, key: &'a str) -> &Self::Output {
        let obj = match self {
            JsonValue::Object(o) => o,
            _ => panic!(
                "Attempted to access to an object with key '{}' but actually it was {:?}",
                key, self
            ),
        };

        match obj.get(key) {
            Some(json) => json,
            None => panic!("Key '{}' was not found in {:?}", key, self),
        }
    }
}

impl Index<usize> for JsonValue {
    type Output = JsonValue;

    fn index(&self, index: usize) -> &'_ Self::Output {
        let array = match self {
            JsonValue::Array(a) => a,
            _ => panic!(
                "Attempted to access to an array with index {} but actually the value was {:?}",
                index, self,
            ),
        };
        &array[index]
    }
}

fn write_escaped_string(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    use fmt::Write;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\u{8}' => f.write_str("\\b")?,
            '\u{c}' => f.write_str("\\f")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Serializes the value back to compact JSON text. Numbers print their
/// original digit sequence, so a materialize/serialize/parse round trip
/// preserves them exactly.
impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonValue::Null => f.write_str("null"),
            JsonValue::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            JsonValue::Number(n) => write!(f, "{n}"),
            JsonValue::String(s) => {
                f.write_str("\"")?;
                write_escaped_string(s, f)?;
                f.write_str("\"")
            }
            JsonValue::Array(arr) => {
                f.write_str("[")?;
                let mut first = true;
                for v in arr {
                    if !first {
                        f.write_str(",")?;
                    }
                    first = false;
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            JsonValue::Object(obj) => {
                f.write_str("{")?;
                let mut first = true;
                for (k, v) in obj {
                    if !first {
                        f.write_str(",")?;
                    }
                    first = false;
                    f.write_str("\"")?;
                    write_escaped_string(k, f)?;
                    write!(f, "\":{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}
