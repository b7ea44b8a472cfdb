use std::io::Read;

use crate::cursor::{ArrayCursor, LazyNode, ObjectCursor};
use crate::error::JsonResult;
use crate::path::Path;
use crate::value::{JsonObject, JsonValue};

impl<R: Read> LazyNode<R> {
    /// Reads the entire subtree rooted at this node into an owned
    /// [`JsonValue`], leaving the stream just past it.
    ///
    /// The result is detached from the stream and stays valid after the
    /// traversal moves on. Memory use is proportional to the materialized
    /// subtree, not to the whole document.
    pub fn materialize(self) -> JsonResult<JsonValue> {
        match self {
            LazyNode::Scalar(value) => Ok(value),
            LazyNode::Object(cursor) => cursor.materialize(),
            LazyNode::Array(cursor) => cursor.materialize(),
        }
    }
}

impl<R: Read> ObjectCursor<R> {
    /// Reads the remaining entries of this object into an owned value.
    ///
    /// A key that occurs more than once keeps the last value, at the position
    /// where the key first appeared.
    pub fn materialize(mut self) -> JsonResult<JsonValue> {
        let mut object = JsonObject::new();
        while let Some((key, node)) = self.next_entry()? {
            object.insert(key, node.materialize()?);
        }
        Ok(JsonValue::Object(object))
    }
}

impl<R: Read> ArrayCursor<R> {
    /// Reads the remaining elements of this array into an owned value.
    pub fn materialize(mut self) -> JsonResult<JsonValue> {
        let mut array = Vec::new();
        while let Some(node) = self.next_element()? {
            array.push(node.materialize()?);
        }
        Ok(JsonValue::Array(array))
    }

    /// Converts this cursor into an iterator that materializes one element
    /// at a time.
    pub fn persistent(self) -> PersistentValues<R> {
        PersistentValues {
            cursor: self,
            failed: false,
        }
    }
}

/// An iterator over the elements of an array, each materialized as an owned
/// [`JsonValue`] the moment it is yielded.
///
/// Only one element is held in memory at a time, so an array far larger than
/// memory can be folded over as long as its individual elements fit. After an
/// `Err` the iterator is fused; tokenization cannot resume past a malformed
/// region.
pub struct PersistentValues<R: Read> {
    cursor: ArrayCursor<R>,
    failed: bool,
}

impl<R: Read> PersistentValues<R> {
    /// The path from the document root to the element currently being
    /// visited.
    pub fn path(&self) -> std::cell::Ref<'_, Path> {
        self.cursor.path()
    }

    /// Stops iterating and discards the remaining elements, leaving the
    /// stream just past the array so the enclosing scope can resume.
    pub fn skip_rest(&mut self) -> JsonResult<()> {
        self.cursor.skip_rest()
    }
}

impl<R: Read> Iterator for PersistentValues<R> {
    type Item = JsonResult<JsonValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.cursor.next_element() {
            Ok(Some(node)) => match node.materialize() {
                Ok(value) => Some(Ok(value)),
                Err(e) => {
                    self.failed = true;
                    Some(Err(e))
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::cursor::load;
    use crate::error::{Error, SyntaxErrorKind};
    use crate::value::JsonNumber;

    use super::*;

    fn materialize_str(data: &str) -> JsonValue {
        load(data.as_bytes()).unwrap().materialize().unwrap()
    }

    fn num(text: &str) -> JsonValue {
        JsonValue::Number(JsonNumber::from_text(text))
    }

    #[test]
    fn materializes_nested_values() {
        let v = materialize_str(r#"{"a": [1, {"b": null}], "c": "d"}"#);
        assert_eq!(v["a"][1]["b"], JsonValue::Null);
        assert_eq!(v["c"], JsonValue::String("d".to_string()));
        assert_eq!(v["a"][0], num("1"));
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        let v = materialize_str(r#"{"a": 1, "a": 2}"#);
        let obj = v.get::<JsonObject>().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(v["a"], num("2"));
    }

    #[test]
    fn round_trips_through_serde_json() {
        let text = r#"{"name":"x","tags":["a","b"],"n":3,"nested":{"ok":true,"v":null}}"#;
        let v = materialize_str(text);
        let ours: serde_json::Value = serde_json::from_str(&v.to_string()).unwrap();
        let theirs: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(ours, theirs);
    }

    #[test]
    fn skipping_a_subtree_does_not_disturb_the_rest() {
        let data = br#"{"skip_me": {"deep": [1, 2, 3]}, "keep": 42}"#;
        let mut root = match load(&data[..]).unwrap() {
            LazyNode::Object(cursor) => cursor,
            _ => panic!("expected object root"),
        };
        let mut kept = None;
        while let Some((key, node)) = root.next_entry().unwrap() {
            if key == "keep" {
                kept = Some(node.materialize().unwrap());
            } else {
                node.skip().unwrap();
            }
        }
        assert_eq!(kept, Some(num("42")));
    }

    #[test]
    fn error_surfaces_at_the_malformed_element() {
        let mut values = match load(&b"[1, 2, xyz]"[..]).unwrap() {
            LazyNode::Array(cursor) => cursor.persistent(),
            _ => panic!("expected array root"),
        };
        assert_eq!(values.next().unwrap().unwrap(), num("1"));
        assert_eq!(values.next().unwrap().unwrap(), num("2"));
        let err = values.next().unwrap().unwrap_err();
        match err {
            Error::Syntax {
                kind: SyntaxErrorKind::InvalidByte(b'x'),
                location,
            } => assert_eq!(location.byte_offset, 7),
            other => panic!("unexpected error: {other:?}"),
        }
        // Fused after the failure.
        assert!(values.next().is_none());
        assert!(values.next().is_none());
    }

    #[test]
    fn early_break_then_resume_the_outer_scope() {
        let data = br#"{"first": [1, 2, 3, 4], "second": 5}"#;
        let mut root = match load(&data[..]).unwrap() {
            LazyNode::Object(cursor) => cursor,
            _ => panic!("expected object root"),
        };
        let (key, node) = root.next_entry().unwrap().unwrap();
        assert_eq!(key, "first");
        let mut values = match node {
            LazyNode::Array(cursor) => cursor.persistent(),
            _ => panic!("expected array"),
        };
        assert_eq!(values.next().unwrap().unwrap(), num("1"));
        assert_eq!(values.path().to_string(), "$.first[0]");
        values.skip_rest().unwrap();

        let (key, node) = root.next_entry().unwrap().unwrap();
        assert_eq!(key, "second");
        assert_eq!(node.materialize().unwrap(), num("5"));
        assert!(root.next_entry().unwrap().is_none());
    }

    #[test]
    fn filters_a_rate_file_shaped_document() {
        let data = br#"{
            "reporting_entity_name": "Example Health",
            "last_updated_on": "2024-01-01",
            "in_network": [
                {"billing_code": "0001", "billing_code_type": "CPT"},
                {"billing_code": "S0012", "billing_code_type": "HCPCS"},
                {"billing_code": "99213", "billing_code_type": "CPT"}
            ],
            "version": "1.0.0"
        }"#;
        let mut root = match load(&data[..]).unwrap() {
            LazyNode::Object(cursor) => cursor,
            _ => panic!("expected object root"),
        };
        let mut total = 0;
        let mut matches = 0;
        while let Some((key, node)) = root.next_entry().unwrap() {
            if key != "in_network" {
                node.skip().unwrap();
                continue;
            }
            let values = match node {
                LazyNode::Array(cursor) => cursor.persistent(),
                _ => panic!("expected array"),
            };
            for value in values {
                let value = value.unwrap();
                total += 1;
                if value["billing_code_type"] == JsonValue::String("CPT".to_string()) {
                    matches += 1;
                }
            }
        }
        assert_eq!(total, 3);
        assert_eq!(matches, 2);
    }
}
