//! Single-pass lazy traversal of JSON documents that are too large to hold in
//! memory.
//!
//! [`load`] wraps any [`std::io::Read`] source and hands back a [`LazyNode`]
//! for the root value. Objects and arrays are traversed through forward-only
//! cursors; a subtree is only materialized into an owned [`JsonValue`] when
//! the caller asks for it, and anything else can be skipped in a streaming
//! fashion. Peak memory stays proportional to the nesting depth plus the
//! largest single subtree the caller chooses to materialize.
//!
//! ```
//! use json_cursor::{load, JsonResult, LazyNode};
//!
//! fn sum_items() -> JsonResult<i64> {
//!     let data = br#"{"meta": {"huge": [0, 0, 0]}, "items": [1, 2, 3]}"#;
//!     let LazyNode::Object(mut root) = load(&data[..])? else {
//!         return Ok(0);
//!     };
//!     let mut sum = 0;
//!     while let Some((key, node)) = root.next_entry()? {
//!         if key != "items" {
//!             node.skip()?;
//!             continue;
//!         }
//!         let LazyNode::Array(items) = node else { continue };
//!         for value in items.persistent() {
//!             if let Some(n) = value?.get::<json_cursor::JsonNumber>() {
//!                 sum += n.as_i64().unwrap_or(0);
//!             }
//!         }
//!     }
//!     Ok(sum)
//! }
//!
//! assert_eq!(sum_items().unwrap(), 6);
//! ```
//!
//! Cursors enforce a consumption protocol at runtime: a yielded child must be
//! materialized, skipped, or fully iterated before its parent advances, and a
//! cursor the traversal has moved past reports itself as stale instead of
//! silently reading the wrong bytes.

mod cursor;
mod error;
mod materialize;
mod path;
mod tokenizer;
mod value;

pub use cursor::{load, ArrayCursor, LazyNode, ObjectCursor};
pub use error::{Error, JsonResult, ProtocolViolation, SyntaxErrorKind};
pub use materialize::PersistentValues;
pub use path::{Path, PathSegment};
pub use tokenizer::{JsonToken, JsonTokenizer, Location};
pub use value::{InnerAsRef, JsonNumber, JsonObject, JsonValue};
