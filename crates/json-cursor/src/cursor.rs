use std::cell::{Ref, RefCell};
use std::io::Read;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{Error, JsonResult, ProtocolViolation, SyntaxErrorKind};
use crate::path::Path;
use crate::tokenizer::{JsonToken, JsonTokenizer, Location};
use crate::value::JsonValue;

/// Reads the single JSON document in `reader` and returns a [`LazyNode`] for
/// its root value.
///
/// Nothing beyond the first token is consumed up front; the caller descends
/// into the root via [`ObjectCursor::next_entry`] or
/// [`ArrayCursor::next_element`] and the stream advances exactly as far as
/// the traversal demands. The reader is only ever read forward; its lifecycle
/// stays with the caller.
pub fn load<R: Read>(reader: R) -> JsonResult<LazyNode<R>> {
    let mut core = StreamCore {
        tokenizer: JsonTokenizer::new(reader),
        path: Path::default(),
        open: Vec::new(),
        next_id: 0,
    };
    let location = core.tokenizer.location();
    let token = core.require_token()?;
    let core = Rc::new(RefCell::new(core));
    let node = node_from_token(&core, token, location)?;
    if let LazyNode::Scalar(_) = &node {
        core.borrow_mut().tokenizer.expect_eof()?;
    }
    Ok(node)
}

/// A JSON value that has not been fully read yet.
///
/// Scalars are small and are therefore read eagerly; objects and arrays are
/// handed out as forward-only cursors over the unread input.
pub enum LazyNode<R: Read> {
    Scalar(JsonValue),
    Object(ObjectCursor<R>),
    Array(ArrayCursor<R>),
}

impl<R: Read> LazyNode<R> {
    /// Consumes and discards every token belonging to this value without
    /// materializing anything, in O(size of the subtree).
    pub fn skip(self) -> JsonResult<()> {
        match self {
            LazyNode::Scalar(_) => Ok(()),
            LazyNode::Object(mut cursor) => cursor.skip_rest(),
            LazyNode::Array(mut cursor) => cursor.skip_rest(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Start,
    AfterValue,
    Done,
}

/// The stream state shared by every cursor of one document: the tokenizer,
/// the current path, and the stack of open containers. Single-threaded by
/// construction; every public call runs to completion on the calling thread.
struct StreamCore<R> {
    tokenizer: JsonTokenizer<R>,
    path: Path,
    // One entry per open container, innermost last. The id identifies the
    // cursor that is allowed to advance at that depth.
    open: Vec<(u64, Scope)>,
    next_id: u64,
}

impl<R: Read> StreamCore<R> {
    fn require_token(&mut self) -> JsonResult<JsonToken> {
        match self.tokenizer.next_token()? {
            Some(token) => Ok(token),
            None => Err(Error::UnexpectedEof {
                location: self.tokenizer.location(),
            }),
        }
    }

    fn protocol(&self, kind: ProtocolViolation) -> Error {
        Error::Protocol {
            kind,
            location: self.tokenizer.location(),
        }
    }

    fn check_cursor(&self, id: u64, depth: usize) -> JsonResult<()> {
        match self.open.get(depth) {
            Some(&(open_id, _)) if open_id == id => {
                if self.open.len() > depth + 1 {
                    Err(self.protocol(ProtocolViolation::UnconsumedChild))
                } else {
                    Ok(())
                }
            }
            _ => Err(self.protocol(ProtocolViolation::StaleCursor)),
        }
    }

    fn open_container(&mut self, scope: Scope) -> (u64, usize) {
        let id = self.next_id;
        self.next_id += 1;
        self.open.push((id, scope));
        (id, self.open.len() - 1)
    }

    /// Pops the innermost container. When the last one closes, the document
    /// is complete and trailing non-whitespace input is an error.
    fn close_top(&mut self) -> JsonResult<()> {
        self.open.pop();
        if self.open.is_empty() {
            self.tokenizer.expect_eof()?;
        }
        Ok(())
    }

    fn expect_colon(&mut self) -> JsonResult<()> {
        let location = self.tokenizer.location();
        match self.require_token()? {
            JsonToken::Colon => Ok(()),
            token => Err(Error::Syntax {
                kind: SyntaxErrorKind::UnexpectedToken {
                    expected: "':' after an object key",
                    found: format!("{token:?}"),
                },
                location,
            }),
        }
    }

    /// Discards tokens until every container in `stack` has been closed,
    /// checking only that close brackets match. The full comma/colon grammar
    /// is not re-validated inside a discarded subtree.
    fn skip_containers(&mut self, mut stack: SmallVec<[Scope; 8]>) -> JsonResult<()> {
        while !stack.is_empty() {
            let location = self.tokenizer.location();
            match self.require_token()? {
                JsonToken::ObjOpen => stack.push(Scope::Object),
                JsonToken::ArrayOpen => stack.push(Scope::Array),
                token @ (JsonToken::ObjClose | JsonToken::ArrayClose) => {
                    let expected = match token {
                        JsonToken::ObjClose => Scope::Object,
                        _ => Scope::Array,
                    };
                    if stack.pop() != Some(expected) {
                        return Err(Error::Syntax {
                            kind: SyntaxErrorKind::UnexpectedToken {
                                expected: "a matching close bracket",
                                found: format!("{token:?}"),
                            },
                            location,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn node_from_token<R: Read>(
    core: &Rc<RefCell<StreamCore<R>>>,
    token: JsonToken,
    location: Location,
) -> JsonResult<LazyNode<R>> {
    let node = match token {
        JsonToken::Null => LazyNode::Scalar(JsonValue::Null),
        JsonToken::True => LazyNode::Scalar(JsonValue::Boolean(true)),
        JsonToken::False => LazyNode::Scalar(JsonValue::Boolean(false)),
        JsonToken::Number(n) => LazyNode::Scalar(JsonValue::Number(n)),
        JsonToken::String(s) => LazyNode::Scalar(JsonValue::String(s)),
        JsonToken::ObjOpen => LazyNode::Object(ObjectCursor::open(core)),
        JsonToken::ArrayOpen => LazyNode::Array(ArrayCursor::open(core)),
        token => {
            return Err(Error::Syntax {
                kind: SyntaxErrorKind::UnexpectedToken {
                    expected: "a JSON value",
                    found: format!("{token:?}"),
                },
                location,
            })
        }
    };
    Ok(node)
}

/// Drains the remaining input of the container that `id` opened, including
/// any still-open descendants, leaving the stream just past its close
/// bracket. Descendant cursors become stale.
fn skip_rest_impl<R: Read>(
    core: &Rc<RefCell<StreamCore<R>>>,
    id: u64,
    depth: usize,
) -> JsonResult<()> {
    let mut core = core.borrow_mut();
    match core.open.get(depth) {
        Some(&(open_id, _)) if open_id == id => {}
        _ => return Err(core.protocol(ProtocolViolation::StaleCursor)),
    }
    let stack: SmallVec<[Scope; 8]> = core.open[depth..].iter().map(|&(_, scope)| scope).collect();
    core.skip_containers(stack)?;
    core.open.truncate(depth);
    core.path.truncate(depth);
    if core.open.is_empty() {
        core.tokenizer.expect_eof()?;
    }
    Ok(())
}

/// A forward-only cursor over the members of one JSON object.
///
/// Entries are yielded in document order. Before the cursor may advance, the
/// previously yielded value must have been materialized, skipped, or fully
/// iterated; violating that fails with
/// [`ProtocolViolation::UnconsumedChild`]. A cursor whose position the
/// traversal has moved past fails with [`ProtocolViolation::StaleCursor`].
pub struct ObjectCursor<R: Read> {
    core: Rc<RefCell<StreamCore<R>>>,
    id: u64,
    depth: usize,
    state: CursorState,
    pending_segment: bool,
}

impl<R: Read> ObjectCursor<R> {
    fn open(core: &Rc<RefCell<StreamCore<R>>>) -> Self {
        let (id, depth) = core.borrow_mut().open_container(Scope::Object);
        ObjectCursor {
            core: Rc::clone(core),
            id,
            depth,
            state: CursorState::Start,
            pending_segment: false,
        }
    }

    /// The path from the document root to the node currently being visited.
    pub fn path(&self) -> Ref<'_, Path> {
        Ref::map(self.core.borrow(), |core| &core.path)
    }

    /// Returns the next `(key, value)` pair, or `None` once the object end
    /// has been reached.
    pub fn next_entry(&mut self) -> JsonResult<Option<(String, LazyNode<R>)>> {
        if self.state == CursorState::Done {
            return Ok(None);
        }
        let (key, value_token, value_location) = {
            let mut core = self.core.borrow_mut();
            core.check_cursor(self.id, self.depth)?;
            if self.pending_segment {
                core.path.pop();
                self.pending_segment = false;
            }
            let location = core.tokenizer.location();
            let token = core.require_token()?;
            let key = match (self.state, token) {
                (_, JsonToken::ObjClose) => {
                    self.state = CursorState::Done;
                    core.close_top()?;
                    return Ok(None);
                }
                (CursorState::Start, JsonToken::String(key)) => key,
                (CursorState::Start, token) => {
                    return Err(Error::Syntax {
                        kind: SyntaxErrorKind::UnexpectedToken {
                            expected: "an object key or '}'",
                            found: format!("{token:?}"),
                        },
                        location,
                    });
                }
                (CursorState::AfterValue, JsonToken::Comma) => {
                    let location = core.tokenizer.location();
                    match core.require_token()? {
                        JsonToken::String(key) => key,
                        token => {
                            return Err(Error::Syntax {
                                kind: SyntaxErrorKind::UnexpectedToken {
                                    expected: "an object key",
                                    found: format!("{token:?}"),
                                },
                                location,
                            });
                        }
                    }
                }
                (CursorState::AfterValue, token) => {
                    return Err(Error::Syntax {
                        kind: SyntaxErrorKind::UnexpectedToken {
                            expected: "',' or '}'",
                            found: format!("{token:?}"),
                        },
                        location,
                    });
                }
                (CursorState::Done, _) => unreachable!(),
            };
            core.expect_colon()?;
            let value_location = core.tokenizer.location();
            let value_token = core.require_token()?;
            core.path.push_key(&key);
            self.pending_segment = true;
            self.state = CursorState::AfterValue;
            (key, value_token, value_location)
        };
        let node = node_from_token(&self.core, value_token, value_location)?;
        Ok(Some((key, node)))
    }

    /// Discards the remaining entries of this object, including any open
    /// descendant, so that the enclosing scope can resume.
    pub fn skip_rest(&mut self) -> JsonResult<()> {
        if self.state == CursorState::Done {
            return Ok(());
        }
        skip_rest_impl(&self.core, self.id, self.depth)?;
        self.pending_segment = false;
        self.state = CursorState::Done;
        Ok(())
    }
}

/// A forward-only cursor over the elements of one JSON array.
///
/// The same consumption protocol as [`ObjectCursor`] applies.
pub struct ArrayCursor<R: Read> {
    core: Rc<RefCell<StreamCore<R>>>,
    id: u64,
    depth: usize,
    index: usize,
    state: CursorState,
    pending_segment: bool,
}

impl<R: Read> ArrayCursor<R> {
    fn open(core: &Rc<RefCell<StreamCore<R>>>) -> Self {
        let (id, depth) = core.borrow_mut().open_container(Scope::Array);
        ArrayCursor {
            core: Rc::clone(core),
            id,
            depth,
            index: 0,
            state: CursorState::Start,
            pending_segment: false,
        }
    }

    /// The path from the document root to the node currently being visited.
    pub fn path(&self) -> Ref<'_, Path> {
        Ref::map(self.core.borrow(), |core| &core.path)
    }

    /// Returns the next element, or `None` once the array end has been
    /// reached.
    pub fn next_element(&mut self) -> JsonResult<Option<LazyNode<R>>> {
        if self.state == CursorState::Done {
            return Ok(None);
        }
        let (value_token, value_location) = {
            let mut core = self.core.borrow_mut();
            core.check_cursor(self.id, self.depth)?;
            if self.pending_segment {
                core.path.pop();
                self.pending_segment = false;
            }
            let location = core.tokenizer.location();
            let token = core.require_token()?;
            let (value_token, value_location) = match (self.state, token) {
                (_, JsonToken::ArrayClose) => {
                    self.state = CursorState::Done;
                    core.close_top()?;
                    return Ok(None);
                }
                (CursorState::Start, token) => (token, location),
                (CursorState::AfterValue, JsonToken::Comma) => {
                    let location = core.tokenizer.location();
                    (core.require_token()?, location)
                }
                (CursorState::AfterValue, token) => {
                    return Err(Error::Syntax {
                        kind: SyntaxErrorKind::UnexpectedToken {
                            expected: "',' or ']'",
                            found: format!("{token:?}"),
                        },
                        location,
                    });
                }
                (CursorState::Done, _) => unreachable!(),
            };
            core.path.push_index(self.index);
            self.index += 1;
            self.pending_segment = true;
            self.state = CursorState::AfterValue;
            (value_token, value_location)
        };
        let node = node_from_token(&self.core, value_token, value_location)?;
        Ok(Some(node))
    }

    /// Discards the remaining elements of this array, including any open
    /// descendant, so that the enclosing scope can resume.
    pub fn skip_rest(&mut self) -> JsonResult<()> {
        if self.state == CursorState::Done {
            return Ok(());
        }
        skip_rest_impl(&self.core, self.id, self.depth)?;
        self.pending_segment = false;
        self.state = CursorState::Done;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::io;
    use std::rc::Rc;

    use super::*;

    fn load_object(data: &[u8]) -> ObjectCursor<&[u8]> {
        match load(data).unwrap() {
            LazyNode::Object(cursor) => cursor,
            _ => panic!("expected object root"),
        }
    }

    #[test]
    fn walks_a_small_document() {
        let data =
            br#"{"propertyKey": 1234, "arr": [], "obj": {}, "arr2": [null, false, true, -0.54e2] }"#;
        let mut root = load_object(data);
        let mut keys = Vec::new();
        while let Some((key, node)) = root.next_entry().unwrap() {
            keys.push(key);
            node.skip().unwrap();
        }
        assert_eq!(keys, ["propertyKey", "arr", "obj", "arr2"]);
    }

    #[test]
    fn scalar_root() {
        match load(&b" 42 "[..]).unwrap() {
            LazyNode::Scalar(JsonValue::Number(n)) => assert_eq!(n.text(), "42"),
            _ => panic!("expected scalar root"),
        }
    }

    #[test]
    fn empty_input_is_unexpected_eof() {
        assert!(matches!(load(&b""[..]), Err(Error::UnexpectedEof { .. })));
    }

    #[test]
    fn trailing_data_after_scalar_root() {
        assert!(matches!(
            load(&b"1 2"[..]),
            Err(Error::Syntax {
                kind: SyntaxErrorKind::TrailingData,
                ..
            })
        ));
    }

    #[test]
    fn trailing_data_after_container_root() {
        let mut root = load_object(b"{} junk");
        assert!(matches!(
            root.next_entry(),
            Err(Error::Syntax {
                kind: SyntaxErrorKind::TrailingData,
                ..
            })
        ));
    }

    #[test]
    fn truncated_array_is_unexpected_eof() {
        let mut arr = match load(&b"[1, 2"[..]).unwrap() {
            LazyNode::Array(cursor) => cursor,
            _ => panic!("expected array root"),
        };
        arr.next_element().unwrap().unwrap().skip().unwrap();
        arr.next_element().unwrap().unwrap().skip().unwrap();
        assert!(matches!(
            arr.next_element(),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn path_tracks_the_traversal() {
        let data = br#"{"a": [10, 20], "b": 1}"#;
        let mut root = load_object(data);

        let (key, node) = root.next_entry().unwrap().unwrap();
        assert_eq!(key, "a");
        assert_eq!(root.path().to_string(), "$.a");

        let mut arr = match node {
            LazyNode::Array(cursor) => cursor,
            _ => panic!("expected array"),
        };
        let mut seen = Vec::new();
        while let Some(element) = arr.next_element().unwrap() {
            seen.push(arr.path().to_string());
            element.skip().unwrap();
        }
        assert_eq!(seen, ["$.a[0]", "$.a[1]"]);

        let (key, node) = root.next_entry().unwrap().unwrap();
        assert_eq!(key, "b");
        assert_eq!(root.path().to_string(), "$.b");
        node.skip().unwrap();

        assert!(root.next_entry().unwrap().is_none());
        assert_eq!(root.path().to_string(), "$");
    }

    #[test]
    fn advancing_over_an_open_child_is_an_error() {
        let data = br#"[[1, 2], 3]"#;
        let mut arr = match load(&data[..]).unwrap() {
            LazyNode::Array(cursor) => cursor,
            _ => panic!("expected array root"),
        };
        let _inner = arr.next_element().unwrap().unwrap();
        assert!(matches!(
            arr.next_element(),
            Err(Error::Protocol {
                kind: ProtocolViolation::UnconsumedChild,
                ..
            })
        ));
    }

    #[test]
    fn abandoned_child_cursor_goes_stale() {
        let data = br#"{"outer": [[1, 2], 3], "tail": true}"#;
        let mut root = load_object(data);
        let (_, node) = root.next_entry().unwrap().unwrap();
        let mut outer = match node {
            LazyNode::Array(cursor) => cursor,
            _ => panic!("expected array"),
        };
        let mut inner = match outer.next_element().unwrap().unwrap() {
            LazyNode::Array(cursor) => cursor,
            _ => panic!("expected inner array"),
        };
        inner.next_element().unwrap().unwrap().skip().unwrap();

        // Ascend without exhausting the inner array.
        outer.skip_rest().unwrap();
        assert!(matches!(
            inner.next_element(),
            Err(Error::Protocol {
                kind: ProtocolViolation::StaleCursor,
                ..
            })
        ));

        // The enclosing object is still resumable.
        let (key, node) = root.next_entry().unwrap().unwrap();
        assert_eq!(key, "tail");
        node.skip().unwrap();
        assert!(root.next_entry().unwrap().is_none());
    }

    #[test]
    fn mismatched_close_bracket_is_a_syntax_error() {
        let mut arr = match load(&b"[1}"[..]).unwrap() {
            LazyNode::Array(cursor) => cursor,
            _ => panic!("expected array root"),
        };
        arr.next_element().unwrap().unwrap().skip().unwrap();
        assert!(matches!(
            arr.next_element(),
            Err(Error::Syntax {
                kind: SyntaxErrorKind::UnexpectedToken { .. },
                ..
            })
        ));
    }

    #[test]
    fn object_key_must_be_a_string() {
        let mut root = load_object(b"{1: 2}");
        assert!(matches!(
            root.next_entry(),
            Err(Error::Syntax {
                kind: SyntaxErrorKind::UnexpectedToken { .. },
                ..
            })
        ));
    }

    struct CountingReader<R> {
        inner: R,
        bytes_read: Rc<Cell<u64>>,
    }

    impl<R: io::Read> io::Read for CountingReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.bytes_read.set(self.bytes_read.get() + n as u64);
            Ok(n)
        }
    }

    #[test]
    fn every_byte_is_read_exactly_once() {
        let data = br#"{"a": [1, {"b": "c"}], "d": null}"#;
        let bytes_read = Rc::new(Cell::new(0));
        let reader = CountingReader {
            inner: &data[..],
            bytes_read: Rc::clone(&bytes_read),
        };
        let root = load(reader).unwrap();
        root.skip().unwrap();
        assert_eq!(bytes_read.get(), data.len() as u64);
    }
}
