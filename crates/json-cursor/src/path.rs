use std::fmt;

/// One step in the route from the document root to the current node: either
/// the key of an object member or the index of an array element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// The chain of keys and indices from the document root to the node that the
/// traversal is currently visiting. Its length always equals the current
/// nesting depth; segments are popped as soon as control ascends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub(crate) fn push_key(&mut self, key: &str) {
        self.segments.push(PathSegment::Key(key.to_string()));
    }

    pub(crate) fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.segments.truncate(len);
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Path {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Formats the path in dot-notation rooted at `$`, for example
/// `$.in_network[2].billing_code_type`.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_dot_notation() {
        let path: Path = [
            PathSegment::from("in_network"),
            PathSegment::from(2),
            PathSegment::from("billing_code_type"),
        ]
        .into_iter()
        .collect();
        assert_eq!(path.to_string(), "$.in_network[2].billing_code_type");
        assert_eq!(Path::default().to_string(), "$");
    }

    #[test]
    fn push_and_pop_track_depth() {
        let mut path = Path::default();
        path.push_key("a");
        path.push_index(0);
        assert_eq!(path.len(), 2);
        assert_eq!(path.last(), Some(&PathSegment::Index(0)));
        path.pop();
        assert_eq!(path.len(), 1);
        path.truncate(0);
        assert!(path.is_empty());
    }
}
