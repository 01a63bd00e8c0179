//! Path element and path types.

use crate::typed::ValidationError;

/// PathElement represents one level of path navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Key of a mapping or field of a struct. Sequences accept numeric keys.
    Key(String),
    /// Index written in brackets, `lst[0]`.
    Index(usize),
}

impl PathElement {
    /// Creates a new key path element.
    pub fn key(name: impl Into<String>) -> Self {
        PathElement::Key(name.into())
    }

    /// Creates a new index path element.
    pub fn index(i: usize) -> Self {
        PathElement::Index(i)
    }

    /// Returns the element as a mapping key.
    pub fn as_key(&self) -> String {
        match self {
            PathElement::Key(k) => k.clone(),
            PathElement::Index(i) => i.to_string(),
        }
    }

    /// Returns the element as a sequence index, if it is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathElement::Key(k) => k.parse().ok(),
            PathElement::Index(i) => Some(*i),
        }
    }
}

/// Path represents a complete path to a nested node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    /// Creates a new empty path, addressing the root.
    pub fn new() -> Self {
        Path {
            elements: Vec::new(),
        }
    }

    /// Creates a path from a vector of elements.
    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Path { elements }
    }

    /// Parses `a.b[0].c` (or `a.b.0.c`) into a path. The empty string is the root.
    pub fn parse(s: &str) -> Result<Path, ValidationError> {
        let mut path = Path::new();
        if s.is_empty() {
            return Ok(path);
        }

        let invalid = |message: &str| ValidationError::invalid_path(s, message);
        let mut chars = s.chars().peekable();
        let mut key = String::new();
        // A key is expected at the start and after every dot.
        let mut expect_key = true;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if expect_key && key.is_empty() {
                        return Err(invalid("empty key"));
                    }
                    if !key.is_empty() {
                        path.push(PathElement::Key(std::mem::take(&mut key)));
                    }
                    expect_key = true;
                }
                '[' => {
                    if !key.is_empty() {
                        path.push(PathElement::Key(std::mem::take(&mut key)));
                    } else if expect_key && !path.is_empty() {
                        return Err(invalid("empty key"));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) => digits.push(d),
                            None => return Err(invalid("unterminated '['")),
                        }
                    }
                    let index = digits
                        .trim()
                        .parse()
                        .map_err(|_| invalid("index must be a non-negative integer"))?;
                    path.push(PathElement::Index(index));
                    expect_key = false;
                    if let Some(&next) = chars.peek() {
                        if next != '.' && next != '[' {
                            return Err(invalid("expected '.' or '[' after ']'"));
                        }
                    }
                }
                ']' => return Err(invalid("unbalanced ']'")),
                other => {
                    key.push(other);
                    expect_key = false;
                }
            }
        }

        if !key.is_empty() {
            path.push(PathElement::Key(key));
        } else if expect_key {
            return Err(invalid("trailing '.'"));
        }
        Ok(path)
    }

    /// Returns the number of elements in the path.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns an iterator over the path elements.
    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter()
    }

    /// Appends a path element.
    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    /// Removes and returns the last path element.
    pub fn pop(&mut self) -> Option<PathElement> {
        self.elements.pop()
    }

    /// Returns the last path element.
    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Creates a new path with the given element appended.
    pub fn with(&self, element: PathElement) -> Self {
        let mut new_path = self.clone();
        new_path.push(element);
        new_path
    }

    pub fn with_key(&self, key: impl Into<String>) -> Self {
        self.with(PathElement::Key(key.into()))
    }

    pub fn with_index(&self, index: usize) -> Self {
        self.with(PathElement::Index(index))
    }

    /// Returns the path of the containing node, None for the root.
    pub fn parent(&self) -> Option<Path> {
        let mut parent = self.clone();
        parent.pop().map(|_| parent)
    }

    /// Appends all elements of `other`.
    pub fn join(&self, other: &Path) -> Path {
        let mut joined = self.clone();
        joined.elements.extend(other.elements.iter().cloned());
        joined
    }

    /// Returns a slice of the path elements.
    pub fn as_slice(&self) -> &[PathElement] {
        &self.elements
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Path {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "<root>");
        }
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Key(k) if i == 0 => write!(f, "{}", k)?,
                PathElement::Key(k) => write!(f, ".{}", k)?,
                PathElement::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}
