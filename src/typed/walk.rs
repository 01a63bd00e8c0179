//! Read-only traversal for document writers.

use crate::fieldpath::Path;
use crate::typed::{Content, Node, NodeKind};
use crate::value::{Value, MISSING};

/// WalkEntry describes one node met during a walk.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkEntry {
    pub path: Path,
    pub kind: NodeKind,
    /// Leaf value, or the raw expression of an interpolation. None for
    /// containers.
    pub value: Option<Value>,
    /// Qualified name of the alternative selected by a union node.
    pub selected: Option<String>,
}

/// Walks the tree depth-first in document order without resolving anything.
///
/// A union yields one entry carrying its selection; the children of its
/// payload follow at the same paths a reader would use.
pub fn walk(root: &Node) -> Vec<WalkEntry> {
    let mut entries = Vec::new();
    visit(root, Path::new(), &mut entries);
    entries
}

fn visit(node: &Node, path: Path, out: &mut Vec<WalkEntry>) {
    let selected = node
        .selected_alternative()
        .map(|alternative| alternative.qualified_name().to_string());
    let data = node.payload();

    let value = match data.content() {
        Content::Missing => Some(Value::from(MISSING)),
        Content::Null => Some(Value::Null),
        Content::Interpolation(expr) => Some(Value::String(expr.clone())),
        Content::Value(v) => Some(v.clone()),
        Content::Map(_) | Content::Seq(_) | Content::Union(_) => None,
    };
    out.push(WalkEntry {
        path: path.clone(),
        kind: node.kind(),
        value,
        selected,
    });

    match data.content() {
        Content::Map(children) => {
            for (key, child) in children {
                visit(child, path.with_key(key.clone()), out);
            }
        }
        Content::Seq(items) => {
            for (i, item) in items.iter().enumerate() {
                visit(item, path.with_index(i), out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{build, Context};
    use crate::schema::{StructType, TypeDescriptor};

    #[test]
    fn test_walk_reports_selection_and_references() {
        let a = StructType::builder("A").qualified_name("pkg.A").field("x", TypeDescriptor::INT, 1).build();
        let root_type = StructType::builder("Root")
            .field("val", TypeDescriptor::sum(vec![TypeDescriptor::Struct(a), TypeDescriptor::INT]), "A")
            .field("ref", TypeDescriptor::INT, "${val.x}")
            .mandatory("todo", TypeDescriptor::STRING)
            .build();
        let root = build(&TypeDescriptor::Struct(root_type), &Value::Map(Default::default()), &Context::detached()).unwrap();

        let entries = walk(&root);
        let paths: Vec<String> = entries.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["<root>", "val", "val.x", "ref", "todo"]);

        assert_eq!(entries[1].kind, NodeKind::Union);
        assert_eq!(entries[1].selected.as_deref(), Some("pkg.A"));
        assert_eq!(entries[2].value, Some(Value::Int(1)));
        assert_eq!(entries[3].value, Some(Value::from("${val.x}")));
        assert_eq!(entries[4].value, Some(Value::from("???")));
    }
}
