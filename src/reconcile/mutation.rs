//! Document mutations and their atomic application

use crate::xml::Node;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Child positions from the root element down to a node; empty for the root
pub type NodePath = Vec<usize>;

/// One edit of a document tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    SetAttribute { path: NodePath, name: String, value: String },
    RemoveAttribute { path: NodePath, name: String },
    SetText { path: NodePath, text: Option<String> },
    Insert { parent: NodePath, index: usize, node: Node },
    Remove { parent: NodePath, index: usize },
    /// Removes the child at `from` and reinserts it at `to` of the shortened list
    Move { parent: NodePath, from: usize, to: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("no node at {0:?}")]
    MissingNode(NodePath),

    #[error("position {index} is out of range for {len} children of {parent:?}")]
    OutOfRange { parent: NodePath, index: usize, len: usize },

    #[error("attribute '{name}' is not present on {path:?}")]
    MissingAttribute { path: NodePath, name: String },
}

fn node_mut<'a>(root: &'a mut Node, path: &[usize]) -> Result<&'a mut Node, ApplyError> {
    root.at_mut(path).ok_or_else(|| ApplyError::MissingNode(path.to_vec()))
}

fn check_index(parent: &[usize], index: usize, len: usize) -> Result<(), ApplyError> {
    if index < len {
        Ok(())
    } else {
        Err(ApplyError::OutOfRange {
            parent: parent.to_vec(),
            index,
            len,
        })
    }
}

impl Mutation {
    pub fn apply_to(&self, root: &mut Node) -> Result<(), ApplyError> {
        match self {
            Mutation::SetAttribute { path, name, value } => {
                node_mut(root, path)?.set_attribute(name.clone(), value.clone());
            }
            Mutation::RemoveAttribute { path, name } => {
                node_mut(root, path)?
                    .remove_attribute(name)
                    .ok_or_else(|| ApplyError::MissingAttribute {
                        path: path.clone(),
                        name: name.clone(),
                    })?;
            }
            Mutation::SetText { path, text } => {
                node_mut(root, path)?.text = text.clone();
            }
            Mutation::Insert { parent, index, node } => {
                let target = node_mut(root, parent)?;
                check_index(parent, *index, target.children.len() + 1)?;
                target.children.insert(*index, node.clone());
            }
            Mutation::Remove { parent, index } => {
                let target = node_mut(root, parent)?;
                check_index(parent, *index, target.children.len())?;
                target.children.remove(*index);
            }
            Mutation::Move { parent, from, to } => {
                let target = node_mut(root, parent)?;
                let len = target.children.len();
                check_index(parent, *from, len)?;
                check_index(parent, *to, len)?;
                let child = target.children.remove(*from);
                target.children.insert(*to, child);
            }
        }
        Ok(())
    }
}

/// Applies `mutations` in order to a copy of `root`
///
/// Either every mutation applies and the new tree is returned, or the first
/// failure is returned and nothing is changed.
pub fn apply(root: &Node, mutations: &[Mutation]) -> Result<Node, ApplyError> {
    let mut working = root.clone();
    for mutation in mutations {
        mutation.apply_to(&mut working)?;
    }
    Ok(working)
}

/// Working tree that records every edit made to it
pub struct Editor {
    doc: Node,
    mutations: Vec<Mutation>,
}

impl Editor {
    pub fn new(doc: Node) -> Self {
        Self {
            doc,
            mutations: Vec::new(),
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn node(&self, path: &[usize]) -> Result<&Node, ApplyError> {
        self.doc.at(path).ok_or_else(|| ApplyError::MissingNode(path.to_vec()))
    }

    pub fn record(&mut self, mutation: Mutation) -> Result<(), ApplyError> {
        mutation.apply_to(&mut self.doc)?;
        self.mutations.push(mutation);
        Ok(())
    }

    pub fn finish(self) -> (Node, Vec<Mutation>) {
        (self.doc, self.mutations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Node {
        Node::new("root")
            .with_child(Node::new("a"))
            .with_child(Node::new("b"))
            .with_child(Node::new("c"))
    }

    fn tags(node: &Node) -> Vec<&str> {
        node.children.iter().map(|c| c.tag.as_str()).collect()
    }

    #[test]
    fn test_move_within_list() {
        let moved = apply(
            &tree(),
            &[Mutation::Move {
                parent: vec![],
                from: 2,
                to: 0,
            }],
        )
        .unwrap();
        assert_eq!(tags(&moved), vec!["c", "a", "b"]);

        let moved = apply(
            &tree(),
            &[Mutation::Move {
                parent: vec![],
                from: 0,
                to: 2,
            }],
        )
        .unwrap();
        assert_eq!(tags(&moved), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_failed_batch_leaves_original() {
        let original = tree();
        let result = apply(
            &original,
            &[
                Mutation::Remove {
                    parent: vec![],
                    index: 0,
                },
                Mutation::RemoveAttribute {
                    path: vec![0],
                    name: "missing".into(),
                },
            ],
        );
        assert_eq!(
            result,
            Err(ApplyError::MissingAttribute {
                path: vec![0],
                name: "missing".into()
            })
        );
        assert_eq!(tags(&original), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_insert_bounds() {
        let insert = |index| Mutation::Insert {
            parent: vec![],
            index,
            node: Node::new("d"),
        };
        assert_eq!(tags(&apply(&tree(), &[insert(3)]).unwrap()), vec!["a", "b", "c", "d"]);
        assert!(matches!(apply(&tree(), &[insert(4)]), Err(ApplyError::OutOfRange { .. })));
        assert!(matches!(
            apply(
                &tree(),
                &[Mutation::SetText {
                    path: vec![5],
                    text: None
                }]
            ),
            Err(ApplyError::MissingNode(_))
        ));
    }
}
