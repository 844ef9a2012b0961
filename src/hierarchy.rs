// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::Error;
use std::fmt;

/// [`Hierarchy`] is a forest of named resources, e.g., databases, tables, and records.
///
/// Nodes are stored in an arena, and they refer to each other through [`NodeID`] values. A
/// [`Hierarchy`] is built up front and then shared read-only; it never holds lock state.
#[derive(Debug, Default)]
pub struct Hierarchy {
    nodes: Vec<Node>,
}

/// [`NodeID`] identifies a resource in a [`Hierarchy`].
///
/// The identifier is stable throughout the lifetime of the [`Hierarchy`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeID(usize);

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeID>,
    children: Vec<NodeID>,
}

impl Hierarchy {
    /// Creates an empty [`Hierarchy`].
    #[inline]
    #[must_use]
    pub fn new() -> Hierarchy {
        Hierarchy::default()
    }

    /// Adds a new root resource.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::Hierarchy;
    ///
    /// let mut hierarchy = Hierarchy::new();
    /// let database = hierarchy.add_root("database");
    /// assert!(hierarchy.parent(database).is_none());
    /// ```
    #[inline]
    pub fn add_root<N: Into<String>>(&mut self, name: N) -> NodeID {
        self.push(name.into(), None)
    }

    /// Adds a new child resource under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `parent` does not exist, or [`Error::DuplicateName`] if
    /// `parent` already has a child of the same name.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::{Error, Hierarchy};
    ///
    /// let mut hierarchy = Hierarchy::new();
    /// let database = hierarchy.add_root("database");
    /// let table = hierarchy.add_child(database, "table").unwrap();
    /// assert_eq!(hierarchy.parent(table), Some(database));
    /// assert_eq!(hierarchy.add_child(database, "table"), Err(Error::DuplicateName));
    /// ```
    #[inline]
    pub fn add_child<N: Into<String>>(&mut self, parent: NodeID, name: N) -> Result<NodeID, Error> {
        let name = name.into();
        if !self.contains(parent) {
            return Err(Error::NotFound);
        }
        if self.child(parent, &name).is_some() {
            return Err(Error::DuplicateName);
        }
        let child = self.push(name, Some(parent));
        self.nodes[parent.0].children.push(child);
        Ok(child)
    }

    /// Returns `true` if the [`Hierarchy`] contains the resource.
    #[inline]
    #[must_use]
    pub fn contains(&self, node: NodeID) -> bool {
        node.0 < self.nodes.len()
    }

    /// Returns the number of resources.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no resources.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the parent of the resource.
    #[inline]
    #[must_use]
    pub fn parent(&self, node: NodeID) -> Option<NodeID> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    /// Returns the children of the resource.
    #[inline]
    #[must_use]
    pub fn children(&self, node: NodeID) -> &[NodeID] {
        self.nodes.get(node.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Returns the name of the resource.
    #[inline]
    #[must_use]
    pub fn name(&self, node: NodeID) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.name.as_str())
    }

    /// Finds the child of `parent` by name.
    #[inline]
    #[must_use]
    pub fn child(&self, parent: NodeID, name: &str) -> Option<NodeID> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.name(*c) == Some(name))
    }

    /// Returns an iterator over the ancestors of the resource, starting from its parent and
    /// ending at the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::Hierarchy;
    ///
    /// let mut hierarchy = Hierarchy::new();
    /// let database = hierarchy.add_root("database");
    /// let table = hierarchy.add_child(database, "table").unwrap();
    /// let record = hierarchy.add_child(table, "1").unwrap();
    /// assert_eq!(hierarchy.ancestors(record).collect::<Vec<_>>(), vec![table, database]);
    /// ```
    #[inline]
    pub fn ancestors(&self, node: NodeID) -> impl Iterator<Item = NodeID> + '_ {
        let mut current = self.parent(node);
        std::iter::from_fn(move || {
            let ancestor = current?;
            current = self.parent(ancestor);
            Some(ancestor)
        })
    }

    /// Returns `true` if `node` is a strict descendant of `ancestor`.
    #[inline]
    #[must_use]
    pub fn is_descendant(&self, node: NodeID, ancestor: NodeID) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Returns the `/`-separated names of the resource and all its ancestors.
    ///
    /// # Examples
    ///
    /// ```
    /// use sap_mgl::Hierarchy;
    ///
    /// let mut hierarchy = Hierarchy::new();
    /// let database = hierarchy.add_root("database");
    /// let table = hierarchy.add_child(database, "table").unwrap();
    /// assert_eq!(hierarchy.path(table), "database/table");
    /// ```
    #[inline]
    #[must_use]
    pub fn path(&self, node: NodeID) -> String {
        let mut names: Vec<&str> = self.ancestors(node).filter_map(|a| self.name(a)).collect();
        names.reverse();
        names.extend(self.name(node));
        names.join("/")
    }

    fn push(&mut self, name: String, parent: Option<NodeID>) -> NodeID {
        let node = NodeID(self.nodes.len());
        self.nodes.push(Node {
            name,
            parent,
            children: Vec::new(),
        });
        node
    }
}

impl NodeID {
    /// Returns the arena index of the resource.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeID {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
