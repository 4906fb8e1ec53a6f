//! Arena-backed hierarchical store.
//!
//! A [`TreeStore`] owns every level ("store") and every node of one hierarchy in
//! two generational arenas. Nodes own their branch store through
//! [`Content::Branch`]; each store keeps a non-owning back-reference to the node
//! holding it, which is only used for upward navigation (`root`, `depth`).
//! Ids held inside the tree are always live: removing a node frees its whole
//! subtree in the same step.

use generational_arena::{Arena, Index};
use indexmap::IndexMap;
use tracing::trace;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::value::{Attributes, Entry, Mapping, Value};

/// Handle of one store level inside a [`TreeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(Index);

/// Handle of one node inside a [`TreeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

/// Payload of a node: exactly one of scalar or child store.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Scalar(Value),
    Branch(StoreId),
}

#[derive(Debug)]
struct Store {
    /// Label -> node, in insertion order
    nodes: IndexMap<String, NodeId>,
    /// Node holding this store as its branch, None for the root store
    parent: Option<NodeId>,
    /// Builder tag that opened this scope
    tag: Option<String>,
}

impl Store {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            nodes: IndexMap::new(),
            parent,
            tag: None,
        }
    }
}

#[derive(Debug)]
struct Node {
    label: String,
    attributes: Attributes,
    content: Content,
    /// Store containing this node
    owner: StoreId,
}

/// One complete hierarchy: a root store and everything below it.
#[derive(Debug)]
pub struct TreeStore {
    stores: Arena<Store>,
    nodes: Arena<Node>,
    root: StoreId,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    pub fn new() -> Self {
        let mut stores = Arena::new();
        let root = StoreId(stores.insert(Store::new(None)));
        Self {
            stores,
            nodes: Arena::new(),
            root,
        }
    }

    pub fn root_id(&self) -> StoreId {
        self.root
    }

    /// View of the root store.
    pub fn root(&self) -> StoreRef<'_> {
        self.store_ref(self.root)
    }

    pub fn store(&self, id: StoreId) -> DomainResult<StoreRef<'_>> {
        if self.stores.contains(id.0) {
            Ok(self.store_ref(id))
        } else {
            Err(DomainError::StoreNotFound)
        }
    }

    pub fn node(&self, id: NodeId) -> DomainResult<NodeRef<'_>> {
        if self.nodes.contains(id.0) {
            Ok(self.node_ref(id))
        } else {
            Err(DomainError::NodeNotFound)
        }
    }

    /// Insert a scalar-valued node under `store`.
    ///
    /// An existing node with the same label is replaced in place (same
    /// iteration position) and its subtree is freed.
    pub fn add_leaf(
        &mut self,
        store: StoreId,
        label: impl Into<String>,
        attributes: Attributes,
        value: impl Into<Value>,
    ) -> DomainResult<NodeId> {
        if !self.stores.contains(store.0) {
            return Err(DomainError::StoreNotFound);
        }
        let label = label.into();
        trace!(label = %label, "add leaf");
        let id = NodeId(self.nodes.insert(Node {
            label: label.clone(),
            attributes,
            content: Content::Scalar(value.into()),
            owner: store,
        }));
        self.link(store, label, id);
        Ok(id)
    }

    /// Insert a branch node under `store`, creating its child store.
    ///
    /// Same overwrite rule as [`TreeStore::add_leaf`]. The child store is
    /// reachable with [`TreeStore::branch_of`].
    pub fn add_branch(
        &mut self,
        store: StoreId,
        label: impl Into<String>,
        attributes: Attributes,
    ) -> DomainResult<NodeId> {
        if !self.stores.contains(store.0) {
            return Err(DomainError::StoreNotFound);
        }
        let label = label.into();
        trace!(label = %label, "add branch");
        let child = StoreId(self.stores.insert(Store::new(None)));
        let id = NodeId(self.nodes.insert(Node {
            label: label.clone(),
            attributes,
            content: Content::Branch(child),
            owner: store,
        }));
        self.stores[child.0].parent = Some(id);
        self.link(store, label, id);
        Ok(id)
    }

    /// Child store of a branch node.
    pub fn branch_of(&self, node: NodeId) -> DomainResult<StoreId> {
        let data = self.nodes.get(node.0).ok_or(DomainError::NodeNotFound)?;
        match data.content {
            Content::Branch(child) => Ok(child),
            Content::Scalar(_) => Err(DomainError::NotABranch(data.label.clone())),
        }
    }

    pub(crate) fn set_tag(&mut self, store: StoreId, tag: &str) -> DomainResult<()> {
        let data = self
            .stores
            .get_mut(store.0)
            .ok_or(DomainError::StoreNotFound)?;
        if data.tag.is_none() {
            data.tag = Some(tag.to_string());
        }
        Ok(())
    }

    /// Number of live nodes in the whole hierarchy.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn as_mapping(&self) -> Mapping {
        self.root().as_mapping()
    }

    pub fn walk(&self) -> Walk<'_> {
        self.root().walk()
    }

    fn link(&mut self, store: StoreId, label: String, id: NodeId) {
        let replaced = self.stores[store.0].nodes.insert(label, id);
        if let Some(old) = replaced {
            self.release(old);
        }
    }

    /// Free a node and every store/node below it.
    fn release(&mut self, node: NodeId) {
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            let Some(data) = self.nodes.remove(id.0) else {
                continue;
            };
            trace!(label = %data.label, "release node");
            if let Content::Branch(child) = data.content {
                if let Some(store) = self.stores.remove(child.0) {
                    pending.extend(store.nodes.into_values());
                }
            }
        }
    }

    fn store_ref(&self, id: StoreId) -> StoreRef<'_> {
        StoreRef {
            tree: self,
            id,
            data: &self.stores[id.0],
        }
    }

    fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id,
            data: &self.nodes[id.0],
        }
    }
}

/// Read view of one store level.
#[derive(Debug, Clone, Copy)]
pub struct StoreRef<'a> {
    tree: &'a TreeStore,
    id: StoreId,
    data: &'a Store,
}

impl<'a> StoreRef<'a> {
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Builder tag that opened this scope, if any.
    pub fn tag(&self) -> Option<&'a str> {
        let data: &'a Store = self.data;
        data.tag.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nodes.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.data.nodes.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<NodeRef<'a>> {
        let tree = self.tree;
        self.data.nodes.get(label).map(|&id| tree.node_ref(id))
    }

    pub fn labels(&self) -> impl Iterator<Item = &'a str> + 'a {
        let data: &'a Store = self.data;
        data.nodes.keys().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let (tree, data): (&'a TreeStore, &'a Store) = (self.tree, self.data);
        data.nodes.values().map(move |&id| tree.node_ref(id))
    }

    /// Node holding this store, None for the root store.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data.parent.map(|id| self.tree.node_ref(id))
    }

    pub fn is_root(&self) -> bool {
        self.data.parent.is_none()
    }

    pub fn root(&self) -> StoreRef<'a> {
        let mut current = *self;
        while let Some(node) = current.parent() {
            current = node.parent();
        }
        current
    }

    /// 0 for the root store, +1 per branch level.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = *self;
        while let Some(node) = current.parent() {
            current = node.parent();
            depth += 1;
        }
        depth
    }

    /// Owned projection into a plain nested mapping.
    ///
    /// Leaves project to their value. Branches project to their attributes
    /// merged with the child mapping; on a key collision the child wins.
    pub fn as_mapping(&self) -> Mapping {
        let mut out = Mapping::with_capacity(self.len());
        for node in self.nodes() {
            let entry = match node.content() {
                Content::Scalar(v) => Entry::Scalar(v.clone()),
                Content::Branch(child) => {
                    let mut merged: Mapping = node
                        .attributes()
                        .iter()
                        .map(|(k, v)| (k.clone(), Entry::Scalar(v.clone())))
                        .collect();
                    merged.extend(self.tree.store_ref(*child).as_mapping());
                    Entry::Map(merged)
                }
            };
            out.insert(node.label().to_string(), entry);
        }
        out
    }

    /// Depth-first `(dotted.path, node)` pairs in insertion order.
    pub fn walk(&self) -> Walk<'a> {
        let data: &'a Store = self.data;
        Walk {
            tree: self.tree,
            stack: vec![(data.nodes.iter(), None)],
        }
    }
}

/// Read view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a TreeStore,
    id: NodeId,
    data: &'a Node,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &'a str {
        let data: &'a Node = self.data;
        &data.label
    }

    pub fn attributes(&self) -> &'a Attributes {
        let data: &'a Node = self.data;
        &data.attributes
    }

    pub fn content(&self) -> &'a Content {
        let data: &'a Node = self.data;
        &data.content
    }

    /// Scalar value, None for branches.
    pub fn value(&self) -> Option<&'a Value> {
        match self.content() {
            Content::Scalar(v) => Some(v),
            Content::Branch(_) => None,
        }
    }

    /// Child store, None for leaves.
    pub fn branch(&self) -> Option<StoreRef<'a>> {
        match self.data.content {
            Content::Branch(child) => Some(self.tree.store_ref(child)),
            Content::Scalar(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.data.content, Content::Scalar(_))
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.data.content, Content::Branch(_))
    }

    /// Store containing this node.
    pub fn parent(&self) -> StoreRef<'a> {
        self.tree.store_ref(self.data.owner)
    }

    pub fn root(&self) -> StoreRef<'a> {
        self.parent().root()
    }
}

/// Lazy depth-first traversal, see [`StoreRef::walk`].
pub struct Walk<'a> {
    tree: &'a TreeStore,
    stack: Vec<(indexmap::map::Iter<'a, String, NodeId>, Option<String>)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (String, NodeRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let tree: &'a TreeStore = self.tree;
        loop {
            let (iter, prefix) = self.stack.last_mut()?;
            let Some((label, &id)) = iter.next() else {
                self.stack.pop();
                continue;
            };
            let path = match prefix {
                Some(p) => format!("{p}.{label}"),
                None => label.clone(),
            };
            let node = tree.node_ref(id);
            if let Content::Branch(child) = node.content() {
                let store = &tree.stores[child.0];
                self.stack.push((store.nodes.iter(), Some(path.clone())));
            }
            return Some((path, node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    #[test]
    fn given_branch_when_added_then_child_points_back_to_node() {
        let mut tree = TreeStore::new();
        let users = tree
            .add_branch(tree.root_id(), "users", attrs! { "type" => "list" })
            .unwrap();
        let child = tree.branch_of(users).unwrap();

        let store = tree.store(child).unwrap();
        assert_eq!(store.parent().map(|n| n.id()), Some(users));
        assert!(tree.node(users).unwrap().is_branch());
        assert!(!tree.node(users).unwrap().is_leaf());
    }

    #[test]
    fn given_leaf_when_asking_for_branch_then_errors() {
        let mut tree = TreeStore::new();
        let leaf = tree
            .add_leaf(tree.root_id(), "name", Attributes::new(), "Alice")
            .unwrap();
        assert_eq!(
            tree.branch_of(leaf),
            Err(DomainError::NotABranch("name".into()))
        );
    }

    #[test]
    fn given_overwritten_branch_when_replaced_then_subtree_is_freed() {
        let mut tree = TreeStore::new();
        let root = tree.root_id();
        let a = tree.add_branch(root, "a", Attributes::new()).unwrap();
        let inner = tree.branch_of(a).unwrap();
        tree.add_leaf(inner, "x", Attributes::new(), 1).unwrap();
        assert_eq!(tree.node_count(), 2);

        tree.add_leaf(root, "a", Attributes::new(), "flat").unwrap();

        assert_eq!(tree.node_count(), 1);
        assert!(tree.store(inner).is_err());
        assert!(tree.node(a).is_err());
    }

    #[test]
    fn given_stale_store_id_when_adding_then_errors() {
        let mut tree = TreeStore::new();
        let root = tree.root_id();
        let a = tree.add_branch(root, "a", Attributes::new()).unwrap();
        let inner = tree.branch_of(a).unwrap();
        tree.add_leaf(root, "a", Attributes::new(), 0).unwrap();

        let result = tree.add_leaf(inner, "x", Attributes::new(), 1);
        assert_eq!(result, Err(DomainError::StoreNotFound));
    }
}
