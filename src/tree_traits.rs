/*
Rendering lives in a trait so the domain views stay free of terminal concerns.
termtree::Tree is foreign, so the conversion is a trait on our side (E0116).
 */
use itertools::Itertools;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{Content, NodeRef, StoreRef, TreeStore};

pub trait ToTermTree {
    fn to_term_tree(&self) -> Tree<String>;
}

fn node_caption(node: &NodeRef<'_>) -> String {
    let attrs = node.attributes();
    let attrs = if attrs.is_empty() {
        String::new()
    } else {
        format!(
            " [{}]",
            attrs.iter().map(|(k, v)| format!("{k}={v}")).join(", ")
        )
    };
    match node.content() {
        Content::Scalar(v) => format!("{}{} = {}", node.label(), attrs, v),
        Content::Branch(_) => format!("{}{}", node.label(), attrs),
    }
}

impl ToTermTree for NodeRef<'_> {
    fn to_term_tree(&self) -> Tree<String> {
        let leaves: Vec<_> = self
            .branch()
            .map(|store| store.nodes().map(|n| n.to_term_tree()).collect())
            .unwrap_or_default();
        Tree::new(node_caption(self)).with_leaves(leaves)
    }
}

impl ToTermTree for StoreRef<'_> {
    #[instrument(level = "trace", skip(self))]
    fn to_term_tree(&self) -> Tree<String> {
        let caption = match self.parent() {
            Some(node) => node.label().to_string(),
            None => ".".to_string(),
        };
        let leaves: Vec<_> = self.nodes().map(|n| n.to_term_tree()).collect();
        Tree::new(caption).with_leaves(leaves)
    }
}

impl ToTermTree for TreeStore {
    fn to_term_tree(&self) -> Tree<String> {
        self.root().to_term_tree()
    }
}
