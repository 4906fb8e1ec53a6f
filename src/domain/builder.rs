//! Fluent, validating builder for [`TreeStore`] hierarchies.
//!
//! The builder keeps a cursor (the store receiving insertions) and a stack of
//! open scopes. Each scope carries the rule table resolved from the
//! [`Schema`] when it was opened and its own child counters, so validation
//! never looks anything up by name after the scope exists.
//!
//! ```text
//! root ──open_branch(t)──→ scope t ──close_branch()──→ root
//!   │                        │  ↺ leaf / open_branch
//!   └──────── finish() auto-closes every open scope, checking each ──┘
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::schema::{ChildRules, Schema};
use crate::domain::store::{StoreId, TreeStore};
use crate::domain::value::{Attributes, Value};

/// One open scope on the builder stack.
#[derive(Debug)]
struct Scope {
    store: StoreId,
    /// None for the root scope
    tag: Option<String>,
    /// None means no constraints
    rules: Option<Rc<ChildRules>>,
    counts: HashMap<String, u32>,
}

impl Scope {
    fn new(store: StoreId, tag: Option<String>, rules: Option<Rc<ChildRules>>) -> Self {
        Self {
            store,
            tag,
            rules,
            counts: HashMap::new(),
        }
    }

    fn count(&self, tag: &str) -> u32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    fn name(&self) -> String {
        self.tag.clone().unwrap_or_else(|| "root".to_string())
    }
}

/// Builds a [`TreeStore`] through open/leaf/close calls.
///
/// All methods that can fail leave the tree as it was before the call;
/// siblings committed earlier stay in place and [`TreeStoreBuilder::tree`]
/// can still inspect them.
#[derive(Debug)]
pub struct TreeStoreBuilder {
    tree: TreeStore,
    schema: Schema,
    /// Never empty; index 0 is the root scope
    scopes: Vec<Scope>,
}

impl Default for TreeStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStoreBuilder {
    /// Unconstrained builder: any tag, any count.
    pub fn new() -> Self {
        Self::with_schema(Schema::new())
    }

    pub fn with_schema(schema: Schema) -> Self {
        let tree = TreeStore::new();
        let root = Scope::new(tree.root_id(), None, None);
        Self {
            tree,
            schema,
            scopes: vec![root],
        }
    }

    /// Create a branch node and descend into it.
    ///
    /// `name` is used verbatim as the label when given and non-empty, otherwise
    /// the label is generated as `{tag}_{n}`.
    #[instrument(level = "debug", skip(self, attributes))]
    pub fn open_branch(
        &mut self,
        tag: &str,
        name: Option<&str>,
        attributes: Attributes,
    ) -> DomainResult<&mut Self> {
        self.validate_child(tag)?;
        let label = self.label_for(tag, name)?;

        let cursor = self.cursor();
        let node = self.tree.add_branch(cursor, label, attributes)?;
        let child = self.tree.branch_of(node)?;
        self.tree.set_tag(child, tag)?;
        self.increment(tag);

        let rules = self.schema.rules_for(tag);
        self.scopes
            .push(Scope::new(child, Some(tag.to_string()), rules));
        Ok(self)
    }

    /// Create a leaf node; the cursor stays where it is.
    #[instrument(level = "debug", skip(self, value, attributes))]
    pub fn leaf(
        &mut self,
        tag: &str,
        value: impl Into<Value>,
        name: Option<&str>,
        attributes: Attributes,
    ) -> DomainResult<&mut Self> {
        self.validate_child(tag)?;
        let label = self.label_for(tag, name)?;

        let cursor = self.cursor();
        self.tree.add_leaf(cursor, label, attributes, value)?;
        self.increment(tag);
        Ok(self)
    }

    /// Leave the current scope after checking its mandatory children.
    #[instrument(level = "debug", skip(self))]
    pub fn close_branch(&mut self) -> DomainResult<&mut Self> {
        if self.scopes.len() <= 1 {
            return Err(DomainError::InvalidScopeTransition);
        }
        self.validate_mandatory()?;
        if let Some(scope) = self.scopes.pop() {
            debug!(tag = ?scope.tag, "closed scope");
        }
        Ok(self)
    }

    /// Close every open scope, checking each one on the way up.
    ///
    /// Stops at the first scope missing a mandatory child; the scopes below it
    /// have already been closed.
    pub fn unwind(&mut self) -> DomainResult<()> {
        while self.scopes.len() > 1 {
            self.close_branch()?;
        }
        Ok(())
    }

    /// Unwind to the root and hand over the finished tree.
    ///
    /// On failure the builder keeps the partial tree and the scopes still open,
    /// so [`tree`](Self::tree) can inspect what was built. On success the
    /// builder starts over with an empty tree.
    pub fn finish(&mut self) -> DomainResult<TreeStore> {
        self.unwind()?;
        let tree = std::mem::take(&mut self.tree);
        self.scopes = vec![Scope::new(self.tree.root_id(), None, None)];
        Ok(tree)
    }

    /// The tree as built so far.
    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    /// Store currently receiving insertions.
    pub fn cursor(&self) -> StoreId {
        self.current().store
    }

    /// Tag of the innermost open scope, None at root.
    pub fn current_tag(&self) -> Option<&str> {
        self.current().tag.as_deref()
    }

    /// Number of open scopes above the root.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Children of `tag` added to the current scope so far.
    pub fn child_count(&self, tag: &str) -> u32 {
        self.current().count(tag)
    }

    fn current(&self) -> &Scope {
        // scopes is never empty: the root scope is never popped
        &self.scopes[self.scopes.len() - 1]
    }

    fn validate_child(&self, tag: &str) -> DomainResult<()> {
        if !self.schema.is_allowed(tag) {
            return Err(DomainError::TagNotAllowed(tag.to_string()));
        }

        let scope = self.current();
        let Some(rules) = &scope.rules else {
            return Ok(());
        };

        let Some(rule) = rules.get(tag) else {
            return Err(DomainError::InvalidChild {
                tag: tag.to_string(),
                scope: scope.name(),
                allowed: rules.describe(),
            });
        };

        let found = scope.count(tag);
        if rule.is_full(found) {
            return Err(DomainError::TooManyChildren {
                tag: tag.to_string(),
                scope: scope.name(),
                max: rule.max.unwrap_or(found),
                found,
            });
        }
        Ok(())
    }

    fn validate_mandatory(&self) -> DomainResult<()> {
        let scope = self.current();
        let Some(rules) = &scope.rules else {
            return Ok(());
        };

        for (tag, rule) in rules.mandatory() {
            let found = scope.count(tag);
            if found < rule.min {
                return Err(DomainError::MissingMandatoryChild {
                    tag: tag.to_string(),
                    scope: scope.name(),
                    required: rule.min,
                    found,
                });
            }
        }
        Ok(())
    }

    fn label_for(&self, tag: &str, name: Option<&str>) -> DomainResult<String> {
        match name {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => self.generate_label(tag),
        }
    }

    /// `{tag}_{n}` where n counts existing labels equal to `tag` or prefixed `{tag}_`.
    fn generate_label(&self, tag: &str) -> DomainResult<String> {
        let prefix = format!("{tag}_");
        let existing = self
            .tree
            .store(self.cursor())?
            .labels()
            .filter(|label| *label == tag || label.starts_with(&prefix))
            .count();
        Ok(format!("{tag}_{existing}"))
    }

    fn increment(&mut self, tag: &str) {
        let last = self.scopes.len() - 1;
        *self.scopes[last].counts.entry(tag.to_string()).or_insert(0) += 1;
    }
}
