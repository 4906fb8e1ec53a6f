//! Declarative child rules for typed builders.
//!
//! A [`Schema`] maps a scope tag (the tag passed to `open_branch`) to the
//! [`ChildRules`] that apply inside that scope, plus an optional builder-wide
//! whitelist of tags. Rule tables are shared with open scopes through `Rc`, so
//! the builder resolves a table once when a scope opens.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use crate::domain::cardinality::{Cardinality, CardinalitySpec};
use crate::domain::error::DomainResult;

/// Allowed child tags of one scope with their cardinality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildRules {
    rules: IndexMap<String, Cardinality>,
}

impl ChildRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Option<Cardinality> {
        self.rules.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.rules.contains_key(tag)
    }

    pub fn insert(&mut self, tag: impl Into<String>, rule: Cardinality) {
        self.rules.insert(tag.into(), rule);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Cardinality)> {
        self.rules.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// Rules with `min > 0`.
    pub fn mandatory(&self) -> impl Iterator<Item = (&str, Cardinality)> {
        self.iter().filter(|(_, c)| c.is_mandatory())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Comma-separated allowed tags, for error messages.
    pub fn describe(&self) -> String {
        self.rules.keys().join(", ")
    }
}

/// Rule registry for one kind of builder.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    scopes: IndexMap<String, Rc<ChildRules>>,
    allowed_tags: Option<IndexSet<String>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bare-list form: every listed tag is allowed zero or more times in `scope`.
    pub fn valid_children<I, S>(mut self, scope: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = self.rules_mut(scope);
        for tag in tags {
            rules.insert(tag, Cardinality::ANY);
        }
        self
    }

    /// Explicit form: each tag with its own spec. Fails on the first malformed spec,
    /// leaving the schema untouched.
    pub fn constrain<I, S, C>(mut self, scope: &str, specs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<CardinalitySpec>,
    {
        let mut parsed = Vec::new();
        for (tag, spec) in specs {
            let tag = tag.into();
            let rule = spec.into().resolve(&tag)?;
            parsed.push((tag, rule));
        }
        let rules = self.rules_mut(scope);
        for (tag, rule) in parsed {
            rules.insert(tag, rule);
        }
        Ok(self)
    }

    /// Builder-wide whitelist; any tag outside it is rejected in every scope.
    pub fn allow_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn rules_for(&self, scope: &str) -> Option<Rc<ChildRules>> {
        self.scopes.get(scope).cloned()
    }

    /// True when no whitelist is set or `tag` is on it.
    pub fn is_allowed(&self, tag: &str) -> bool {
        self.allowed_tags
            .as_ref()
            .map_or(true, |allowed| allowed.contains(tag))
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&str, &ChildRules)> {
        self.scopes.iter().map(|(s, r)| (s.as_str(), r.as_ref()))
    }

    pub fn allowed_tags(&self) -> Option<&IndexSet<String>> {
        self.allowed_tags.as_ref()
    }

    fn rules_mut(&mut self, scope: &str) -> &mut ChildRules {
        let entry = self.scopes.entry(scope.to_string()).or_default();
        Rc::make_mut(entry)
    }
}
