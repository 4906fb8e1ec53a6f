//! Hierarchical tree store with a validating builder.
//!
//! - [`domain`]: [`TreeStore`](domain::TreeStore) arena, cardinality rules,
//!   [`Schema`](domain::Schema) and [`TreeStoreBuilder`](domain::TreeStoreBuilder)
//! - [`application`]: file/env loaders, multi-source merging, option helpers,
//!   feeding mappings into builders
//! - [`cli`]: the `treestore` command

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod macros;
pub mod tree_traits;
pub mod util;
