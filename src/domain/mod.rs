//! Domain layer: the tree store, its cardinality rules and the builder
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod builder;
pub mod cardinality;
pub mod error;
pub mod schema;
pub mod store;
pub mod value;

pub use builder::TreeStoreBuilder;
pub use cardinality::{Cardinality, CardinalitySpec};
pub use error::{DomainError, DomainResult};
pub use schema::{ChildRules, Schema};
pub use store::{Content, NodeId, NodeRef, StoreId, StoreRef, TreeStore, Walk};
pub use value::{fold_list, Attributes, Entry, Mapping, Value};
