//! Application layer: loading, merging and feeding mappings into trees
//!
//! This layer does the I/O around the domain types.

pub mod error;
pub mod error_ext;
pub mod feed;
pub mod loaders;
pub mod options;
pub mod sources;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use feed::{build_tree, feed_mapping};
pub use loaders::{load_env, load_file, load_schema, parse_schema};
pub use options::{extract_prefixed, merge_options, MergeFilter, Options};
pub use sources::{auto_convert, deep_merge, flatten, MultiSource, Source};
