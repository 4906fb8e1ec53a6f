//! Build trees from nested mappings.

use tracing::{instrument, trace};

use crate::application::ApplicationResult;
use crate::domain::{Attributes, DomainResult, Entry, Mapping, Schema, TreeStore, TreeStoreBuilder};

/// Feed every entry of `mapping` into `builder` at its current cursor.
///
/// A nested map opens a branch tagged and named by its key, a scalar becomes
/// a leaf tagged and named by its key. Entry order is kept.
pub fn feed_mapping(builder: &mut TreeStoreBuilder, mapping: &Mapping) -> DomainResult<()> {
    for (key, entry) in mapping {
        match entry {
            Entry::Map(inner) => {
                trace!(key = %key, "branch");
                builder.open_branch(key, Some(key.as_str()), Attributes::new())?;
                feed_mapping(builder, inner)?;
                builder.close_branch()?;
            }
            Entry::Scalar(value) => {
                builder.leaf(key, value.clone(), Some(key.as_str()), Attributes::new())?;
            }
        }
    }
    Ok(())
}

/// New builder over `schema`, fed with `mapping` and finished.
#[instrument(level = "debug", skip_all, fields(keys = mapping.len()))]
pub fn build_tree(mapping: &Mapping, schema: Schema) -> ApplicationResult<TreeStore> {
    let mut builder = TreeStoreBuilder::with_schema(schema);
    feed_mapping(&mut builder, mapping)?;
    Ok(builder.finish()?)
}
