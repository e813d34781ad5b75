use std::collections::HashSet;

use tracing::info;

use crate::error::StoreError;
use crate::store::{id_from_key, RecordStore};

/// IDs already persisted in `container`.
///
/// A missing container is created and reported as empty. Object names that do
/// not follow the `<id>.json` convention are ignored.
pub fn load_existing(store: &dyn RecordStore, container: &str) -> Result<HashSet<String>, StoreError> {
    let keys = match store.list_keys(container) {
        Ok(keys) => keys,
        Err(StoreError::ContainerNotFound(_)) => {
            info!(container, "container missing, creating it");
            store.create_container(container)?;
            return Ok(HashSet::new());
        }
        Err(e) => return Err(e),
    };

    Ok(keys
        .iter()
        .filter_map(|key| id_from_key(key))
        .map(str::to_string)
        .collect())
}
