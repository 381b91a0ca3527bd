//! Dimension Resolver - get-or-create a `banks` row per distinct label.
//!
//! Lookup-then-insert is only correct with a single writer. Concurrent
//! loaders would need `INSERT ... ON CONFLICT DO NOTHING` plus a re-select.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::LoadError;
use crate::store::ReviewStore;

/// Label to surrogate id mapping for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityIds {
    ids: HashMap<String, i64>,
    /// Labels created during this run, in creation order.
    created: Vec<String>,
}

impl EntityIds {
    pub fn get(&self, label: &str) -> Option<i64> {
        self.ids.get(label).copied()
    }

    /// Number of labels resolved, found or created.
    pub fn resolved_count(&self) -> usize {
        self.ids.len()
    }

    pub fn created(&self) -> &[String] {
        &self.created
    }
}

/// Resolves every label, creating missing rows. Each creation is committed
/// immediately so the generated id survives a later rollback.
pub async fn resolve_entities<S: ReviewStore>(
    store: &mut S,
    labels: &[String],
) -> Result<EntityIds, LoadError> {
    let mut resolved = EntityIds::default();

    for label in labels {
        if resolved.ids.contains_key(label) {
            continue;
        }
        let wrap = |source| LoadError::Resolve {
            label: label.clone(),
            source,
        };

        let id = match store.find_entity(label).await.map_err(wrap)? {
            Some(id) => {
                debug!(label = %label, id, "found existing entity");
                id
            }
            None => {
                let id = store.create_entity(label).await.map_err(wrap)?;
                store.commit().await.map_err(wrap)?;
                info!(label = %label, id, "created entity");
                resolved.created.push(label.clone());
                id
            }
        };
        resolved.ids.insert(label.clone(), id);
    }

    Ok(resolved)
}
