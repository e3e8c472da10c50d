use super::query::{filter_by_query, project, QueryParams};
use super::record::{Association, AssociationField, AssociationUpdate};
use super::store::{all_records, AssociationStore, StoreError};
use crate::signature::Signature;
use crate::status::Status;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Signature string → projected association fields
pub type AssociationMap = BTreeMap<String, Map<String, Value>>;

/// Association operation errors
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationError {
    /// Record (or the requested property) does not exist
    NotFound,
    StoreUnavailable(StoreError),
}

impl AssociationError {
    pub fn status(&self) -> Status {
        match self {
            AssociationError::NotFound => Status::NotFound,
            AssociationError::StoreUnavailable(_) => Status::BadRequest,
        }
    }
}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationError::NotFound => write!(f, "association not found"),
            AssociationError::StoreUnavailable(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AssociationError {}

impl From<StoreError> for AssociationError {
    fn from(e: StoreError) -> Self {
        AssociationError::StoreUnavailable(e)
    }
}

/// Receives the full record set after every mutation
#[async_trait]
pub trait AssociationObserver: Send + Sync {
    async fn associations_changed(
        &self,
        associations: &BTreeMap<String, Association>,
    ) -> anyhow::Result<()>;
}

/// CRUD and property-level mutation of association records
pub struct AssociationsManager {
    store: Arc<dyn AssociationStore>,
    observer: Option<Arc<dyn AssociationObserver>>,
}

impl AssociationsManager {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self {
            store,
            observer: None,
        }
    }

    /// Attach a downstream observer notified after each mutation
    pub fn with_observer(mut self, observer: Arc<dyn AssociationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Underlying store, shared with the context engine
    pub fn store(&self) -> Arc<dyn AssociationStore> {
        Arc::clone(&self.store)
    }

    /// Retrieve one record (optionally one property of it), or scan all
    /// records through `params` when no signature is given.
    pub async fn retrieve(
        &self,
        signature: Option<&Signature>,
        property: Option<AssociationField>,
        params: &QueryParams,
    ) -> Result<AssociationMap, AssociationError> {
        let mut associations = AssociationMap::new();

        let Some(signature) = signature else {
            let records = self.store.find(&all_records).await?;
            for (key, record) in records {
                if record.is_empty() {
                    continue;
                }
                if let Some(projected) = filter_by_query(&record, params) {
                    associations.insert(key, projected);
                }
            }
            return Ok(associations);
        };

        let key = signature.to_string();
        let record = self
            .store
            .get(&key)
            .await?
            .ok_or(AssociationError::NotFound)?;

        let projected = match property {
            Some(property) => {
                let value = record.field(property).ok_or(AssociationError::NotFound)?;
                let mut map = Map::new();
                map.insert(property.as_str().to_string(), value);
                map
            }
            None => project(&record, params.include.as_deref()),
        };
        associations.insert(key, projected);

        Ok(associations)
    }

    /// Non-destructive partial update; creates the record if absent.
    ///
    /// Returns the merged record and `Created` or `Ok`.
    pub async fn replace(
        &self,
        signature: &Signature,
        update: &AssociationUpdate,
    ) -> Result<(Association, Status), AssociationError> {
        let key = signature.to_string();
        let existing = self.store.get(&key).await?;
        let status = if existing.is_some() {
            Status::Ok
        } else {
            Status::Created
        };

        let mut record = existing.unwrap_or_default();
        record.apply(update);
        self.store.set(&key, &record).await?;

        info!(signature = %signature, status = %status, "Association replaced");
        self.notify_observer();

        Ok((record, status))
    }

    /// Delete one property, or the whole record when `property` is `None`.
    ///
    /// Removing the last property leaves an empty record in place.
    pub async fn remove(
        &self,
        signature: &Signature,
        property: Option<AssociationField>,
    ) -> Result<(), AssociationError> {
        let key = signature.to_string();

        match property {
            Some(property) => {
                let mut record = self
                    .store
                    .get(&key)
                    .await?
                    .ok_or(AssociationError::NotFound)?;
                if !record.remove_field(property) {
                    return Err(AssociationError::NotFound);
                }
                self.store.set(&key, &record).await?;
                info!(signature = %signature, property = %property, "Association property removed");
            }
            None => {
                if !self.store.delete(&key).await? {
                    return Err(AssociationError::NotFound);
                }
                info!(signature = %signature, "Association removed");
            }
        }

        self.notify_observer();
        Ok(())
    }

    /// Fire-and-forget notification; failures are logged, never surfaced
    fn notify_observer(&self) {
        let Some(observer) = self.observer.clone() else {
            return;
        };
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let associations = match store.find(&all_records).await {
                Ok(associations) => associations,
                Err(e) => {
                    warn!(error = %e, "Failed to read associations for observer");
                    return;
                }
            };
            if let Err(e) = observer.associations_changed(&associations).await {
                warn!(error = %e, "Association observer failed");
            }
        });
    }
}
