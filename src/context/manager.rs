use crate::association::{
    directory_prefix_match, trim_bag, Association, AssociationStore, QueryParams, StoreError,
};
use crate::live::{DeviceFilter, DeviceStates, LiveContextSource, RetrieveOptions};
use crate::signature::{ParseError, Signature};
use crate::status::Status;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which devices a context query resolves to, in priority order
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSelector {
    Signature(Signature),
    /// Identifier without a type: every signature sharing it
    Identifier(String),
    Directory(String),
    Tag(String),
    /// Every device the primary source knows
    All,
}

impl DeviceSelector {
    /// Pick exactly one resolution path: id (optionally typed), then
    /// directory, then tag, then everything.
    pub fn resolve(
        id: Option<&str>,
        id_type: Option<&str>,
        directory: Option<&str>,
        tag: Option<&str>,
    ) -> Result<Self, ParseError> {
        if let Some(id) = id {
            return match id_type {
                Some(id_type) => Ok(DeviceSelector::Signature(Signature::new(id, id_type)?)),
                None => Ok(DeviceSelector::Identifier(id.to_string())),
            };
        }
        if let Some(directory) = directory {
            return Ok(DeviceSelector::Directory(directory.to_string()));
        }
        if let Some(tag) = tag {
            return Ok(DeviceSelector::Tag(tag.to_string()));
        }
        Ok(DeviceSelector::All)
    }
}

/// Merged per-device context
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSnapshot {
    /// Signature string → live fields overlaid with association fields
    pub devices: BTreeMap<String, Map<String, Value>>,
}

/// Context query errors
#[derive(Debug, Clone, PartialEq)]
pub enum ContextError {
    /// No association or live device matched
    NotFound,
    StoreUnavailable(StoreError),
    /// No primary live-context source configured
    SourceUnavailable,
}

impl ContextError {
    pub fn status(&self) -> Status {
        match self {
            ContextError::NotFound => Status::NotFound,
            ContextError::StoreUnavailable(_) | ContextError::SourceUnavailable => {
                Status::BadRequest
            }
        }
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::NotFound => write!(f, "no matching devices"),
            ContextError::StoreUnavailable(e) => write!(f, "{}", e),
            ContextError::SourceUnavailable => write!(f, "no live context source configured"),
        }
    }
}

impl std::error::Error for ContextError {}

impl From<StoreError> for ContextError {
    fn from(e: StoreError) -> Self {
        ContextError::StoreUnavailable(e)
    }
}

/// Aggregation core.
///
/// Merge order is fixed: primary live state, then complementary live state,
/// then associations. Later layers win on key collision.
pub struct ContextManager {
    store: Arc<dyn AssociationStore>,
    primary: Option<Arc<dyn LiveContextSource>>,
    complementary: Option<Arc<dyn LiveContextSource>>,
}

impl ContextManager {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self {
            store,
            primary: None,
            complementary: None,
        }
    }

    pub fn with_primary(mut self, source: Arc<dyn LiveContextSource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_complementary(mut self, source: Arc<dyn LiveContextSource>) -> Self {
        self.complementary = Some(source);
        self
    }

    /// Resolve `selector`, merge live and persisted state, project to
    /// `params.include`.
    pub async fn retrieve(
        &self,
        selector: &DeviceSelector,
        params: &QueryParams,
    ) -> Result<ContextSnapshot, ContextError> {
        let primary = self.primary.as_ref().ok_or(ContextError::SourceUnavailable)?;

        let mut known = BTreeMap::new();
        let (filter, options) = match selector {
            DeviceSelector::Signature(signature) => (
                DeviceFilter::Signatures(vec![signature.clone()]),
                RetrieveOptions { expand_nearest: true },
            ),
            DeviceSelector::Identifier(identifier) => (
                DeviceFilter::Identifier(identifier.clone()),
                RetrieveOptions { expand_nearest: true },
            ),
            DeviceSelector::Directory(_) | DeviceSelector::Tag(_) => {
                known = self.lookup_associations(selector).await?;
                let signatures = known
                    .keys()
                    .filter_map(|key| key.parse::<Signature>().ok())
                    .collect();
                (
                    DeviceFilter::Signatures(signatures),
                    RetrieveOptions { expand_nearest: true },
                )
            }
            DeviceSelector::All => (DeviceFilter::All, RetrieveOptions::default()),
        };

        let mut devices = primary
            .retrieve_context(&filter, options)
            .await
            .filter(|devices| !devices.is_empty())
            .ok_or(ContextError::NotFound)?;

        if let Some(complementary) = &self.complementary {
            self.merge_complementary(complementary.as_ref(), &mut devices).await;
        }

        let mut snapshot = ContextSnapshot::default();
        for (signature, mut bag) in devices {
            let key = signature.to_string();
            let association = match known.remove(&key) {
                Some(record) => Some(record),
                None => self.store.get(&key).await?,
            };
            if let Some(association) = association {
                bag.extend(association.to_map());
            }

            let bag = match params.include.as_deref() {
                Some(include) => trim_bag(&bag, include),
                None => bag,
            };
            snapshot.devices.insert(key, bag);
        }

        debug!(selector = ?selector, devices = snapshot.devices.len(), "Context retrieved");
        Ok(snapshot)
    }

    /// Associations whose directory or tags satisfy a directory/tag selector
    async fn lookup_associations(
        &self,
        selector: &DeviceSelector,
    ) -> Result<BTreeMap<String, Association>, ContextError> {
        let found = match selector {
            DeviceSelector::Directory(directory) => {
                self.store
                    .find(&|record: &Association| {
                        record
                            .directory
                            .as_deref()
                            .map(|stored| directory_prefix_match(directory, stored))
                            .unwrap_or(false)
                    })
                    .await
            }
            DeviceSelector::Tag(tag) => self.store.find(&|record: &Association| record.has_tag(tag)).await,
            _ => Ok(BTreeMap::new()),
        };

        let found = found.map_err(|e| {
            warn!(error = %e, "Association lookup failed");
            ContextError::StoreUnavailable(e)
        })?;

        if found.is_empty() {
            return Err(ContextError::NotFound);
        }
        Ok(found)
    }

    /// Copy complementary fields into devices the primary source reported
    async fn merge_complementary(&self, complementary: &dyn LiveContextSource, devices: &mut DeviceStates) {
        let signatures = devices.keys().cloned().collect();
        let extra = complementary
            .retrieve_context(&DeviceFilter::Signatures(signatures), RetrieveOptions::default())
            .await;

        for (signature, fields) in extra.into_iter().flatten() {
            if let Some(bag) = devices.get_mut(&signature) {
                bag.extend(fields);
            }
        }
    }
}
