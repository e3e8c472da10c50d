// Persisted device metadata: records, query rules, storage, CRUD

mod manager;
mod query;
mod record;
pub mod store;

pub use manager::{AssociationError, AssociationMap, AssociationObserver, AssociationsManager};
pub use query::{
    directory_prefix_match, filter_by_query, project, trim, trim_bag, QueryParams,
    DIRECTORY_SEPARATOR,
};
pub use record::{Association, AssociationField, AssociationUpdate};
pub use store::{AssociationStore, SqliteAssociationStore, StoreError};

#[cfg(test)]
mod tests;
