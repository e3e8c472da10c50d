use super::record::{Association, AssociationField};
use serde_json::{Map, Value};

/// Directory level separator
pub const DIRECTORY_SEPARATOR: char = ':';

/// Filters and projection shared by association and context queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Field names to project the result to
    pub include: Option<Vec<String>>,
    /// Match records carrying any of these tags
    pub tag: Option<Vec<String>>,
    /// Match records under any of these directories
    pub directory: Option<Vec<String>>,
}

impl QueryParams {
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.tag.is_none() && self.directory.is_none()
    }

    /// True when the query narrows by tag or directory
    pub fn has_match_criteria(&self) -> bool {
        self.tag.is_some() || self.directory.is_some()
    }

    /// Does `record` satisfy the tag/directory criteria?
    ///
    /// Any tag or any directory is enough.
    pub fn matches(&self, record: &Association) -> bool {
        let tag_match = self
            .tag
            .iter()
            .flatten()
            .any(|tag| record.has_tag(tag));

        let directory_match = match record.directory.as_deref() {
            Some(stored) => self
                .directory
                .iter()
                .flatten()
                .any(|query| directory_prefix_match(query, stored)),
            None => false,
        };

        tag_match || directory_match
    }
}

/// Hierarchical directory match on `:` segment boundaries.
///
/// `query` matches `stored` when `stored` equals `query` or continues it with
/// a `:`; "floor1" matches "floor1:room3" but not "floor10".
pub fn directory_prefix_match(query: &str, stored: &str) -> bool {
    match stored.strip_prefix(query) {
        Some(rest) => rest.is_empty() || rest.starts_with(DIRECTORY_SEPARATOR),
        None => false,
    }
}

/// Apply a bulk-listing query to one record.
///
/// Returns `None` when the record does not match. With no parameters every
/// record matches and yields an empty object (presence only).
pub fn filter_by_query(record: &Association, params: &QueryParams) -> Option<Map<String, Value>> {
    if params.is_empty() {
        return Some(Map::new());
    }

    if !params.has_match_criteria() || params.matches(record) {
        return Some(project(record, params.include.as_deref()));
    }

    None
}

/// Project a record to `include`, or the whole record when `include` is absent
pub fn project(record: &Association, include: Option<&[String]>) -> Map<String, Value> {
    match include {
        Some(include) => trim(record, include),
        None => record.to_map(),
    }
}

/// Keep each association field that is both requested and present.
///
/// Unknown names in `include` are ignored.
pub fn trim(record: &Association, include: &[String]) -> Map<String, Value> {
    let mut trimmed = Map::new();
    for field in AssociationField::ALL {
        if !include.iter().any(|name| name == field.as_str()) {
            continue;
        }
        if let Some(value) = record.field(field) {
            trimmed.insert(field.as_str().to_string(), value);
        }
    }
    trimmed
}

/// Keep each key of a merged bag that is requested and present
pub fn trim_bag(bag: &Map<String, Value>, include: &[String]) -> Map<String, Value> {
    include
        .iter()
        .filter_map(|name| bag.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}
