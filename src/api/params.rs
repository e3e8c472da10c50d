use crate::association::QueryParams;
use serde::Deserialize;

/// Raw query string: comma-separated lists
///
/// `?include=url,tags&tag=lobby&directory=site:floor1`
#[derive(Debug, Default, Deserialize)]
pub struct QueryString {
    pub include: Option<String>,
    pub tag: Option<String>,
    pub directory: Option<String>,
}

impl QueryString {
    pub fn into_params(self) -> QueryParams {
        QueryParams {
            include: self.include.as_deref().and_then(split_list),
            tag: self.tag.as_deref().and_then(split_list),
            directory: self.directory.as_deref().and_then(split_list),
        }
    }
}

// `?tag=` with nothing in it is the same as no `tag` at all
fn split_list(raw: &str) -> Option<Vec<String>> {
    let list: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!list.is_empty()).then_some(list)
}
