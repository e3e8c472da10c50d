use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Persisted metadata for one device signature.
///
/// Every field is optional; a record with no fields still exists in storage
/// but never matches a tag or directory query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Association {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Colon-delimited hierarchical path (e.g. "site:floor1:room3")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// 2 or 3 coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec<f64>>,
}

/// Names of the association fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationField {
    Url,
    Directory,
    Tags,
    Position,
}

impl AssociationField {
    pub const ALL: [AssociationField; 4] = [
        AssociationField::Url,
        AssociationField::Directory,
        AssociationField::Tags,
        AssociationField::Position,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssociationField::Url => "url",
            AssociationField::Directory => "directory",
            AssociationField::Tags => "tags",
            AssociationField::Position => "position",
        }
    }
}

impl fmt::Display for AssociationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociationField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(AssociationField::Url),
            "directory" => Ok(AssociationField::Directory),
            "tags" => Ok(AssociationField::Tags),
            "position" => Ok(AssociationField::Position),
            other => Err(format!("unknown association property '{}'", other)),
        }
    }
}

impl Association {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.directory.is_none() && self.tags.is_none() && self.position.is_none()
    }

    /// JSON value of a single field, if present
    pub fn field(&self, field: AssociationField) -> Option<Value> {
        match field {
            AssociationField::Url => self.url.clone().map(Value::from),
            AssociationField::Directory => self.directory.clone().map(Value::from),
            AssociationField::Tags => self.tags.clone().map(Value::from),
            AssociationField::Position => self.position.clone().map(Value::from),
        }
    }

    /// Clear a field. Returns false if it was not set.
    pub fn remove_field(&mut self, field: AssociationField) -> bool {
        match field {
            AssociationField::Url => self.url.take().is_some(),
            AssociationField::Directory => self.directory.take().is_some(),
            AssociationField::Tags => self.tags.take().is_some(),
            AssociationField::Position => self.position.take().is_some(),
        }
    }

    /// All present fields as a JSON object
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for field in AssociationField::ALL {
            if let Some(value) = self.field(field) {
                map.insert(field.as_str().to_string(), value);
            }
        }
        map
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .map(|tags| tags.iter().any(|t| t == tag))
            .unwrap_or(false)
    }

    /// Overwrite only the fields supplied in `update`.
    ///
    /// Values of the wrong type are ignored field by field; the rest of the
    /// update still applies.
    pub fn apply(&mut self, update: &AssociationUpdate) {
        if let Some(url) = update.url.as_ref().and_then(as_string) {
            self.url = Some(url);
        }
        if let Some(directory) = update.directory.as_ref().and_then(as_string) {
            self.directory = Some(directory);
        }
        if let Some(tags) = update.tags.as_ref().and_then(as_string_list) {
            self.tags = Some(tags);
        }
        if let Some(position) = update.position.as_ref().and_then(as_number_list) {
            self.position = Some(position);
        }
    }
}

/// Client-supplied fields for `replace`, still untyped
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssociationUpdate {
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(default)]
    pub directory: Option<Value>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub position: Option<Value>,
}

impl AssociationUpdate {
    /// Drop every supplied field except `field`
    pub fn retain_only(self, field: AssociationField) -> Self {
        let mut kept = AssociationUpdate::default();
        match field {
            AssociationField::Url => kept.url = self.url,
            AssociationField::Directory => kept.directory = self.directory,
            AssociationField::Tags => kept.tags = self.tags,
            AssociationField::Position => kept.position = self.position,
        }
        kept
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

// Tags are a set; first occurrence keeps its place
fn as_string_list(value: &Value) -> Option<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.as_array()? {
        let tag = tag.as_str()?;
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    Some(tags)
}

// Positions are 2D or 3D
fn as_number_list(value: &Value) -> Option<Vec<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()?;
    (2..=3).contains(&coords.len()).then_some(coords)
}
