use serde::Serialize;
use std::fmt;

/// Semantic outcome of an association or context operation.
///
/// The transport maps these to HTTP status codes; the core never deals in
/// wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Ok,
    Created,
    NotFound,
    BadRequest,
}

impl Status {
    /// HTTP status code for this outcome
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::NotFound => 404,
            Status::BadRequest => 400,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::Created => write!(f, "created"),
            Status::NotFound => write!(f, "not found"),
            Status::BadRequest => write!(f, "bad request"),
        }
    }
}
