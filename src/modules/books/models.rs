use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One circulating copy record in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned identifier, immutable after creation
    pub id: i64,
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Publication year, fixed at creation
    pub publication_year: i32,
    /// `true` while the book may be loaned, `false` while on loan
    pub available: bool,
    /// Creation timestamp; listings sort on it, newest first
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Request payload for creating a new book.
///
/// Fields stay optional so missing input surfaces as a catalog validation
/// error rather than a framework-shaped deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
}

/// A validated book ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub created_at: OffsetDateTime,
}

/// Optional listing constraints, combined with logical AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    /// Case-insensitive substring match on the author field
    pub author: Option<String>,
    /// Exact match on the availability flag
    pub available: Option<bool>,
}
