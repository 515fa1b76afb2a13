//! Validation and the loan state machine for the catalog.

use std::sync::Arc;

use thiserror::Error;

use super::clock::Clock;
use super::models::{Book, BookFilter, CreateBookRequest, NewBook};
use super::store::{BookStore, StoreError, Transition};

/// Errors surfaced by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("book not found")]
    NotFound,

    #[error("{0}")]
    InvalidTransition(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Catalog operations over book records.
///
/// Owns the storage and clock capabilities. Every availability change goes
/// through `loan`/`return_book`; no other path writes the flag.
pub struct CatalogService {
    store: Arc<dyn BookStore>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BookStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a book after validating the request. New books start available.
    ///
    /// The publication-year bound is evaluated against the injected clock at
    /// call time and never re-checked afterwards.
    pub async fn create(&self, request: CreateBookRequest) -> Result<Book, CatalogError> {
        let title = request.title.as_deref().map(str::trim).unwrap_or_default();
        let author = request.author.as_deref().map(str::trim).unwrap_or_default();

        let Some(year) = request.publication_year else {
            return Err(required_fields());
        };
        if title.is_empty() || author.is_empty() {
            return Err(required_fields());
        }
        if year > self.clock.current_year() {
            return Err(CatalogError::Validation(
                "publication year cannot be in the future".to_string(),
            ));
        }

        let book = self
            .store
            .insert(NewBook {
                title: title.to_string(),
                author: author.to_string(),
                publication_year: year,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(id = book.id, title = %book.title, "book created");
        Ok(book)
    }

    /// Lists books matching the filter, newest first.
    pub async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>, CatalogError> {
        Ok(self.store.list(filter).await?)
    }

    /// Looks up a single book.
    pub async fn get_by_id(&self, id: i64) -> Result<Book, CatalogError> {
        self.store.find(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Available → Loaned. Re-loaning a loaned book is an error, not a no-op.
    pub async fn loan(&self, id: i64) -> Result<Book, CatalogError> {
        match self.store.transition(id, true, false).await? {
            Transition::Applied(book) => {
                tracing::info!(id = book.id, "book loaned");
                Ok(book)
            }
            Transition::Missing => Err(CatalogError::NotFound),
            Transition::Blocked(_) => Err(CatalogError::InvalidTransition(
                "cannot loan an unavailable book",
            )),
        }
    }

    /// Loaned → Available. Returning an available book is an error, not a no-op.
    pub async fn return_book(&self, id: i64) -> Result<Book, CatalogError> {
        match self.store.transition(id, false, true).await? {
            Transition::Applied(book) => {
                tracing::info!(id = book.id, "book returned");
                Ok(book)
            }
            Transition::Missing => Err(CatalogError::NotFound),
            Transition::Blocked(_) => {
                Err(CatalogError::InvalidTransition("book is already available"))
            }
        }
    }
}

fn required_fields() -> CatalogError {
    CatalogError::Validation("title, author and publication year are required".to_string())
}
