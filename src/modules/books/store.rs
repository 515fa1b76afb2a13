//! Persistence boundary for the books module.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;

use super::models::{Book, BookFilter, NewBook};

const BOOK_COLUMNS: &str = "id, title, author, publication_year, available, created_at";

/// Failure inside the persistence layer.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StoreError(#[from] sqlx::Error);

/// Result of a guarded availability transition.
#[derive(Debug)]
pub enum Transition {
    /// Precondition held; carries the updated record
    Applied(Book),
    /// No record with that id
    Missing,
    /// Record exists but the availability precondition failed
    Blocked(Book),
}

/// Storage capability for book records.
///
/// The catalog service owns one of these; production wires the SQLite
/// implementation, tests substitute the in-memory fake.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Persists a new book. New books are always stored as available.
    async fn insert(&self, book: NewBook) -> Result<Book, StoreError>;

    /// Returns books matching the filter, newest first.
    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError>;

    /// Looks up a book by id.
    async fn find(&self, id: i64) -> Result<Option<Book>, StoreError>;

    /// Flips `available` from `from` to `to` in one guarded update.
    ///
    /// The check and the write are a single statement, so two concurrent
    /// transitions on one row can never both apply.
    async fn transition(&self, id: i64, from: bool, to: bool) -> Result<Transition, StoreError>;
}

/// `BookStore` backed by the shared SQLite pool.
pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        let book = sqlx::query_as::<_, Book>(
            "INSERT INTO book (title, author, publication_year, available, created_at)
             VALUES (?, ?, ?, 1, ?)
             RETURNING id, title, author, publication_year, available, created_at",
        )
        .bind(book.title)
        .bind(book.author)
        .bind(book.publication_year)
        .bind(book.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(book)
    }

    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {BOOK_COLUMNS} FROM book"));

        let mut prefix = " WHERE ";
        if let Some(author) = &filter.author {
            query.push(prefix);
            query.push("instr(lower(author), lower(");
            query.push_bind(author.clone());
            query.push(")) > 0");
            prefix = " AND ";
        }
        if let Some(available) = filter.available {
            query.push(prefix);
            query.push("available = ");
            query.push_bind(available);
        }
        // Fixed ordering; id breaks ties between same-instant creations.
        query.push(" ORDER BY created_at DESC, id DESC");

        let books = query
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    async fn find(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let book =
            sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM book WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(book)
    }

    async fn transition(&self, id: i64, from: bool, to: bool) -> Result<Transition, StoreError> {
        let updated = sqlx::query_as::<_, Book>(
            "UPDATE book SET available = ? WHERE id = ? AND available = ?
             RETURNING id, title, author, publication_year, available, created_at",
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(book) = updated {
            return Ok(Transition::Applied(book));
        }

        // Nothing matched: the row is missing or the guard failed.
        match self.find(id).await? {
            Some(book) => Ok(Transition::Blocked(book)),
            None => Ok(Transition::Missing),
        }
    }
}

/// In-memory `BookStore` standing in for the database in tests.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryBookStore {
    inner: std::sync::Mutex<InMemoryState>,
}

#[cfg(test)]
#[derive(Default)]
struct InMemoryState {
    next_id: i64,
    books: Vec<Book>,
}

#[cfg(test)]
#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        let book = Book {
            id: state.next_id,
            title: book.title,
            author: book.author,
            publication_year: book.publication_year,
            available: true,
            created_at: book.created_at,
        };
        state.books.push(book.clone());
        Ok(book)
    }

    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let state = self.inner.lock().unwrap();
        let needle = filter.author.as_deref().map(str::to_lowercase);

        let mut books: Vec<Book> = state
            .books
            .iter()
            .filter(|book| match &needle {
                Some(needle) => book.author.to_lowercase().contains(needle),
                None => true,
            })
            .filter(|book| match filter.available {
                Some(available) => book.available == available,
                None => true,
            })
            .cloned()
            .collect();

        books.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(books)
    }

    async fn find(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state.books.iter().find(|book| book.id == id).cloned())
    }

    async fn transition(&self, id: i64, from: bool, to: bool) -> Result<Transition, StoreError> {
        // The mutex spans check and write, mirroring the single-statement
        // guarantee of the SQLite implementation.
        let mut state = self.inner.lock().unwrap();
        let Some(book) = state.books.iter_mut().find(|book| book.id == id) else {
            return Ok(Transition::Missing);
        };
        if book.available != from {
            return Ok(Transition::Blocked(book.clone()));
        }
        book.available = to;
        Ok(Transition::Applied(book.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::INIT_SCHEMA;
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn new_book(title: &str, author: &str, created_at: OffsetDateTime) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: author.to_string(),
            publication_year: 1965,
            created_at,
        }
    }

    async fn sqlite_store() -> SqliteBookStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::raw_sql(INIT_SCHEMA).execute(&pool).await.unwrap();
        SqliteBookStore::new(pool)
    }

    #[tokio::test]
    async fn insert_assigns_fresh_ids_and_availability() {
        let store = sqlite_store().await;
        let at = datetime!(2026-01-01 12:00:00 UTC);

        let first = store.insert(new_book("Dune", "Frank Herbert", at)).await.unwrap();
        let second = store.insert(new_book("Dune Messiah", "Frank Herbert", at)).await.unwrap();

        assert!(first.available);
        assert!(second.available);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn transition_applies_only_when_guard_holds() {
        let store = sqlite_store().await;
        let at = datetime!(2026-01-01 12:00:00 UTC);
        let book = store.insert(new_book("Dune", "Frank Herbert", at)).await.unwrap();

        let first = store.transition(book.id, true, false).await.unwrap();
        assert!(matches!(first, Transition::Applied(ref b) if !b.available));

        // Same guard again: the row no longer satisfies the precondition.
        let second = store.transition(book.id, true, false).await.unwrap();
        assert!(matches!(second, Transition::Blocked(_)));
    }

    #[tokio::test]
    async fn transition_reports_missing_rows() {
        let store = sqlite_store().await;
        let outcome = store.transition(42, true, false).await.unwrap();
        assert!(matches!(outcome, Transition::Missing));
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let store = sqlite_store().await;

        let tolkien = store
            .insert(new_book(
                "The Hobbit",
                "J.R.R. Tolkien",
                datetime!(2026-01-01 09:00:00 UTC),
            ))
            .await
            .unwrap();
        let herbert = store
            .insert(new_book(
                "Dune",
                "Frank Herbert",
                datetime!(2026-01-02 09:00:00 UTC),
            ))
            .await
            .unwrap();
        store.transition(herbert.id, true, false).await.unwrap();

        let all = store.list(&BookFilter::default()).await.unwrap();
        assert_eq!(
            all.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![herbert.id, tolkien.id]
        );

        let by_author = store
            .list(&BookFilter {
                author: Some("tolk".to_string()),
                available: None,
            })
            .await
            .unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].id, tolkien.id);

        let available_only = store
            .list(&BookFilter {
                author: None,
                available: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(available_only.len(), 1);
        assert_eq!(available_only[0].id, tolkien.id);

        let combined = store
            .list(&BookFilter {
                author: Some("herbert".to_string()),
                available: Some(true),
            })
            .await
            .unwrap();
        assert!(combined.is_empty());
    }
}
