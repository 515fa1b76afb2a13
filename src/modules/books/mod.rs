pub mod clock;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use biblio_kernel::{InitCtx, Migration, Module};
use once_cell::sync::OnceCell;
use serde_json::json;

use clock::SystemClock;
use service::CatalogService;
use store::SqliteBookStore;

/// Relational schema for the `book` table.
pub(crate) const INIT_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS book (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL CHECK (title <> ''),
        author TEXT NOT NULL CHECK (author <> ''),
        publication_year INTEGER NOT NULL,
        available INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS book_created_at_idx ON book (created_at);
"#;

/// Books module wiring the catalog service into the application lifecycle
pub struct BooksModule {
    service: OnceCell<Arc<CatalogService>>,
}

impl BooksModule {
    pub fn new() -> Self {
        Self {
            service: OnceCell::new(),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let store = SqliteBookStore::new(ctx.db.pool().clone());
        let service = Arc::new(CatalogService::new(Arc::new(store), Arc::new(SystemClock)));

        if self.service.set(service).is_err() {
            anyhow::bail!("books module initialized twice");
        }

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.service.get() {
            Some(service) => routes::router(service.clone()),
            // Routes are only collected after init; an empty router keeps a
            // wiring mistake visible instead of panicking.
            None => Router::new(),
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "author",
                                "in": "query",
                                "required": false,
                                "description": "Case-insensitive substring match on the author",
                                "schema": { "type": "string" }
                            },
                            {
                                "name": "available",
                                "in": "query",
                                "required": false,
                                "description": "Exact match on the availability flag",
                                "schema": { "type": "boolean" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Books matching the filters, newest first",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": {
                                "description": "Internal server error",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Created book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Missing or invalid field",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book by id",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "id",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "integer", "format": "int64" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Unknown id",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}/loan": {
                    "patch": {
                        "summary": "Loan a book",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "id",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "integer", "format": "int64" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Updated book, now unavailable",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Book is already loaned",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Unknown id",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}/return": {
                    "patch": {
                        "summary": "Return a loaned book",
                        "tags": ["Books"],
                        "parameters": [
                            {
                                "name": "id",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "integer", "format": "int64" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Updated book, available again",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Book is already available",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Unknown id",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Error" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "integer",
                                "format": "int64",
                                "description": "Store-assigned identifier"
                            },
                            "title": {
                                "type": "string",
                                "description": "Title of the book"
                            },
                            "author": {
                                "type": "string",
                                "description": "Author of the book"
                            },
                            "publicationYear": {
                                "type": "integer",
                                "description": "Publication year, never later than the current year"
                            },
                            "available": {
                                "type": "boolean",
                                "description": "Whether the book may currently be loaned"
                            },
                            "createdAt": {
                                "type": "string",
                                "format": "date-time",
                                "description": "When the record was created"
                            }
                        },
                        "required": ["id", "title", "author", "publicationYear", "available", "createdAt"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": {
                                "type": "string",
                                "description": "Title of the book"
                            },
                            "author": {
                                "type": "string",
                                "description": "Author of the book"
                            },
                            "publicationYear": {
                                "type": "integer",
                                "description": "Publication year"
                            }
                        },
                        "required": ["title", "author", "publicationYear"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: INIT_SCHEMA,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
