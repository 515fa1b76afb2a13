//! Core traits, settings, and module registry for the biblio application.

pub mod module;
pub mod registry;
pub mod settings;

pub use biblio_db::Migration;
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
