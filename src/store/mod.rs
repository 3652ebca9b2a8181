//! Entity Store
//!
//! Row-level persistence for lists and books. Every backend implements the
//! same [`EntityStore`] primitives; domain rules (ordering, derived book
//! counts, validation) live in [`crate::service::Library`] so that each
//! backend stays a plain table of records. The two compound writes,
//! cascade delete and checked book insert, have default implementations
//! that backends may make atomic.
//!
//! Three backends are available and exactly one is active per process:
//!
//! - [`SqlStore`]: libsql database, optionally an embedded replica
//! - [`MemoryStore`]: in-process collections, for demos and tests
//! - [`FileStore`]: a JSON document on disk, shaped like browser local storage

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Book, ListRecord};

mod file;
mod memory;
mod sql;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sql::SqlStore;

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// All stored lists, in no particular order.
    async fn all_lists(&self) -> Result<Vec<ListRecord>>;

    async fn find_list(&self, id: &str) -> Result<Option<ListRecord>>;

    async fn insert_list(&self, list: &ListRecord) -> Result<()>;

    /// Overwrites title, description and `updated_at` of an existing list.
    /// Returns false when no list has that id.
    async fn update_list(&self, list: &ListRecord) -> Result<bool>;

    /// Removes the list row only. Missing ids are not an error.
    async fn delete_list(&self, id: &str) -> Result<()>;

    /// Books owned by a list, in no particular order.
    async fn books_in_list(&self, list_id: &str) -> Result<Vec<Book>>;

    /// Live number of books per list id. Lists without books may be absent.
    async fn book_counts(&self) -> Result<HashMap<String, usize>>;

    async fn insert_book(&self, book: &Book) -> Result<()>;

    /// Missing ids are not an error.
    async fn delete_book(&self, id: &str) -> Result<()>;

    async fn delete_books_in_list(&self, list_id: &str) -> Result<()>;

    /// Inserts `book` only while its list exists. Returns false, storing
    /// nothing, when the list is missing. Backends without a foreign key
    /// override this to check and insert under one lock.
    async fn insert_book_into_list(&self, book: &Book) -> Result<bool> {
        if self.find_list(&book.list_id).await?.is_none() {
            return Ok(false);
        }
        self.insert_book(book).await?;
        Ok(true)
    }

    /// Removes a list and every book in it.
    async fn delete_list_with_books(&self, id: &str) -> Result<()> {
        self.delete_books_in_list(id).await?;
        self.delete_list(id).await
    }
}
