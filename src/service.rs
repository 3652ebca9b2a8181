//! Data Service Interface
//!
//! [`DataService`] is the contract the state controller and the HTTP layer
//! program against. [`Library`] implements it on top of any
//! [`EntityStore`]; [`crate::client::ApiClient`] implements it over HTTP.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::model::{Book, BookList, BookListDetail, ListRecord};
use crate::store::EntityStore;

#[async_trait]
pub trait DataService: Send + Sync {
    /// All lists with live book counts, newest first.
    async fn get_lists(&self) -> Result<Vec<BookList>, ServiceError>;

    async fn create_list(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<BookList, ServiceError>;

    /// Removes the list and every book in it. Unknown ids are a no-op.
    async fn delete_list(&self, id: &str) -> Result<(), ServiceError>;

    /// `None` keeps the stored description; `Some` replaces it.
    async fn update_list(
        &self,
        id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<BookList, ServiceError>;

    /// `Ok(None)` when no list has this id.
    async fn get_list_details(&self, id: &str) -> Result<Option<BookListDetail>, ServiceError>;

    async fn add_book(&self, list_id: &str, title: &str, url: &str) -> Result<Book, ServiceError>;

    /// Unknown ids are a no-op.
    async fn delete_book(&self, id: &str) -> Result<(), ServiceError>;
}

/// Millisecond clock that never hands out the same value twice, so records
/// created back to back still sort strictly.
#[derive(Debug, Default)]
struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    fn now_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1)
    }
}

fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn newest_first_lists(lists: &mut [BookList]) {
    lists.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

fn newest_first_books(books: &mut [Book]) {
    books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// The store-backed implementation of [`DataService`].
pub struct Library {
    store: Arc<dyn EntityStore>,
    clock: MonotonicClock,
}

impl Library {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Library {
            store,
            clock: MonotonicClock::default(),
        }
    }

    async fn count_for(&self, list_id: &str) -> Result<usize, ServiceError> {
        let counts = self.store.book_counts().await?;
        Ok(counts.get(list_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl DataService for Library {
    async fn get_lists(&self) -> Result<Vec<BookList>, ServiceError> {
        let records = self.store.all_lists().await?;
        let counts = self.store.book_counts().await?;

        let mut lists: Vec<BookList> = records
            .into_iter()
            .map(|record| {
                let count = counts.get(&record.id).copied().unwrap_or(0);
                record.with_count(count)
            })
            .collect();
        newest_first_lists(&mut lists);
        Ok(lists)
    }

    async fn create_list(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<BookList, ServiceError> {
        let now = self.clock.now_millis();
        let record = ListRecord {
            id: Uuid::new_v4().to_string(),
            title: required("title", title)?,
            description: optional(description),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_list(&record).await?;
        tracing::info!(list_id = %record.id, "created list");
        Ok(record.with_count(0))
    }

    async fn delete_list(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete_list_with_books(id).await?;
        tracing::info!(list_id = %id, "deleted list");
        Ok(())
    }

    async fn update_list(
        &self,
        id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<BookList, ServiceError> {
        let title = required("title", title)?;
        let mut record = self
            .store
            .find_list(id)
            .await?
            .ok_or_else(|| ServiceError::list_not_found(id))?;

        record.title = title;
        if description.is_some() {
            record.description = optional(description);
        }
        record.updated_at = self.clock.now_millis();

        if !self.store.update_list(&record).await? {
            return Err(ServiceError::list_not_found(id));
        }

        let count = self.count_for(id).await?;
        tracing::info!(list_id = %id, "updated list");
        Ok(record.with_count(count))
    }

    async fn get_list_details(&self, id: &str) -> Result<Option<BookListDetail>, ServiceError> {
        let Some(record) = self.store.find_list(id).await? else {
            return Ok(None);
        };

        let mut books = self.store.books_in_list(id).await?;
        newest_first_books(&mut books);

        Ok(Some(BookListDetail {
            list: record.with_count(books.len()),
            books,
        }))
    }

    async fn add_book(&self, list_id: &str, title: &str, url: &str) -> Result<Book, ServiceError> {
        let title = required("title", title)?;
        let url = required("url", url)?;

        let book = Book {
            id: Uuid::new_v4().to_string(),
            list_id: list_id.to_string(),
            title,
            url,
            created_at: self.clock.now_millis(),
        };

        if !self.store.insert_book_into_list(&book).await? {
            return Err(ServiceError::list_not_found(list_id));
        }
        tracing::info!(list_id = %list_id, book_id = %book.id, "added book");
        Ok(book)
    }

    async fn delete_book(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete_book(id).await?;
        tracing::info!(book_id = %id, "deleted book");
        Ok(())
    }
}
