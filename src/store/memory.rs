use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::EntityStore;
use crate::model::{Book, ListRecord};

#[derive(Debug, Default)]
struct Tables {
    lists: Vec<ListRecord>,
    books: Vec<Book>,
}

/// Keeps lists and books in process memory. State lives as long as the
/// store value does, so every test or server instance gets its own.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn all_lists(&self) -> Result<Vec<ListRecord>> {
        Ok(self.tables.read().await.lists.clone())
    }

    async fn find_list(&self, id: &str) -> Result<Option<ListRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.lists.iter().find(|l| l.id == id).cloned())
    }

    async fn insert_list(&self, list: &ListRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.lists.iter().any(|l| l.id == list.id) {
            anyhow::bail!("list {} already exists", list.id);
        }
        tables.lists.push(list.clone());
        Ok(())
    }

    async fn update_list(&self, list: &ListRecord) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.lists.iter_mut().find(|l| l.id == list.id) {
            Some(existing) => {
                existing.title = list.title.clone();
                existing.description = list.description.clone();
                existing.updated_at = list.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_list(&self, id: &str) -> Result<()> {
        self.tables.write().await.lists.retain(|l| l.id != id);
        Ok(())
    }

    async fn books_in_list(&self, list_id: &str) -> Result<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(tables
            .books
            .iter()
            .filter(|b| b.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn book_counts(&self) -> Result<HashMap<String, usize>> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for book in &tables.books {
            *counts.entry(book.list_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        self.tables.write().await.books.push(book.clone());
        Ok(())
    }

    async fn delete_book(&self, id: &str) -> Result<()> {
        self.tables.write().await.books.retain(|b| b.id != id);
        Ok(())
    }

    async fn delete_books_in_list(&self, list_id: &str) -> Result<()> {
        self.tables.write().await.books.retain(|b| b.list_id != list_id);
        Ok(())
    }

    async fn insert_book_into_list(&self, book: &Book) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.lists.iter().any(|l| l.id == book.list_id) {
            return Ok(false);
        }
        tables.books.push(book.clone());
        Ok(true)
    }

    async fn delete_list_with_books(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.books.retain(|b| b.list_id != id);
        tables.lists.retain(|l| l.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ListRecord {
        ListRecord {
            id: id.to_string(),
            title: format!("list {id}"),
            description: None,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn separate_stores_do_not_share_state() {
        let a = MemoryStore::new();
        let b = MemoryStore::new();

        a.insert_list(&record("l1")).await.unwrap();

        assert_eq!(a.all_lists().await.unwrap().len(), 1);
        assert!(b.all_lists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_reports_missing_list() {
        let store = MemoryStore::new();
        assert!(!store.update_list(&record("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn checked_insert_and_cascade() {
        let store = MemoryStore::new();
        let book = Book {
            id: "b1".to_string(),
            list_id: "l1".to_string(),
            title: "Dune".to_string(),
            url: "https://example.com/dune".to_string(),
            created_at: 2,
        };

        assert!(!store.insert_book_into_list(&book).await.unwrap());
        assert!(store.book_counts().await.unwrap().is_empty());

        store.insert_list(&record("l1")).await.unwrap();
        assert!(store.insert_book_into_list(&book).await.unwrap());

        store.delete_list_with_books("l1").await.unwrap();
        assert!(store.all_lists().await.unwrap().is_empty());
        assert!(store.books_in_list("l1").await.unwrap().is_empty());
    }
}
