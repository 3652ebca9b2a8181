use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::EntityStore;
use crate::model::{Book, ListRecord};

/// On-disk layout: two top-level keys, each a serialized array of records,
/// the same shape the browser demo mode keeps in local storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    bookmarked_lists: Vec<ListRecord>,
    #[serde(default)]
    bookmarked_books: Vec<Book>,
}

/// Local-storage style backend. The whole document is loaded at open and
/// written back after every mutation.
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Document::default(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse storage file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "storage file missing, starting empty");
                Document::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        Ok(FileStore {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Applies `change` to a copy of the document and swaps it in only once
    /// the copy is on disk. `change` reports whether it touched anything;
    /// untouched documents are not rewritten.
    async fn commit<T>(&self, change: impl FnOnce(&mut Document) -> (bool, T)) -> Result<T> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        let (changed, out) = change(&mut next);
        if changed {
            self.persist(&next).await?;
            *doc = next;
        }
        Ok(out)
    }

    async fn persist(&self, doc: &Document) -> Result<()> {
        let raw = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, raw)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FileStore {
    async fn all_lists(&self) -> Result<Vec<ListRecord>> {
        Ok(self.doc.lock().await.bookmarked_lists.clone())
    }

    async fn find_list(&self, id: &str) -> Result<Option<ListRecord>> {
        let doc = self.doc.lock().await;
        Ok(doc.bookmarked_lists.iter().find(|l| l.id == id).cloned())
    }

    async fn insert_list(&self, list: &ListRecord) -> Result<()> {
        self.commit(|doc| {
            doc.bookmarked_lists.insert(0, list.clone());
            (true, ())
        })
        .await
    }

    async fn update_list(&self, list: &ListRecord) -> Result<bool> {
        self.commit(|doc| {
            let Some(existing) = doc.bookmarked_lists.iter_mut().find(|l| l.id == list.id) else {
                return (false, false);
            };
            existing.title = list.title.clone();
            existing.description = list.description.clone();
            existing.updated_at = list.updated_at;
            (true, true)
        })
        .await
    }

    async fn delete_list(&self, id: &str) -> Result<()> {
        self.commit(|doc| {
            let before = doc.bookmarked_lists.len();
            doc.bookmarked_lists.retain(|l| l.id != id);
            (doc.bookmarked_lists.len() != before, ())
        })
        .await
    }

    async fn delete_list_with_books(&self, id: &str) -> Result<()> {
        self.commit(|doc| {
            let before = doc.bookmarked_lists.len() + doc.bookmarked_books.len();
            doc.bookmarked_books.retain(|b| b.list_id != id);
            doc.bookmarked_lists.retain(|l| l.id != id);
            let after = doc.bookmarked_lists.len() + doc.bookmarked_books.len();
            (after != before, ())
        })
        .await
    }

    async fn books_in_list(&self, list_id: &str) -> Result<Vec<Book>> {
        let doc = self.doc.lock().await;
        Ok(doc
            .bookmarked_books
            .iter()
            .filter(|b| b.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn book_counts(&self) -> Result<HashMap<String, usize>> {
        let doc = self.doc.lock().await;
        let mut counts = HashMap::new();
        for book in &doc.bookmarked_books {
            *counts.entry(book.list_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        self.commit(|doc| {
            doc.bookmarked_books.insert(0, book.clone());
            (true, ())
        })
        .await
    }

    async fn insert_book_into_list(&self, book: &Book) -> Result<bool> {
        self.commit(|doc| {
            if !doc.bookmarked_lists.iter().any(|l| l.id == book.list_id) {
                return (false, false);
            }
            doc.bookmarked_books.insert(0, book.clone());
            (true, true)
        })
        .await
    }

    async fn delete_book(&self, id: &str) -> Result<()> {
        self.commit(|doc| {
            let before = doc.bookmarked_books.len();
            doc.bookmarked_books.retain(|b| b.id != id);
            (doc.bookmarked_books.len() != before, ())
        })
        .await
    }

    async fn delete_books_in_list(&self, list_id: &str) -> Result<()> {
        self.commit(|doc| {
            let before = doc.bookmarked_books.len();
            doc.bookmarked_books.retain(|b| b.list_id != list_id);
            (doc.bookmarked_books.len() != before, ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn list(id: &str) -> ListRecord {
        ListRecord {
            id: id.to_string(),
            title: "Sci-Fi".to_string(),
            description: Some("favorites".to_string()),
            created_at: 100,
            updated_at: 100,
        }
    }

    fn book(id: &str, list_id: &str) -> Book {
        Book {
            id: id.to_string(),
            list_id: list_id.to_string(),
            title: "Dune".to_string(),
            url: "https://example.com/dune".to_string(),
            created_at: 101,
        }
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("absent.json")).await.unwrap();
        assert!(store.all_lists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmarked.json");

        {
            let store = FileStore::open(&path).await.unwrap();
            store.insert_list(&list("l1")).await.unwrap();
            store.insert_book(&book("b1", "l1")).await.unwrap();
        }

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.find_list("l1").await.unwrap(), Some(list("l1")));
        assert_eq!(store.books_in_list("l1").await.unwrap(), vec![book("b1", "l1")]);
    }

    #[tokio::test]
    async fn document_has_two_top_level_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmarked.json");
        let store = FileStore::open(&path).await.unwrap();
        store.insert_list(&list("l1")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();

        assert_eq!(keys.len(), 2);
        assert!(value["bookmarked_lists"].is_array());
        assert!(value["bookmarked_books"].is_array());
        assert!(value["bookmarked_lists"][0].get("bookCount").is_none());
    }

    #[tokio::test]
    async fn delete_books_in_list_keeps_other_lists() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("s.json")).await.unwrap();
        store.insert_book(&book("b1", "l1")).await.unwrap();
        store.insert_book(&book("b2", "l2")).await.unwrap();

        store.delete_books_in_list("l1").await.unwrap();

        let counts = store.book_counts().await.unwrap();
        assert_eq!(counts.get("l1"), None);
        assert_eq!(counts.get("l2"), Some(&1));
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("data");
        std::fs::create_dir(&sub).unwrap();
        let store = FileStore::open(sub.join("bookmarked.json")).await.unwrap();
        store.insert_list(&list("l1")).await.unwrap();
        store.insert_book(&book("b1", "l1")).await.unwrap();

        std::fs::remove_dir_all(&sub).unwrap();

        assert!(store.insert_list(&list("ghost")).await.is_err());
        assert!(store.insert_book(&book("b2", "l1")).await.is_err());
        assert!(store.delete_list_with_books("l1").await.is_err());
        assert!(store.delete_book("b1").await.is_err());

        assert_eq!(store.all_lists().await.unwrap(), vec![list("l1")]);
        assert_eq!(store.books_in_list("l1").await.unwrap(), vec![book("b1", "l1")]);
    }

    #[tokio::test]
    async fn book_insert_checks_list_under_one_lock() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("s.json")).await.unwrap();

        assert!(!store.insert_book_into_list(&book("b1", "l1")).await.unwrap());
        assert!(!dir.path().join("s.json").exists());

        store.insert_list(&list("l1")).await.unwrap();
        assert!(store.insert_book_into_list(&book("b1", "l1")).await.unwrap());
        assert_eq!(store.book_counts().await.unwrap().get("l1"), Some(&1));
    }
}
