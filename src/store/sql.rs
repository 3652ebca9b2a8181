use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};

use super::EntityStore;
use crate::config::Replica;
use crate::model::{Book, ListRecord};

const SYSTEM_MIGRATIONS: &[(&str, &str)] = &[(
    "system/000_migrations_table.sql",
    include_str!("../migrations/system/000_migrations_table.sql"),
)];

const MIGRATIONS: &[(&str, &str)] = &[("001_schema.sql", include_str!("../migrations/001_schema.sql"))];

const LIST_COLUMNS: &str = "id, title, description, created_at, updated_at";
const BOOK_COLUMNS: &str = "id, list_id, title, url, created_at";

/// Relational backend on libsql. Runs against a local file, or against an
/// embedded replica kept in sync with a remote database.
pub struct SqlStore {
    db: LibsqlDatabase,
    conn: Connection,
    replicated: bool,
}

impl SqlStore {
    pub async fn new(path: impl AsRef<Path>, replica: Option<&Replica>) -> Result<Self> {
        let path = path.as_ref();

        let db = match replica {
            Some(replica) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                Builder::new_synced_database(path, replica.url.clone(), replica.auth_token.clone())
                    .sync_interval(Duration::from_secs(replica.sync_interval_seconds))
                    .build()
                    .await?
            }
            None => Builder::new_local(path).build().await?,
        };

        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(SqlStore {
            db,
            conn,
            replicated: replica.is_some(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub async fn sync(&self) -> Result<()> {
        if self.replicated {
            self.db
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("sync failed: {}", e))?;
        }
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    fn row_to_list(row: &libsql::Row) -> Result<ListRecord> {
        Ok(ListRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get::<Option<String>>(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn row_to_book(row: &libsql::Row) -> Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            list_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[async_trait]
impl EntityStore for SqlStore {
    async fn all_lists(&self) -> Result<Vec<ListRecord>> {
        let query = format!("SELECT {LIST_COLUMNS} FROM lists ORDER BY created_at DESC");
        let mut rows = self.conn.query(&query, ()).await?;

        let mut lists = Vec::new();
        while let Some(row) = rows.next().await? {
            lists.push(Self::row_to_list(&row)?);
        }
        Ok(lists)
    }

    async fn find_list(&self, id: &str) -> Result<Option<ListRecord>> {
        let query = format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?");
        let mut rows = self.conn.query(&query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_list(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn insert_list(&self, list: &ListRecord) -> Result<()> {
        let query = format!("INSERT INTO lists ({LIST_COLUMNS}) VALUES (?, ?, ?, ?, ?)");
        self.conn
            .execute(
                &query,
                libsql::params![
                    list.id.as_str(),
                    list.title.as_str(),
                    list.description.clone(),
                    list.created_at,
                    list.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_list(&self, list: &ListRecord) -> Result<bool> {
        let query = "UPDATE lists SET title = ?, description = ?, updated_at = ? WHERE id = ?";
        let changed = self
            .conn
            .execute(
                query,
                libsql::params![
                    list.title.as_str(),
                    list.description.clone(),
                    list.updated_at,
                    list.id.as_str()
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    async fn delete_list(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM lists WHERE id = ?", libsql::params![id])
            .await?;
        Ok(())
    }

    async fn books_in_list(&self, list_id: &str) -> Result<Vec<Book>> {
        let query =
            format!("SELECT {BOOK_COLUMNS} FROM books WHERE list_id = ? ORDER BY created_at DESC");
        let mut rows = self.conn.query(&query, libsql::params![list_id]).await?;

        let mut books = Vec::new();
        while let Some(row) = rows.next().await? {
            books.push(Self::row_to_book(&row)?);
        }
        Ok(books)
    }

    async fn book_counts(&self) -> Result<HashMap<String, usize>> {
        let query = "SELECT list_id, COUNT(*) FROM books GROUP BY list_id";
        let mut rows = self.conn.query(query, ()).await?;

        let mut counts = HashMap::new();
        while let Some(row) = rows.next().await? {
            let list_id: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.insert(list_id, count as usize);
        }
        Ok(counts)
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        let query = format!("INSERT INTO books ({BOOK_COLUMNS}) VALUES (?, ?, ?, ?, ?)");
        self.conn
            .execute(
                &query,
                libsql::params![
                    book.id.as_str(),
                    book.list_id.as_str(),
                    book.title.as_str(),
                    book.url.as_str(),
                    book.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_book(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM books WHERE id = ?", libsql::params![id])
            .await?;
        Ok(())
    }

    async fn delete_books_in_list(&self, list_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM books WHERE list_id = ?", libsql::params![list_id])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn list(id: &str, created_at: i64) -> ListRecord {
        ListRecord {
            id: id.to_string(),
            title: format!("list {id}"),
            description: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn book(id: &str, list_id: &str) -> Book {
        Book {
            id: id.to_string(),
            list_id: list_id.to_string(),
            title: "Dune".to_string(),
            url: "https://example.com/dune".to_string(),
            created_at: 5,
        }
    }

    #[tokio::test]
    async fn migrations_are_applied_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmarked.db");

        let store = SqlStore::new(&path, None).await.unwrap();
        store.insert_list(&list("l1", 1)).await.unwrap();
        drop(store);

        let store = SqlStore::new(&path, None).await.unwrap();
        let mut rows = store
            .connection()
            .query("SELECT COUNT(*) FROM _migrations", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let applied: i64 = row.get(0).unwrap();

        assert_eq!(applied as usize, SYSTEM_MIGRATIONS.len() + MIGRATIONS.len());
        assert!(store.find_list("l1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_list_row_cascades_in_schema() {
        let store = SqlStore::new(":memory:", None).await.unwrap();
        store.insert_list(&list("l1", 1)).await.unwrap();
        store.insert_book(&book("b1", "l1")).await.unwrap();

        store.delete_list("l1").await.unwrap();

        assert!(store.book_counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nullable_description_round_trips() {
        let store = SqlStore::new(":memory:", None).await.unwrap();
        let mut record = list("l1", 1);
        store.insert_list(&record).await.unwrap();
        assert_eq!(store.find_list("l1").await.unwrap().unwrap().description, None);

        record.description = Some("favorites".to_string());
        record.updated_at = 2;
        assert!(store.update_list(&record).await.unwrap());
        assert_eq!(store.find_list("l1").await.unwrap(), Some(record));
    }
}
