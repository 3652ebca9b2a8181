//! Application State Controller
//!
//! Client-side holder of what the views render: the cached lists, the list
//! currently open, the search query and the view mode. The cache is never
//! the source of truth; every mutation is followed by a refetch from the
//! [`DataService`], and every failure is reported as a [`Notice`] instead of
//! being returned to the view.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::model::{Book, BookList, BookListDetail, ViewMode};
use crate::service::DataService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Notifier { tx }, rx)
    }

    pub fn success(&self, message: &str) {
        self.send(NoticeKind::Success, message);
    }

    pub fn error(&self, message: &str) {
        self.send(NoticeKind::Error, message);
    }

    fn send(&self, kind: NoticeKind, message: &str) {
        // Nobody listening is fine.
        let _ = self.tx.send(Notice {
            kind,
            message: message.to_string(),
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub search_query: String,
    pub view_mode: ViewMode,
    pub is_loading: bool,
    pub lists: Vec<BookList>,
    pub current_list: Option<BookListDetail>,
}

/// Case-insensitive substring match of `query` against any of `fields`.
/// An empty query matches everything.
pub fn matches_query<'a>(query: &str, fields: impl IntoIterator<Item = &'a str>) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(&query))
}

pub fn filter_lists<'a>(lists: &'a [BookList], query: &str) -> Vec<&'a BookList> {
    lists
        .iter()
        .filter(|l| matches_query(query, [l.title.as_str(), l.description.as_deref().unwrap_or("")]))
        .collect()
}

pub fn filter_books<'a>(books: &'a [Book], query: &str) -> Vec<&'a Book> {
    books
        .iter()
        .filter(|b| matches_query(query, [b.title.as_str()]))
        .collect()
}

pub struct AppController {
    service: Arc<dyn DataService>,
    notifier: Notifier,
    state: ViewState,
}

impl AppController {
    pub fn new(service: Arc<dyn DataService>, notifier: Notifier) -> Self {
        AppController {
            service,
            notifier,
            state: ViewState::default(),
        }
    }

    /// Builds a controller and performs the initial fetch of all lists.
    pub async fn init(service: Arc<dyn DataService>, notifier: Notifier) -> Self {
        let mut controller = Self::new(service, notifier);
        controller.refresh_lists().await;
        controller
    }

    pub fn service(&self) -> Arc<dyn DataService> {
        self.service.clone()
    }

    pub fn lists(&self) -> &[BookList] {
        &self.state.lists
    }

    pub fn current_list(&self) -> Option<&BookListDetail> {
        self.state.current_list.as_ref()
    }

    pub fn search_query(&self) -> &str {
        &self.state.search_query
    }

    pub fn view_mode(&self) -> ViewMode {
        self.state.view_mode
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.state.search_query = query.to_string();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.state.view_mode = mode;
    }

    pub fn filtered_lists(&self) -> Vec<&BookList> {
        filter_lists(&self.state.lists, &self.state.search_query)
    }

    pub fn filtered_books(&self) -> Vec<&Book> {
        match &self.state.current_list {
            Some(detail) => filter_books(&detail.books, &self.state.search_query),
            None => Vec::new(),
        }
    }

    pub async fn refresh_lists(&mut self) {
        self.state.is_loading = true;
        match self.service.get_lists().await {
            Ok(lists) => self.state.lists = lists,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch lists");
                self.notifier.error("Failed to load lists");
            }
        }
        self.state.is_loading = false;
    }

    pub async fn fetch_list_details(&mut self, id: &str) {
        self.state.is_loading = true;
        match self.service.get_list_details(id).await {
            Ok(detail) => self.state.current_list = detail,
            Err(e) => {
                tracing::error!(error = %e, list_id = %id, "failed to fetch list details");
                self.notifier.error("Failed to load list");
            }
        }
        self.state.is_loading = false;
    }

    pub async fn create_new_list(&mut self, title: &str, description: &str) {
        if let Err(e) = self.service.create_list(title, Some(description)).await {
            tracing::error!(error = %e, "failed to create list");
            self.notifier.error("Failed to create list");
            return;
        }
        self.refresh_lists().await;
        self.notifier.success("List created");
    }

    pub async fn remove_list(&mut self, id: &str) {
        if let Err(e) = self.service.delete_list(id).await {
            tracing::error!(error = %e, list_id = %id, "failed to delete list");
            self.notifier.error("Failed to delete list");
            return;
        }
        self.refresh_lists().await;
        self.notifier.success("List deleted");
    }

    /// Sends `description` as given, so an empty string clears the stored
    /// description rather than keeping it.
    pub async fn update_list_details(&mut self, id: &str, title: &str, description: &str) {
        if let Err(e) = self.service.update_list(id, title, Some(description)).await {
            tracing::error!(error = %e, list_id = %id, "failed to update list");
            self.notifier.error("Failed to update list");
            return;
        }
        self.refresh_lists().await;
        if self.state.current_list.as_ref().is_some_and(|c| c.list.id == id) {
            self.fetch_list_details(id).await;
        }
        self.notifier.success("List updated");
    }

    pub async fn add_new_book(&mut self, list_id: &str, title: &str, url: &str) {
        if let Err(e) = self.service.add_book(list_id, title, url).await {
            tracing::error!(error = %e, list_id = %list_id, "failed to add book");
            self.notifier.error("Failed to add book");
            return;
        }
        self.fetch_list_details(list_id).await;
        self.refresh_lists().await;
        self.notifier.success("Book added");
    }

    /// Does nothing unless a list is open.
    pub async fn remove_book(&mut self, book_id: &str) {
        let Some(list_id) = self.state.current_list.as_ref().map(|c| c.list.id.clone()) else {
            return;
        };

        if let Err(e) = self.service.delete_book(book_id).await {
            tracing::error!(error = %e, book_id = %book_id, "failed to delete book");
            self.notifier.error("Failed to remove book");
            return;
        }
        self.fetch_list_details(&list_id).await;
        self.refresh_lists().await;
        self.notifier.success("Book removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::Library;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Wraps a real library, counts calls, and can be switched to fail.
    struct Flaky {
        inner: Library,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new() -> Self {
            Flaky {
                inner: Library::new(Arc::new(MemoryStore::new())),
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn gate(&self) -> Result<(), ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ServiceError::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DataService for Flaky {
        async fn get_lists(&self) -> Result<Vec<BookList>, ServiceError> {
            self.gate()?;
            self.inner.get_lists().await
        }

        async fn create_list(
            &self,
            title: &str,
            description: Option<&str>,
        ) -> Result<BookList, ServiceError> {
            self.gate()?;
            self.inner.create_list(title, description).await
        }

        async fn delete_list(&self, id: &str) -> Result<(), ServiceError> {
            self.gate()?;
            self.inner.delete_list(id).await
        }

        async fn update_list(
            &self,
            id: &str,
            title: &str,
            description: Option<&str>,
        ) -> Result<BookList, ServiceError> {
            self.gate()?;
            self.inner.update_list(id, title, description).await
        }

        async fn get_list_details(
            &self,
            id: &str,
        ) -> Result<Option<BookListDetail>, ServiceError> {
            self.gate()?;
            self.inner.get_list_details(id).await
        }

        async fn add_book(
            &self,
            list_id: &str,
            title: &str,
            url: &str,
        ) -> Result<Book, ServiceError> {
            self.gate()?;
            self.inner.add_book(list_id, title, url).await
        }

        async fn delete_book(&self, id: &str) -> Result<(), ServiceError> {
            self.gate()?;
            self.inner.delete_book(id).await
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    async fn setup() -> (Arc<Flaky>, AppController, UnboundedReceiver<Notice>) {
        let service = Arc::new(Flaky::new());
        let (notifier, rx) = Notifier::channel();
        let controller = AppController::init(service.clone(), notifier).await;
        (service, controller, rx)
    }

    #[tokio::test]
    async fn mutations_refetch_state() {
        let (_, mut c, mut rx) = setup().await;
        assert!(c.lists().is_empty());

        c.create_new_list("2024 Reads", "favorites").await;
        assert_eq!(c.lists().len(), 1);
        let id = c.lists()[0].id.clone();

        c.fetch_list_details(&id).await;
        c.add_new_book(&id, "Dune", "https://example.com/dune").await;
        assert_eq!(c.current_list().unwrap().books.len(), 1);
        assert_eq!(c.lists()[0].book_count, 1);

        c.update_list_details(&id, "Renamed", "").await;
        assert_eq!(c.lists()[0].title, "Renamed");
        assert_eq!(c.current_list().unwrap().list.title, "Renamed");

        let book_id = c.current_list().unwrap().books[0].id.clone();
        c.remove_book(&book_id).await;
        assert!(c.current_list().unwrap().books.is_empty());
        assert_eq!(c.lists()[0].book_count, 0);

        c.remove_list(&id).await;
        assert!(c.lists().is_empty());
        assert!(!c.is_loading());

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 5);
        assert!(notices.iter().all(|n| n.kind == NoticeKind::Success));
    }

    #[tokio::test]
    async fn failures_notify_and_keep_cache() {
        let (service, mut c, mut rx) = setup().await;
        c.create_new_list("Sci-Fi Favorites", "").await;
        let id = c.lists()[0].id.clone();
        c.fetch_list_details(&id).await;
        drain(&mut rx);

        service.failing.store(true, Ordering::SeqCst);
        c.create_new_list("Cooking", "").await;
        c.refresh_lists().await;
        c.fetch_list_details(&id).await;

        assert_eq!(c.lists().len(), 1);
        assert_eq!(c.current_list().unwrap().list.id, id);
        assert!(!c.is_loading());

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 3);
        assert!(notices.iter().all(|n| n.kind == NoticeKind::Error));
    }

    #[tokio::test]
    async fn remove_book_without_open_list_is_a_no_op() {
        let (service, mut c, mut rx) = setup().await;
        let before = service.calls.load(Ordering::SeqCst);

        c.remove_book("anything").await;

        assert_eq!(service.calls.load(Ordering::SeqCst), before);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn missing_list_clears_current_list() {
        let (_, mut c, _rx) = setup().await;
        c.create_new_list("A", "").await;
        let id = c.lists()[0].id.clone();
        c.fetch_list_details(&id).await;
        assert!(c.current_list().is_some());

        c.fetch_list_details("missing").await;
        assert!(c.current_list().is_none());
    }

    #[tokio::test]
    async fn search_filters_client_side() {
        let (service, mut c, _rx) = setup().await;
        c.create_new_list("Sci-Fi Favorites", "").await;
        c.create_new_list("Cooking", "weeknight dinners").await;
        let calls = service.calls.load(Ordering::SeqCst);

        c.set_search_query("sci");
        let titles: Vec<_> = c.filtered_lists().iter().map(|l| l.title.clone()).collect();
        assert_eq!(titles, vec!["Sci-Fi Favorites"]);

        c.set_search_query("DINNER");
        assert_eq!(c.filtered_lists()[0].title, "Cooking");

        c.set_search_query("");
        assert_eq!(c.filtered_lists().len(), 2);
        assert_eq!(service.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn view_mode_defaults_to_card() {
        let (notifier, _rx) = Notifier::channel();
        let mut c = AppController::new(Arc::new(Flaky::new()), notifier);
        assert_eq!(c.view_mode(), ViewMode::Card);
        c.set_view_mode(ViewMode::List);
        assert_eq!(c.view_mode(), ViewMode::List);
    }
}
