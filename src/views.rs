//! View models for the dashboard, a list's detail page and the public
//! shared page. They hold no markup: they decide what is shown, validate
//! form input before any call is made, and route actions to the
//! [`AppController`].

use thiserror::Error;

use crate::controller::{AppController, filter_books};
use crate::model::{Book, BookList, BookListDetail};
use crate::service::DataService;

const SHARE_FRAGMENT: &str = "/#/shared/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("url must be an absolute http(s) address")]
    InvalidUrl,
}

fn require(field: &'static str, value: &str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::Required(field));
    }
    Ok(())
}

/// Roughly what a browser `type="url"` input accepts.
fn is_absolute_url(value: &str) -> bool {
    let value = value.trim();
    let Some((scheme, rest)) = value.split_once("://") else {
        return false;
    };
    matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https")
        && !rest.is_empty()
        && !rest.starts_with('/')
        && !value.contains(char::is_whitespace)
}

#[derive(Debug, Clone, Default)]
pub struct NewListForm {
    pub title: String,
    pub description: String,
}

impl NewListForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require("title", &self.title)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewBookForm {
    pub title: String,
    pub url: String,
}

impl NewBookForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require("title", &self.title)?;
        require("url", &self.url)?;
        if !is_absolute_url(&self.url) {
            return Err(FormError::InvalidUrl);
        }
        Ok(())
    }
}

/// `{origin}/#/shared/{id}`
pub fn share_link(origin: &str, list_id: &str) -> String {
    format!(
        "{}{}{}",
        origin.trim_end_matches('/'),
        SHARE_FRAGMENT,
        urlencoding::encode(list_id)
    )
}

/// Extracts the list id from a link built by [`share_link`].
pub fn parse_share_link(link: &str) -> Option<String> {
    let (_, id) = link.split_once(SHARE_FRAGMENT)?;
    let id = id.trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    urlencoding::decode(id).ok().map(|id| id.into_owned())
}

pub struct Dashboard {
    origin: String,
}

impl Dashboard {
    pub fn new(origin: &str) -> Self {
        Dashboard {
            origin: origin.to_string(),
        }
    }

    pub fn lists<'a>(&self, controller: &'a AppController) -> Vec<&'a BookList> {
        controller.filtered_lists()
    }

    pub async fn create(
        &self,
        controller: &mut AppController,
        form: &NewListForm,
    ) -> Result<(), FormError> {
        form.validate()?;
        controller
            .create_new_list(form.title.trim(), form.description.trim())
            .await;
        Ok(())
    }

    /// Deletes only when `confirm` agrees. Returns whether the delete was sent.
    pub async fn delete(
        &self,
        controller: &mut AppController,
        list_id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> bool {
        if !confirm("Delete this list? All of its books will be removed too.") {
            return false;
        }
        controller.remove_list(list_id).await;
        true
    }

    pub fn share_link(&self, list_id: &str) -> String {
        share_link(&self.origin, list_id)
    }
}

pub struct ListDetailView {
    list_id: String,
}

impl ListDetailView {
    /// Opens the view and loads the list.
    pub async fn mount(controller: &mut AppController, list_id: &str) -> Self {
        controller.fetch_list_details(list_id).await;
        ListDetailView {
            list_id: list_id.to_string(),
        }
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    /// Reloads when the routed id changes.
    pub async fn set_list_id(&mut self, controller: &mut AppController, list_id: &str) {
        if self.list_id != list_id {
            self.list_id = list_id.to_string();
            controller.fetch_list_details(list_id).await;
        }
    }

    pub fn list<'a>(&self, controller: &'a AppController) -> Option<&'a BookListDetail> {
        controller
            .current_list()
            .filter(|detail| detail.list.id == self.list_id)
    }

    pub fn books<'a>(&self, controller: &'a AppController) -> Vec<&'a Book> {
        match self.list(controller) {
            Some(_) => controller.filtered_books(),
            None => Vec::new(),
        }
    }

    pub async fn add_book(
        &self,
        controller: &mut AppController,
        form: &NewBookForm,
    ) -> Result<(), FormError> {
        form.validate()?;
        controller
            .add_new_book(&self.list_id, form.title.trim(), form.url.trim())
            .await;
        Ok(())
    }

    pub async fn delete_book(&self, controller: &mut AppController, book_id: &str) {
        controller.remove_book(book_id).await;
    }
}

/// Read-only page reached through a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedListView {
    Found(BookListDetail),
    NotFound,
}

impl SharedListView {
    /// Resolves straight through the service, bypassing the controller cache.
    pub async fn load(service: &dyn DataService, list_id: &str) -> Self {
        match service.get_list_details(list_id).await {
            Ok(Some(detail)) => SharedListView::Found(detail),
            Ok(None) => SharedListView::NotFound,
            Err(e) => {
                tracing::error!(error = %e, list_id = %list_id, "failed to load shared list");
                SharedListView::NotFound
            }
        }
    }

    pub async fn from_link(service: &dyn DataService, link: &str) -> Self {
        match parse_share_link(link) {
            Some(id) => Self::load(service, &id).await,
            None => SharedListView::NotFound,
        }
    }

    pub fn books<'a>(&'a self, query: &str) -> Vec<&'a Book> {
        match self {
            SharedListView::Found(detail) => filter_books(&detail.books, query),
            SharedListView::NotFound => Vec::new(),
        }
    }
}
