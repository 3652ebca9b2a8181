//! Remote backend: a [`DataService`] that talks to the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ServiceError;
use crate::model::{Book, BookList, BookListDetail};
use crate::service::DataService;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(ApiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn list_url(&self, id: &str) -> String {
        self.url(&format!("/lists/{}", urlencoding::encode(id)))
    }

    /// Turns a non-success response into the matching error. `list_id` is
    /// the list a 404 refers to. A 404 without the server's `{error}` body
    /// means the route itself is missing, which is a transport problem.
    async fn check(response: Response, list_id: &str) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let server_message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error);

        Err(match (status, server_message) {
            (StatusCode::NOT_FOUND, Some(_)) => ServiceError::list_not_found(list_id),
            (StatusCode::BAD_REQUEST, Some(message)) => ServiceError::Validation(message),
            (status, message) => ServiceError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                message.unwrap_or_else(|| status.to_string())
            )),
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        list_id: &str,
    ) -> Result<T, ServiceError> {
        let response = Self::check(response, list_id).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl DataService for ApiClient {
    async fn get_lists(&self) -> Result<Vec<BookList>, ServiceError> {
        let response = self.client.get(self.url("/lists")).send().await?;
        Self::decode(response, "").await
    }

    async fn create_list(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<BookList, ServiceError> {
        let response = self
            .client
            .post(self.url("/lists"))
            .json(&json!({ "title": title, "description": description }))
            .send()
            .await?;
        Self::decode(response, "").await
    }

    async fn delete_list(&self, id: &str) -> Result<(), ServiceError> {
        let response = self.client.delete(self.list_url(id)).send().await?;
        Self::check(response, id).await?;
        Ok(())
    }

    async fn update_list(
        &self,
        id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<BookList, ServiceError> {
        let response = self
            .client
            .put(self.list_url(id))
            .json(&json!({ "title": title, "description": description }))
            .send()
            .await?;
        Self::decode(response, id).await
    }

    async fn get_list_details(&self, id: &str) -> Result<Option<BookListDetail>, ServiceError> {
        let response = self.client.get(self.list_url(id)).send().await?;
        match Self::decode(response, id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn add_book(&self, list_id: &str, title: &str, url: &str) -> Result<Book, ServiceError> {
        let response = self
            .client
            .post(self.url("/books"))
            .json(&json!({ "listId": list_id, "title": title, "url": url }))
            .send()
            .await?;
        Self::decode(response, list_id).await
    }

    async fn delete_book(&self, id: &str) -> Result<(), ServiceError> {
        let url = self.url(&format!("/books/{}", urlencoding::encode(id)));
        let response = self.client.delete(url).send().await?;
        Self::check(response, id).await?;
        Ok(())
    }
}
