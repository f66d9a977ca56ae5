//! HTTP-backed object store.
//!
//! Objects are served at `{base}/{prefix}/{name}`; listing a prefix is a
//! `GET {base}/{prefix}/` returning a JSON string array of object names.

use std::time::Duration;

use async_trait::async_trait;

use super::{ObjectStore, StoreError};

pub struct HttpObjectStore {
    client: reqwest::Client,
    base: String,
}

impl HttpObjectStore {
    pub fn new(base: String, request_timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/{}/", self.base, prefix);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!(
                "list {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn get_object(&self, prefix: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!("{}/{}/{}", self.base, prefix, name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("{}/{}", prefix, name)));
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!(
                "get {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
