use crate::domain::model::{Collection, EntityId};
use crate::domain::ports::{Backend, ConfigProvider, Credential, Fetched};
use crate::utils::error::{DeskError, Result};
use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// 以 reqwest 實作的 REST 持久化服務
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: Url,
}

impl RestBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::with_timeout(config.base_url(), config.request_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        // 確保以 '/' 結尾，否則 Url::join 會吃掉最後一段路徑
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| DeskError::InvalidConfigValue {
            field: "backend.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, collection: Collection, id: Option<EntityId>) -> Result<Url> {
        let path = match id {
            Some(id) => format!("{}/{}", collection.path(), id),
            None => collection.path().to_string(),
        };
        self.base_url.join(&path).map_err(|e| DeskError::Config {
            message: format!("Cannot build URL for {}: {}", path, e),
        })
    }

    fn request(
        &self,
        method: Method,
        collection: Collection,
        id: Option<EntityId>,
        credential: &Credential,
    ) -> Result<RequestBuilder> {
        let url = self.url(collection, id)?;
        tracing::debug!("{} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(credential.token()))
    }

    async fn check(
        response: Response,
        operation: &str,
        collection: Collection,
        id: Option<EntityId>,
    ) -> Result<Response> {
        let status = response.status();
        tracing::debug!("{} {} -> {}", operation, collection, status);

        match status {
            s if s.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("Backend rejected credential during {}", operation);
                Err(DeskError::SessionExpired)
            }
            StatusCode::NOT_FOUND => Err(DeskError::not_found(
                collection.path(),
                id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            )),
            StatusCode::PRECONDITION_FAILED => Err(DeskError::Conflict {
                resource: collection.path().to_string(),
                id: id.map(|id| id.to_string()).unwrap_or_default(),
            }),
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(DeskError::Persistence {
                    operation: operation.to_string(),
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }

    /// 空回應視為 None，由呼叫端決定如何補上
    async fn read_json(response: Response) -> Result<Option<Value>> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn list(&self, collection: Collection, credential: &Credential) -> Result<Vec<Value>> {
        let operation = format!("list {}", collection);
        let response = self
            .request(Method::GET, collection, None, credential)?
            .send()
            .await?;
        let response = Self::check(response, &operation, collection, None).await?;

        match Self::read_json(response).await? {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(DeskError::Persistence {
                operation,
                status: 200,
                message: format!("expected a JSON array, got {}", other),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch(
        &self,
        collection: Collection,
        id: EntityId,
        credential: &Credential,
    ) -> Result<Fetched> {
        let operation = format!("read {}/{}", collection, id);
        let response = self
            .request(Method::GET, collection, Some(id), credential)?
            .send()
            .await?;
        let response = Self::check(response, &operation, collection, Some(id)).await?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = Self::read_json(response)
            .await?
            .ok_or_else(|| DeskError::not_found(collection.path(), id))?;

        Ok(Fetched { body, etag })
    }

    async fn create(
        &self,
        collection: Collection,
        body: &Value,
        credential: &Credential,
    ) -> Result<Value> {
        let operation = format!("create {}", collection);
        let response = self
            .request(Method::POST, collection, None, credential)?
            .json(body)
            .send()
            .await?;
        let response = Self::check(response, &operation, collection, None).await?;

        Ok(Self::read_json(response)
            .await?
            .unwrap_or_else(|| body.clone()))
    }

    async fn update(
        &self,
        collection: Collection,
        id: EntityId,
        body: &Value,
        precondition: Option<&str>,
        credential: &Credential,
    ) -> Result<Value> {
        let operation = format!("update {}/{}", collection, id);
        let mut request = self
            .request(Method::PUT, collection, Some(id), credential)?
            .json(body);
        if let Some(etag) = precondition {
            request = request.header(IF_MATCH, etag);
        }

        let response = request.send().await?;
        let response = Self::check(response, &operation, collection, Some(id)).await?;

        Ok(Self::read_json(response)
            .await?
            .unwrap_or_else(|| body.clone()))
    }

    async fn delete(
        &self,
        collection: Collection,
        id: EntityId,
        credential: &Credential,
    ) -> Result<()> {
        let operation = format!("delete {}/{}", collection, id);
        let response = self
            .request(Method::DELETE, collection, Some(id), credential)?
            .send()
            .await?;
        let response = Self::check(response, &operation, collection, Some(id)).await?;

        if response.status() != StatusCode::NO_CONTENT {
            tracing::debug!(
                "Delete of {}/{} answered {} instead of 204",
                collection,
                id,
                response.status()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn credential() -> Credential {
        Credential::bearer("secret-token")
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let backend = RestBackend::new("http://localhost:9000/api").unwrap();
        let url = backend.url(Collection::GoodsDeclaration, Some(3)).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/goods-declaration/3");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        assert!(matches!(
            RestBackend::new("not a url"),
            Err(DeskError::InvalidConfigValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_attaches_bearer_token_and_reads_etag() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/trader/5")
                .header("Authorization", "Bearer secret-token");
            then.status(200)
                .header("Content-Type", "application/json")
                .header("ETag", "\"v2\"")
                .json_body(serde_json::json!({"id": 5, "name": "Acme"}));
        });

        let backend = RestBackend::new(&server.base_url()).unwrap();
        let fetched = backend
            .fetch(Collection::Trader, 5, &credential())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(fetched.body["name"], "Acme");
        assert_eq!(fetched.etag.as_deref(), Some("\"v2\""));
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/packer/1");
            then.status(401);
        });
        server.mock(|when, then| {
            when.method(GET).path("/packer/2");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/packer/3");
            then.status(500).body("boom");
        });

        let backend = RestBackend::new(&server.base_url()).unwrap();

        assert!(matches!(
            backend.fetch(Collection::Packer, 1, &credential()).await,
            Err(DeskError::SessionExpired)
        ));
        assert!(matches!(
            backend.fetch(Collection::Packer, 2, &credential()).await,
            Err(DeskError::NotFound { .. })
        ));
        match backend.fetch(Collection::Packer, 3, &credential()).await {
            Err(DeskError::Persistence { status, message, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_sends_if_match_and_maps_412() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/consignment/8")
                .header("If-Match", "\"v1\"");
            then.status(412);
        });

        let backend = RestBackend::new(&server.base_url()).unwrap();
        let result = backend
            .update(
                Collection::Consignment,
                8,
                &serde_json::json!({"id": 8}),
                Some("\"v1\""),
                &credential(),
            )
            .await;

        mock.assert();
        assert!(matches!(result, Err(DeskError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/commodity/4");
            then.status(204);
        });

        let backend = RestBackend::new(&server.base_url()).unwrap();
        backend
            .delete(Collection::Commodity, 4, &credential())
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_update_with_empty_body_echoes_request() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/packaging/2");
            then.status(200);
        });

        let backend = RestBackend::new(&server.base_url()).unwrap();
        let body = serde_json::json!({"id": 2, "name": "Carton"});
        let echoed = backend
            .update(Collection::Packaging, 2, &body, None, &credential())
            .await
            .unwrap();
        assert_eq!(echoed, body);
    }
}
