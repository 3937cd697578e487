use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::registry::{ProxyRouter, RouterError};

#[derive(Serialize)]
struct BackendBody<'a> {
    host: &'a str,
    port: u16,
}

#[derive(Serialize)]
struct ConnectBody<'a> {
    backend: &'a str,
}

/// Routing tier driven over its admin HTTP API. The proxy exposes backend
/// registration and player transfer endpoints; this adapter is the
/// production `ProxyRouter`.
#[derive(Clone)]
pub struct HttpProxyRouter {
    http: Client,
    base_url: String,
}

impl HttpProxyRouter {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, RouterError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| RouterError::Rejected(err.to_string()))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl ProxyRouter for HttpProxyRouter {
    async fn register_backend(&self, name: &str, host: &str, port: u16) -> Result<(), RouterError> {
        let url = format!("{}/backends/{}", self.base_url, name);
        let res = self
            .http
            .put(url)
            .json(&BackendBody { host, port })
            .send()
            .await
            .map_err(|err| RouterError::Rejected(err.to_string()))?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(RouterError::Rejected(format!(
                "register {name}: {}",
                res.status()
            )))
        }
    }

    async fn unregister_backend(&self, name: &str) -> Result<(), RouterError> {
        let url = format!("{}/backends/{}", self.base_url, name);
        let res = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| RouterError::Rejected(err.to_string()))?;
        // The proxy answers 404 for a name it never had; that is still "gone".
        if res.status().is_success() || res.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(RouterError::Rejected(format!(
                "unregister {name}: {}",
                res.status()
            )))
        }
    }

    async fn connect_player(&self, player_id: Uuid, backend: &str) -> Result<(), RouterError> {
        let url = format!("{}/players/{}/connect", self.base_url, player_id);
        let res = self
            .http
            .post(url)
            .json(&ConnectBody { backend })
            .send()
            .await
            .map_err(|err| RouterError::ConnectFailed {
                backend: backend.to_string(),
                message: err.to_string(),
            })?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(RouterError::ConnectFailed {
                backend: backend.to_string(),
                message: res.status().to_string(),
            })
        }
    }
}
