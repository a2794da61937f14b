// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! reqwest transport for the master API

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{FieldError, MasterApi};

/// Plain HTTP client bound to one master
pub struct HttpMaster {
    client: reqwest::Client,
    base_url: String,
    address: String,
}

impl HttpMaster {
    /// Build a client for `address:port` with a per-request timeout
    pub fn new(address: &str, port: u16, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let base_url = if port == 80 {
            format!("http://{}", address)
        } else {
            format!("http://{}:{}", address, port)
        };

        Ok(Self {
            client,
            base_url,
            address: address.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport_error(path: &str, error: reqwest::Error) -> FieldError {
    if error.is_timeout() {
        FieldError::Timeout {
            path: path.to_string(),
        }
    } else {
        FieldError::Connection {
            path: path.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl MasterApi for HttpMaster {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get_raw(&self, path: &str) -> Result<String, FieldError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FieldError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| transport_error(path, e))
    }
}
