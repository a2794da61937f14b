// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! InfluxDB 1.x HTTP sink

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Point, PointSink, SinkError};

/// Writes points to an InfluxDB database using line protocol
pub struct InfluxSink {
    client: reqwest::Client,
    url: String,
    database: String,
}

impl InfluxSink {
    pub fn new(url: &str, database: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            database: database.to_string(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Create the database if it does not exist yet
    pub async fn ensure_database(&self) -> Result<(), SinkError> {
        let query = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        let response = self
            .client
            .post(format!("{}/query", self.url))
            .query(&[("q", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("InfluxDB database '{}' ready at {}", self.database, self.url);
        Ok(())
    }

    /// Line-protocol body for a batch
    pub fn encode(points: &[Point]) -> String {
        points
            .iter()
            .filter_map(|point| {
                let line = point.to_line_protocol();
                if line.is_none() {
                    warn!("Skipping {} point without usable fields", point.measurement);
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl PointSink for InfluxSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        let body = Self::encode(points);
        if body.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(format!("{}/write", self.url))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Wrote {} points to {}", points.len(), self.database);
        Ok(())
    }
}
