// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Local SQLite point store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Point, PointSink, SinkError};

/// A point read back from the store
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: i64,
    pub measurement: String,
    pub timestamp: String,
    pub tags: Value,
    pub fields: Value,
}

/// Points table in a SQLite file, for deployments without InfluxDB
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteSink {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let sink = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        };
        sink.create_tables()?;

        info!("Point store opened at {:?}", path);
        Ok(sink)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        let sink = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            path: None,
        };
        sink.create_tables()?;
        Ok(sink)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn create_tables(&self) -> Result<(), SinkError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                measurement TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                tags TEXT NOT NULL,
                fields TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_points_timestamp ON points(timestamp);
            CREATE INDEX IF NOT EXISTS idx_points_measurement ON points(measurement);
        "#,
        )?;
        Ok(())
    }

    fn insert_batch(conn: &Connection, points: &[Point]) -> Result<usize, SinkError> {
        let tx = conn.unchecked_transaction()?;
        let mut count = 0;

        for point in points {
            let tags: Map<String, Value> = point
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let mut fields = Map::new();
            for (k, v) in &point.fields {
                fields.insert(k.clone(), serde_json::to_value(v)?);
            }

            tx.execute(
                "INSERT INTO points (measurement, timestamp, tags, fields) VALUES (?1, ?2, ?3, ?4)",
                params![
                    point.measurement,
                    point.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                    Value::Object(tags).to_string(),
                    Value::Object(fields).to_string(),
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// Most recent points of a measurement, newest first
    pub fn query_points(
        &self,
        measurement: &str,
        limit: usize,
    ) -> Result<Vec<StoredPoint>, SinkError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, measurement, timestamp, tags, fields FROM points
             WHERE measurement = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![measurement, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, measurement, timestamp, tags, fields) = row?;
            results.push(StoredPoint {
                id,
                measurement,
                timestamp,
                tags: serde_json::from_str(&tags)?,
                fields: serde_json::from_str(&fields)?,
            });
        }
        Ok(results)
    }

    pub fn count(&self) -> Result<usize, SinkError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM points", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete points older than the retention window
    pub fn cleanup(&self, retention_days: u32) -> Result<usize, SinkError> {
        let conn = self.conn.lock();
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));

        let deleted = conn.execute(
            "DELETE FROM points WHERE timestamp < ?1",
            params![cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)],
        )?;

        info!("Cleaned up {} points older than {} days", deleted, retention_days);
        Ok(deleted)
    }
}

#[async_trait]
impl PointSink for SqliteSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        let conn = Arc::clone(&self.conn);
        let batch = points.to_vec();

        let written = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::insert_batch(&conn, &batch)
        })
        .await
        .map_err(|e| SinkError::Task(e.to_string()))??;

        debug!("Stored {} points", written);
        Ok(())
    }
}
