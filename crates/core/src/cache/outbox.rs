//! Queue of form submissions waiting for connectivity.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use crate::Error;

/// A form submission that could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedForm {
    pub id: i64,
    pub tag: String,
    pub payload_json: String,
    pub queued_at: String,
}

impl CacheDb {
    /// Queue a payload under a sync tag. Returns the new row id.
    pub async fn enqueue_form(&self, tag: &str, payload_json: &str) -> Result<i64, Error> {
        let tag = tag.to_string();
        let payload_json = payload_json.to_string();
        let queued_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO outbox (tag, payload_json, queued_at) VALUES (?1, ?2, ?3)",
                    params![tag, payload_json, queued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Queued payloads for a tag, oldest first.
    pub async fn queued_forms(&self, tag: &str) -> Result<Vec<QueuedForm>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<QueuedForm>, Error> {
                let mut stmt =
                    conn.prepare("SELECT id, tag, payload_json, queued_at FROM outbox WHERE tag = ?1 ORDER BY id ASC")?;
                let forms = stmt
                    .query_map(params![tag], |row| {
                        Ok(QueuedForm {
                            id: row.get(0)?,
                            tag: row.get(1)?,
                            payload_json: row.get(2)?,
                            queued_at: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(forms)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove delivered payloads. Returns the number of rows removed.
    pub async fn remove_forms(&self, ids: &[i64]) -> Result<u64, Error> {
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut removed = 0u64;
                for id in &ids {
                    removed += tx.execute("DELETE FROM outbox WHERE id = ?1", params![id])? as u64;
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }
}
