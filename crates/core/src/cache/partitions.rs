//! Partition and entry operations on the SQLite backend.

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::{params, rusqlite};

use super::CacheStorage;
use super::connection::CacheDb;
use super::hash::request_key;
use crate::Error;
use crate::model::{CachedResponse, Request};

/// Row shape shared by both lookup queries.
type EntryRow = (String, i64, String, String, Vec<u8>);

const SELECT_ENTRY: &str = "SELECT e.response_url, e.status, e.status_text, e.headers_json, e.body
     FROM entries e JOIN partitions p ON p.id = e.partition_id";

/// Owned copy of everything a put needs, so it can move into the db thread.
struct PendingEntry {
    key_hash: String,
    method: String,
    request_url: String,
    response: CachedResponse,
    headers_json: String,
}

impl PendingEntry {
    fn new(request: &Request, response: &CachedResponse) -> Result<Self, Error> {
        let request_url = request.cache_url();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;
        Ok(Self {
            key_hash: request_key(&request.method, &request_url),
            method: request.method.to_ascii_uppercase(),
            request_url,
            response: response.clone(),
            headers_json,
        })
    }
}

fn ensure_partition(conn: &rusqlite::Connection, name: &str, now: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO partitions (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, now],
    )?;
    let id = conn.query_row("SELECT id FROM partitions WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn write_entry(conn: &rusqlite::Connection, partition_id: i64, entry: &PendingEntry, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO entries (
            partition_id, key_hash, method, request_url, response_url,
            status, status_text, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(partition_id, key_hash) DO UPDATE SET
            response_url = excluded.response_url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition_id,
            &entry.key_hash,
            &entry.method,
            &entry.request_url,
            &entry.response.url,
            entry.response.status as i64,
            &entry.response.status_text,
            &entry.headers_json,
            entry.response.body.as_ref(),
            now,
        ],
    )?;
    Ok(())
}

fn decode(row: EntryRow) -> Result<CachedResponse, Error> {
    let (url, status, status_text, headers_json, body) = row;
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status} for {url}")))?;
    let headers =
        serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(format!("headers for {url}: {e}")))?;
    Ok(CachedResponse { url, status, status_text, headers, body: body.into() })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_partition(conn, &name, &now)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<CachedResponse>, Error> {
        let name = name.to_string();
        let key_hash = request_key(&request.method, &request.cache_url());
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_ENTRY} WHERE p.name = ?1 AND e.key_hash = ?2"))?;
                optional(stmt.query_row(params![name, key_hash], read_row))
            })
            .await
            .map_err(Error::from)?;

        row.map(decode).transpose()
    }

    async fn match_any(&self, request: &Request) -> Result<Option<CachedResponse>, Error> {
        let key_hash = request_key(&request.method, &request.cache_url());
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE e.key_hash = ?1 ORDER BY p.id ASC LIMIT 1");
                let mut stmt = conn.prepare(&sql)?;
                optional(stmt.query_row(params![key_hash], read_row))
            })
            .await
            .map_err(Error::from)?;

        row.map(decode).transpose()
    }

    async fn put(&self, name: &str, request: &Request, response: &CachedResponse) -> Result<(), Error> {
        let name = name.to_string();
        let entry = PendingEntry::new(request, response)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let partition_id = ensure_partition(conn, &name, &now)?;
                write_entry(conn, partition_id, &entry, &now)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: &[(Request, CachedResponse)]) -> Result<(), Error> {
        let name = name.to_string();
        let pending = entries
            .iter()
            .map(|(req, resp)| PendingEntry::new(req, resp))
            .collect::<Result<Vec<_>, _>>()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let partition_id = ensure_partition(&tx, &name, &now)?;
                for entry in &pending {
                    write_entry(&tx, partition_id, entry, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_count(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries e JOIN partitions p ON p.id = e.partition_id WHERE p.name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
