//! Generation and entry operations on the SQLite store.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::{params, rusqlite};

use super::connection::StoreDb;
use super::{Store, StoreHandle};
use crate::{Error, Request, Response, ResponseType};

/// An opened generation inside a [`StoreDb`].
#[derive(Clone, Debug)]
pub struct GenerationHandle {
    db: StoreDb,
    name: String,
}

/// Owned row data, built before crossing onto the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    response_url: Option<String>,
    status: i64,
    status_text: String,
    response_type: &'static str,
    redirected: bool,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            key_hash: request.cache_key(),
            method: request.method.to_ascii_uppercase(),
            url: request.url.to_string(),
            response_url: response.url.clone(),
            status: i64::from(response.status),
            status_text: response.status_text.clone(),
            response_type: response.response_type.as_str(),
            redirected: response.redirected,
            headers_json,
            body: response.body.to_vec(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection, generation: &str, stored_at: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO entries (
                generation, key_hash, method, url, response_url, status, status_text,
                response_type, redirected, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(generation, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                response_url = excluded.response_url,
                status = excluded.status,
                status_text = excluded.status_text,
                response_type = excluded.response_type,
                redirected = excluded.redirected,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                generation,
                &self.key_hash,
                &self.method,
                &self.url,
                &self.response_url,
                self.status,
                &self.status_text,
                self.response_type,
                self.redirected as i32,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )
    }
}

#[async_trait]
impl Store for StoreDb {
    type Handle = GenerationHandle;

    async fn open(&self, name: &str) -> Result<GenerationHandle, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("generation name cannot be empty".into()));
        }

        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(GenerationHandle { db: self.clone(), name: name.to_string() })
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn is_installed(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let installed = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1 AND installed_at IS NOT NULL)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(installed)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl StoreHandle for GenerationHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let generation = self.name.clone();
        let key_hash = request.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, status_text, response_type, redirected, headers_json, body
                    FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i32>(4)? == 1,
                        row.get::<_, String>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                    ))
                });

                let (url, status, status_text, response_type, redirected, headers_json, body) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let status = u16::try_from(status).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                let response_type = response_type.parse::<ResponseType>().map_err(Error::CorruptEntry)?;
                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

                Ok(Some(Response {
                    url,
                    status,
                    status_text,
                    response_type,
                    redirected,
                    headers,
                    body: Bytes::from(body),
                }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let generation = self.name.clone();
        let row = EntryRow::new(request, response)?;
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                row.upsert(conn, &generation, &stored_at)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, entries: &[(Request, Response)]) -> Result<(), Error> {
        let generation = self.name.clone();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.upsert(&tx, &generation, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn mark_installed(&self) -> Result<(), Error> {
        let generation = self.name.clone();
        let installed_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let updated = conn.execute(
                    "UPDATE generations SET installed_at = ?2 WHERE name = ?1",
                    params![generation, installed_at],
                )?;
                if updated == 0 {
                    return Err(Error::InvalidInput(format!("generation {generation} does not exist")));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_urls(&self) -> Result<Vec<String>, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
