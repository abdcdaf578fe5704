//! SQLite implementation of the Cache Store.
//!
//! Generations are rows in `generations`; entries cascade with their owner.

use super::connection::CacheDb;
use super::entry::{CachedResponse, RequestIdentity};
use super::store::CacheStore;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Raw entry columns: status, headers_json, body, stored_at.
type EntryRow = (u16, String, Vec<u8>, String);

/// Insert the generation if missing and return its id.
fn ensure_generation(conn: &rusqlite::Connection, name: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
        ON CONFLICT(name) DO NOTHING",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    let id = conn.query_row("SELECT id FROM generations WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn upsert_entry(
    conn: &rusqlite::Connection, generation_id: i64, identity: &RequestIdentity, response: &CachedResponse,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO entries (generation_id, key_hash, method, uri, status, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(generation_id, key_hash) DO UPDATE SET
            method = excluded.method,
            uri = excluded.uri,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation_id,
            identity.key(),
            identity.method(),
            identity.uri(),
            response.status,
            headers_json,
            &response.body,
            &response.stored_at,
        ],
    )?;
    Ok(())
}

fn decode_row(row: EntryRow) -> Result<CachedResponse, Error> {
    let (status, headers_json, body, stored_at) = row;
    let headers = serde_json::from_str(&headers_json)?;
    Ok(CachedResponse { status, headers, body, stored_at })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn create_generation(&self, generation: &str) -> Result<(), Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_generation(conn, &generation)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, generation: &str, identity: &RequestIdentity) -> Result<Option<CachedResponse>, Error> {
        let generation = generation.to_string();
        let key = identity.key();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.status, e.headers_json, e.body, e.stored_at
                    FROM entries e JOIN generations g ON g.id = e.generation_id
                    WHERE g.name = ?1 AND e.key_hash = ?2",
                )?;

                match stmt.query_row(params![generation, key], read_row) {
                    Ok(row) => decode_row(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, generation: &str, identity: &RequestIdentity, response: &CachedResponse) -> Result<(), Error> {
        let generation = generation.to_string();
        let identity = identity.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let generation_id = ensure_generation(&tx, &generation)?;
                upsert_entry(&tx, generation_id, &identity, &response)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_existing(
        &self, generation: &str, identity: &RequestIdentity, response: &CachedResponse,
    ) -> Result<bool, Error> {
        let generation = generation.to_string();
        let identity = identity.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let headers_json = serde_json::to_string(&response.headers)?;
                let written = conn.execute(
                    "INSERT INTO entries (generation_id, key_hash, method, uri, status, headers_json, body, stored_at)
                    SELECT id, ?2, ?3, ?4, ?5, ?6, ?7, ?8 FROM generations WHERE name = ?1
                    ON CONFLICT(generation_id, key_hash) DO UPDATE SET
                        method = excluded.method,
                        uri = excluded.uri,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        generation,
                        identity.key(),
                        identity.method(),
                        identity.uri(),
                        response.status,
                        headers_json,
                        &response.body,
                        &response.stored_at,
                    ],
                )?;
                Ok(written > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, generation: &str, entries: &[(RequestIdentity, CachedResponse)]) -> Result<(), Error> {
        let generation = generation.to_string();
        let entries = entries.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let generation_id = ensure_generation(&tx, &generation)?;
                for (identity, response) in &entries {
                    upsert_entry(&tx, generation_id, identity, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_any(&self, identity: &RequestIdentity) -> Result<Option<CachedResponse>, Error> {
        let key = identity.key();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.status, e.headers_json, e.body, e.stored_at
                    FROM entries e JOIN generations g ON g.id = e.generation_id
                    WHERE e.key_hash = ?1
                    ORDER BY g.id ASC
                    LIMIT 1",
                )?;

                match stmt.query_row(params![key], read_row) {
                    Ok(row) => decode_row(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![generation])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
