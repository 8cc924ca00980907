// crates/triage-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Persistence
// Description: Relational Config/Session/BoardScope/Ticket/History store.
// Purpose: Durable, single-writer backing store for the orchestrator.
// Dependencies: triage-gate-core, rusqlite, serde_json, time, tokio
// ============================================================================

//! ## Overview
//! [`SqlitePersistence`] implements [`Persistence`] over a single `SQLite`
//! connection opened in WAL journal mode. One writer connection, guarded by a
//! mutex, serializes every commit; `commit_run` and `commit_reanalysis` each
//! run inside one `SQLite` transaction so a failure rolls back cleanly (§4.9).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use triage_gate_core::AnalysisHistory;
use triage_gate_core::AnalysisSession;
use triage_gate_core::BoardScope;
use triage_gate_core::BoardScopeId;
use triage_gate_core::Config;
use triage_gate_core::ConfigData;
use triage_gate_core::ConfigId;
use triage_gate_core::Criticality;
use triage_gate_core::ExternalCardId;
use triage_gate_core::HistoryId;
use triage_gate_core::Justification;
use triage_gate_core::PendingCardWrite;
use triage_gate_core::SessionId;
use triage_gate_core::SessionReference;
use triage_gate_core::StoreError;
use triage_gate_core::Ticket;
use triage_gate_core::TicketId;
use triage_gate_core::TicketMetadata;
use triage_gate_core::Timestamp;

/// Default busy timeout applied to the store connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed relational store.
///
/// # Invariants
/// - All access goes through a single mutex-guarded connection; `commit_run`
///   and `commit_reanalysis` each execute inside one `SQLite` transaction.
pub struct SqlitePersistence {
    /// Shared writer connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePersistence {
    /// Opens (creating if absent) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be opened or the schema
    /// cannot be initialized.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection =
            Connection::open_with_flags(path, flags).map_err(|err| StoreError::Db(err.to_string()))?;
        apply_pragmas(&connection)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens an in-memory store, useful for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the schema cannot be initialized.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|err| StoreError::Db(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs `f` against the guarded connection on a blocking thread.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let conn = connection.lock().map_err(|_| StoreError::Db("poisoned lock".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|err| StoreError::Db(err.to_string()))?
    }
}

/// Applies the pragmas needed for WAL, single-writer semantics.
fn apply_pragmas(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch("PRAGMA journal_mode = wal; PRAGMA foreign_keys = ON; PRAGMA synchronous = normal;")
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .map_err(|err| StoreError::Db(err.to_string()))
}

/// Creates every table if absent. Idempotent; used by the store on open and
/// by the CLI `migrate` subcommand.
fn initialize_schema(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS configs (
                id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                reference TEXT NOT NULL UNIQUE,
                reanalyse INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS board_scopes (
                id INTEGER PRIMARY KEY,
                session_id INTEGER NOT NULL REFERENCES sessions(id),
                platform TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                board_scope_id INTEGER NOT NULL REFERENCES board_scopes(id),
                board_name TEXT NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY,
                ticket_id INTEGER NOT NULL REFERENCES tickets(id),
                session_id INTEGER NOT NULL REFERENCES sessions(id),
                criticality TEXT NOT NULL,
                justification TEXT NOT NULL,
                analyzed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_ticket ON history(ticket_id, analyzed_at);",
        )
        .map_err(|err| StoreError::Db(err.to_string()))
}

// ============================================================================
// SECTION: Timestamp and Criticality Codecs
// ============================================================================

/// Formats a timestamp for storage.
fn format_timestamp(ts: Timestamp) -> Result<String, StoreError> {
    ts.format(&Rfc3339).map_err(|err| StoreError::Decode(err.to_string()))
}

/// Parses a stored timestamp.
fn parse_timestamp(raw: &str) -> Result<Timestamp, StoreError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| StoreError::Decode(err.to_string()))
}

/// Parses a stored criticality string.
fn parse_criticality(raw: &str) -> Result<Criticality, StoreError> {
    match raw {
        "high" => Ok(Criticality::High),
        "medium" => Ok(Criticality::Medium),
        "low" => Ok(Criticality::Low),
        other => Err(StoreError::Decode(format!("unrecognized criticality: {other}"))),
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Reads one [`Config`] row from `row`.
///
/// `SQLite` stores row ids as signed 64-bit integers; the id is converted to
/// `u64` by [`decode_config`].
fn map_config_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Decodes a raw config row into a [`Config`].
fn decode_config(raw: (i64, String, String, String)) -> Result<Config, StoreError> {
    let (id, data, created_at, updated_at) = raw;
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let id = id as u64;
    Ok(Config {
        id: ConfigId::from_raw(id).ok_or_else(|| StoreError::Decode("config id was zero".to_string()))?,
        data: serde_json::from_str(&data).map_err(|err| StoreError::Decode(err.to_string()))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Reads one ticket row.
///
/// `SQLite` stores row ids as signed 64-bit integers; ids are converted to
/// `u64` by [`decode_ticket`].
fn map_ticket_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

/// Decodes a raw ticket row into a [`Ticket`].
fn decode_ticket(raw: (i64, String, i64, String, String)) -> Result<Ticket, StoreError> {
    let (id, external_id, board_scope_id, board_name, metadata) = raw;
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let id = id as u64;
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let board_scope_id = board_scope_id as u64;
    Ok(Ticket {
        id: TicketId::from_raw(id).ok_or_else(|| StoreError::Decode("ticket id was zero".to_string()))?,
        external_id: ExternalCardId::from(external_id),
        board_scope_id: BoardScopeId::from_raw(board_scope_id)
            .ok_or_else(|| StoreError::Decode("board scope id was zero".to_string()))?,
        board_name,
        metadata: serde_json::from_str(&metadata).map_err(|err| StoreError::Decode(err.to_string()))?,
    })
}

/// Reads one history row.
///
/// `SQLite` stores row ids as signed 64-bit integers; ids are converted to
/// `u64` by [`decode_history`].
fn map_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, i64, i64, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

/// Decodes a raw history row into an [`AnalysisHistory`].
fn decode_history(raw: (i64, i64, i64, String, String, String)) -> Result<AnalysisHistory, StoreError> {
    let (id, ticket_id, session_id, criticality, justification, analyzed_at) = raw;
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let id = id as u64;
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let ticket_id = ticket_id as u64;
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let session_id = session_id as u64;
    Ok(AnalysisHistory {
        id: HistoryId::from_raw(id).ok_or_else(|| StoreError::Decode("history id was zero".to_string()))?,
        ticket_id: TicketId::from_raw(ticket_id).ok_or_else(|| StoreError::Decode("ticket id was zero".to_string()))?,
        session_id: SessionId::from_raw(session_id)
            .ok_or_else(|| StoreError::Decode("session id was zero".to_string()))?,
        criticality: parse_criticality(&criticality)?,
        justification: serde_json::from_str(&justification).map_err(|err| StoreError::Decode(err.to_string()))?,
        analyzed_at: parse_timestamp(&analyzed_at)?,
    })
}

// ============================================================================
// SECTION: Persistence Implementation
// ============================================================================

#[async_trait::async_trait]
impl triage_gate_core::Persistence for SqlitePersistence {
    async fn create_config(&self, data: ConfigData) -> Result<Config, StoreError> {
        self.with_connection(move |conn| {
            let now = triage_gate_core::now_utc();
            let now_str = format_timestamp(now)?;
            let data_json = serde_json::to_string(&data).map_err(|err| StoreError::Decode(err.to_string()))?;
            conn.execute(
                "INSERT INTO configs (data, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![data_json, now_str],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
            let id = conn.last_insert_rowid();
            #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
            let id = ConfigId::from_raw(id as u64).ok_or_else(|| StoreError::Decode("new config id was zero".to_string()))?;
            Ok(Config { id, data, created_at: now, updated_at: now })
        })
        .await
    }

    async fn update_config(&self, id: ConfigId, data: ConfigData) -> Result<Config, StoreError> {
        self.with_connection(move |conn| {
            let created_at: Option<String> = conn
                .query_row("SELECT created_at FROM configs WHERE id = ?1", params![id.get() as i64], |row| row.get(0))
                .optional()
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let Some(created_at) = created_at else {
                return Err(StoreError::NotFound(format!("config {id} not found")));
            };
            let now = triage_gate_core::now_utc();
            let now_str = format_timestamp(now)?;
            let data_json = serde_json::to_string(&data).map_err(|err| StoreError::Decode(err.to_string()))?;
            conn.execute(
                "UPDATE configs SET data = ?1, updated_at = ?2 WHERE id = ?3",
                params![data_json, now_str, id.get() as i64],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
            Ok(Config { id, data, created_at: parse_timestamp(&created_at)?, updated_at: now })
        })
        .await
    }

    async fn list_configs(&self) -> Result<Vec<Config>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, data, created_at, updated_at FROM configs ORDER BY id")
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], map_config_row)
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let mut configs = Vec::new();
            for row in rows {
                configs.push(decode_config(row.map_err(|err| StoreError::Db(err.to_string()))?)?);
            }
            Ok(configs)
        })
        .await
    }

    async fn get_config(&self, id: ConfigId) -> Result<Option<Config>, StoreError> {
        self.with_connection(move |conn| {
            let raw = conn
                .query_row("SELECT id, data, created_at, updated_at FROM configs WHERE id = ?1", params![id.get() as i64], map_config_row)
                .optional()
                .map_err(|err| StoreError::Db(err.to_string()))?;
            raw.map(decode_config).transpose()
        })
        .await
    }

    async fn create_session(
        &self,
        reanalyse: bool,
        reference: Option<SessionReference>,
        platform: &str,
    ) -> Result<(AnalysisSession, BoardScope), StoreError> {
        let platform = platform.to_string();
        self.with_connection(move |conn| {
            let now = triage_gate_core::now_utc();
            let now_str = format_timestamp(now)?;
            let reference = reference.unwrap_or_else(|| SessionReference::from(default_session_reference(now, reanalyse)));
            conn.execute(
                "INSERT INTO sessions (reference, reanalyse, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![reference.as_str(), reanalyse, now_str],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
            let session_row_id = conn.last_insert_rowid();
            #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
            let session_id = SessionId::from_raw(session_row_id as u64)
                .ok_or_else(|| StoreError::Decode("new session id was zero".to_string()))?;

            conn.execute(
                "INSERT INTO board_scopes (session_id, platform) VALUES (?1, ?2)",
                params![session_id.get() as i64, platform],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
            let scope_row_id = conn.last_insert_rowid();
            #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
            let scope_id = BoardScopeId::from_raw(scope_row_id as u64)
                .ok_or_else(|| StoreError::Decode("new board scope id was zero".to_string()))?;

            let session = AnalysisSession { id: session_id, reference, reanalyse, created_at: now, updated_at: now };
            let scope = BoardScope { id: scope_id, session_id, platform };
            Ok((session, scope))
        })
        .await
    }

    async fn get_ticket_by_external_id(&self, external_id: &ExternalCardId) -> Result<Option<Ticket>, StoreError> {
        let external_id = external_id.as_str().to_string();
        self.with_connection(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, external_id, board_scope_id, board_name, metadata FROM tickets WHERE external_id = ?1",
                    params![external_id],
                    map_ticket_row,
                )
                .optional()
                .map_err(|err| StoreError::Db(err.to_string()))?;
            raw.map(decode_ticket).transpose()
        })
        .await
    }

    async fn latest_history(&self, ticket_id: TicketId) -> Result<Option<AnalysisHistory>, StoreError> {
        self.with_connection(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, ticket_id, session_id, criticality, justification, analyzed_at FROM history
                     WHERE ticket_id = ?1 ORDER BY analyzed_at DESC, id DESC LIMIT 1",
                    params![ticket_id.get() as i64],
                    map_history_row,
                )
                .optional()
                .map_err(|err| StoreError::Db(err.to_string()))?;
            raw.map(decode_history).transpose()
        })
        .await
    }

    async fn history_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<AnalysisHistory>, StoreError> {
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, ticket_id, session_id, criticality, justification, analyzed_at FROM history
                     WHERE ticket_id = ?1 ORDER BY analyzed_at ASC, id ASC",
                )
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![ticket_id.get() as i64], map_history_row)
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let mut history = Vec::new();
            for row in rows {
                history.push(decode_history(row.map_err(|err| StoreError::Db(err.to_string()))?)?);
            }
            Ok(history)
        })
        .await
    }

    async fn commit_run(&self, session_id: SessionId, writes: Vec<PendingCardWrite>) -> Result<Vec<AnalysisHistory>, StoreError> {
        self.with_connection(move |conn| {
            let tx = rusqlite::Connection::unchecked_transaction(conn).map_err(|err| StoreError::Db(err.to_string()))?;
            let mut appended = Vec::with_capacity(writes.len());
            for write in writes {
                let history = commit_one_card_write(&tx, session_id, write)?;
                appended.push(history);
            }
            tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
            Ok(appended)
        })
        .await
    }

    async fn commit_reanalysis(
        &self,
        ticket_id: TicketId,
        session_id: SessionId,
        criticality: Criticality,
        justification: Justification,
        analyzed_at: Timestamp,
        soft_result: serde_json::Value,
    ) -> Result<AnalysisHistory, StoreError> {
        self.with_connection(move |conn| {
            let tx = rusqlite::Connection::unchecked_transaction(conn).map_err(|err| StoreError::Db(err.to_string()))?;
            let history = insert_history_row(&tx, ticket_id, session_id, criticality, justification, analyzed_at)?;
            update_ticket_analysis_result(&tx, ticket_id, Some(soft_result))?;
            tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
            Ok(history)
        })
        .await
    }

    async fn all_history(&self) -> Result<Vec<AnalysisHistory>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, ticket_id, session_id, criticality, justification, analyzed_at FROM history ORDER BY id")
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], map_history_row)
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let mut history = Vec::new();
            for row in rows {
                history.push(decode_history(row.map_err(|err| StoreError::Db(err.to_string()))?)?);
            }
            Ok(history)
        })
        .await
    }

    async fn all_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, external_id, board_scope_id, board_name, metadata FROM tickets ORDER BY id")
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], map_ticket_row)
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let mut tickets = Vec::new();
            for row in rows {
                tickets.push(decode_ticket(row.map_err(|err| StoreError::Db(err.to_string()))?)?);
            }
            Ok(tickets)
        })
        .await
    }

    async fn all_sessions(&self) -> Result<Vec<AnalysisSession>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, reference, reanalyse, created_at, updated_at FROM sessions ORDER BY id")
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?, row.get::<_, String>(3)?, row.get::<_, String>(4)?))
                })
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let mut sessions = Vec::new();
            for row in rows {
                let (id, reference, reanalyse, created_at, updated_at) = row.map_err(|err| StoreError::Db(err.to_string()))?;
                #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
                let id = id as u64;
                sessions.push(AnalysisSession {
                    id: SessionId::from_raw(id).ok_or_else(|| StoreError::Decode("session id was zero".to_string()))?,
                    reference: SessionReference::from(reference),
                    reanalyse,
                    created_at: parse_timestamp(&created_at)?,
                    updated_at: parse_timestamp(&updated_at)?,
                });
            }
            Ok(sessions)
        })
        .await
    }

    async fn clear_cache(&self, ticket_id: Option<TicketId>) -> Result<u64, StoreError> {
        self.with_connection(move |conn| {
            let ids: Vec<i64> = match ticket_id {
                Some(id) => vec![id.get() as i64],
                None => {
                    let mut stmt = conn.prepare("SELECT id FROM tickets").map_err(|err| StoreError::Db(err.to_string()))?;
                    let rows = stmt
                        .query_map(params![], |row| row.get::<_, i64>(0))
                        .map_err(|err| StoreError::Db(err.to_string()))?;
                    rows.collect::<Result<Vec<_>, _>>().map_err(|err| StoreError::Db(err.to_string()))?
                }
            };
            let mut cleared = 0u64;
            for raw_id in ids {
                #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
                let raw_id = raw_id as u64;
                let id = TicketId::from_raw(raw_id).ok_or_else(|| StoreError::Decode("ticket id was zero".to_string()))?;
                if update_ticket_cache_cleared(conn, id)? {
                    cleared += 1;
                }
            }
            Ok(cleared)
        })
        .await
    }
}

// ============================================================================
// SECTION: Transaction Helpers
// ============================================================================

/// Applies one [`PendingCardWrite`]: ensures the ticket row, appends the
/// history row, and updates mutable ticket metadata (§4.1 step 5).
fn commit_one_card_write(tx: &Transaction<'_>, session_id: SessionId, write: PendingCardWrite) -> Result<AnalysisHistory, StoreError> {
    let external_id = write.card.id.as_str().to_string();
    let existing: Option<(i64, String)> = tx
        .query_row("SELECT id, metadata FROM tickets WHERE external_id = ?1", params![external_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()
        .map_err(|err| StoreError::Db(err.to_string()))?;

    let ticket_id = match existing {
        Some((raw_id, metadata_json)) => {
            #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
            let raw_id = raw_id as u64;
            let mut metadata: TicketMetadata =
                serde_json::from_str(&metadata_json).map_err(|err| StoreError::Decode(err.to_string()))?;
            metadata.name = write.card.name.clone();
            metadata.desc = write.card.desc.clone();
            metadata.due = write.card.due.clone();
            metadata.url = write.card.url.clone();
            metadata.labels = write.card.labels.clone();
            metadata.members = write.card.members.clone();
            metadata.board_id = write.board_id.clone();
            metadata.board_name = write.board_name.clone();
            if let Some((list_id, list_name)) = &write.moved_to {
                metadata.list_id = list_id.clone();
                metadata.list_name = list_name.clone();
                metadata.last_moved_at = Some(write.analyzed_at);
            } else {
                metadata.list_id = write.list_id.clone();
                metadata.list_name = write.list_name.clone();
            }
            metadata.last_analysis_config = Some(write.config_snapshot.clone());
            let metadata_json = serde_json::to_string(&metadata).map_err(|err| StoreError::Decode(err.to_string()))?;
            tx.execute("UPDATE tickets SET metadata = ?1 WHERE id = ?2", params![metadata_json, raw_id as i64])
                .map_err(|err| StoreError::Db(err.to_string()))?;
            TicketId::from_raw(raw_id).ok_or_else(|| StoreError::Decode("ticket id was zero".to_string()))?
        }
        None => {
            let mut metadata = TicketMetadata::from_card(&write.card, &write.board_id, &write.board_name, &write.list_id, &write.list_name);
            metadata.last_analysis_config = Some(write.config_snapshot.clone());
            if let Some((list_id, list_name)) = &write.moved_to {
                metadata.list_id = list_id.clone();
                metadata.list_name = list_name.clone();
                metadata.last_moved_at = Some(write.analyzed_at);
            }
            let metadata_json = serde_json::to_string(&metadata).map_err(|err| StoreError::Decode(err.to_string()))?;
            tx.execute(
                "INSERT INTO tickets (external_id, board_scope_id, board_name, metadata) VALUES (?1, ?2, ?3, ?4)",
                params![external_id, write.scope_id.get() as i64, write.board_name, metadata_json],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
            let raw_id = tx.last_insert_rowid();
            #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
            let id = TicketId::from_raw(raw_id as u64).ok_or_else(|| StoreError::Decode("new ticket id was zero".to_string()))?;
            id
        }
    };

    insert_history_row(tx, ticket_id, session_id, write.criticality, write.justification, write.analyzed_at)
}

/// Inserts one append-only history row and returns it.
fn insert_history_row(
    tx: &Transaction<'_>,
    ticket_id: TicketId,
    session_id: SessionId,
    criticality: Criticality,
    justification: Justification,
    analyzed_at: Timestamp,
) -> Result<AnalysisHistory, StoreError> {
    let analyzed_at_str = format_timestamp(analyzed_at)?;
    let justification_json = serde_json::to_string(&justification).map_err(|err| StoreError::Decode(err.to_string()))?;
    tx.execute(
        "INSERT INTO history (ticket_id, session_id, criticality, justification, analyzed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![ticket_id.get() as i64, session_id.get() as i64, criticality.as_str(), justification_json, analyzed_at_str],
    )
    .map_err(|err| StoreError::Db(err.to_string()))?;
    let raw_id = tx.last_insert_rowid();
    #[allow(clippy::cast_sign_loss, reason = "SQLite rowids are always positive here")]
    let id = HistoryId::from_raw(raw_id as u64).ok_or_else(|| StoreError::Decode("new history id was zero".to_string()))?;
    Ok(AnalysisHistory { id, ticket_id, session_id, criticality, justification, analyzed_at })
}

/// Updates the soft `analysis_result` cache field on a ticket's metadata.
fn update_ticket_analysis_result(tx: &Transaction<'_>, ticket_id: TicketId, result: Option<serde_json::Value>) -> Result<(), StoreError> {
    let metadata_json: String = tx
        .query_row("SELECT metadata FROM tickets WHERE id = ?1", params![ticket_id.get() as i64], |row| row.get(0))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    let mut metadata: TicketMetadata = serde_json::from_str(&metadata_json).map_err(|err| StoreError::Decode(err.to_string()))?;
    metadata.analysis_result = result;
    let metadata_json = serde_json::to_string(&metadata).map_err(|err| StoreError::Decode(err.to_string()))?;
    tx.execute("UPDATE tickets SET metadata = ?1 WHERE id = ?2", params![metadata_json, ticket_id.get() as i64])
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(())
}

/// Clears `analysis_result` and `last_analysis_config` on one ticket.
/// Returns `true` if the ticket existed.
fn update_ticket_cache_cleared(conn: &Connection, ticket_id: TicketId) -> Result<bool, StoreError> {
    let metadata_json: Option<String> = conn
        .query_row("SELECT metadata FROM tickets WHERE id = ?1", params![ticket_id.get() as i64], |row| row.get(0))
        .optional()
        .map_err(|err| StoreError::Db(err.to_string()))?;
    let Some(metadata_json) = metadata_json else {
        return Ok(false);
    };
    let mut metadata: TicketMetadata = serde_json::from_str(&metadata_json).map_err(|err| StoreError::Decode(err.to_string()))?;
    metadata.analysis_result = None;
    metadata.last_analysis_config = None;
    let metadata_json = serde_json::to_string(&metadata).map_err(|err| StoreError::Decode(err.to_string()))?;
    conn.execute("UPDATE tickets SET metadata = ?1 WHERE id = ?2", params![metadata_json, ticket_id.get() as i64])
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(true)
}

/// Builds the default session reference per §4.5 (`analyse_YYYYMMDD_HHMM` for
/// a bulk run, `REANALYSE-YYYYMMDD_HHMMSS` for a reanalysis).
fn default_session_reference(now: Timestamp, reanalyse: bool) -> String {
    if reanalyse {
        format!(
            "REANALYSE-{:04}{:02}{:02}_{:02}{:02}{:02}",
            now.year(), u8::from(now.month()), now.day(), now.hour(), now.minute(), now.second()
        )
    } else {
        format!("analyse_{:04}{:02}{:02}_{:02}{:02}", now.year(), u8::from(now.month()), now.day(), now.hour(), now.minute())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::SqlitePersistence;
    use triage_gate_core::Card;
    use triage_gate_core::Criticality;
    use triage_gate_core::ExternalCardId;
    use triage_gate_core::Justification;
    use triage_gate_core::PendingCardWrite;
    use triage_gate_core::Persistence;

    fn sample_card(id: &str) -> Card {
        Card {
            id: ExternalCardId::from(id),
            name: "name".to_string(),
            desc: "desc".to_string(),
            due: None,
            url: "https://example.test/card".to_string(),
            labels: Vec::new(),
            members: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_session_assigns_a_default_reference_per_kind() {
        let store = SqlitePersistence::open_in_memory().expect("schema init");
        let (bulk, _) = store.create_session(false, None, "trello").await.expect("create session");
        assert!(bulk.reference.as_str().starts_with("analyse_"));
        let (reanalysis, _) = store.create_session(true, None, "trello").await.expect("create session");
        assert!(reanalysis.reference.as_str().starts_with("REANALYSE-"));
    }

    #[tokio::test]
    async fn commit_run_creates_ticket_and_history_atomically() {
        let store = SqlitePersistence::open_in_memory().expect("schema init");
        let (session, scope) = store.create_session(false, None, "trello").await.expect("create session");
        let write = PendingCardWrite {
            scope_id: scope.id,
            card: sample_card("card-1"),
            board_id: "board".to_string(),
            board_name: "Board".to_string(),
            list_id: "list".to_string(),
            list_name: "List".to_string(),
            criticality: Criticality::High,
            justification: Justification::new("urgent".to_string()),
            analyzed_at: triage_gate_core::now_utc(),
            moved_to: None,
            config_snapshot: serde_json::json!({"a": 1}),
        };
        let appended = store.commit_run(session.id, vec![write]).await.expect("commit");
        assert_eq!(appended.len(), 1);
        let ticket = store
            .get_ticket_by_external_id(&ExternalCardId::from("card-1"))
            .await
            .expect("query")
            .expect("ticket exists");
        assert_eq!(ticket.board_scope_id, scope.id);
        let history = store.history_for_ticket(ticket.id).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].criticality, Criticality::High);
    }

    #[tokio::test]
    async fn re_observing_the_same_external_id_reuses_the_ticket_row() {
        let store = SqlitePersistence::open_in_memory().expect("schema init");
        let (session, scope) = store.create_session(false, None, "trello").await.expect("create session");
        let make_write = || PendingCardWrite {
            scope_id: scope.id,
            card: sample_card("card-1"),
            board_id: "board".to_string(),
            board_name: "Board".to_string(),
            list_id: "list".to_string(),
            list_name: "List".to_string(),
            criticality: Criticality::Low,
            justification: Justification::new("ok".to_string()),
            analyzed_at: triage_gate_core::now_utc(),
            moved_to: None,
            config_snapshot: serde_json::json!({}),
        };
        store.commit_run(session.id, vec![make_write()]).await.expect("commit");
        store.commit_run(session.id, vec![make_write()]).await.expect("commit");
        let tickets = store.all_tickets().await.expect("tickets");
        assert_eq!(tickets.len(), 1);
        let history = store.history_for_ticket(tickets[0].id).await.expect("history");
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn clear_cache_resets_soft_fields_on_one_ticket() {
        let store = SqlitePersistence::open_in_memory().expect("schema init");
        let (session, scope) = store.create_session(false, None, "trello").await.expect("create session");
        let write = PendingCardWrite {
            scope_id: scope.id,
            card: sample_card("card-1"),
            board_id: "board".to_string(),
            board_name: "Board".to_string(),
            list_id: "list".to_string(),
            list_name: "List".to_string(),
            criticality: Criticality::Medium,
            justification: Justification::new("soon".to_string()),
            analyzed_at: triage_gate_core::now_utc(),
            moved_to: None,
            config_snapshot: serde_json::json!({"x": true}),
        };
        store.commit_run(session.id, vec![write]).await.expect("commit");
        let ticket = store.all_tickets().await.expect("tickets").remove(0);
        assert!(ticket.metadata.last_analysis_config.is_some());
        let cleared = store.clear_cache(Some(ticket.id)).await.expect("clear");
        assert_eq!(cleared, 1);
        let refreshed = store.get_ticket_by_external_id(&ticket.external_id).await.expect("query").expect("exists");
        assert!(refreshed.metadata.last_analysis_config.is_none());
    }
}
