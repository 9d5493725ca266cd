//! SQLite-backed persistence for profiles, connections, messages, and
//! follow-ups. One connection behind a mutex; every public method is a
//! single logical transaction, so partial progress across a batch stays
//! durable even when a later candidate fails.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use prospector_core::error::{ProspectorError, Result};
use prospector_core::types::{
    CompanyContext, ConnectionRecord, ConnectionStatus, FollowUpRecord, FollowUpStatus,
    MessageRecord, MessageType, ProfileDetails, ProfileRecord,
};

/// Input for creating a profile.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub profile_url: String,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

/// Result of a bulk profile import. Partial success is expected and
/// reported, never treated as total failure.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub profiles_created: usize,
    pub skipped_existing: usize,
    pub errors: Vec<String>,
}

/// Result of the atomic quota reservation.
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    /// Connection ids admitted into this batch, in candidate order.
    pub connection_ids: Vec<i64>,
    pub admitted: usize,
    /// Attempts already counted against today's quota before this batch.
    pub used_today: u32,
    /// Slots left after this admission.
    pub remaining: u32,
    pub limit_reached: bool,
}

/// A connection enriched with denormalized profile fields and the linked
/// initial message, as exposed by the query API.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    pub id: i64,
    pub profile_id: i64,
    pub profile_name: String,
    pub profile_url: String,
    pub status: ConnectionStatus,
    pub connected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub connection_message: Option<String>,
    pub connection_message_sent_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// A message enriched with denormalized profile fields.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub connection_id: i64,
    pub profile_name: String,
    pub profile_url: String,
    pub content: String,
    pub message_type: MessageType,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Campaign totals for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_profiles: u32,
    pub total_connections: u32,
    pub connections_pending: u32,
    pub connections_connected: u32,
    pub connections_failed: u32,
    pub total_messages: u32,
    pub initial_messages: u32,
    pub followup_messages: u32,
}

/// The persistent store.
pub struct Store {
    conn: Mutex<Connection>,
}

fn now_str() -> String {
    Utc::now().to_rfc3339()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Start of the current UTC calendar day, in the stored rfc3339 form.
fn utc_day_start() -> String {
    let now = Utc::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().to_rfc3339())
        .unwrap_or_else(|| now.to_rfc3339())
}

impl Store {
    /// Open or create the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(ProspectorError::store)?;
        tracing::debug!("Opened sqlite store at {}", path.display());
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(ProspectorError::store)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(ProspectorError::store)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                profile_url TEXT NOT NULL UNIQUE,
                company TEXT,
                title TEXT,
                notes TEXT,
                tags TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id INTEGER NOT NULL
                    REFERENCES profiles(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'pending',
                connected_at TEXT,
                connection_message_id INTEGER REFERENCES messages(id),
                failure_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_connections_profile
                ON connections(profile_id);
            CREATE INDEX IF NOT EXISTS idx_connections_status
                ON connections(status);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                connection_id INTEGER NOT NULL
                    REFERENCES connections(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                message_type TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_connection
                ON messages(connection_id);

            CREATE TABLE IF NOT EXISTS followups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL REFERENCES messages(id),
                scheduled_at TEXT NOT NULL,
                sent_at TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_followups_message
                ON followups(message_id);
            CREATE INDEX IF NOT EXISTS idx_followups_status
                ON followups(status, scheduled_at);

            CREATE TABLE IF NOT EXISTS app_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                company_name TEXT,
                company_description TEXT,
                value_proposition TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );
            ",
        )
        .map_err(ProspectorError::store)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ProspectorError::Store(format!("lock: {e}")))
    }

    // ─── Profiles ──────────────────────────────────────────────

    pub fn insert_profile(&self, new: &NewProfile) -> Result<ProfileRecord> {
        if new.profile_url.trim().is_empty() {
            return Err(ProspectorError::InvalidInput("profile_url is required".into()));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO profiles (name, profile_url, company, title, notes, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.name,
                new.profile_url,
                new.company,
                new.title,
                new.notes,
                new.tags,
                now_str(),
            ],
        )
        .map_err(ProspectorError::store)?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_profile(id)?
            .ok_or_else(|| ProspectorError::Store("profile vanished after insert".into()))
    }

    /// Bulk import with per-row isolation: duplicates are skipped, row
    /// errors are collected, and every successful row is kept.
    pub fn import_profiles(&self, rows: Vec<NewProfile>) -> Result<ImportOutcome> {
        let mut outcome = ImportOutcome {
            profiles_created: 0,
            skipped_existing: 0,
            errors: Vec::new(),
        };
        for (idx, row) in rows.into_iter().enumerate() {
            if row.profile_url.trim().is_empty() {
                outcome.errors.push(format!("row {}: missing profile_url", idx + 1));
                continue;
            }
            if self.profile_by_url(&row.profile_url)?.is_some() {
                outcome.skipped_existing += 1;
                continue;
            }
            match self.insert_profile(&row) {
                Ok(_) => outcome.profiles_created += 1,
                Err(e) => outcome.errors.push(format!("row {}: {e}", idx + 1)),
            }
        }
        Ok(outcome)
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, profile_url, company, title, notes, tags, created_at, updated_at
             FROM profiles WHERE id = ?1",
            [id],
            row_to_profile,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    pub fn profile_by_url(&self, url: &str) -> Result<Option<ProfileRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, profile_url, company, title, notes, tags, created_at, updated_at
             FROM profiles WHERE profile_url = ?1",
            [url],
            row_to_profile,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    /// Profiles with the latest connection status attached, filterable by
    /// company substring and connection status.
    pub fn list_profiles(
        &self,
        company: Option<&str>,
        status: Option<ConnectionStatus>,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<(ProfileRecord, Option<ConnectionStatus>)>> {
        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT p.id, p.name, p.profile_url, p.company, p.title, p.notes, p.tags,
                    p.created_at, p.updated_at, c.status
             FROM profiles p
             LEFT JOIN connections c ON c.profile_id = p.id
             WHERE 1=1",
        );
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(company) = company {
            sql.push_str(" AND p.company LIKE ?");
            binds.push(Box::new(format!("%{company}%")));
        }
        if let Some(status) = status {
            sql.push_str(" AND c.status = ?");
            binds.push(Box::new(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY p.id LIMIT ? OFFSET ?");
        binds.push(Box::new(limit as i64));
        binds.push(Box::new(skip as i64));

        let mut stmt = conn.prepare(&sql).map_err(ProspectorError::store)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(binds.iter().map(|b| b.as_ref())), |row| {
                let profile = row_to_profile(row)?;
                let status: Option<String> = row.get(9)?;
                Ok((profile, status.and_then(|s| ConnectionStatus::parse(&s))))
            })
            .map_err(ProspectorError::store)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ProspectorError::store)?;
        Ok(rows)
    }

    pub fn delete_profile(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM profiles WHERE id = ?1", [id])
            .map_err(ProspectorError::store)?;
        Ok(n > 0)
    }

    /// Backfill only profile fields that are currently empty, from a
    /// best-effort enrichment scrape. Notes are capped at 500 chars.
    pub fn backfill_profile_details(&self, profile_id: i64, details: &ProfileDetails) -> Result<()> {
        let conn = self.lock()?;
        if let Some(headline) = details.headline.as_deref().filter(|s| !s.is_empty()) {
            conn.execute(
                "UPDATE profiles SET title = ?1, updated_at = ?2
                 WHERE id = ?3 AND (title IS NULL OR title = '')",
                params![headline, now_str(), profile_id],
            )
            .map_err(ProspectorError::store)?;
        }
        if let Some(company) = details.current_company.as_deref().filter(|s| !s.is_empty()) {
            conn.execute(
                "UPDATE profiles SET company = ?1, updated_at = ?2
                 WHERE id = ?3 AND (company IS NULL OR company = '')",
                params![company, now_str(), profile_id],
            )
            .map_err(ProspectorError::store)?;
        }
        if let Some(about) = details.about.as_deref().filter(|s| !s.is_empty()) {
            let capped: String = about.chars().take(500).collect();
            conn.execute(
                "UPDATE profiles SET notes = ?1, updated_at = ?2
                 WHERE id = ?3 AND (notes IS NULL OR notes = '')",
                params![capped, now_str(), profile_id],
            )
            .map_err(ProspectorError::store)?;
        }
        Ok(())
    }

    // ─── Admission / quota ─────────────────────────────────────

    /// Profile ids eligible for a fresh start: no connection yet, or a
    /// failed one.
    pub fn eligible_profiles_for_start(&self) -> Result<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT p.id FROM profiles p
                 LEFT JOIN connections c ON c.profile_id = p.id
                 WHERE c.id IS NULL OR c.status = 'failed'
                 ORDER BY p.id",
            )
            .map_err(ProspectorError::store)?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(ProspectorError::store)?
            .collect::<std::result::Result<Vec<i64>, _>>()
            .map_err(ProspectorError::store)?;
        Ok(ids)
    }

    /// Profile ids behind the given failed connections, preserving input
    /// order; with no explicit list, all failed connections.
    pub fn retry_candidates(&self, connection_ids: Option<&[i64]>) -> Result<Vec<i64>> {
        let conn = self.lock()?;
        match connection_ids {
            Some(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    let pid: Option<i64> = conn
                        .query_row(
                            "SELECT profile_id FROM connections WHERE id = ?1",
                            [id],
                            |row| row.get(0),
                        )
                        .optional()
                        .map_err(ProspectorError::store)?;
                    if let Some(pid) = pid {
                        out.push(pid);
                    }
                }
                Ok(out)
            }
            None => {
                let mut stmt = conn
                    .prepare(
                        "SELECT profile_id FROM connections
                         WHERE status = 'failed' ORDER BY id",
                    )
                    .map_err(ProspectorError::store)?;
                let ids = stmt
                    .query_map([], |row| row.get(0))
                    .map_err(ProspectorError::store)?
                    .collect::<std::result::Result<Vec<i64>, _>>()
                    .map_err(ProspectorError::store)?;
                Ok(ids)
            }
        }
    }

    /// Atomic quota reservation. Inside one transaction: count today's
    /// attempts, admit the first `limit - used` candidates in input order,
    /// and create/flip their connection rows to `connecting`. Profiles
    /// already `connected` are skipped without consuming a slot.
    ///
    /// `count_pending` widens the count basis to include `pending` rows
    /// (the retry path counts them, the start path does not).
    pub fn reserve_connections(
        &self,
        profile_ids: &[i64],
        daily_limit: u32,
        count_pending: bool,
    ) -> Result<Admission> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(ProspectorError::store)?;

        let basis = if count_pending {
            "('connected', 'connecting', 'pending')"
        } else {
            "('connected', 'connecting')"
        };
        let used: u32 = tx
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM connections
                     WHERE created_at >= ?1 AND status IN {basis}"
                ),
                [utc_day_start()],
                |row| row.get(0),
            )
            .map_err(ProspectorError::store)?;

        let slots = daily_limit.saturating_sub(used);
        if slots == 0 {
            // no state changes at all
            return Ok(Admission {
                connection_ids: Vec::new(),
                admitted: 0,
                used_today: used,
                remaining: 0,
                limit_reached: true,
            });
        }

        let mut admitted_ids = Vec::new();
        for &profile_id in profile_ids {
            if admitted_ids.len() as u32 >= slots {
                break;
            }
            let existing: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, status FROM connections WHERE profile_id = ?1",
                    [profile_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(ProspectorError::store)?;
            match existing {
                Some((_, status)) if status == "connected" => {
                    // idempotent no-op, no slot consumed
                    continue;
                }
                Some((id, _)) => {
                    tx.execute(
                        "UPDATE connections SET status = 'connecting', updated_at = ?1
                         WHERE id = ?2",
                        params![now_str(), id],
                    )
                    .map_err(ProspectorError::store)?;
                    admitted_ids.push(id);
                }
                None => {
                    tx.execute(
                        "INSERT INTO connections (profile_id, status, created_at)
                         VALUES (?1, 'connecting', ?2)",
                        params![profile_id, now_str()],
                    )
                    .map_err(ProspectorError::store)?;
                    admitted_ids.push(tx.last_insert_rowid());
                }
            }
        }

        tx.commit().map_err(ProspectorError::store)?;

        let admitted = admitted_ids.len();
        Ok(Admission {
            connection_ids: admitted_ids,
            admitted,
            used_today: used,
            remaining: slots - admitted as u32,
            limit_reached: false,
        })
    }

    /// Count of connections created today in the given status set. Used by
    /// tests to assert the quota invariant.
    pub fn count_today(&self, statuses: &[ConnectionStatus]) -> Result<u32> {
        let conn = self.lock()?;
        let set = statuses
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM connections
                 WHERE created_at >= ?1 AND status IN ({set})"
            ),
            [utc_day_start()],
            |row| row.get(0),
        )
        .map_err(ProspectorError::store)
    }

    // ─── Connections ───────────────────────────────────────────

    pub fn get_connection(&self, id: i64) -> Result<Option<ConnectionRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, profile_id, status, connected_at, connection_message_id,
                    failure_reason, created_at, updated_at
             FROM connections WHERE id = ?1",
            [id],
            row_to_connection,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    pub fn connection_by_profile(&self, profile_id: i64) -> Result<Option<ConnectionRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, profile_id, status, connected_at, connection_message_id,
                    failure_reason, created_at, updated_at
             FROM connections WHERE profile_id = ?1",
            [profile_id],
            row_to_connection,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    /// Record a successful send: link the initial message, clear any prior
    /// failure reason, and apply the outcome status.
    pub fn mark_connection_sent(
        &self,
        connection_id: i64,
        message_id: i64,
        status: ConnectionStatus,
        connected_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE connections
             SET status = ?1, connection_message_id = ?2, connected_at = ?3,
                 failure_reason = NULL, updated_at = ?4
             WHERE id = ?5",
            params![
                status.as_str(),
                message_id,
                connected_at.map(|t| t.to_rfc3339()),
                now_str(),
                connection_id,
            ],
        )
        .map_err(ProspectorError::store)?;
        Ok(())
    }

    pub fn mark_connection_failed(&self, connection_id: i64, reason: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE connections
             SET status = 'failed', failure_reason = ?1, updated_at = ?2
             WHERE id = ?3",
            params![reason, now_str(), connection_id],
        )
        .map_err(ProspectorError::store)?;
        Ok(())
    }

    pub fn list_connections(&self, status: Option<ConnectionStatus>) -> Result<Vec<ConnectionView>> {
        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT c.id, c.profile_id, p.name, p.profile_url, c.status, c.connected_at,
                    c.created_at, m.content, m.sent_at, c.failure_reason
             FROM connections c
             JOIN profiles p ON p.id = c.profile_id
             LEFT JOIN messages m ON m.id = c.connection_message_id",
        );
        if status.is_some() {
            sql.push_str(" WHERE c.status = ?1");
        }
        sql.push_str(" ORDER BY c.id");

        let mut stmt = conn.prepare(&sql).map_err(ProspectorError::store)?;
        let rows = match status {
            Some(s) => stmt.query_map([s.as_str()], row_to_connection_view),
            None => stmt.query_map([], row_to_connection_view),
        }
        .map_err(ProspectorError::store)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProspectorError::store)?;
        Ok(rows)
    }

    pub fn get_connection_view(&self, id: i64) -> Result<Option<ConnectionView>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT c.id, c.profile_id, p.name, p.profile_url, c.status, c.connected_at,
                    c.created_at, m.content, m.sent_at, c.failure_reason
             FROM connections c
             JOIN profiles p ON p.id = c.profile_id
             LEFT JOIN messages m ON m.id = c.connection_message_id
             WHERE c.id = ?1",
            [id],
            row_to_connection_view,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    // ─── Messages ──────────────────────────────────────────────

    pub fn insert_message(
        &self,
        connection_id: i64,
        content: &str,
        message_type: MessageType,
    ) -> Result<MessageRecord> {
        let conn = self.lock()?;
        let now = now_str();
        conn.execute(
            "INSERT INTO messages (connection_id, content, message_type, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![connection_id, content, message_type.as_str(), now],
        )
        .map_err(ProspectorError::store)?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT id, connection_id, content, message_type, sent_at, created_at
             FROM messages WHERE id = ?1",
            [id],
            row_to_message,
        )
        .map_err(ProspectorError::store)
    }

    /// Full prior message history for a connection, oldest first.
    pub fn messages_for_connection(&self, connection_id: i64) -> Result<Vec<MessageRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, connection_id, content, message_type, sent_at, created_at
                 FROM messages WHERE connection_id = ?1 ORDER BY sent_at",
            )
            .map_err(ProspectorError::store)?;
        let rows = stmt
            .query_map([connection_id], row_to_message)
            .map_err(ProspectorError::store)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ProspectorError::store)?;
        Ok(rows)
    }

    pub fn list_messages(
        &self,
        connection_id: Option<i64>,
        message_type: Option<MessageType>,
    ) -> Result<Vec<MessageView>> {
        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT m.id, m.connection_id, p.name, p.profile_url, m.content,
                    m.message_type, m.sent_at, m.created_at
             FROM messages m
             JOIN connections c ON c.id = m.connection_id
             JOIN profiles p ON p.id = c.profile_id
             WHERE 1=1",
        );
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(cid) = connection_id {
            sql.push_str(" AND m.connection_id = ?");
            binds.push(Box::new(cid));
        }
        if let Some(t) = message_type {
            sql.push_str(" AND m.message_type = ?");
            binds.push(Box::new(t.as_str().to_string()));
        }
        sql.push_str(" ORDER BY m.sent_at DESC");

        let mut stmt = conn.prepare(&sql).map_err(ProspectorError::store)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(binds.iter().map(|b| b.as_ref())),
                row_to_message_view,
            )
            .map_err(ProspectorError::store)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ProspectorError::store)?;
        Ok(rows)
    }

    pub fn get_message_view(&self, id: i64) -> Result<Option<MessageView>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT m.id, m.connection_id, p.name, p.profile_url, m.content,
                    m.message_type, m.sent_at, m.created_at
             FROM messages m
             JOIN connections c ON c.id = m.connection_id
             JOIN profiles p ON p.id = c.profile_id
             WHERE m.id = ?1",
            [id],
            row_to_message_view,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    // ─── Follow-ups ────────────────────────────────────────────

    /// Connected connections whose initial message has no follow-up yet.
    /// Returns (connection_id, initial_message_id) pairs.
    pub fn connections_needing_followup(&self) -> Result<Vec<(i64, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.connection_message_id
                 FROM connections c
                 WHERE c.status = 'connected'
                   AND c.connection_message_id IS NOT NULL
                   AND NOT EXISTS (
                       SELECT 1 FROM followups f
                       WHERE f.message_id = c.connection_message_id
                   )
                 ORDER BY c.id",
            )
            .map_err(ProspectorError::store)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(ProspectorError::store)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ProspectorError::store)?;
        Ok(rows)
    }

    /// Create a pending follow-up for an initial message. Creation is
    /// suppressed when one already exists — exactly-once per message.
    pub fn create_followup(
        &self,
        message_id: i64,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<FollowUpRecord>> {
        let conn = self.lock()?;
        let n = conn
            .execute(
                "INSERT INTO followups (message_id, scheduled_at, status, created_at)
                 SELECT ?1, ?2, 'pending', ?3
                 WHERE NOT EXISTS (SELECT 1 FROM followups WHERE message_id = ?1)",
                params![message_id, scheduled_at.to_rfc3339(), now_str()],
            )
            .map_err(ProspectorError::store)?;
        if n == 0 {
            return Ok(None);
        }
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT id, message_id, scheduled_at, sent_at, status, created_at, updated_at
             FROM followups WHERE id = ?1",
            [id],
            row_to_followup,
        )
        .map(Some)
        .map_err(ProspectorError::store)
    }

    /// Pending follow-ups whose scheduled time has passed.
    pub fn due_followups(&self, now: DateTime<Utc>) -> Result<Vec<FollowUpRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, message_id, scheduled_at, sent_at, status, created_at, updated_at
                 FROM followups
                 WHERE status = 'pending' AND scheduled_at <= ?1
                 ORDER BY scheduled_at",
            )
            .map_err(ProspectorError::store)?;
        let rows = stmt
            .query_map([now.to_rfc3339()], row_to_followup)
            .map_err(ProspectorError::store)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ProspectorError::store)?;
        Ok(rows)
    }

    /// The connection that owns a follow-up's triggering message.
    pub fn connection_for_followup(&self, followup: &FollowUpRecord) -> Result<Option<ConnectionRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT c.id, c.profile_id, c.status, c.connected_at, c.connection_message_id,
                    c.failure_reason, c.created_at, c.updated_at
             FROM connections c
             JOIN messages m ON m.connection_id = c.id
             WHERE m.id = ?1",
            [followup.message_id],
            row_to_connection,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    pub fn mark_followup(
        &self,
        id: i64,
        status: FollowUpStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE followups SET status = ?1, sent_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                status.as_str(),
                sent_at.map(|t| t.to_rfc3339()),
                now_str(),
                id,
            ],
        )
        .map_err(ProspectorError::store)?;
        Ok(())
    }

    /// The pending follow-up attached to a connection's initial message,
    /// if any (used by the manual follow-up path).
    pub fn pending_followup_for_message(&self, message_id: i64) -> Result<Option<FollowUpRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, message_id, scheduled_at, sent_at, status, created_at, updated_at
             FROM followups WHERE message_id = ?1 AND status = 'pending'",
            [message_id],
            row_to_followup,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    pub fn followup_for_message(&self, message_id: i64) -> Result<Option<FollowUpRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, message_id, scheduled_at, sent_at, status, created_at, updated_at
             FROM followups WHERE message_id = ?1",
            [message_id],
            row_to_followup,
        )
        .optional()
        .map_err(ProspectorError::store)
    }

    // ─── Settings & stats ──────────────────────────────────────

    pub fn company_context(&self) -> Result<CompanyContext> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT company_name, company_description, value_proposition
             FROM app_settings WHERE id = 1",
            [],
            |row| {
                Ok(CompanyContext {
                    company_name: row.get(0)?,
                    company_description: row.get(1)?,
                    value_proposition: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(ProspectorError::store)
        .map(|ctx| ctx.unwrap_or_default())
    }

    pub fn update_company_context(&self, ctx: &CompanyContext) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_settings (id, company_name, company_description, value_proposition, created_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 company_name = excluded.company_name,
                 company_description = excluded.company_description,
                 value_proposition = excluded.value_proposition,
                 updated_at = excluded.updated_at",
            params![ctx.company_name, ctx.company_description, ctx.value_proposition, now_str()],
        )
        .map_err(ProspectorError::store)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StatsSnapshot> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<u32> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(ProspectorError::store)
        };
        Ok(StatsSnapshot {
            total_profiles: count("SELECT COUNT(*) FROM profiles")?,
            total_connections: count("SELECT COUNT(*) FROM connections")?,
            connections_pending: count("SELECT COUNT(*) FROM connections WHERE status = 'pending'")?,
            connections_connected: count("SELECT COUNT(*) FROM connections WHERE status = 'connected'")?,
            connections_failed: count("SELECT COUNT(*) FROM connections WHERE status = 'failed'")?,
            total_messages: count("SELECT COUNT(*) FROM messages")?,
            initial_messages: count("SELECT COUNT(*) FROM messages WHERE message_type = 'initial'")?,
            followup_messages: count("SELECT COUNT(*) FROM messages WHERE message_type = 'followup'")?,
        })
    }
}

/// Convenience for schedulers: `now + days`.
pub fn days_from_now(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

// ─── Row mappers ───────────────────────────────────────────────

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        profile_url: row.get(2)?,
        company: row.get(3)?,
        title: row.get(4)?,
        notes: row.get(5)?,
        tags: row.get(6)?,
        created_at: parse_ts(&row.get::<_, String>(7)?),
        updated_at: parse_ts_opt(row.get(8)?),
    })
}

fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRecord> {
    let status: String = row.get(2)?;
    Ok(ConnectionRecord {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        status: ConnectionStatus::parse(&status).unwrap_or(ConnectionStatus::Pending),
        connected_at: parse_ts_opt(row.get(3)?),
        connection_message_id: row.get(4)?,
        failure_reason: row.get(5)?,
        created_at: parse_ts(&row.get::<_, String>(6)?),
        updated_at: parse_ts_opt(row.get(7)?),
    })
}

fn row_to_connection_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionView> {
    let status: String = row.get(4)?;
    Ok(ConnectionView {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        profile_name: row.get(2)?,
        profile_url: row.get(3)?,
        status: ConnectionStatus::parse(&status).unwrap_or(ConnectionStatus::Pending),
        connected_at: parse_ts_opt(row.get(5)?),
        created_at: parse_ts(&row.get::<_, String>(6)?),
        connection_message: row.get(7)?,
        connection_message_sent_at: parse_ts_opt(row.get(8)?),
        failure_reason: row.get(9)?,
    })
}

fn row_to_message_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageView> {
    let message_type: String = row.get(5)?;
    Ok(MessageView {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        profile_name: row.get(2)?,
        profile_url: row.get(3)?,
        content: row.get(4)?,
        message_type: MessageType::parse(&message_type).unwrap_or(MessageType::Initial),
        sent_at: parse_ts(&row.get::<_, String>(6)?),
        created_at: parse_ts(&row.get::<_, String>(7)?),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let message_type: String = row.get(3)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        content: row.get(2)?,
        message_type: MessageType::parse(&message_type).unwrap_or(MessageType::Initial),
        sent_at: parse_ts(&row.get::<_, String>(4)?),
        created_at: parse_ts(&row.get::<_, String>(5)?),
    })
}

fn row_to_followup(row: &rusqlite::Row<'_>) -> rusqlite::Result<FollowUpRecord> {
    let status: String = row.get(4)?;
    Ok(FollowUpRecord {
        id: row.get(0)?,
        message_id: row.get(1)?,
        scheduled_at: parse_ts(&row.get::<_, String>(2)?),
        sent_at: parse_ts_opt(row.get(3)?),
        status: FollowUpStatus::parse(&status).unwrap_or(FollowUpStatus::Pending),
        created_at: parse_ts(&row.get::<_, String>(5)?),
        updated_at: parse_ts_opt(row.get(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn profile(store: &Store, name: &str, url: &str) -> ProfileRecord {
        store
            .insert_profile(&NewProfile {
                name: name.into(),
                profile_url: url.into(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn profile_url_is_unique() {
        let s = store();
        profile(&s, "Ada", "https://example.com/in/ada");
        let dup = s.insert_profile(&NewProfile {
            name: "Ada 2".into(),
            profile_url: "https://example.com/in/ada".into(),
            ..Default::default()
        });
        assert!(dup.is_err());
    }

    #[test]
    fn import_reports_partial_success() {
        let s = store();
        profile(&s, "Ada", "https://example.com/in/ada");
        let outcome = s
            .import_profiles(vec![
                NewProfile {
                    name: "Ada".into(),
                    profile_url: "https://example.com/in/ada".into(),
                    ..Default::default()
                },
                NewProfile {
                    name: "Grace".into(),
                    profile_url: "https://example.com/in/grace".into(),
                    ..Default::default()
                },
                NewProfile {
                    name: "No Url".into(),
                    profile_url: "  ".into(),
                    ..Default::default()
                },
            ])
            .unwrap();
        assert_eq!(outcome.profiles_created, 1);
        assert_eq!(outcome.skipped_existing, 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn delete_profile_cascades_to_connections() {
        let s = store();
        let p = profile(&s, "Ada", "https://example.com/in/ada");
        let adm = s.reserve_connections(&[p.id], 10, false).unwrap();
        assert_eq!(adm.admitted, 1);
        assert!(s.delete_profile(p.id).unwrap());
        assert!(s.get_connection(adm.connection_ids[0]).unwrap().is_none());
    }

    #[test]
    fn reservation_respects_daily_limit() {
        let s = store();
        let ids: Vec<i64> = (0..8)
            .map(|i| profile(&s, &format!("p{i}"), &format!("https://example.com/in/p{i}")).id)
            .collect();
        let adm = s.reserve_connections(&ids, 5, false).unwrap();
        assert_eq!(adm.admitted, 5);
        assert_eq!(adm.remaining, 0);
        assert!(!adm.limit_reached);
        // quota invariant: never more than the limit created today
        assert!(
            s.count_today(&[
                ConnectionStatus::Connected,
                ConnectionStatus::Connecting,
                ConnectionStatus::Pending
            ])
            .unwrap()
                <= 5
        );

        // a second batch is rejected outright with no state change
        let again = s.reserve_connections(&ids[5..], 5, false).unwrap();
        assert_eq!(again.admitted, 0);
        assert!(again.limit_reached);
        assert!(s.connection_by_profile(ids[5]).unwrap().is_none());
    }

    #[test]
    fn reservation_preserves_candidate_order() {
        let s = store();
        let ids: Vec<i64> = (0..3)
            .map(|i| profile(&s, &format!("p{i}"), &format!("https://example.com/in/o{i}")).id)
            .collect();
        let adm = s
            .reserve_connections(&[ids[2], ids[0], ids[1]], 10, false)
            .unwrap();
        let by_profile: Vec<i64> = adm
            .connection_ids
            .iter()
            .map(|cid| s.get_connection(*cid).unwrap().unwrap().profile_id)
            .collect();
        assert_eq!(by_profile, vec![ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn connected_profiles_are_skipped_without_consuming_slots() {
        let s = store();
        let a = profile(&s, "A", "https://example.com/in/a");
        let b = profile(&s, "B", "https://example.com/in/b");
        let adm = s.reserve_connections(&[a.id], 10, false).unwrap();
        let msg = s.insert_message(adm.connection_ids[0], "hi", MessageType::Initial).unwrap();
        s.mark_connection_sent(
            adm.connection_ids[0],
            msg.id,
            ConnectionStatus::Connected,
            Some(msg.sent_at),
        )
        .unwrap();

        let again = s.reserve_connections(&[a.id, b.id], 2, false).unwrap();
        // A is skipped; only B admitted; no duplicate row for A
        assert_eq!(again.admitted, 1);
        let conn_a = s.connection_by_profile(a.id).unwrap().unwrap();
        assert_eq!(conn_a.status, ConnectionStatus::Connected);
        assert_eq!(conn_a.id, adm.connection_ids[0]);
    }

    #[test]
    fn failed_connection_row_is_reused_on_retry() {
        let s = store();
        let a = profile(&s, "A", "https://example.com/in/a");
        let adm = s.reserve_connections(&[a.id], 10, false).unwrap();
        let cid = adm.connection_ids[0];
        s.mark_connection_failed(cid, "Network timeout").unwrap();

        let retry = s.reserve_connections(&[a.id], 10, true).unwrap();
        assert_eq!(retry.connection_ids, vec![cid]);
        let conn = s.get_connection(cid).unwrap().unwrap();
        assert_eq!(conn.status, ConnectionStatus::Connecting);
        // failure reason survives until the next successful send
        assert_eq!(conn.failure_reason.as_deref(), Some("Network timeout"));
    }

    #[test]
    fn followup_creation_is_exactly_once() {
        let s = store();
        let a = profile(&s, "A", "https://example.com/in/a");
        let adm = s.reserve_connections(&[a.id], 10, false).unwrap();
        let msg = s.insert_message(adm.connection_ids[0], "hi", MessageType::Initial).unwrap();
        s.mark_connection_sent(
            adm.connection_ids[0],
            msg.id,
            ConnectionStatus::Connected,
            Some(msg.sent_at),
        )
        .unwrap();

        let when = days_from_now(7);
        assert!(s.create_followup(msg.id, when).unwrap().is_some());
        assert!(s.create_followup(msg.id, when).unwrap().is_none());

        // and the needing-followup query no longer returns it
        assert!(s.connections_needing_followup().unwrap().is_empty());
    }

    #[test]
    fn due_followups_only_returns_past_pending() {
        let s = store();
        let a = profile(&s, "A", "https://example.com/in/a");
        let adm = s.reserve_connections(&[a.id], 10, false).unwrap();
        let msg = s.insert_message(adm.connection_ids[0], "hi", MessageType::Initial).unwrap();
        let past = Utc::now() - Duration::hours(1);
        let f = s.create_followup(msg.id, past).unwrap().unwrap();

        let due = s.due_followups(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, f.id);

        s.mark_followup(f.id, FollowUpStatus::Sent, Some(Utc::now())).unwrap();
        assert!(s.due_followups(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn backfill_only_fills_empty_fields() {
        let s = store();
        let p = s
            .insert_profile(&NewProfile {
                name: "Ada".into(),
                profile_url: "https://example.com/in/ada".into(),
                title: Some("CTO".into()),
                ..Default::default()
            })
            .unwrap();
        s.backfill_profile_details(
            p.id,
            &ProfileDetails {
                headline: Some("Engineer".into()),
                current_company: Some("Acme".into()),
                about: Some("x".repeat(900)),
            },
        )
        .unwrap();
        let p = s.get_profile(p.id).unwrap().unwrap();
        assert_eq!(p.title.as_deref(), Some("CTO")); // kept
        assert_eq!(p.company.as_deref(), Some("Acme")); // filled
        assert_eq!(p.notes.map(|n| n.len()), Some(500)); // capped
    }

    #[test]
    fn view_lookups_fetch_by_id() {
        let s = store();
        let a = profile(&s, "A", "https://example.com/in/a");
        let b = profile(&s, "B", "https://example.com/in/b");
        let adm = s.reserve_connections(&[a.id, b.id], 10, false).unwrap();
        let msg = s.insert_message(adm.connection_ids[1], "hi", MessageType::Initial).unwrap();
        s.mark_connection_sent(adm.connection_ids[1], msg.id, ConnectionStatus::Pending, None)
            .unwrap();

        let view = s.get_connection_view(adm.connection_ids[1]).unwrap().unwrap();
        assert_eq!(view.profile_name, "B");
        assert_eq!(view.connection_message.as_deref(), Some("hi"));
        assert!(s.get_connection_view(9999).unwrap().is_none());

        let view = s.get_message_view(msg.id).unwrap().unwrap();
        assert_eq!(view.profile_url, "https://example.com/in/b");
        assert!(s.get_message_view(9999).unwrap().is_none());
    }

    #[test]
    fn settings_singleton_upserts() {
        let s = store();
        assert!(s.company_context().unwrap().company_name.is_none());
        s.update_company_context(&CompanyContext {
            company_name: Some("Acme".into()),
            company_description: None,
            value_proposition: Some("We ship".into()),
        })
        .unwrap();
        s.update_company_context(&CompanyContext {
            company_name: Some("Acme Corp".into()),
            company_description: Some("Tools".into()),
            value_proposition: Some("We ship".into()),
        })
        .unwrap();
        let ctx = s.company_context().unwrap();
        assert_eq!(ctx.company_name.as_deref(), Some("Acme Corp"));
        assert_eq!(ctx.company_description.as_deref(), Some("Tools"));
    }

    #[test]
    fn stats_counts_by_status_and_type() {
        let s = store();
        let a = profile(&s, "A", "https://example.com/in/a");
        let b = profile(&s, "B", "https://example.com/in/b");
        let adm = s.reserve_connections(&[a.id, b.id], 10, false).unwrap();
        let msg = s.insert_message(adm.connection_ids[0], "hi", MessageType::Initial).unwrap();
        s.mark_connection_sent(
            adm.connection_ids[0],
            msg.id,
            ConnectionStatus::Connected,
            Some(msg.sent_at),
        )
        .unwrap();
        s.mark_connection_failed(adm.connection_ids[1], "Network timeout").unwrap();
        s.insert_message(adm.connection_ids[0], "again", MessageType::Followup).unwrap();

        let stats = s.stats().unwrap();
        assert_eq!(stats.total_profiles, 2);
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.connections_connected, 1);
        assert_eq!(stats.connections_failed, 1);
        assert_eq!(stats.initial_messages, 1);
        assert_eq!(stats.followup_messages, 1);
    }
}
