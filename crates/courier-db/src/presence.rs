use crate::{CoreError, Database, Result};

/// Ephemeral typing and online state. Every operation takes `now_ms`
/// explicitly: "typing" and "online" are read-time predicates over stored
/// timestamps, never stored booleans, so there is no offline write to race
/// against a late heartbeat.
impl Database {
    /// Record that a user is typing. Re-arms the TTL on every signal; the
    /// caller debounces, this component does not.
    pub fn set_typing(
        &self,
        conversation_id: i64,
        user_id: i64,
        ttl_secs: i64,
        now_ms: i64,
    ) -> Result<()> {
        if ttl_secs <= 0 {
            return Err(CoreError::Validation("typing TTL must be positive"));
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO typing_status (conversation_id, user_id, expires_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (conversation_id, user_id) DO UPDATE SET
                    expires_at = excluded.expires_at",
                rusqlite::params![conversation_id, user_id, now_ms + ttl_secs * 1000],
            )?;
            Ok(())
        })
    }

    /// Explicit stop signal. Clearing an absent row is a no-op.
    pub fn clear_typing(&self, conversation_id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM typing_status WHERE conversation_id = ?1 AND user_id = ?2",
                rusqlite::params![conversation_id, user_id],
            )?;
            Ok(())
        })
    }

    /// Drop all of a user's typing rows, e.g. when their gateway connection
    /// goes away.
    pub fn clear_typing_for_user(&self, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM typing_status WHERE user_id = ?1",
                rusqlite::params![user_id],
            )?;
            Ok(removed)
        })
    }

    /// Users currently typing in a conversation. Filters at read time, so a
    /// stale row that the sweep has not reached yet is still excluded.
    pub fn list_typing_users(&self, conversation_id: i64, now_ms: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM typing_status
                 WHERE conversation_id = ?1 AND expires_at > ?2
                 ORDER BY user_id",
            )?;
            let users = stmt
                .query_map(rusqlite::params![conversation_id, now_ms], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Delete every expired typing row. Idempotent — a run with nothing
    /// expired removes nothing — and safe to interrupt: leftover expired
    /// rows are invisible to reads and picked up by the next run.
    pub fn sweep_expired_typing(&self, now_ms: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM typing_status WHERE expires_at <= ?1",
                rusqlite::params![now_ms],
            )?;
            Ok(removed)
        })
    }

    pub fn heartbeat(&self, user_id: i64, now_ms: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_online_status (user_id, last_heartbeat_at)
                 VALUES (?1, ?2)
                 ON CONFLICT (user_id) DO UPDATE SET
                    last_heartbeat_at = excluded.last_heartbeat_at",
                rusqlite::params![user_id, now_ms],
            )?;
            Ok(())
        })
    }

    /// A user is online while their last heartbeat is fresh. No row means
    /// offline; going offline is the absence of heartbeats, never a write.
    pub fn is_online(&self, user_id: i64, stale_after_secs: i64, now_ms: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let last: Option<i64> = conn
                .query_row(
                    "SELECT last_heartbeat_at FROM user_online_status WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    e => Err(e),
                })?;
            Ok(matches!(last, Some(at) if now_ms - at < stale_after_secs * 1000))
        })
    }

    /// Batch form of `is_online`, used when rendering a conversation list.
    pub fn online_users(
        &self,
        user_ids: &[i64],
        stale_after_secs: i64,
        now_ms: i64,
    ) -> Result<Vec<i64>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (3..=user_ids.len() + 2).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT user_id FROM user_online_status
                 WHERE last_heartbeat_at > ?1 - ?2 AND user_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(user_ids.len() + 2);
            let stale_ms = stale_after_secs * 1000;
            params.push(&now_ms);
            params.push(&stale_ms);
            for id in user_ids {
                params.push(id);
            }

            let users = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}
