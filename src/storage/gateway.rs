use crate::types::{ErrorEvent, ErrorKind, Resolution, Severity, SourceLocation, TrendAnalysis};
use deadpool_sqlite::Pool;
use rusqlite::{params, Row};

pub type GatewayError = Box<dyn std::error::Error + Send + Sync>;
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Number of characters of the message used for related-error matching.
const RELATED_PREFIX_CHARS: usize = 20;

/// Related errors are searched over the preceding 24 hours.
const RELATED_LOOKBACK_MS: i64 = 24 * 3_600_000;

/// Cap on related errors returned per query.
const RELATED_LIMIT: i64 = 10;

/// Durable store for raw error records, analysis snapshots, and resolution
/// audit entries. Every write is independently fallible; callers log and
/// discard failures rather than propagating them into the pipeline.
#[derive(Clone)]
pub struct SqliteGateway {
    pool: Pool,
}

impl SqliteGateway {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Insert one normalized error record.
    pub async fn insert_event(&self, event: &ErrorEvent) -> GatewayResult<()> {
        let e = event.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            let metadata_str = e.metadata.as_ref().map(|v| v.to_string());
            let (file, line, column) = match &e.source_location {
                Some(loc) => (Some(loc.file.clone()), loc.line, loc.column),
                None => (None, None, None),
            };
            conn.execute(
                "INSERT INTO error_events (
                    id, kind, message, stack, source_file, source_line, source_column,
                    severity_hint, timestamp, user_id, request_url, http_status, metadata
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
                params![
                    e.id,
                    e.kind.as_str(),
                    e.message,
                    e.stack,
                    file,
                    line,
                    column,
                    e.severity_hint.as_str(),
                    e.timestamp,
                    e.user_id,
                    e.request_url,
                    e.http_status,
                    metadata_str,
                ],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(|e| format!("interact error: {e}"))??;
        Ok(())
    }

    /// Insert one analysis/insight snapshot.
    pub async fn insert_insight(&self, analysis: &TrendAnalysis) -> GatewayResult<()> {
        let generated_at = analysis.generated_at;
        let window_secs = analysis.window_secs as i64;
        let total_errors = analysis.total_errors as i64;
        let error_rate = analysis.error_rate;
        let payload = serde_json::to_string(analysis)?;

        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            conn.execute(
                "INSERT INTO analysis_snapshots (generated_at, window_secs, total_errors, error_rate, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![generated_at, window_secs, total_errors, error_rate, payload],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(|e| format!("interact error: {e}"))??;
        Ok(())
    }

    /// Insert one audit entry for a manual pattern resolution.
    pub async fn insert_resolution(
        &self,
        pattern_id: &str,
        resolution: &Resolution,
    ) -> GatewayResult<()> {
        let pattern_id = pattern_id.to_string();
        let r = resolution.clone();
        let conn = self.pool.get().await?;
        conn.interact(move |conn| {
            conn.execute(
                "INSERT INTO resolution_audit (pattern_id, status, action, resolved_by, resolved_at, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pattern_id,
                    r.status.as_str(),
                    r.action,
                    r.resolved_by,
                    r.resolved_at,
                    chrono::Utc::now().timestamp_millis(),
                ],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(|e| format!("interact error: {e}"))??;
        Ok(())
    }

    /// Fetch one stored error by id.
    pub async fn fetch_event(&self, id: &str) -> GatewayResult<Option<ErrorEvent>> {
        let id = id.to_string();
        let conn = self.pool.get().await?;
        let event = conn
            .interact(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, message, stack, source_file, source_line, source_column,
                            severity_hint, timestamp, user_id, request_url, http_status, metadata
                     FROM error_events WHERE id = ?1",
                )?;
                let mut rows = stmt.query_map(params![id], row_to_event)?;
                rows.next().transpose()
            })
            .await
            .map_err(|e| format!("interact error: {e}"))??;
        Ok(event)
    }

    /// Fetch errors related to the given one: same kind, or containing the
    /// first 20 characters of its message, within the preceding 24 hours.
    /// Excludes the record itself; capped at 10, oldest first.
    pub async fn fetch_related(&self, of: &ErrorEvent) -> GatewayResult<Vec<ErrorEvent>> {
        let id = of.id.clone();
        let kind = of.kind.as_str().to_string();
        let prefix: String = of.message.chars().take(RELATED_PREFIX_CHARS).collect();
        let until = of.timestamp;
        let since = of.timestamp - RELATED_LOOKBACK_MS;

        let conn = self.pool.get().await?;
        let events = conn
            .interact(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, message, stack, source_file, source_line, source_column,
                            severity_hint, timestamp, user_id, request_url, http_status, metadata
                     FROM error_events
                     WHERE id != ?1
                       AND timestamp >= ?2 AND timestamp <= ?3
                       AND (kind = ?4 OR instr(message, ?5) > 0)
                     ORDER BY timestamp ASC
                     LIMIT ?6",
                )?;
                let rows = stmt
                    .query_map(
                        params![id, since, until, kind, prefix, RELATED_LIMIT],
                        row_to_event,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await
            .map_err(|e| format!("interact error: {e}"))??;
        Ok(events)
    }

    /// Delete raw events older than the cutoff. Returns the number removed.
    pub async fn prune_events(&self, cutoff_ms: i64) -> GatewayResult<usize> {
        let conn = self.pool.get().await?;
        let deleted = conn
            .interact(move |conn| {
                conn.execute(
                    "DELETE FROM error_events WHERE timestamp < ?1",
                    params![cutoff_ms],
                )
            })
            .await
            .map_err(|e| format!("interact error: {e}"))??;
        Ok(deleted)
    }

    /// Cheap connectivity probe for health checks.
    pub async fn ping(&self) -> bool {
        let Ok(conn) = self.pool.get().await else {
            return false;
        };
        conn.interact(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<ErrorEvent> {
    let kind_str: String = row.get(1)?;
    let severity_str: String = row.get(7)?;
    let file: Option<String> = row.get(4)?;
    let metadata_str: Option<String> = row.get(12)?;

    Ok(ErrorEvent {
        id: row.get(0)?,
        kind: ErrorKind::parse(&kind_str).unwrap_or(ErrorKind::System),
        message: row.get(2)?,
        stack: row.get(3)?,
        source_location: file.map(|file| SourceLocation {
            file,
            line: row.get(5).ok().flatten(),
            column: row.get(6).ok().flatten(),
        }),
        severity_hint: parse_severity(&severity_str),
        timestamp: row.get(8)?,
        user_id: row.get(9)?,
        request_url: row.get(10)?,
        http_status: row.get(11)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "medium" => Severity::Medium,
        "high" => Severity::High,
        "critical" => Severity::Critical,
        _ => Severity::Low,
    }
}
