//! Postgres-backed configuration store.
//!
//! One row holds the active configuration. Applies are optimistic: the
//! proposal is computed from a plain read and the write only lands when
//! `version_seq` is still the one that was read.

use chrono::{DateTime, Utc};
use listing_trust_core::config::{
    AppliedConfiguration, ApplyRequest, ConfigMetadata, ConfigSnapshot, ConfigVersion,
    ConfigurationChange, FieldChange, HistoryQuery, propose,
};
use listing_trust_core::error::TrustError;
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    data: serde_json::Value,
    version: String,
    version_seq: i64,
    last_modified: DateTime<Utc>,
    modified_by: String,
}

#[derive(Debug, Clone)]
pub struct StoredConfig {
    pub snapshot: ConfigSnapshot,
    pub version_seq: i64,
}

/// Insert the default configuration unless one already exists.
pub async fn ensure_seeded(pool: &PgPool) -> Result<(), AppError> {
    let initial = ConfigSnapshot::initial(Utc::now());
    let data = serde_json::to_value(&initial.configuration)
        .map_err(|e| AppError::Internal(format!("default configuration: {e}")))?;
    let inserted = sqlx::query(
        "INSERT INTO configuration (id, data, version, version_seq, last_modified, modified_by) \
         VALUES (1, $1, $2, 0, $3, $4) ON CONFLICT (id) DO NOTHING",
    )
    .bind(data)
    .bind(initial.version().to_string())
    .bind(initial.metadata.last_modified)
    .bind(&initial.metadata.modified_by)
    .execute(pool)
    .await?;
    if inserted.rows_affected() > 0 {
        tracing::info!(version = %initial.version(), "seeded default configuration");
    }
    Ok(())
}

pub async fn load_snapshot<'c>(executor: impl PgExecutor<'c>) -> Result<StoredConfig, AppError> {
    let row = sqlx::query_as::<_, ConfigRow>(
        "SELECT data, version, version_seq, last_modified, modified_by \
         FROM configuration WHERE id = 1",
    )
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "configuration".to_string(),
    })?;

    let configuration = serde_json::from_value(row.data)
        .map_err(|e| AppError::Internal(format!("stored configuration is unreadable: {e}")))?;
    let version = parse_version(&row.version)?;
    Ok(StoredConfig {
        snapshot: ConfigSnapshot {
            configuration,
            metadata: ConfigMetadata {
                version,
                last_modified: row.last_modified,
                modified_by: row.modified_by,
            },
        },
        version_seq: row.version_seq,
    })
}

fn parse_version(raw: &str) -> Result<ConfigVersion, AppError> {
    raw.parse()
        .map_err(|e| AppError::Internal(format!("stored configuration version: {e}")))
}

/// Validate, version and persist an update together with its change record.
pub async fn apply_configuration(
    pool: &PgPool,
    request: ApplyRequest<'_>,
) -> Result<AppliedConfiguration, AppError> {
    let mut tx = pool.begin().await?;
    let stored = load_snapshot(&mut *tx).await?;
    let current = stored.snapshot.version();
    if let Some(expected) = request.expected_version
        && expected != current
    {
        return Err(TrustError::ConcurrencyConflict {
            expected: expected.to_string(),
            actual: current.to_string(),
        }
        .into());
    }

    let proposal = propose(&stored.snapshot, request.partial)?;
    proposal.validate()?;
    let (snapshot, change) = proposal.commit(request.actor, request.reason, request.now)?;
    let data = serde_json::to_value(&snapshot.configuration)
        .map_err(|e| AppError::Internal(format!("configuration serialization: {e}")))?;

    let updated = sqlx::query(
        "UPDATE configuration \
         SET data = $1, version = $2, version_seq = version_seq + 1, \
             last_modified = $3, modified_by = $4 \
         WHERE id = 1 AND version_seq = $5",
    )
    .bind(data)
    .bind(snapshot.version().to_string())
    .bind(snapshot.metadata.last_modified)
    .bind(&snapshot.metadata.modified_by)
    .bind(stored.version_seq)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        let actual = sqlx::query_scalar::<_, String>("SELECT version FROM configuration WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;
        tracing::warn!(expected = %current, %actual, "configuration apply lost a race");
        return Err(AppError::Conflict {
            expected: current.to_string(),
            actual,
        });
    }

    insert_change(&mut tx, &change).await?;
    tx.commit().await?;

    tracing::info!(
        actor = %change.actor,
        from = %change.from_version,
        to = %change.to_version,
        fields = change.changes.len(),
        "configuration applied"
    );
    Ok(AppliedConfiguration { snapshot, change })
}

async fn insert_change(
    conn: &mut PgConnection,
    change: &ConfigurationChange,
) -> Result<(), AppError> {
    let changes = serde_json::to_value(&change.changes)
        .map_err(|e| AppError::Internal(format!("change serialization: {e}")))?;
    sqlx::query(
        "INSERT INTO configuration_changes \
         (id, occurred_at, actor, changes, reason, applied_successfully, \
          rollback_available, test_mode, from_version, to_version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(change.id)
    .bind(change.timestamp)
    .bind(&change.actor)
    .bind(changes)
    .bind(&change.reason)
    .bind(change.applied_successfully)
    .bind(change.rollback_available)
    .bind(change.test_mode)
    .bind(change.from_version.to_string())
    .bind(change.to_version.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct ChangeRow {
    id: Uuid,
    occurred_at: DateTime<Utc>,
    actor: String,
    changes: serde_json::Value,
    reason: Option<String>,
    applied_successfully: bool,
    rollback_available: bool,
    test_mode: bool,
    from_version: String,
    to_version: String,
}

impl TryFrom<ChangeRow> for ConfigurationChange {
    type Error = AppError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        let changes: Vec<FieldChange> = serde_json::from_value(row.changes)
            .map_err(|e| AppError::Internal(format!("change record {}: {e}", row.id)))?;
        Ok(ConfigurationChange {
            id: row.id,
            timestamp: row.occurred_at,
            actor: row.actor,
            changes,
            reason: row.reason,
            applied_successfully: row.applied_successfully,
            rollback_available: row.rollback_available,
            test_mode: row.test_mode,
            from_version: parse_version(&row.from_version)?,
            to_version: parse_version(&row.to_version)?,
        })
    }
}

/// Change records narrowed by the query's actor and time bounds. Category,
/// pagination and stats are left to `query_history`.
pub async fn list_changes(
    pool: &PgPool,
    query: &HistoryQuery,
) -> Result<Vec<ConfigurationChange>, AppError> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id, occurred_at, actor, changes, reason, applied_successfully, \
         rollback_available, test_mode, from_version, to_version \
         FROM configuration_changes WHERE TRUE",
    );
    if let Some(actor) = &query.actor {
        builder.push(" AND actor = ").push_bind(actor.clone());
    }
    if let Some(from) = query.from {
        builder.push(" AND occurred_at >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND occurred_at <= ").push_bind(to);
    }
    if !query.include_test_mode {
        builder.push(" AND NOT test_mode");
    }
    builder.push(" ORDER BY occurred_at DESC, id DESC");

    let rows = builder.build_query_as::<ChangeRow>().fetch_all(pool).await?;
    rows.into_iter().map(ConfigurationChange::try_from).collect()
}
