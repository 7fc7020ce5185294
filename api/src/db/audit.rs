use listing_trust_core::review::AuditEvent;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn record_event(pool: &PgPool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (id, event_type, target_id, actor, payload) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::now_v7())
    .bind(&event.event_type)
    .bind(event.target_id)
    .bind(&event.actor)
    .bind(&event.payload)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record every event, returning one warning per failure.
/// The action being audited has already happened, so failures never propagate.
pub async fn record_events(pool: &PgPool, events: &[AuditEvent]) -> Vec<String> {
    let mut warnings = Vec::new();
    for event in events {
        if let Err(err) = record_event(pool, event).await {
            tracing::warn!(
                event_type = %event.event_type,
                target_id = %event.target_id,
                error = %err,
                "audit event not recorded"
            );
            warnings.push(format!("audit event '{}' was not recorded", event.event_type));
        }
    }
    warnings
}
