use chrono::{DateTime, Utc};
use listing_trust_core::decision::Decision;
use listing_trust_core::feedback::FeedbackRecord;
use listing_trust_core::review::AdminAction;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;

pub async fn insert_feedback(
    conn: &mut PgConnection,
    record: &FeedbackRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO feedback \
         (id, business_id, original_recommendation, original_confidence, admin_decision, \
          agreement, accuracy_rating, strengths, weaknesses, missed_issues, false_positives, \
          notes, actor, recorded_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(record.id)
    .bind(record.business_id)
    .bind(record.original_recommendation.as_str())
    .bind(i16::from(record.original_confidence))
    .bind(record.admin_decision.as_str())
    .bind(record.agreement)
    .bind(i16::from(record.accuracy_rating))
    .bind(sqlx::types::Json(&record.strengths))
    .bind(sqlx::types::Json(&record.weaknesses))
    .bind(sqlx::types::Json(&record.missed_issues))
    .bind(sqlx::types::Json(&record.false_positives))
    .bind(&record.notes)
    .bind(&record.actor)
    .bind(record.recorded_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    business_id: Uuid,
    original_recommendation: String,
    original_confidence: i16,
    admin_decision: String,
    agreement: bool,
    accuracy_rating: i16,
    strengths: sqlx::types::Json<Vec<String>>,
    weaknesses: sqlx::types::Json<Vec<String>>,
    missed_issues: sqlx::types::Json<Vec<String>>,
    false_positives: sqlx::types::Json<Vec<String>>,
    notes: Option<String>,
    actor: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<FeedbackRow> for FeedbackRecord {
    type Error = AppError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |what: &str| AppError::Internal(format!("feedback {id}: bad {what}"));
        Ok(FeedbackRecord {
            id: row.id,
            business_id: row.business_id,
            original_recommendation: Decision::from_db_value(&row.original_recommendation)
                .ok_or_else(|| corrupt("original_recommendation"))?,
            original_confidence: u8::try_from(row.original_confidence)
                .map_err(|_| corrupt("original_confidence"))?,
            admin_decision: AdminAction::from_db_value(&row.admin_decision)
                .ok_or_else(|| corrupt("admin_decision"))?,
            agreement: row.agreement,
            accuracy_rating: u8::try_from(row.accuracy_rating)
                .map_err(|_| corrupt("accuracy_rating"))?,
            strengths: row.strengths.0,
            weaknesses: row.weaknesses.0,
            missed_issues: row.missed_issues.0,
            false_positives: row.false_positives.0,
            notes: row.notes,
            actor: row.actor,
            recorded_at: row.recorded_at,
        })
    }
}

pub async fn list_feedback(pool: &PgPool) -> Result<Vec<FeedbackRecord>, AppError> {
    let rows = sqlx::query_as::<_, FeedbackRow>(
        "SELECT id, business_id, original_recommendation, original_confidence, admin_decision, \
         agreement, accuracy_rating, strengths, weaknesses, missed_issues, false_positives, \
         notes, actor, recorded_at \
         FROM feedback ORDER BY recorded_at DESC",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(FeedbackRecord::try_from).collect()
}
