//! Listing reads and reviewer writes.

use chrono::{DateTime, Utc};
use listing_trust_core::business::{
    ActivityCounters, BusinessRecord, ContentItem, Geocode, ListingStatus, MAX_CONTENT_ITEMS,
    RecordSource,
};
use listing_trust_core::duplicates::{DuplicateQuery, MatchPredicate};
use listing_trust_core::review::{BusinessUpdate, OVERRIDABLE_FIELDS};
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

const BUSINESS_COLUMNS: &str = "id, name, phone, email, website, address, suburb, category, bio, \
     abn, abn_verified, latitude, longitude, source, owner_id, owner_verified, status, \
     recent_inquiries, recent_leads, created_at, updated_at";

// SQL forms of the matcher's comparison keys. Candidates are re-scored in
// core, so these only need to select a superset of real matches.
const NAME_KEY: &str = "lower(regexp_replace(btrim(name), '\\s+', ' ', 'g'))";
const SUBURB_KEY: &str = "lower(regexp_replace(btrim(suburb), '\\s+', ' ', 'g'))";
const PHONE_KEY: &str = "regexp_replace(phone, '\\D', '', 'g')";
const EMAIL_KEY: &str = "lower(btrim(email))";
const WEBSITE_KEY: &str =
    "rtrim(regexp_replace(lower(btrim(website)), '^(https?://)?(www\\.)*', ''), '/')";
const ABN_KEY: &str = "regexp_replace(abn, '\\D', '', 'g')";

#[derive(Debug, sqlx::FromRow)]
struct BusinessRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    website: Option<String>,
    address: Option<String>,
    suburb: Option<String>,
    category: Option<String>,
    bio: Option<String>,
    abn: Option<String>,
    abn_verified: bool,
    latitude: Option<f64>,
    longitude: Option<f64>,
    source: String,
    owner_id: Option<Uuid>,
    owner_verified: bool,
    status: String,
    recent_inquiries: i32,
    recent_leads: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BusinessRow {
    fn into_stored(self, content_items: Vec<ContentItem>) -> StoredBusiness {
        let geocode = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Geocode { lat, lng }),
            _ => None,
        };
        StoredBusiness {
            updated_at: self.updated_at,
            record: BusinessRecord {
                id: self.id,
                name: self.name,
                phone: self.phone,
                email: self.email,
                website: self.website,
                address: self.address,
                suburb: self.suburb,
                category: self.category,
                bio: self.bio,
                abn: self.abn,
                abn_verified: self.abn_verified,
                geocode,
                source: RecordSource::from_db_value(&self.source),
                owner_id: self.owner_id,
                owner_verified: self.owner_verified,
                status: ListingStatus::from_db_value(&self.status),
                created_at: self.created_at,
                activity: ActivityCounters {
                    recent_inquiries: u32::try_from(self.recent_inquiries).unwrap_or(0),
                    recent_leads: u32::try_from(self.recent_leads).unwrap_or(0),
                },
                content_items,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    kind: String,
    body: String,
}

/// A listing together with the time it was last edited.
#[derive(Debug, Clone)]
pub struct StoredBusiness {
    pub record: BusinessRecord,
    pub updated_at: DateTime<Utc>,
}

pub async fn fetch_business(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<StoredBusiness>, sqlx::Error> {
    fetch(conn, id, "").await
}

/// Same as [`fetch_business`] but locks the row until the transaction ends.
pub async fn fetch_business_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<StoredBusiness>, sqlx::Error> {
    fetch(conn, id, " FOR UPDATE").await
}

async fn fetch(
    conn: &mut PgConnection,
    id: Uuid,
    lock: &str,
) -> Result<Option<StoredBusiness>, sqlx::Error> {
    let row = sqlx::query_as::<_, BusinessRow>(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let content = sqlx::query_as::<_, ContentRow>(
        "SELECT id, kind, body FROM business_content \
         WHERE business_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(id)
    .bind(MAX_CONTENT_ITEMS as i64)
    .fetch_all(&mut *conn)
    .await?;
    let items = content
        .into_iter()
        .map(|c| ContentItem {
            id: c.id,
            kind: c.kind,
            text: c.body,
        })
        .collect();

    Ok(Some(row.into_stored(items)))
}

pub async fn business_exists<'c>(
    executor: impl PgExecutor<'c>,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM businesses WHERE id = $1)")
        .bind(id)
        .fetch_one(executor)
        .await
}

/// When an approved listing last changed. Any such change can create a new
/// duplicate candidate for every other listing.
pub async fn latest_approval_at<'c>(
    executor: impl PgExecutor<'c>,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(updated_at) FROM businesses WHERE status = 'approved'",
    )
    .fetch_one(executor)
    .await
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &MatchPredicate) {
    match predicate {
        MatchPredicate::NameInSuburb { name, suburb } => {
            builder
                .push(format!("({NAME_KEY} = "))
                .push_bind(name.clone())
                .push(format!(" AND {SUBURB_KEY} = "))
                .push_bind(suburb.clone())
                .push(")");
        }
        MatchPredicate::Phone { digits } => {
            builder.push(format!("{PHONE_KEY} = ")).push_bind(digits.clone());
        }
        MatchPredicate::Email { email } => {
            builder.push(format!("{EMAIL_KEY} = ")).push_bind(email.clone());
        }
        MatchPredicate::Website { key } => {
            builder.push(format!("{WEBSITE_KEY} = ")).push_bind(key.clone());
        }
        MatchPredicate::Abn { digits } => {
            builder.push(format!("{ABN_KEY} = ")).push_bind(digits.clone());
        }
    }
}

/// Build the candidate lookup: approved listings other than the subject that
/// satisfy any predicate, strongest overlap first.
fn candidate_query(query: &DuplicateQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE status = 'approved' AND id <> "
    ));
    builder.push_bind(query.exclude_id);

    builder.push(" AND (");
    for (i, predicate) in query.predicates.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        push_predicate(&mut builder, predicate);
    }

    builder.push(") ORDER BY (");
    for (i, predicate) in query.predicates.iter().enumerate() {
        if i > 0 {
            builder.push(" + ");
        }
        builder.push("CASE WHEN ");
        push_predicate(&mut builder, predicate);
        builder.push(" THEN 1 ELSE 0 END");
    }
    builder.push(") DESC, id LIMIT ");
    builder.push_bind(query.limit as i64);
    builder
}

/// Answer a [`DuplicateQuery`]. Returned records carry no content items.
pub async fn find_candidates<'c>(
    executor: impl PgExecutor<'c>,
    query: &DuplicateQuery,
) -> Result<Vec<BusinessRecord>, sqlx::Error> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = candidate_query(query);
    let rows = builder
        .build_query_as::<BusinessRow>()
        .fetch_all(executor)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_stored(Vec::new()).record)
        .collect())
}

/// Write a review's status, reviewer fields and whitelisted overrides.
pub async fn update_business_fields(
    conn: &mut PgConnection,
    id: Uuid,
    update: &BusinessUpdate,
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE businesses SET status = ");
    builder.push_bind(update.status.as_str());
    builder.push(", reviewed_by = ").push_bind(update.reviewed_by.clone());
    builder.push(", reviewed_at = ").push_bind(update.reviewed_at);
    builder.push(", review_reason = ").push_bind(update.review_reason.clone());
    builder.push(", review_notes = ").push_bind(update.review_notes.clone());
    if let Some(duplicate_of) = update.duplicate_of {
        builder.push(", duplicate_of = ").push_bind(duplicate_of);
    }
    for (column, value) in &update.fields {
        if let Some(column) = OVERRIDABLE_FIELDS.iter().find(|f| **f == column.as_str()) {
            builder.push(format!(", {column} = ")).push_bind(value.clone());
        }
    }
    builder.push(", updated_at = NOW() WHERE id = ").push_bind(id);

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_query_ors_predicates_and_ranks_by_overlap() {
        let query = DuplicateQuery {
            exclude_id: Uuid::nil(),
            predicates: vec![
                MatchPredicate::Phone {
                    digits: "0295551234".to_string(),
                },
                MatchPredicate::Abn {
                    digits: "51824753556".to_string(),
                },
            ],
            limit: 10,
        };
        let sql = candidate_query(&query).into_sql();
        assert!(sql.contains("status = 'approved' AND id <> $1"));
        assert!(sql.contains(&format!("{PHONE_KEY} = $2 OR {ABN_KEY} = $3")));
        assert!(sql.contains("THEN 1 ELSE 0 END"));
        assert!(sql.ends_with("DESC, id LIMIT $6"));
    }

    #[test]
    fn name_predicate_needs_both_keys() {
        let query = DuplicateQuery {
            exclude_id: Uuid::nil(),
            predicates: vec![MatchPredicate::NameInSuburb {
                name: "brewhouse coffee".to_string(),
                suburb: "newtown".to_string(),
            }],
            limit: 5,
        };
        let sql = candidate_query(&query).into_sql();
        assert!(sql.contains(&format!("({NAME_KEY} = $2 AND {SUBURB_KEY} = $3)")));
    }
}
