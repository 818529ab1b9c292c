//! Database operations for the `permits` table.

use chrono::{DateTime, Utc};
use permitwatch_core::{Issuer, PermitFields, PermitInsert};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::DbError;

pub const MIN_SEARCH_QUERY_CHARS: usize = 3;
pub const MAX_SEARCH_LIMIT: i64 = 100;

#[derive(Debug, Clone, sqlx::FromRow)]
struct PermitDbRow {
    id: i64,
    public_id: Uuid,
    issuer: String,
    address: String,
    data: Json<PermitFields>,
    source_url: String,
    created_at: DateTime<Utc>,
}

/// A stored permit.
///
/// `data` comes back from JSONB, which does not keep key order; keys are in
/// the order Postgres returns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitRow {
    pub id: i64,
    pub public_id: Uuid,
    pub issuer: Issuer,
    pub address: String,
    pub data: PermitFields,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PermitDbRow> for PermitRow {
    type Error = DbError;

    fn try_from(row: PermitDbRow) -> Result<Self, Self::Error> {
        let issuer = row
            .issuer
            .parse::<Issuer>()
            .map_err(|e| DbError::InvalidRow(e.to_string()))?;
        Ok(Self {
            id: row.id,
            public_id: row.public_id,
            issuer,
            address: row.address,
            data: row.data.0,
            source_url: row.source_url,
            created_at: row.created_at,
        })
    }
}

/// Deletes every stored permit of `issuer`. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_permits_for_issuer(pool: &PgPool, issuer: Issuer) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM permits WHERE issuer = $1")
        .bind(issuer.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Inserts one batch of permits as a single multi-row `INSERT`.
///
/// Generates each `public_id` in Rust. An empty batch is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails; no row of the batch is
/// stored in that case.
pub async fn insert_permit_batch(pool: &PgPool, batch: &[PermitInsert]) -> Result<u64, DbError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO permits (public_id, issuer, address, data, source_url) ");
    builder.push_values(batch, |mut row, permit| {
        row.push_bind(Uuid::new_v4())
            .push_bind(permit.issuer.as_str())
            .push_bind(permit.address.as_str())
            .push_bind(Json(permit.data.clone()))
            .push_bind(permit.source_url.as_str());
    });

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Number of stored permits, optionally for one issuer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_permits(pool: &PgPool, issuer: Option<Issuer>) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM permits WHERE ($1::text IS NULL OR issuer = $1)",
    )
    .bind(issuer.map(Issuer::as_str))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Validated address search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pattern: String,
    issuer: Option<Issuer>,
    limit: i64,
}

impl SearchQuery {
    /// Case-insensitive substring search over addresses.
    ///
    /// `limit` is clamped to `1..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidQuery`] when the trimmed query is shorter
    /// than three characters.
    pub fn new(query: &str, issuer: Option<Issuer>, limit: i64) -> Result<Self, DbError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_QUERY_CHARS {
            return Err(DbError::InvalidQuery(format!(
                "query must be at least {MIN_SEARCH_QUERY_CHARS} characters"
            )));
        }
        Ok(Self {
            pattern: format!("%{}%", escape_like(query)),
            issuer,
            limit: limit.clamp(1, MAX_SEARCH_LIMIT),
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// Newest-first permits whose address matches `search`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::InvalidRow`]
/// for a row with an unknown issuer.
pub async fn search_permits(pool: &PgPool, search: &SearchQuery) -> Result<Vec<PermitRow>, DbError> {
    let rows = sqlx::query_as::<_, PermitDbRow>(
        "SELECT id, public_id, issuer, address, data, source_url, created_at \
         FROM permits \
         WHERE address ILIKE $1 ESCAPE '\\' \
           AND ($2::text IS NULL OR issuer = $2) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3",
    )
    .bind(&search.pattern)
    .bind(search.issuer.map(Issuer::as_str))
    .bind(search.limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PermitRow::try_from).collect()
}

/// Escapes `LIKE` wildcards so user input only matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
