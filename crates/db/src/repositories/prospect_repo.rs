//! Repository for the `prospects` table.

use prospector_core::stage::Stage;
use prospector_core::types::DbId;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::models::prospect::{
    NewProspect, Prospect, ProspectListQuery, ProspectRow, StageWrite, UpsertedProspect,
};
use crate::store::{page, StoreError, StoreResult};

/// Column list for `prospects` queries.
const COLUMNS: &str = "\
    id, url, domain, title, category, location, \
    stage, failed_from, last_error, \
    contact_email, verification_status, verification_confidence, verification, \
    domain_authority, backlinks, metrics, \
    score, score_breakdown, draft_subject, draft_body, \
    sent_at, sent_message_id, created_at, updated_at";

/// Ranking used for eligibility and listing.
const RANK_ORDER: &str = "score DESC NULLS LAST, updated_at DESC, id DESC";

/// Upsert result row: the prospect plus whether the insert branch ran.
#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    prospect: ProspectRow,
    inserted: bool,
}

/// Provides persistence for prospects.
pub struct ProspectRepo;

impl ProspectRepo {
    /// Insert by domain, or merge into the existing row.
    ///
    /// `xmax = 0` is true only for a freshly inserted tuple.
    pub async fn upsert(pool: &PgPool, input: &NewProspect) -> StoreResult<UpsertedProspect> {
        let query = format!(
            "INSERT INTO prospects (url, domain, title, category, location, contact_email) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (domain) DO UPDATE SET \
                 title = COALESCE(prospects.title, EXCLUDED.title), \
                 category = COALESCE(prospects.category, EXCLUDED.category), \
                 location = COALESCE(prospects.location, EXCLUDED.location), \
                 contact_email = COALESCE(prospects.contact_email, EXCLUDED.contact_email), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        let row = sqlx::query_as::<_, UpsertRow>(&query)
            .bind(&input.url)
            .bind(&input.domain)
            .bind(&input.title)
            .bind(input.category.map(|c| c.as_str()))
            .bind(input.location.map(|l| l.as_str()))
            .bind(&input.contact_email)
            .fetch_one(pool)
            .await?;
        Ok(UpsertedProspect {
            prospect: row.prospect.try_into()?,
            created: row.inserted,
        })
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> StoreResult<Option<Prospect>> {
        let query = format!("SELECT {COLUMNS} FROM prospects WHERE id = $1");
        let row = sqlx::query_as::<_, ProspectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(Prospect::try_from).transpose()?)
    }

    /// Load by ids, returned in the order given.
    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> StoreResult<Vec<Prospect>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {COLUMNS} FROM prospects WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, ProspectRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await?;
        let mut found = rows
            .into_iter()
            .map(Prospect::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|p| p.id == *id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    pub async fn list_in_stage(
        pool: &PgPool,
        stage: Stage,
        limit: i64,
    ) -> StoreResult<Vec<Prospect>> {
        let query = format!(
            "SELECT {COLUMNS} FROM prospects WHERE stage = $1 ORDER BY {RANK_ORDER} LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ProspectRow>(&query)
            .bind(stage.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await?;
        collect(rows)
    }

    pub async fn list(pool: &PgPool, params: &ProspectListQuery) -> StoreResult<Vec<Prospect>> {
        let (limit, offset) = page(params.limit, params.offset);
        let rows = match params.stage {
            Some(stage) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM prospects WHERE stage = $1 \
                     ORDER BY {RANK_ORDER} LIMIT $2 OFFSET $3"
                );
                sqlx::query_as::<_, ProspectRow>(&query)
                    .bind(stage.as_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM prospects ORDER BY {RANK_ORDER} LIMIT $1 OFFSET $2"
                );
                sqlx::query_as::<_, ProspectRow>(&query)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
            }
        };
        collect(rows)
    }

    /// Compare-and-swap on `stage`. `None` means the stored stage moved.
    pub async fn write_stage(pool: &PgPool, write: &StageWrite) -> StoreResult<Option<Prospect>> {
        let u = &write.update;
        let query = format!(
            "UPDATE prospects SET \
                 stage = $3, failed_from = $4, last_error = $5, \
                 title = COALESCE($6, title), \
                 contact_email = COALESCE($7, contact_email), \
                 domain_authority = COALESCE($8, domain_authority), \
                 backlinks = COALESCE($9, backlinks), \
                 metrics = COALESCE($10, metrics), \
                 verification_status = COALESCE($11, verification_status), \
                 verification_confidence = CASE WHEN $20 THEN $12 \
                     ELSE COALESCE($12, verification_confidence) END, \
                 verification = CASE WHEN $20 THEN $13 ELSE COALESCE($13, verification) END, \
                 score = COALESCE($14, score), \
                 score_breakdown = COALESCE($15, score_breakdown), \
                 draft_subject = COALESCE($16, draft_subject), \
                 draft_body = COALESCE($17, draft_body), \
                 sent_at = COALESCE($18, sent_at), \
                 sent_message_id = COALESCE($19, sent_message_id), \
                 updated_at = NOW() \
             WHERE id = $1 AND stage = $2 \
             RETURNING {COLUMNS}"
        );
        let result = sqlx::query_as::<_, ProspectRow>(&query)
            .bind(write.prospect_id)
            .bind(write.expected.as_str())
            .bind(write.next.as_str())
            .bind(write.failed_from.map(|s| s.as_str()))
            .bind(&write.last_error)
            .bind(&u.title)
            .bind(&u.contact_email)
            .bind(u.domain_authority)
            .bind(u.backlinks)
            .bind(&u.metrics)
            .bind(u.verification_status.map(|s| s.as_str()))
            .bind(u.verification_confidence)
            .bind(&u.verification)
            .bind(u.score)
            .bind(u.score_breakdown.map(Json))
            .bind(&u.draft_subject)
            .bind(&u.draft_body)
            .bind(u.sent_at)
            .bind(&u.sent_message_id)
            .bind(u.replace_verification)
            .fetch_optional(pool)
            .await;

        match result {
            Ok(row) => Ok(row.map(Prospect::try_from).transpose()?),
            Err(err) => match super::check_violation(&err) {
                Some(constraint) => Err(StoreError::Constraint(constraint)),
                None => Err(err.into()),
            },
        }
    }
}

fn collect(rows: Vec<ProspectRow>) -> StoreResult<Vec<Prospect>> {
    Ok(rows
        .into_iter()
        .map(Prospect::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}
