//! # PostgreSQL Status Repository
//!
//! [`StatusRepository`] over the schema in `migrations/`. Queries are built
//! at runtime with `sqlx::query_as` so the crate compiles without a live
//! database.
//!
//! ## Transactions
//!
//! - `save_request` writes the request, its publishers, generations and
//!   enhancements in one transaction.
//! - `update_generation` locks the generation row `FOR UPDATE`, plans the
//!   reconciliation against the locked chain, and applies field updates and
//!   enhancement changes before committing.
//! - `update_*_if_status` and `reset_*_for_retry` are single
//!   `UPDATE ... WHERE status = $expected` statements over the status-owned
//!   columns. Under READ COMMITTED a concurrent writer blocks on the row and
//!   re-evaluates the predicate, so exactly one of two racing retries
//!   succeeds.

use super::StatusRepository;
use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::models::{
    EnhancementRecord, GenerationRecord, Page, PageRequest, PublisherRecord, RequestGraph,
    RequestRecord,
};
use crate::orchestration::reconciliation::{plan_reconciliation, ReconcileAction};
use crate::state_machine::{EnhancementStatus, GenerationStatus, RequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

const REQUEST_COLUMNS: &str = "db_id, request_id, status, creation_date";

const GENERATION_COLUMNS: &str = "db_id, generation_id, request_id, target_type, \
    target_identifier, generator_name, generator_version, generator_options, status, result, \
    reason, created, updated, finished, artifact_urls";

const SELECT_ENHANCEMENTS: &str = "SELECT e.enhancement_id, g.generation_id, e.request_id, \
    e.index_value, e.enhancer_name, e.enhancer_version, e.enhancer_options, e.status, e.result, \
    e.reason, e.created, e.updated, e.finished, e.artifact_urls \
    FROM enhancements e LEFT JOIN generations g ON g.db_id = e.generation_db_id";

#[derive(Debug, FromRow)]
struct RequestRow {
    db_id: i64,
    request_id: String,
    status: String,
    creation_date: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PublisherRow {
    name: String,
    version: String,
    options: Json<BTreeMap<String, String>>,
}

#[derive(Debug, FromRow)]
struct GenerationRow {
    db_id: i64,
    generation_id: String,
    request_id: String,
    target_type: String,
    target_identifier: String,
    generator_name: String,
    generator_version: String,
    generator_options: Json<BTreeMap<String, String>>,
    status: String,
    result: Option<i32>,
    reason: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
    artifact_urls: Vec<String>,
}

#[derive(Debug, FromRow)]
struct EnhancementRow {
    enhancement_id: String,
    generation_id: Option<String>,
    request_id: String,
    index_value: i32,
    enhancer_name: String,
    enhancer_version: String,
    enhancer_options: Json<BTreeMap<String, String>>,
    status: String,
    result: Option<i32>,
    reason: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
    artifact_urls: Vec<String>,
}

impl RequestRow {
    fn into_record(self, publishers: Vec<PublisherRecord>) -> Result<RequestRecord> {
        let status = self
            .status
            .parse::<RequestStatus>()
            .map_err(OrchestratorError::Internal)?;
        Ok(RequestRecord {
            request_id: self.request_id,
            status,
            creation_date: self.creation_date,
            publishers,
        })
    }
}

impl GenerationRow {
    fn into_record(self, enhancements: Vec<EnhancementRecord>) -> GenerationRecord {
        GenerationRecord {
            generation_id: self.generation_id,
            request_id: self.request_id,
            target_type: self.target_type,
            target_identifier: self.target_identifier,
            generator_name: self.generator_name,
            generator_version: self.generator_version,
            generator_options: self.generator_options.0,
            status: GenerationStatus::from(self.status),
            result: self.result,
            reason: self.reason,
            created: self.created,
            updated: self.updated,
            finished: self.finished,
            artifact_urls: self.artifact_urls.into_iter().collect(),
            enhancements,
        }
    }
}

impl EnhancementRow {
    fn into_record(self) -> Result<EnhancementRecord> {
        let index = u32::try_from(self.index_value).map_err(|_| {
            OrchestratorError::Internal(format!(
                "enhancement {} has negative index {}",
                self.enhancement_id, self.index_value
            ))
        })?;
        Ok(EnhancementRecord {
            enhancement_id: self.enhancement_id,
            generation_id: self.generation_id,
            request_id: self.request_id,
            index,
            enhancer_name: self.enhancer_name,
            enhancer_version: self.enhancer_version,
            enhancer_options: self.enhancer_options.0,
            status: EnhancementStatus::from(self.status),
            result: self.result,
            reason: self.reason,
            created: self.created,
            updated: self.updated,
            finished: self.finished,
            artifact_urls: self.artifact_urls.into_iter().collect(),
        })
    }
}

fn db_index(record: &EnhancementRecord) -> Result<i32> {
    i32::try_from(record.index).map_err(|_| {
        OrchestratorError::InvalidInput(format!(
            "enhancement index {} out of range",
            record.index
        ))
    })
}

fn url_array(urls: &std::collections::BTreeSet<String>) -> Vec<String> {
    urls.iter().cloned().collect()
}

fn offset_limit(page: PageRequest) -> (i64, i64) {
    (
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
        i64::try_from(page.limit()).unwrap_or(i64::MAX),
    )
}

fn enhancement_records(rows: Vec<EnhancementRow>) -> Result<Vec<EnhancementRecord>> {
    rows.into_iter().map(EnhancementRow::into_record).collect()
}

async fn load_publishers(conn: &mut PgConnection, request_db_id: i64) -> Result<Vec<PublisherRecord>> {
    let rows: Vec<PublisherRow> = sqlx::query_as(
        "SELECT name, version, options FROM publishers WHERE request_db_id = $1 ORDER BY db_id",
    )
    .bind(request_db_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PublisherRecord::new(row.name, row.version).with_options(row.options.0))
        .collect())
}

async fn load_request(conn: &mut PgConnection, row: RequestRow) -> Result<RequestRecord> {
    let publishers = load_publishers(conn, row.db_id).await?;
    row.into_record(publishers)
}

/// Attach current enhancement chains to generation rows, preserving row order
async fn with_chains(conn: &mut PgConnection, rows: Vec<GenerationRow>) -> Result<Vec<GenerationRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let db_ids: Vec<i64> = rows.iter().map(|row| row.db_id).collect();
    let chain_rows: Vec<EnhancementRow> = sqlx::query_as(&format!(
        "{SELECT_ENHANCEMENTS} WHERE e.generation_db_id = ANY($1) ORDER BY e.index_value, e.db_id"
    ))
    .bind(db_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut chains: HashMap<String, Vec<EnhancementRecord>> = HashMap::new();
    for record in enhancement_records(chain_rows)? {
        if let Some(generation_id) = record.generation_id.clone() {
            chains.entry(generation_id).or_default().push(record);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let chain = chains.remove(&row.generation_id).unwrap_or_default();
            row.into_record(chain)
        })
        .collect())
}

async fn load_chain(conn: &mut PgConnection, generation_db_id: i64) -> Result<Vec<EnhancementRecord>> {
    let rows: Vec<EnhancementRow> = sqlx::query_as(&format!(
        "{SELECT_ENHANCEMENTS} WHERE e.generation_db_id = $1 ORDER BY e.index_value, e.db_id"
    ))
    .bind(generation_db_id)
    .fetch_all(&mut *conn)
    .await?;
    enhancement_records(rows)
}

/// Insert a generation and its chain. `false` when the id already exists.
async fn insert_generation(conn: &mut PgConnection, generation: &GenerationRecord) -> Result<bool> {
    let db_id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO generations (generation_id, request_db_id, request_id, target_type, \
         target_identifier, generator_name, generator_version, generator_options, status, result, \
         reason, created, updated, finished, artifact_urls) \
         VALUES ($1, (SELECT db_id FROM requests WHERE request_id = $2), $2, $3, $4, $5, $6, $7, \
         $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (generation_id) DO NOTHING RETURNING db_id",
    )
    .bind(&generation.generation_id)
    .bind(&generation.request_id)
    .bind(&generation.target_type)
    .bind(&generation.target_identifier)
    .bind(&generation.generator_name)
    .bind(&generation.generator_version)
    .bind(Json(&generation.generator_options))
    .bind(generation.status.as_str())
    .bind(generation.result)
    .bind(generation.reason.as_deref())
    .bind(generation.created)
    .bind(generation.updated)
    .bind(generation.finished)
    .bind(url_array(&generation.artifact_urls))
    .fetch_optional(&mut *conn)
    .await?;

    let Some(db_id) = db_id else {
        return Ok(false);
    };
    for enhancement in &generation.enhancements {
        if !insert_enhancement(conn, enhancement, Some(db_id)).await? {
            return Err(OrchestratorError::InvalidInput(format!(
                "enhancement {} already exists",
                enhancement.enhancement_id
            )));
        }
    }
    Ok(true)
}

/// Insert one enhancement. `false` when the id already exists.
async fn insert_enhancement(
    conn: &mut PgConnection,
    enhancement: &EnhancementRecord,
    generation_db_id: Option<i64>,
) -> Result<bool> {
    let inserted = sqlx::query(
        "INSERT INTO enhancements (enhancement_id, generation_db_id, request_db_id, request_id, \
         index_value, enhancer_name, enhancer_version, enhancer_options, status, result, reason, \
         created, updated, finished, artifact_urls) \
         VALUES ($1, $2, (SELECT db_id FROM requests WHERE request_id = $3), $3, $4, $5, $6, $7, \
         $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (enhancement_id) DO NOTHING",
    )
    .bind(&enhancement.enhancement_id)
    .bind(generation_db_id)
    .bind(&enhancement.request_id)
    .bind(db_index(enhancement)?)
    .bind(&enhancement.enhancer_name)
    .bind(&enhancement.enhancer_version)
    .bind(Json(&enhancement.enhancer_options))
    .bind(enhancement.status.as_str())
    .bind(enhancement.result)
    .bind(enhancement.reason.as_deref())
    .bind(enhancement.created)
    .bind(enhancement.updated)
    .bind(enhancement.finished)
    .bind(url_array(&enhancement.artifact_urls))
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(inserted == 1)
}

/// Write every mutable generation field (reconciliation path)
async fn write_generation_fields(conn: &mut PgConnection, generation: &GenerationRecord) -> Result<u64> {
    let updated = sqlx::query(
        "UPDATE generations SET generator_name = $2, generator_version = $3, \
         generator_options = $4, status = $5, result = $6, reason = $7, updated = $8, \
         finished = $9, artifact_urls = $10 WHERE generation_id = $1",
    )
    .bind(&generation.generation_id)
    .bind(&generation.generator_name)
    .bind(&generation.generator_version)
    .bind(Json(&generation.generator_options))
    .bind(generation.status.as_str())
    .bind(generation.result)
    .bind(generation.reason.as_deref())
    .bind(generation.updated)
    .bind(generation.finished)
    .bind(url_array(&generation.artifact_urls))
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(updated)
}

/// Write every mutable enhancement field (reconciliation path)
async fn write_enhancement_fields(
    conn: &mut PgConnection,
    enhancement: &EnhancementRecord,
) -> Result<u64> {
    let updated = sqlx::query(
        "UPDATE enhancements SET index_value = $2, enhancer_name = $3, enhancer_version = $4, \
         enhancer_options = $5, status = $6, result = $7, reason = $8, created = $9, \
         updated = $10, finished = $11, artifact_urls = $12 WHERE enhancement_id = $1",
    )
    .bind(&enhancement.enhancement_id)
    .bind(db_index(enhancement)?)
    .bind(&enhancement.enhancer_name)
    .bind(&enhancement.enhancer_version)
    .bind(Json(&enhancement.enhancer_options))
    .bind(enhancement.status.as_str())
    .bind(enhancement.result)
    .bind(enhancement.reason.as_deref())
    .bind(enhancement.created)
    .bind(enhancement.updated)
    .bind(enhancement.finished)
    .bind(url_array(&enhancement.artifact_urls))
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(updated)
}

/// Status-owned columns shared by `generations` and `enhancements`
struct StatusFields<'a> {
    status: &'a str,
    result: Option<i32>,
    reason: Option<&'a str>,
    artifact_urls: Vec<String>,
    updated: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
}

impl<'a> From<&'a GenerationRecord> for StatusFields<'a> {
    fn from(generation: &'a GenerationRecord) -> Self {
        Self {
            status: generation.status.as_str(),
            result: generation.result,
            reason: generation.reason.as_deref(),
            artifact_urls: url_array(&generation.artifact_urls),
            updated: generation.updated,
            finished: generation.finished,
        }
    }
}

impl<'a> From<&'a EnhancementRecord> for StatusFields<'a> {
    fn from(enhancement: &'a EnhancementRecord) -> Self {
        Self {
            status: enhancement.status.as_str(),
            result: enhancement.result,
            reason: enhancement.reason.as_deref(),
            artifact_urls: url_array(&enhancement.artifact_urls),
            updated: enhancement.updated,
            finished: enhancement.finished,
        }
    }
}

/// Conditional write of the status-owned columns. `table` and `id_column`
/// are crate constants, never caller input.
async fn write_status_if(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    id: &str,
    fields: StatusFields<'_>,
    expected: &str,
) -> Result<bool> {
    let mut conn = pool.acquire().await?;
    let updated = sqlx::query(&format!(
        "UPDATE {table} SET status = $2, result = $3, reason = $4, artifact_urls = $5, \
         updated = $6, finished = $7 WHERE {id_column} = $1 AND status = $8"
    ))
    .bind(id)
    .bind(fields.status)
    .bind(fields.result)
    .bind(fields.reason)
    .bind(fields.artifact_urls)
    .bind(fields.updated)
    .bind(fields.finished)
    .bind(expected)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated == 1 {
        return Ok(true);
    }
    found_or_missing(&mut conn, table, id_column, id).await
}

/// Reset a `FAILED` row to `NEW`, leaving every other column as stored
async fn reset_if_failed(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut conn = pool.acquire().await?;
    let updated = sqlx::query(&format!(
        "UPDATE {table} SET status = $2, result = NULL, reason = NULL, finished = NULL, \
         updated = $3 WHERE {id_column} = $1 AND status = $4"
    ))
    .bind(id)
    .bind(GenerationStatus::New.as_str())
    .bind(now)
    .bind(GenerationStatus::Failed.as_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated == 1 {
        return Ok(true);
    }
    found_or_missing(&mut conn, table, id_column, id).await
}

/// `Ok(false)` when the row exists, `NotFound` when it does not
async fn found_or_missing(
    conn: &mut PgConnection,
    table: &str,
    id_column: &str,
    id: &str,
) -> Result<bool> {
    let found: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE {id_column} = $1)"
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    if found {
        return Ok(false);
    }
    let entity = if table == "generations" {
        entities::GENERATION
    } else {
        entities::ENHANCEMENT
    };
    Err(OrchestratorError::not_found(entity, id))
}

#[derive(Debug, Clone)]
pub struct PgStatusRepository {
    pool: PgPool,
}

impl PgStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn generations_page(
        &self,
        filter: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<GenerationRecord>> {
        let mut conn = self.pool.acquire().await?;
        let (offset, limit) = offset_limit(page);

        let (total, rows): (i64, Vec<GenerationRow>) = match filter {
            Some(request_id) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM generations WHERE request_id = $1")
                    .bind(request_id)
                    .fetch_one(&mut *conn)
                    .await?;
                let rows: Vec<GenerationRow> = sqlx::query_as(&format!(
                    "SELECT {GENERATION_COLUMNS} FROM generations WHERE request_id = $1 \
                     ORDER BY db_id LIMIT $2 OFFSET $3"
                ))
                .bind(request_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generations")
                    .fetch_one(&mut *conn)
                    .await?;
                let rows: Vec<GenerationRow> = sqlx::query_as(&format!(
                    "SELECT {GENERATION_COLUMNS} FROM generations ORDER BY db_id LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?;
                (total, rows)
            }
        };

        let content = with_chains(&mut conn, rows).await?;
        Ok(Page::new(content, total.max(0) as u64, page))
    }
}

#[async_trait]
impl StatusRepository for PgStatusRepository {
    #[instrument(skip(self, graph), fields(request_id = %graph.request_id()))]
    async fn save_request(&self, graph: &RequestGraph) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let request = &graph.request;

        let request_db_id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO requests (request_id, status, creation_date) VALUES ($1, $2, $3) \
             ON CONFLICT (request_id) DO NOTHING RETURNING db_id",
        )
        .bind(&request.request_id)
        .bind(request.status.to_string())
        .bind(request.creation_date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request_db_id) = request_db_id else {
            return Err(OrchestratorError::InvalidInput(format!(
                "request {} already exists",
                request.request_id
            )));
        };

        for publisher in &request.publishers {
            sqlx::query(
                "INSERT INTO publishers (request_db_id, name, version, options) VALUES ($1, $2, $3, $4)",
            )
            .bind(request_db_id)
            .bind(&publisher.name)
            .bind(&publisher.version)
            .bind(Json(&publisher.options))
            .execute(&mut *tx)
            .await?;
        }

        for generation in &graph.generations {
            if !insert_generation(&mut tx, generation).await? {
                return Err(OrchestratorError::InvalidInput(format!(
                    "generation {} already exists",
                    generation.generation_id
                )));
            }
        }

        tx.commit().await?;
        debug!(
            generations = graph.generations.len(),
            enhancements = graph.enhancement_count(),
            "Stored request graph"
        );
        Ok(())
    }

    async fn find_request(&self, request_id: &str) -> Result<Option<RequestRecord>> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(load_request(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_all_requests(&self, page: PageRequest) -> Result<Page<RequestRecord>> {
        let mut conn = self.pool.acquire().await?;
        let (offset, limit) = offset_limit(page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM requests")
            .fetch_one(&mut *conn)
            .await?;
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests ORDER BY db_id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let mut content = Vec::with_capacity(rows.len());
        for row in rows {
            content.push(load_request(&mut conn, row).await?);
        }
        Ok(Page::new(content, total.max(0) as u64, page))
    }

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        let updated = sqlx::query("UPDATE requests SET status = $2 WHERE request_id = $1")
            .bind(request_id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(OrchestratorError::not_found(entities::REQUEST, request_id));
        }
        Ok(())
    }

    async fn save_generation(&self, generation: &GenerationRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_generation(&mut tx, generation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_generation(&self, generation_id: &str) -> Result<Option<GenerationRecord>> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<GenerationRow> = sqlx::query_as(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE generation_id = $1"
        ))
        .bind(generation_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let chain = load_chain(&mut conn, row.db_id).await?;
                Ok(Some(row.into_record(chain)))
            }
            None => Ok(None),
        }
    }

    async fn find_all_generations(&self, page: PageRequest) -> Result<Page<GenerationRecord>> {
        self.generations_page(None, page).await
    }

    async fn find_generations_by_request(&self, request_id: &str) -> Result<Vec<GenerationRecord>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<GenerationRow> = sqlx::query_as(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE request_id = $1 ORDER BY db_id"
        ))
        .bind(request_id)
        .fetch_all(&mut *conn)
        .await?;
        with_chains(&mut conn, rows).await
    }

    async fn find_generations_by_request_paged(
        &self,
        request_id: &str,
        page: PageRequest,
    ) -> Result<Page<GenerationRecord>> {
        self.generations_page(Some(request_id), page).await
    }

    async fn find_generations_by_status(
        &self,
        status: &GenerationStatus,
    ) -> Result<Vec<GenerationRecord>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<GenerationRow> = sqlx::query_as(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE status = $1 ORDER BY db_id"
        ))
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await?;
        with_chains(&mut conn, rows).await
    }

    #[instrument(skip(self, generation), fields(generation_id = %generation.generation_id))]
    async fn update_generation(&self, generation: &GenerationRecord) -> Result<GenerationRecord> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(i64, String)> = sqlx::query_as(
            "SELECT db_id, request_id FROM generations WHERE generation_id = $1 FOR UPDATE",
        )
        .bind(&generation.generation_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((db_id, request_id)) = locked else {
            return Err(OrchestratorError::not_found(
                entities::GENERATION,
                &generation.generation_id,
            ));
        };

        let linked = load_chain(&mut tx, db_id).await?;
        let incoming_ids: Vec<String> = generation
            .enhancements
            .iter()
            .map(|enhancement| enhancement.enhancement_id.clone())
            .collect();
        let stored_rows: Vec<EnhancementRow> = sqlx::query_as(&format!(
            "{SELECT_ENHANCEMENTS} WHERE e.enhancement_id = ANY($1) FOR UPDATE OF e"
        ))
        .bind(incoming_ids)
        .fetch_all(&mut *tx)
        .await?;
        let elsewhere: HashMap<String, EnhancementRecord> = enhancement_records(stored_rows)?
            .into_iter()
            .map(|record| (record.enhancement_id.clone(), record))
            .collect();

        let plan = plan_reconciliation(
            &generation.generation_id,
            &request_id,
            &linked,
            &generation.enhancements,
            &elsewhere,
        )?;

        write_generation_fields(&mut tx, generation).await?;

        if !plan.detached.is_empty() {
            sqlx::query(
                "UPDATE enhancements SET generation_db_id = NULL WHERE enhancement_id = ANY($1)",
            )
            .bind(plan.detached.clone())
            .execute(&mut *tx)
            .await?;
        }

        for action in &plan.actions {
            match action {
                ReconcileAction::Update(record) => {
                    write_enhancement_fields(&mut tx, record).await?;
                }
                ReconcileAction::Adopt { record, .. } => {
                    write_enhancement_fields(&mut tx, record).await?;
                    sqlx::query(
                        "UPDATE enhancements SET generation_db_id = $2, request_id = $3, \
                         request_db_id = (SELECT db_id FROM requests WHERE request_id = $3) \
                         WHERE enhancement_id = $1",
                    )
                    .bind(&record.enhancement_id)
                    .bind(db_id)
                    .bind(&request_id)
                    .execute(&mut *tx)
                    .await?;
                }
                ReconcileAction::Create(record) => {
                    insert_enhancement(&mut tx, record, Some(db_id)).await?;
                }
            }
        }

        let row: GenerationRow = sqlx::query_as(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE db_id = $1"
        ))
        .bind(db_id)
        .fetch_one(&mut *tx)
        .await?;
        let chain = load_chain(&mut tx, db_id).await?;
        tx.commit().await?;

        debug!(
            updated = plan.count("update"),
            adopted = plan.count("adopt"),
            created = plan.count("create"),
            detached = plan.detached.len(),
            "Reconciled enhancement chain"
        );
        Ok(row.into_record(chain))
    }

    async fn update_generation_if_status(
        &self,
        generation: &GenerationRecord,
        expected: &GenerationStatus,
    ) -> Result<bool> {
        write_status_if(
            &self.pool,
            "generations",
            "generation_id",
            &generation.generation_id,
            StatusFields::from(generation),
            expected.as_str(),
        )
        .await
    }

    async fn reset_generation_for_retry(
        &self,
        generation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        reset_if_failed(&self.pool, "generations", "generation_id", generation_id, now).await
    }

    async fn save_enhancement(&self, enhancement: &EnhancementRecord) -> Result<()> {
        if !enhancement.has_id() {
            return Err(OrchestratorError::InvalidInput(
                "enhancement id must be assigned before saving".to_string(),
            ));
        }
        let mut tx = self.pool.begin().await?;
        let generation_db_id: Option<i64> = match &enhancement.generation_id {
            Some(generation_id) => {
                sqlx::query_scalar("SELECT db_id FROM generations WHERE generation_id = $1")
                    .bind(generation_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };
        insert_enhancement(&mut tx, enhancement, generation_db_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_enhancement(&self, enhancement_id: &str) -> Result<Option<EnhancementRecord>> {
        let row: Option<EnhancementRow> = sqlx::query_as(&format!(
            "{SELECT_ENHANCEMENTS} WHERE e.enhancement_id = $1"
        ))
        .bind(enhancement_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(EnhancementRow::into_record).transpose()
    }

    async fn find_all_enhancements(&self, page: PageRequest) -> Result<Page<EnhancementRecord>> {
        let (offset, limit) = offset_limit(page);
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enhancements")
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<EnhancementRow> = sqlx::query_as(&format!(
            "{SELECT_ENHANCEMENTS} ORDER BY e.db_id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(enhancement_records(rows)?, total.max(0) as u64, page))
    }

    async fn find_enhancements_by_generation(
        &self,
        generation_id: &str,
    ) -> Result<Vec<EnhancementRecord>> {
        let rows: Vec<EnhancementRow> = sqlx::query_as(&format!(
            "{SELECT_ENHANCEMENTS} WHERE g.generation_id = $1 ORDER BY e.index_value, e.db_id"
        ))
        .bind(generation_id)
        .fetch_all(&self.pool)
        .await?;
        enhancement_records(rows)
    }

    async fn find_enhancements_by_status(
        &self,
        status: &EnhancementStatus,
    ) -> Result<Vec<EnhancementRecord>> {
        let rows: Vec<EnhancementRow> = sqlx::query_as(&format!(
            "{SELECT_ENHANCEMENTS} WHERE e.status = $1 ORDER BY e.db_id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        enhancement_records(rows)
    }

    async fn update_enhancement(&self, enhancement: &EnhancementRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if write_enhancement_fields(&mut conn, enhancement).await? == 0 {
            return Err(OrchestratorError::not_found(
                entities::ENHANCEMENT,
                &enhancement.enhancement_id,
            ));
        }
        Ok(())
    }

    async fn update_enhancement_if_status(
        &self,
        enhancement: &EnhancementRecord,
        expected: &EnhancementStatus,
    ) -> Result<bool> {
        write_status_if(
            &self.pool,
            "enhancements",
            "enhancement_id",
            &enhancement.enhancement_id,
            StatusFields::from(enhancement),
            expected.as_str(),
        )
        .await
    }

    async fn reset_enhancement_for_retry(
        &self,
        enhancement_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        reset_if_failed(&self.pool, "enhancements", "enhancement_id", enhancement_id, now).await
    }
}
