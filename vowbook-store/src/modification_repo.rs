use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use vowbook_core::{RepoResult, WriteOutcome};
use vowbook_order::{BookingModification, ModificationRepository, ModificationStatus};

pub struct PgModificationRepository {
    pool: PgPool,
}

impl PgModificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModificationRepository for PgModificationRepository {
    async fn insert(&self, modification: &BookingModification) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_modifications (id, booking_id, status, version, created_at, document)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(modification.id)
        .bind(modification.booking_id)
        .bind(modification.status.as_str())
        .bind(i64::try_from(modification.version)?)
        .bind(modification.created_at)
        .bind(Json(modification))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<BookingModification>> {
        let row: Option<(Json<BookingModification>,)> =
            sqlx::query_as("SELECT document FROM booking_modifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(m),)| m))
    }

    async fn update(
        &self,
        modification: &BookingModification,
        expected_version: u64,
    ) -> RepoResult<WriteOutcome> {
        let result = sqlx::query(
            "UPDATE booking_modifications SET status = $3, version = $4, document = $5
             WHERE id = $1 AND version = $2",
        )
        .bind(modification.id)
        .bind(i64::try_from(expected_version)?)
        .bind(modification.status.as_str())
        .bind(i64::try_from(modification.version)?)
        .bind(Json(modification))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(WriteOutcome::Written);
        }
        let exists: Option<(i64,)> = sqlx::query_as("SELECT version FROM booking_modifications WHERE id = $1")
            .bind(modification.id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(WriteOutcome::VersionConflict),
            None => Err(format!("modification {} does not exist", modification.id).into()),
        }
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<BookingModification>> {
        let rows: Vec<(Json<BookingModification>,)> = sqlx::query_as(
            "SELECT document FROM booking_modifications WHERE booking_id = $1 ORDER BY created_at, id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(m),)| m).collect())
    }

    async fn list_by_status(&self, status: ModificationStatus) -> RepoResult<Vec<BookingModification>> {
        let rows: Vec<(Json<BookingModification>,)> = sqlx::query_as(
            "SELECT document FROM booking_modifications WHERE status = $1 ORDER BY created_at, id",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(m),)| m).collect())
    }
}
