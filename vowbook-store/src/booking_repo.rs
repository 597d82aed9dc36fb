use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use vowbook_core::{RepoResult, WriteOutcome};
use vowbook_order::models::{Booking, BookingFilter};
use vowbook_order::BookingRepository;

/// Bookings stored as JSONB documents with the filterable fields copied into
/// indexed columns.
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a BookingFilter) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = &filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(vendor_id) = filter.vendor_id {
        builder.push(" AND vendor_id = ").push_bind(vendor_id);
    }
    if let Some(venue_id) = filter.venue_id {
        builder.push(" AND venue_id = ").push_bind(venue_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(from) = filter.date_from {
        builder.push(" AND booking_date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        builder.push(" AND booking_date <= ").push_bind(to);
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, vendor_id, venue_id, booking_date, status, version, created_at, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_id)
        .bind(booking.vendor_id)
        .bind(booking.venue_id)
        .bind(booking.schedule.date)
        .bind(booking.status.to_string())
        .bind(i64::try_from(booking.version)?)
        .bind(booking.created_at)
        .bind(Json(booking))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let row: Option<(Json<Booking>,)> = sqlx::query_as("SELECT document FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(booking),)| booking))
    }

    async fn update(&self, booking: &Booking, expected_version: u64) -> RepoResult<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET venue_id = $3, booking_date = $4, status = $5, version = $6, document = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(booking.id)
        .bind(i64::try_from(expected_version)?)
        .bind(booking.venue_id)
        .bind(booking.schedule.date)
        .bind(booking.status.to_string())
        .bind(i64::try_from(booking.version)?)
        .bind(Json(booking))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(WriteOutcome::Written);
        }
        let exists: Option<(i64,)> = sqlx::query_as("SELECT version FROM bookings WHERE id = $1")
            .bind(booking.id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(WriteOutcome::VersionConflict),
            None => Err(format!("booking {} does not exist", booking.id).into()),
        }
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        offset: u64,
        limit: u32,
    ) -> RepoResult<(Vec<Booking>, u64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM bookings");
        push_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::new("SELECT document FROM bookings");
        push_filter(&mut page, filter);
        page.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset)?);
        let rows: Vec<(Json<Booking>,)> = page.build_query_as().fetch_all(&self.pool).await?;

        Ok((
            rows.into_iter().map(|(Json(booking),)| booking).collect(),
            u64::try_from(total)?,
        ))
    }
}
