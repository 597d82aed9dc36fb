use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::PgPool;
use uuid::Uuid;
use vowbook_catalog::{AvailabilityRecord, AvailabilityStore, SlotKey, SlotUpdate, TimeSlot};
use vowbook_core::RepoResult;

/// Availability in PostgreSQL. Counter changes are single conditional
/// `UPDATE ... RETURNING` statements, so concurrent reservations are
/// serialized by the row lock.
pub struct PgAvailabilityStore {
    pool: PgPool,
}

impl PgAvailabilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Work out why a conditional update touched no row.
    async fn refusal(&self, key: &SlotKey, start_time: NaiveTime, end_time: NaiveTime) -> RepoResult<SlotUpdate> {
        let record = self.find_record(key).await?;
        let Some(record) = record else {
            return Ok(SlotUpdate::NoRecord);
        };
        Ok(match record.slot(start_time, end_time) {
            None => SlotUpdate::SlotNotFound,
            Some(slot) if slot.blocked => SlotUpdate::Blocked,
            Some(_) => SlotUpdate::Full,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    start_time: NaiveTime,
    end_time: NaiveTime,
    current_bookings: i32,
    max_bookings: i32,
    blocked: bool,
}

impl From<SlotRow> for TimeSlot {
    fn from(row: SlotRow) -> Self {
        let current_bookings = u32::try_from(row.current_bookings).unwrap_or(0);
        let max_bookings = u32::try_from(row.max_bookings).unwrap_or(0);
        TimeSlot {
            start_time: row.start_time,
            end_time: row.end_time,
            is_available: current_bookings < max_bookings,
            current_bookings,
            max_bookings,
            blocked: row.blocked,
        }
    }
}

/// Slots without a venue are stored under the nil uuid so the key can be a
/// primary key.
fn venue_key(key: &SlotKey) -> Uuid {
    key.venue_id.unwrap_or(Uuid::nil())
}

const SLOT_COLUMNS: &str = "start_time, end_time, current_bookings, max_bookings, blocked";

#[async_trait]
impl AvailabilityStore for PgAvailabilityStore {
    async fn find_record(&self, key: &SlotKey) -> RepoResult<Option<AvailabilityRecord>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {} FROM availability_slots
             WHERE vendor_id = $1 AND venue_key = $2 AND slot_date = $3
             ORDER BY start_time",
            SLOT_COLUMNS
        ))
        .bind(key.vendor_id)
        .bind(venue_key(key))
        .bind(key.date)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let slots = rows.into_iter().map(TimeSlot::from).collect();
        Ok(Some(AvailabilityRecord::new(key.clone(), slots)?))
    }

    async fn put_record(&self, record: AvailabilityRecord) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM availability_slots WHERE vendor_id = $1 AND venue_key = $2 AND slot_date = $3")
            .bind(record.key.vendor_id)
            .bind(venue_key(&record.key))
            .bind(record.key.date)
            .execute(&mut *tx)
            .await?;

        for slot in &record.slots {
            sqlx::query(
                r#"
                INSERT INTO availability_slots
                    (vendor_id, venue_key, slot_date, start_time, end_time, current_bookings, max_bookings, blocked)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(record.key.vendor_id)
            .bind(venue_key(&record.key))
            .bind(record.key.date)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(i32::try_from(slot.current_bookings)?)
            .bind(i32::try_from(slot.max_bookings)?)
            .bind(slot.blocked)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reserve_slot(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<SlotUpdate> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "UPDATE availability_slots SET current_bookings = current_bookings + 1
             WHERE vendor_id = $1 AND venue_key = $2 AND slot_date = $3
               AND start_time = $4 AND end_time = $5
               AND NOT blocked AND current_bookings < max_bookings
             RETURNING {}",
            SLOT_COLUMNS
        ))
        .bind(key.vendor_id)
        .bind(venue_key(key))
        .bind(key.date)
        .bind(start_time)
        .bind(end_time)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(SlotUpdate::Applied(row.into())),
            None => self.refusal(key, start_time, end_time).await,
        }
    }

    async fn release_slot(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<SlotUpdate> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "UPDATE availability_slots SET current_bookings = GREATEST(current_bookings - 1, 0)
             WHERE vendor_id = $1 AND venue_key = $2 AND slot_date = $3
               AND start_time = $4 AND end_time = $5
             RETURNING {}",
            SLOT_COLUMNS
        ))
        .bind(key.vendor_id)
        .bind(venue_key(key))
        .bind(key.date)
        .bind(start_time)
        .bind(end_time)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(SlotUpdate::Applied(row.into())),
            None => self.refusal(key, start_time, end_time).await,
        }
    }
}
