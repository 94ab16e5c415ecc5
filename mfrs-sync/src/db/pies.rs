//! Risk pie persistence

use chrono::{DateTime, Utc};
use mfrs_common::{Error, Pie, Result, Slice};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Store for risk pies keyed by pie ID
#[derive(Clone)]
pub struct PieStore {
    pool: SqlitePool,
}

impl PieStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a pie, replacing any pie with the same ID
    pub async fn save(&self, pie: &Pie) -> Result<()> {
        let slices = serde_json::to_string(&pie.slices)?;

        sqlx::query(
            r#"
            INSERT INTO pies (id, created, patient, slices) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                created = excluded.created,
                patient = excluded.patient,
                slices = excluded.slices
            "#,
        )
        .bind(pie.id.to_string())
        .bind(pie.created.to_rfc3339())
        .bind(&pie.patient)
        .bind(&slices)
        .execute(&self.pool)
        .await?;

        tracing::debug!(pie_id = %pie.id, patient = %pie.patient, "Saved pie");
        Ok(())
    }

    /// Look up a pie by its string ID
    ///
    /// Malformed IDs are treated like unknown ones.
    pub async fn find(&self, id: &str) -> Result<Option<Pie>> {
        match Pie::parse_id(id) {
            Ok(uuid) => self.find_by_id(uuid).await,
            Err(_) => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Pie>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT created, patient, slices FROM pies WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some((created, patient, slices)) = row else {
            return Ok(None);
        };

        let created = DateTime::parse_from_rfc3339(&created)
            .map_err(|e| corrupt(id, format!("created timestamp {}: {}", created, e)))?
            .with_timezone(&Utc);
        let slices: Vec<Slice> = serde_json::from_str(&slices)
            .map_err(|e| corrupt(id, format!("slices: {}", e)))?;

        Ok(Some(Pie {
            id,
            created,
            patient,
            slices,
        }))
    }

    /// Number of stored pies
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn corrupt(id: Uuid, reason: String) -> Error {
    Error::CorruptPie {
        id: id.to_string(),
        reason,
    }
}
