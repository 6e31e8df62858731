//! Postgres-backed [`RecordStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::models::{
    CandidateRecord, Category, Gender, Location, MissingPerson, RecordStatus, ReportSource,
};
use crate::data::store::{InsertOutcome, RecordStore, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    fingerprint: String,
    name: String,
    age: i32,
    gender: String,
    category: String,
    missing_date: String,
    address: String,
    lat: f64,
    lng: f64,
    location_address: String,
    photo_url: Option<String>,
    description: String,
    clothing: String,
    status: String,
    report_source: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for MissingPerson {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let malformed = |reason: String| StoreError::Malformed {
            id: row.id.clone(),
            reason,
        };

        let gender: Gender = row.gender.parse().map_err(|e| malformed(format!("{e}")))?;
        let category: Category = row.category.parse().map_err(|e| malformed(format!("{e}")))?;
        let status: RecordStatus = row.status.parse().map_err(|e| malformed(format!("{e}")))?;
        let report_source: ReportSource = row
            .report_source
            .parse()
            .map_err(|e| malformed(format!("{e}")))?;
        let age = u32::try_from(row.age)
            .map_err(|_| malformed(format!("negative age {}", row.age)))?;

        Ok(MissingPerson {
            id: row.id,
            fingerprint: row.fingerprint,
            name: row.name,
            age,
            gender,
            category,
            missing_date: row.missing_date,
            address: row.address,
            location: Location {
                lat: row.lat,
                lng: row.lng,
                address: row.location_address,
            },
            photo_url: row.photo_url,
            description: row.description,
            clothing: row.clothing,
            status,
            report_source,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_if_absent(
        &self,
        candidate: &CandidateRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let age = i32::try_from(candidate.age).map_err(|_| StoreError::Rejected {
            id: candidate.source_id.clone(),
            reason: format!("age {} out of range", candidate.age),
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO missing_persons (
                id, fingerprint, name, age, gender, category, missing_date,
                address, lat, lng, location_address, photo_url, description,
                clothing, status, report_source, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&candidate.source_id)
        .bind(&candidate.fingerprint)
        .bind(&candidate.name)
        .bind(age)
        .bind(candidate.gender.as_str())
        .bind(candidate.category.as_str())
        .bind(&candidate.missing_date)
        .bind(&candidate.address)
        .bind(candidate.location.lat)
        .bind(candidate.location.lng)
        .bind(&candidate.location.address)
        .bind(&candidate.photo_url)
        .bind(&candidate.description)
        .bind(&candidate.clothing)
        .bind(RecordStatus::Active.as_str())
        .bind(ReportSource::ApiIngested.as_str())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MissingPerson>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, fingerprint, name, age, gender, category, missing_date,
                   address, lat, lng, location_address, photo_url, description,
                   clothing, status, report_source, updated_at
            FROM missing_persons
            ORDER BY updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MissingPerson::try_from).collect()
    }
}
