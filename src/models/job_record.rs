use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::job::ScoredJob;

/// A retained job as the persistence layer stores it.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i32,
    pub company_id: i32,
    pub job_title: String,
    pub job_url: String,
    pub department: String,
    pub location: Option<String>,
    pub remote_type: String,
    pub description: Option<String>,
    pub posted_at: Option<String>,
    pub role: String,
    pub score: i32,
    pub scraped_at: DateTime<Utc>,
    pub hash: String,
    pub active: bool,
    pub ats_provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJobRecord {
    pub company_id: i32,
    pub job_title: String,
    pub job_url: String,
    pub department: String,
    pub location: Option<String>,
    pub remote_type: String,
    pub description: Option<String>,
    pub posted_at: Option<String>,
    pub role: String,
    pub score: i32,
    pub hash: String,
    pub ats_provider: Option<String>,
}

/// Durable identity of a stored job, distinct from the in-run dedup key.
pub fn record_hash(company_id: i32, title: &str, url: &str) -> String {
    hex::encode(Sha256::digest(format!("{company_id}:{title}:{url}").as_bytes()))
}

impl NewJobRecord {
    pub fn from_scored(company_id: i32, job: &ScoredJob, ats_provider: Option<&str>) -> Self {
        let url = job.effective_url().to_string();
        let location = Some(job.job.location.raw.clone()).filter(|l| !l.is_empty());
        let description = Some(job.job.summary.clone()).filter(|s| !s.is_empty());
        Self {
            company_id,
            hash: record_hash(company_id, &job.job.title, &url),
            job_title: job.job.title.clone(),
            job_url: url,
            department: job.job.department.as_str().to_string(),
            location,
            remote_type: job.remote_type.as_str().to_string(),
            description,
            posted_at: job.job.posted_at.clone(),
            role: job.role.as_str().to_string(),
            score: job.score as i32,
            ats_provider: ats_provider.map(String::from),
        }
    }
}

impl JobRecord {
    /// Insert, or refresh `scraped_at` and reactivate a job seen before.
    pub async fn upsert(pool: &PgPool, input: &NewJobRecord) -> Result<JobRecord, AppError> {
        let record = sqlx::query_as::<_, JobRecord>(
            "INSERT INTO job_records (company_id, job_title, job_url, department, location, remote_type, \
             description, posted_at, role, score, hash, ats_provider) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (hash) DO UPDATE SET scraped_at = NOW(), active = TRUE, \
             score = EXCLUDED.score, description = EXCLUDED.description \
             RETURNING *",
        )
        .bind(input.company_id)
        .bind(&input.job_title)
        .bind(&input.job_url)
        .bind(&input.department)
        .bind(&input.location)
        .bind(&input.remote_type)
        .bind(&input.description)
        .bind(&input.posted_at)
        .bind(&input.role)
        .bind(input.score)
        .bind(&input.hash)
        .bind(&input.ats_provider)
        .fetch_one(pool)
        .await?;
        Ok(record)
    }

    /// Mark a company's jobs inactive unless their hash was seen this crawl.
    pub async fn deactivate_missing(
        pool: &PgPool,
        company_id: i32,
        seen: &[String],
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE job_records SET active = FALSE \
             WHERE company_id = $1 AND active AND NOT (hash = ANY($2))",
        )
        .bind(company_id)
        .bind(seen)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
