use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Company {
    pub id: i32,
    pub name: String,
    pub domain: String,
    pub careers_url: Option<String>,
    pub ats_platform: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Companies are keyed by domain; the name is refreshed on every crawl.
    pub async fn find_or_create_by_domain(
        pool: &PgPool,
        name: &str,
        domain: &str,
    ) -> Result<Company, AppError> {
        let company = sqlx::query_as::<_, Company>(
            "INSERT INTO companies (name, domain) VALUES ($1, $2) \
             ON CONFLICT (domain) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW() \
             RETURNING *",
        )
        .bind(name)
        .bind(domain)
        .fetch_one(pool)
        .await?;
        Ok(company)
    }

    pub async fn record_career_page(
        pool: &PgPool,
        id: i32,
        careers_url: Option<&str>,
        ats_platform: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE companies SET careers_url = COALESCE($2, careers_url), \
             ats_platform = COALESCE($3, ats_platform), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(careers_url)
        .bind(ats_platform)
        .execute(pool)
        .await?;
        Ok(())
    }
}
