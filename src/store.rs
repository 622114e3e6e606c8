use async_trait::async_trait;
use sqlx::PgPool;

use crate::crawler::orchestrator::DomainReport;
use crate::error::AppError;
use crate::filters::{bare_host, strip_www};
use crate::models::company::Company;
use crate::models::job_record::{JobRecord, NewJobRecord};

/// Destination for the jobs of a finished domain crawl.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Returns the number of jobs stored.
    async fn store_domain(&self, report: &DomainReport) -> Result<usize, AppError>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobSink for PgJobStore {
    async fn store_domain(&self, report: &DomainReport) -> Result<usize, AppError> {
        let domain = company_domain(report);
        let company = Company::find_or_create_by_domain(&self.pool, &report.company, &domain).await?;
        let ats = report.ats_provider.map(|p| p.as_str());
        if let Err(e) =
            Company::record_career_page(&self.pool, company.id, report.career_page.as_deref(), ats).await
        {
            tracing::warn!("Failed to record career page for {domain}: {e}");
        }

        let mut tally = UpsertTally::default();
        for job in &report.jobs {
            let input = NewJobRecord::from_scored(company.id, job, ats);
            match JobRecord::upsert(&self.pool, &input).await {
                Ok(record) => tally.seen.push(record.hash),
                Err(e) => {
                    tally.failed += 1;
                    tracing::warn!("Failed to upsert '{}' for {domain}: {e}", input.job_title);
                }
            }
        }

        match tally.still_listed() {
            Some(seen) => {
                let deactivated = JobRecord::deactivate_missing(&self.pool, company.id, seen).await?;
                if deactivated > 0 {
                    tracing::info!("{domain}: {deactivated} stored jobs no longer listed");
                }
            }
            None => tracing::warn!(
                "{domain}: {} upserts failed, leaving existing jobs active",
                tally.failed
            ),
        }
        Ok(tally.seen.len())
    }
}

/// Companies are keyed by bare host, so `www.` and apex crawls share a row.
fn company_domain(report: &DomainReport) -> String {
    bare_host(&report.root_url).unwrap_or_else(|| strip_www(&report.domain).to_string())
}

/// Outcome of writing one domain's jobs.
#[derive(Debug, Default)]
struct UpsertTally {
    seen: Vec<String>,
    failed: usize,
}

impl UpsertTally {
    /// Hashes that define the live set, or `None` when a failed upsert
    /// leaves the set incomplete and nothing may be deactivated.
    fn still_listed(&self) -> Option<&[String]> {
        (self.failed == 0).then_some(self.seen.as_slice())
    }
}
