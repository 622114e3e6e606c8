use std::collections::BTreeMap;

use serde::Serialize;

use super::tracker::JobChanges;
use crate::models::job::{ScoredJob, Seniority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Expanding,
    Contracting,
    ActivelyHiring,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub trend: Trend,
    pub reason: String,
    pub net_change: i64,
    pub new_jobs: usize,
    pub removed_jobs: usize,
    pub updated_jobs: usize,
    pub insights: Vec<String>,
    /// Counts of new jobs by role family.
    pub role_breakdown: BTreeMap<&'static str, usize>,
}

const ROLE_FAMILIES: &[(&str, &[&str])] = &[
    ("engineering", &["engineer", "developer", "architect"]),
    ("leadership", &["director", "vice president", "vp", "head of", "chief"]),
    ("sales", &["sales", "account executive"]),
    ("marketing", &["marketing", "growth"]),
    ("operations", &["operations", "ops"]),
    ("customer_success", &["customer success", "support"]),
];

fn families(job: &ScoredJob) -> impl Iterator<Item = &'static str> + '_ {
    let title = job.job.title.to_lowercase();
    ROLE_FAMILIES
        .iter()
        .filter(move |(_, keywords)| keywords.iter().any(|k| title.contains(k)))
        .map(|(family, _)| *family)
}

fn role_breakdown(jobs: &[ScoredJob]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> =
        ROLE_FAMILIES.iter().map(|(family, _)| (*family, 0)).collect();
    for job in jobs {
        for family in families(job) {
            *counts.entry(family).or_default() += 1;
        }
    }
    counts
}

/// Most common seniority band among new jobs, ties going to the junior
/// band.
fn seniority_focus(jobs: &[ScoredJob]) -> &'static str {
    let mut bands = [("entry", 0), ("mid", 0), ("senior", 0), ("leadership", 0)];
    for job in jobs {
        let idx = match job.job.seniority {
            Seniority::Entry => 0,
            Seniority::Mid => 1,
            Seniority::Senior | Seniority::Staff => 2,
            Seniority::Director | Seniority::Executive => 3,
        };
        bands[idx].1 += 1;
    }
    bands
        .iter()
        .fold(bands[0], |best, band| if band.1 > best.1 { *band } else { best })
        .0
}

/// Label a company's hiring direction from one run's changes.
pub fn analyze(changes: &JobChanges) -> TrendReport {
    let new_jobs = changes.new.len();
    let removed_jobs = changes.removed.len();
    let net_change = new_jobs as i64 - removed_jobs as i64;

    let (trend, reason) = if net_change > 5 {
        (Trend::Expanding, "Significant increase in job postings")
    } else if net_change < -5 {
        (Trend::Contracting, "Significant decrease in job postings")
    } else if new_jobs > 10 {
        (Trend::ActivelyHiring, "High volume of new positions")
    } else {
        (Trend::Stable, "Steady hiring activity")
    };

    let breakdown = role_breakdown(&changes.new);
    let mut insights = Vec::new();
    if breakdown.get("engineering").copied().unwrap_or(0) > 5 {
        insights.push("Surge in engineering roles".to_string());
    }
    if breakdown.get("leadership").copied().unwrap_or(0) > 0 {
        insights.push("Hiring for leadership positions".to_string());
    }
    if changes
        .removed
        .iter()
        .any(|job| families(job).any(|f| f == "leadership"))
    {
        insights.push("Disappearance of leadership roles".to_string());
    }
    if new_jobs > 0 {
        match seniority_focus(&changes.new) {
            "entry" => insights.push("Focus on entry-level hires".to_string()),
            "senior" => insights.push("Focus on senior talent".to_string()),
            _ => {}
        }
    }

    TrendReport {
        trend,
        reason: reason.to_string(),
        net_change,
        new_jobs,
        removed_jobs,
        updated_jobs: changes.updated.len(),
        insights,
        role_breakdown: breakdown,
    }
}
