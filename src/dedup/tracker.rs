use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::AppError;
use crate::models::job::ScoredJob;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub company: String,
    pub job: ScoredJob,
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    jobs: BTreeMap<String, CacheEntry>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobChanges {
    pub new: Vec<ScoredJob>,
    pub removed: Vec<ScoredJob>,
    pub updated: Vec<ScoredJob>,
}

impl JobChanges {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Cross-run job memory. Loaded once, fed during the run, written back at
/// the end.
#[derive(Debug)]
pub struct IncrementalTracker {
    path: PathBuf,
    previous: BTreeMap<String, CacheEntry>,
    current: BTreeMap<String, CacheEntry>,
    crawled: HashSet<String>,
}

pub fn tracker_key(company: &str, job: &ScoredJob) -> String {
    let id = job.job.url.as_deref().unwrap_or(&job.job.title);
    format!("{company}:{id}")
}

impl IncrementalTracker {
    /// A missing cache is a cold start. An unreadable one is logged and
    /// treated the same way.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let previous = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CacheFile>(&raw) {
                Ok(cache) => {
                    tracing::info!("Loaded {} previous jobs from {}", cache.jobs.len(), path.display());
                    cache.jobs
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable job cache {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No job cache at {}, starting cold", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!("Failed to read job cache {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self {
            path,
            previous,
            current: BTreeMap::new(),
            crawled: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn previous_len(&self) -> usize {
        self.previous.len()
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    /// Record that a company was fully crawled this run, even if nothing
    /// was found. Only crawled companies can lose jobs.
    pub fn mark_crawled(&mut self, company: &str) {
        self.crawled.insert(company.to_string());
    }

    pub fn add_job(&mut self, company: &str, job: &ScoredJob) {
        self.mark_crawled(company);
        self.current.insert(
            tracker_key(company, job),
            CacheEntry {
                company: company.to_string(),
                job: job.clone(),
                seen_at: Utc::now(),
            },
        );
    }

    pub fn get_changes(&self, company: &str) -> JobChanges {
        let previous: BTreeMap<&String, &CacheEntry> = self
            .previous
            .iter()
            .filter(|(_, entry)| entry.company == company)
            .collect();
        let current: BTreeMap<&String, &CacheEntry> = self
            .current
            .iter()
            .filter(|(_, entry)| entry.company == company)
            .collect();

        let mut changes = JobChanges::default();
        for (key, entry) in &current {
            match previous.get(key) {
                None => changes.new.push(entry.job.clone()),
                Some(old) if old.job != entry.job => changes.updated.push(entry.job.clone()),
                Some(_) => {}
            }
        }
        for (key, entry) in &previous {
            if !current.contains_key(key) {
                changes.removed.push(entry.job.clone());
            }
        }
        changes
    }

    /// Entries to persist: everything seen this run plus the previous
    /// entries of companies that were not crawled.
    fn merged(&self) -> BTreeMap<String, CacheEntry> {
        let mut jobs: BTreeMap<String, CacheEntry> = self
            .previous
            .iter()
            .filter(|(_, entry)| !self.crawled.contains(&entry.company))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        jobs.extend(self.current.iter().map(|(k, v)| (k.clone(), v.clone())));
        jobs
    }

    /// Write through a temp file in the same directory, then rename over
    /// the cache.
    pub fn save(&self) -> Result<(), AppError> {
        let cache = CacheFile {
            jobs: self.merged(),
            updated_at: Some(Utc::now()),
        };
        let body = serde_json::to_vec_pretty(&cache)
            .map_err(|e| AppError::Cache(format!("serialize: {e}")))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::Cache(format!("create {}: {e}", dir.display())))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| AppError::Cache(format!("temp file in {}: {e}", dir.display())))?;
        tmp.write_all(&body)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AppError::Cache(format!("write: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::Cache(format!("rename to {}: {e}", self.path.display())))?;

        tracing::info!("Saved {} jobs to {}", cache.jobs.len(), self.path.display());
        Ok(())
    }

    /// Start a new run from what was just saved, so a long-lived process
    /// can diff one batch against the last.
    pub fn advance(&mut self) {
        self.previous = self.merged();
        self.current.clear();
        self.crawled.clear();
    }
}
