use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ats::AtsProvider;
use crate::extract::cms::CmsPlatform;

/// Which extraction strategy produced a [`RawJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum JobSource {
    StructuredData,
    Microdata,
    OpenGraph,
    MetaTags,
    EmbeddedJson,
    Cms(CmsPlatform),
    DomAnchor,
    DomButton,
    DomSection,
    DomHeading,
    Ats(AtsProvider),
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSource::StructuredData => f.write_str("structured_data"),
            JobSource::Microdata => f.write_str("microdata"),
            JobSource::OpenGraph => f.write_str("open_graph"),
            JobSource::MetaTags => f.write_str("meta_tags"),
            JobSource::EmbeddedJson => f.write_str("embedded_json"),
            JobSource::Cms(platform) => write!(f, "cms:{platform}"),
            JobSource::DomAnchor => f.write_str("dom_anchor"),
            JobSource::DomButton => f.write_str("dom_button"),
            JobSource::DomSection => f.write_str("dom_section"),
            JobSource::DomHeading => f.write_str("dom_heading"),
            JobSource::Ats(provider) => write!(f, "ats:{provider}"),
        }
    }
}

/// Extractor output, before any cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawJob {
    pub title: String,
    pub url: Option<String>,
    pub summary: String,
    pub location: Option<String>,
    pub posted_at: Option<String>,
    pub source: JobSource,
}

impl RawJob {
    pub fn new(title: impl Into<String>, source: JobSource) -> Self {
        Self {
            title: title.into(),
            url: None,
            summary: String::new(),
            location: None,
            posted_at: None,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Remote,
    Hybrid,
    Onsite,
}

impl LocationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationKind::Remote => "remote",
            LocationKind::Hybrid => "hybrid",
            LocationKind::Onsite => "onsite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub raw: String,
    pub kind: LocationKind,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Entry,
    Mid,
    Senior,
    Staff,
    Director,
    Executive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Engineering,
    Marketing,
    Sales,
    Operations,
    CustomerSuccess,
    Product,
    Hubspot,
    Other,
}

impl Department {
    pub fn as_str(self) -> &'static str {
        match self {
            Department::Engineering => "engineering",
            Department::Marketing => "marketing",
            Department::Sales => "sales",
            Department::Operations => "operations",
            Department::CustomerSuccess => "customer_success",
            Department::Product => "product",
            Department::Hubspot => "hubspot",
            Department::Other => "other",
        }
    }
}

/// Canonical job, derived deterministically from a [`RawJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedJob {
    pub title: String,
    pub url: Option<String>,
    pub location: Location,
    pub department: Department,
    pub seniority: Seniority,
    pub employment_type: EmploymentType,
    pub summary: String,
    pub posted_at: Option<String>,
    pub source: JobSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Developer,
    Consultant,
    Architect,
    SeniorConsultant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Developer => "developer",
            Role::Consultant => "consultant",
            Role::Architect => "architect",
            Role::SeniorConsultant => "senior_consultant",
        }
    }

    pub fn parse(name: &str) -> Option<Role> {
        match name.trim().to_ascii_lowercase().as_str() {
            "developer" => Some(Role::Developer),
            "consultant" => Some(Role::Consultant),
            "architect" => Some(Role::Architect),
            "senior_consultant" | "senior consultant" => Some(Role::SeniorConsultant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job that cleared its role threshold. Jobs below threshold are never
/// represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredJob {
    #[serde(flatten)]
    pub job: NormalizedJob,
    pub role: Role,
    pub score: u32,
    pub signals: Vec<String>,
    pub is_contract: bool,
    pub remote_type: LocationKind,
    /// Page the job was found on; stands in for a missing job URL.
    pub source_page: String,
}

impl ScoredJob {
    pub fn effective_url(&self) -> &str {
        self.job.url.as_deref().unwrap_or(&self.source_page)
    }
}
