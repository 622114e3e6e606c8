use crate::models::job::{EmploymentType, LocationKind, NormalizedJob, Role, ScoredJob};

const TECH: &[&str] = &[
    "hubspot",
    "hub spot",
    "crm",
    "workflows",
    "integrations",
    "cms hub",
    "marketing hub",
    "service hub",
    "operations hub",
    "inbound",
    "reports",
    "dashboards",
    "portal",
    "map properties",
    "api",
    "app",
    "private app token",
];

const STRONG_SIGNALS: &[&str] = &[
    "hubspot certified",
    "hubspot certification",
    "hubspot partner",
    "hubspot elite partner",
    "hubspot gold partner",
    "operations hub",
    "hubdb",
    "serverless functions",
    "custom object",
];

const DEVELOPER_INTENT: &[&str] = &[
    "hubspot developer",
    "hubspot cms developer",
    "hubspot theme",
    "hubspot custom modules",
    "hubspot serverless",
    "hubspot api",
    "hubspot integrations",
    "nodejs hubspot",
    "python hubspot api",
    "developer",
    "engineer",
    "software engineer",
    "full stack",
    "frontend",
    "backend",
];

const CONSULTANT_INTENT: &[&str] = &[
    "hubspot consultant",
    "crm consultant",
    "revops consultant",
    "marketing ops",
    "solutions architect",
    "hubspot onboarding",
    "hubspot implementation",
    "hubspot specialist",
    "revops specialist",
    "workflow automation",
    "consultant",
    "specialist",
];

const SENIOR: &[&str] = &[
    "senior consultant",
    "lead consultant",
    "principal consultant",
    "senior specialist",
    "lead specialist",
];

const ARCHITECT: &[&str] = &[
    "solutions architect",
    "revops architect",
    "technical architect",
    "systems architect",
    "enterprise architect",
    "architect",
];

const REMOTE: &[&str] = &[
    "remote",
    "distributed",
    "work from home",
    "wfh",
    "anywhere",
    "flexible location",
];

const HYBRID: &[&str] = &["hybrid", "flexible", "remote-friendly", "office optional"];

const CONTRACT: &[&str] = &[
    "1099",
    "contract",
    "contractor",
    "freelance",
    "independent contractor",
];

const AGENCY: &[&str] = &[
    "staffing agency",
    "recruiting agency",
    "placement agency",
    "talent agency",
];

const DEVELOPER_THRESHOLD: u32 = 60;
const CONSULTANT_THRESHOLD: u32 = 50;

struct Rule {
    keywords: &'static [&'static str],
    points: u32,
    signal: &'static str,
}

const DEVELOPER_RULES: &[Rule] = &[
    Rule { keywords: TECH, points: 25, signal: "HubSpot mentioned" },
    Rule { keywords: STRONG_SIGNALS, points: 15, signal: "HubSpot strong signals" },
    Rule { keywords: &["cms hub"], points: 25, signal: "CMS Hub" },
    Rule {
        keywords: &["custom module", "custom modules", "theme development", "hubspot theme"],
        points: 15,
        signal: "Theme/modules",
    },
    Rule {
        keywords: &["hubspot api", "api", "integrations", "private app"],
        points: 20,
        signal: "HubSpot API/Integrations",
    },
    Rule {
        keywords: &["developer", "engineer", "software engineer"],
        points: 10,
        signal: "Developer title",
    },
    Rule {
        keywords: &["react", "vue", "angular", "javascript", "typescript"],
        points: 5,
        signal: "Modern JS frameworks",
    },
    Rule { keywords: &["python", "node", "nodejs"], points: 5, signal: "Backend languages" },
];

const CONSULTANT_RULES: &[Rule] = &[
    Rule { keywords: TECH, points: 25, signal: "HubSpot mentioned" },
    Rule { keywords: STRONG_SIGNALS, points: 15, signal: "HubSpot strong signals" },
    Rule {
        keywords: &["revops", "marketing ops", "mops", "revenue operations"],
        points: 20,
        signal: "RevOps/Marketing Ops",
    },
    Rule {
        keywords: &["workflows", "automation", "implementation"],
        points: 15,
        signal: "Automation/Implementation",
    },
    Rule {
        keywords: &["crm migration", "onboarding", "data migration"],
        points: 20,
        signal: "CRM migration/onboarding",
    },
    Rule {
        keywords: &["consultant", "specialist", "solutions architect"],
        points: 10,
        signal: "Consultant title",
    },
    Rule { keywords: &["sales", "marketing", "service"], points: 5, signal: "Business functions" },
];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// A track only scores when the text names both the technology and the
/// track's role intent.
fn score_track(text: &str, intent: &[&str], rules: &[Rule]) -> (u32, Vec<String>) {
    if !(mentions(text, TECH) && mentions(text, intent)) {
        return (0, Vec::new());
    }
    rules
        .iter()
        .filter(|rule| mentions(text, rule.keywords))
        .fold((0, Vec::new()), |(score, mut signals), rule| {
            signals.push(rule.signal.to_string());
            (score + rule.points, signals)
        })
}

pub fn detect_remote_type(text: &str) -> LocationKind {
    let text = text.to_lowercase();
    if mentions(&text, REMOTE) {
        LocationKind::Remote
    } else if mentions(&text, HYBRID) {
        LocationKind::Hybrid
    } else {
        LocationKind::Onsite
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassifierSettings {
    /// Empty means every role is allowed.
    pub role_filter: Vec<Role>,
    pub remote_only: bool,
    pub allow_agencies: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RoleClassifier {
    settings: ClassifierSettings,
}

struct Candidate {
    role: Role,
    score: u32,
    signals: Vec<String>,
}

impl RoleClassifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    pub fn is_agency_page(&self, text: &str) -> bool {
        !self.settings.allow_agencies && mentions(&text.to_lowercase(), AGENCY)
    }

    /// Score a normalized job against the developer and consultant tracks.
    /// Returns `None` when neither track clears its threshold, the page is
    /// an agency listing, or the caller's filters reject the result.
    pub fn classify_and_score(
        &self,
        page_text: &str,
        job: NormalizedJob,
        source_page: &str,
    ) -> Option<ScoredJob> {
        let text = format!("{} {} {}", job.title, job.summary, page_text).to_lowercase();

        if self.is_agency_page(&text) {
            tracing::debug!("Dropping '{}' from agency page {source_page}", job.title);
            return None;
        }

        let (developer_score, developer_signals) =
            score_track(&text, DEVELOPER_INTENT, DEVELOPER_RULES);
        let (consultant_score, consultant_signals) =
            score_track(&text, CONSULTANT_INTENT, CONSULTANT_RULES);

        let mut candidates = Vec::new();
        if developer_score >= DEVELOPER_THRESHOLD {
            candidates.push(Candidate {
                role: Role::Developer,
                score: developer_score,
                signals: developer_signals,
            });
        }
        if consultant_score >= CONSULTANT_THRESHOLD {
            candidates.push(Candidate {
                role: Role::Consultant,
                score: consultant_score,
                signals: consultant_signals,
            });
        }
        if candidates.is_empty() {
            tracing::debug!(
                "'{}' below thresholds (developer {developer_score}, consultant {consultant_score})",
                job.title
            );
            return None;
        }

        let is_remote = mentions(&text, REMOTE);
        let is_hybrid = mentions(&text, HYBRID);
        let is_contract =
            mentions(&text, CONTRACT) || job.employment_type == EmploymentType::Contract;
        let is_architect = mentions(&text, ARCHITECT);
        let is_senior = mentions(&text, SENIOR);
        let is_strong = mentions(&text, STRONG_SIGNALS);

        for candidate in &mut candidates {
            if is_remote {
                candidate.score += 15;
                candidate.signals.push("Remote-friendly".into());
            }
            if is_hybrid {
                candidate.score += 10;
                candidate.signals.push("Hybrid work".into());
            }
            if is_contract {
                candidate.score += 10;
                candidate.signals.push("1099/Contract".into());
            }
            if is_architect {
                candidate.score += 20;
                candidate.role = Role::Architect;
                candidate.signals.push("Architect-level".into());
            }
            if is_senior && candidate.role == Role::Consultant {
                candidate.score += 10;
                candidate.role = Role::SeniorConsultant;
                candidate.signals.push("Senior Consultant Fit".into());
            }
            if is_strong {
                candidate.score += 10;
                candidate.signals.push("Strong HubSpot Expertise Signal".into());
            }
        }

        // Developer wins ties.
        let best = candidates
            .into_iter()
            .reduce(|best, next| if next.score > best.score { next } else { best })?;

        let remote_type = match job.location.kind {
            LocationKind::Onsite => detect_remote_type(&text),
            kind => kind,
        };

        if !self.should_include(best.role, remote_type) {
            return None;
        }

        Some(ScoredJob {
            job,
            role: best.role,
            score: best.score,
            signals: best.signals,
            is_contract,
            remote_type,
            source_page: source_page.to_string(),
        })
    }

    /// Caller-supplied allow-lists: role filter and remote-only.
    pub fn should_include(&self, role: Role, remote_type: LocationKind) -> bool {
        if !self.settings.role_filter.is_empty() && !self.settings.role_filter.contains(&role) {
            tracing::debug!("Role {role} filtered out by role filter");
            return false;
        }
        if self.settings.remote_only && remote_type != LocationKind::Remote {
            tracing::debug!("Non-remote {role} filtered out by remote-only");
            return false;
        }
        true
    }
}
