use std::sync::LazyLock;

use regex::Regex;

use crate::extract::{clean_text, strip_html};
use crate::models::job::{
    Department, EmploymentType, Location, LocationKind, NormalizedJob, RawJob, Seniority,
};

const SUMMARY_LIMIT: usize = 500;

fn word_pattern(words: &[&str]) -> Regex {
    let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).unwrap()
}

/// Applied in order; later entries see the output of earlier ones.
static TITLE_SYNONYMS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"software developer", "software engineer"),
        (r"programmer", "software engineer"),
        (r"coder", "software engineer"),
        (r"dev", "developer"),
        (r"swe", "software engineer"),
        (r"sde", "software engineer"),
        (r"head of", "director"),
        (r"vp", "vice president"),
        (r"evp", "executive vice president"),
        (r"svp", "senior vice president"),
        (r"cto", "chief technology officer"),
        (r"ceo", "chief executive officer"),
        (r"cmo", "chief marketing officer"),
        (r"revops", "revenue operations"),
        (r"mops", "marketing operations"),
        (r"salesops", "sales operations"),
        (r"implementation specialist", "implementation consultant"),
        (r"solutions engineer", "solutions consultant"),
    ]
    .into_iter()
    .map(|(from, to)| (Regex::new(&format!(r"\b{from}\b")).unwrap(), to))
    .chain([
        (Regex::new(r"\bsr\b\.?").unwrap(), "senior"),
        (Regex::new(r"\bjr\b\.?").unwrap(), "junior"),
    ])
    .collect()
});

static LOCATION_KINDS: LazyLock<Vec<(LocationKind, Regex)>> = LazyLock::new(|| {
    vec![
        (
            LocationKind::Remote,
            word_pattern(&["remote", "work from home", "wfh", "anywhere", "distributed"]),
        ),
        (
            LocationKind::Hybrid,
            word_pattern(&["hybrid", "flexible", "office optional"]),
        ),
        (
            LocationKind::Onsite,
            word_pattern(&["on-site", "onsite", "in-office", "office-based"]),
        ),
    ]
});

static EMPLOYMENT_TYPES: LazyLock<Vec<(EmploymentType, Regex)>> = LazyLock::new(|| {
    vec![
        (
            EmploymentType::FullTime,
            Regex::new(r"(?i)\b(?:full[- ]time|ft|permanent)\b").unwrap(),
        ),
        (
            EmploymentType::PartTime,
            Regex::new(r"(?i)\b(?:part[- ]time|pt)\b").unwrap(),
        ),
        (
            EmploymentType::Contract,
            word_pattern(&["contract", "contractor", "1099", "freelance", "temp"]),
        ),
        (
            EmploymentType::Internship,
            word_pattern(&["intern", "internship", "co-op"]),
        ),
    ]
});

// Most senior first so "Associate Director" reads as a director.
static SENIORITY_LEVELS: LazyLock<Vec<(Seniority, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Seniority::Executive,
            word_pattern(&["c-level", "chief", "cto", "ceo", "cmo", "coo", "cfo"]),
        ),
        (
            Seniority::Director,
            word_pattern(&["director", "head of", "vp", "vice president"]),
        ),
        (Seniority::Staff, word_pattern(&["staff", "principal", "iv", "4"])),
        (Seniority::Senior, word_pattern(&["senior", "sr", "lead", "iii", "3"])),
        (
            Seniority::Entry,
            Regex::new(r"(?i)\b(?:entry[- ]level|junior|jr|associate|i)\b").unwrap(),
        ),
        (Seniority::Mid, Regex::new(r"(?i)\b(?:mid[- ]level|ii|2)\b").unwrap()),
    ]
});

static DEPARTMENTS: LazyLock<Vec<(Department, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Department::Engineering,
            word_pattern(&[
                "engineer", "developer", "programmer", "architect", "devops", "sre", "qa", "test",
            ]),
        ),
        (
            Department::Marketing,
            word_pattern(&["marketing", "growth", "demand gen", "content", "seo", "sem", "brand"]),
        ),
        (
            Department::Sales,
            word_pattern(&["sales", "account executive", "ae", "bdr", "sdr", "account manager"]),
        ),
        (
            Department::Operations,
            word_pattern(&["operations", "ops", "revops", "salesops", "mops", "bizops"]),
        ),
        (
            Department::CustomerSuccess,
            word_pattern(&["customer success", "cs", "support", "technical support"]),
        ),
        (
            Department::Product,
            word_pattern(&["product manager", "pm", "product owner", "product designer"]),
        ),
        (
            Department::Hubspot,
            word_pattern(&["hubspot", "crm consultant", "hubspot specialist"]),
        ),
    ]
});

fn first_match<T: Copy>(table: &[(T, Regex)], text: &str) -> Option<T> {
    table
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(value, _)| *value)
}

/// Canonical title: synonyms expanded, whitespace collapsed, title-cased.
pub fn normalize_title(title: &str) -> String {
    let mut title = clean_text(&strip_html(title)).to_lowercase();
    for (pattern, canonical) in TITLE_SYNONYMS.iter() {
        title = pattern.replace_all(&title, *canonical).into_owned();
    }
    clean_text(&title)
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn detect_location_kind(text: &str) -> Option<LocationKind> {
    first_match(&LOCATION_KINDS, text)
}

/// Location with its kind. A job without location text borrows the kind
/// from its own title and summary, then from the page around it.
pub fn normalize_location(raw: Option<&str>, job_text: &str, context: &str) -> Location {
    let raw = raw.map(|r| clean_text(&strip_html(r))).unwrap_or_default();
    if raw.is_empty() {
        let kind = detect_location_kind(job_text)
            .or_else(|| detect_location_kind(context))
            .unwrap_or(LocationKind::Onsite);
        return Location {
            raw,
            kind,
            city: None,
            state: None,
            country: None,
        };
    }

    let kind = detect_location_kind(&raw).unwrap_or(LocationKind::Onsite);
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let part = |idx: usize| {
        parts
            .get(idx)
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
    };
    Location {
        kind,
        city: part(0),
        state: part(1),
        country: if parts.len() > 2 { part(parts.len() - 1) } else { None },
        raw,
    }
}

pub fn normalize_employment_type(job_text: &str, context: &str) -> EmploymentType {
    first_match(&EMPLOYMENT_TYPES, job_text)
        .or_else(|| first_match(&EMPLOYMENT_TYPES, context))
        .unwrap_or(EmploymentType::FullTime)
}

pub fn normalize_seniority(title: &str) -> Seniority {
    first_match(&SENIORITY_LEVELS, title).unwrap_or(Seniority::Mid)
}

pub fn classify_department(title: &str, summary: &str) -> Department {
    first_match(&DEPARTMENTS, &format!("{title} {summary}")).unwrap_or(Department::Other)
}

/// HTML stripped, whitespace collapsed, cut on a word boundary.
pub fn normalize_summary(summary: &str) -> String {
    let summary = clean_text(&strip_html(summary));
    if summary.chars().count() <= SUMMARY_LIMIT {
        return summary;
    }
    let cut = crate::extract::truncate_chars(&summary, SUMMARY_LIMIT);
    let head = match cut.rfind(' ') {
        Some(idx) => &cut[..idx],
        None => cut.as_str(),
    };
    format!("{head}...")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Normalizer;

impl Normalizer {
    /// Deterministic: the same raw job and context always give the same
    /// result.
    pub fn normalize(&self, raw: &RawJob, context: &str) -> NormalizedJob {
        let title = normalize_title(&raw.title);
        let summary = normalize_summary(&raw.summary);
        let job_text = format!("{title} {summary}");
        NormalizedJob {
            location: normalize_location(raw.location.as_deref(), &job_text, context),
            department: classify_department(&title, &summary),
            seniority: normalize_seniority(&title),
            employment_type: normalize_employment_type(&job_text, context),
            url: raw.url.clone(),
            posted_at: raw.posted_at.clone(),
            source: raw.source,
            title,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobSource;

    #[test]
    fn test_title_synonyms_then_title_case() {
        assert_eq!(normalize_title("Sr. HubSpot Dev"), "Senior Hubspot Developer");
        assert_eq!(normalize_title("  revops   lead "), "Revenue Operations Lead");
        assert_eq!(normalize_title("Head of <b>Growth</b>"), "Director Growth");
        assert_eq!(
            normalize_title("Implementation Specialist"),
            "Implementation Consultant"
        );
        assert_eq!(normalize_title("DevOps Engineer"), "Devops Engineer");
    }

    #[test]
    fn test_location_parts_and_kind() {
        let loc = normalize_location(Some("Austin, TX, USA"), "", "");
        assert_eq!(loc.kind, LocationKind::Onsite);
        assert_eq!(loc.city.as_deref(), Some("Austin"));
        assert_eq!(loc.state.as_deref(), Some("TX"));
        assert_eq!(loc.country.as_deref(), Some("USA"));

        let loc = normalize_location(Some("Remote (US)"), "", "");
        assert_eq!(loc.kind, LocationKind::Remote);
        assert_eq!(loc.country, None);

        let loc = normalize_location(Some("Denver, CO"), "", "");
        assert_eq!(loc.state.as_deref(), Some("CO"));
        assert_eq!(loc.country, None);
    }

    #[test]
    fn test_location_kind_falls_back_to_job_then_context() {
        assert_eq!(
            normalize_location(None, "Hybrid role in Boston", "fully remote team").kind,
            LocationKind::Hybrid
        );
        assert_eq!(
            normalize_location(None, "Developer", "We work from home").kind,
            LocationKind::Remote
        );
        assert_eq!(normalize_location(None, "", "").kind, LocationKind::Onsite);
        // Explicit location text is not overridden by page context.
        assert_eq!(
            normalize_location(Some("Austin, TX"), "", "remote friendly").kind,
            LocationKind::Onsite
        );
    }

    #[test]
    fn test_employment_type() {
        assert_eq!(normalize_employment_type("Contract HubSpot Developer", ""), EmploymentType::Contract);
        assert_eq!(normalize_employment_type("Summer Intern", ""), EmploymentType::Internship);
        assert_eq!(normalize_employment_type("Developer", "part-time hours"), EmploymentType::PartTime);
        assert_eq!(normalize_employment_type("Developer", ""), EmploymentType::FullTime);
    }

    #[test]
    fn test_seniority() {
        assert_eq!(normalize_seniority("Senior Developer"), Seniority::Senior);
        assert_eq!(normalize_seniority("Associate Director"), Seniority::Director);
        assert_eq!(normalize_seniority("Chief Technology Officer"), Seniority::Executive);
        assert_eq!(normalize_seniority("Principal Engineer"), Seniority::Staff);
        assert_eq!(normalize_seniority("Junior Analyst"), Seniority::Entry);
        assert_eq!(normalize_seniority("Developer"), Seniority::Mid);
    }

    #[test]
    fn test_mixed_seniority_titles_take_the_most_senior_level() {
        assert_eq!(normalize_seniority("Senior Associate"), Seniority::Senior);
        assert_eq!(normalize_seniority("Junior Staff Accountant"), Seniority::Staff);
        assert_eq!(normalize_seniority("Lead Developer II"), Seniority::Senior);
        assert_eq!(normalize_seniority("Chief of Staff"), Seniority::Executive);
        assert_eq!(normalize_seniority("VP, Senior Programs"), Seniority::Director);
    }

    #[test]
    fn test_department_word_boundaries() {
        assert_eq!(classify_department("Software Engineer", ""), Department::Engineering);
        assert_eq!(classify_department("Account Executive", ""), Department::Sales);
        assert_eq!(classify_department("Customer Success Manager", ""), Department::CustomerSuccess);
        // "latest" must not hit "test", "apm" must not hit "pm"
        assert_eq!(classify_department("Latest APM news", ""), Department::Other);
    }

    #[test]
    fn test_summary_cut_on_word_boundary() {
        let long = "word ".repeat(200);
        let summary = normalize_summary(&long);
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= SUMMARY_LIMIT + 3);
        assert!(!summary.contains("  "));
        assert_eq!(normalize_summary("<p>Short</p>"), "Short");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let mut raw = RawJob::new("sr hubspot dev", JobSource::DomAnchor);
        raw.url = Some("https://acme.com/jobs/1".into());
        raw.summary = "<p>Remote, contract</p>".into();
        let first = Normalizer.normalize(&raw, "Careers page");
        let second = Normalizer.normalize(&raw, "Careers page");
        assert_eq!(first, second);
        assert_eq!(first.title, "Senior Hubspot Developer");
        assert_eq!(first.location.kind, LocationKind::Remote);
        assert_eq!(first.employment_type, EmploymentType::Contract);
        assert_eq!(first.seniority, Seniority::Senior);
        assert_eq!(first.department, Department::Engineering);
    }
}
