use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

/// Non-job sections of a company site, anchored so `/about` matches but
/// `/about-our-jobs` does not.
static BLOCKED_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "about",
        "team",
        "contact",
        "blog",
        "podcast",
        "services",
        "resources",
        "partners",
        "pricing",
        "portfolio",
        "case-studies",
        "insights",
        "news",
        "events",
    ]
    .iter()
    .map(|segment| Regex::new(&format!(r"(?i)/{segment}(?:/|$)")).unwrap())
    .collect()
});

static JOB_CONTAINER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:job|career|position|opening|listing)s?[-_]").unwrap()
});

const NAV_CLASS_MARKERS: &[&str] = &[
    "navbar",
    "nav-bar",
    "navigation",
    "menu",
    "header",
    "footer",
];

/// True for URLs that can never point at a posting.
pub fn is_blocked_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    if lower.is_empty()
        || lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        return true;
    }
    let path = match url::Url::parse(&lower) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => lower.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    BLOCKED_PATHS.iter().any(|re| re.is_match(&path))
}

fn is_nav_element(el: &ElementRef) -> bool {
    let value = el.value();
    if matches!(value.name(), "header" | "footer" | "nav") {
        return true;
    }
    if value
        .attr("role")
        .is_some_and(|role| role.eq_ignore_ascii_case("navigation"))
    {
        return true;
    }
    if let Some(label) = value.attr("aria-label") {
        let label = label.to_ascii_lowercase();
        if label.contains("navigation") || label.contains("menu") {
            return true;
        }
    }
    value.classes().any(|class| {
        let class = class.to_ascii_lowercase();
        NAV_CLASS_MARKERS.iter().any(|marker| class.contains(marker))
    })
}

fn is_job_container_element(el: &ElementRef) -> bool {
    let value = el.value();
    if value.attr("data-ats").is_some() || value.attr("data-job").is_some() {
        return true;
    }
    let class_attr = value.attr("class").unwrap_or_default();
    let id_attr = value.attr("id").unwrap_or_default();
    JOB_CONTAINER.is_match(class_attr) || JOB_CONTAINER.is_match(id_attr)
}

/// The element and each of its ancestors, innermost first.
fn self_and_ancestors<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::once(*el).chain(el.ancestors().filter_map(ElementRef::wrap))
}

pub fn is_in_header_footer_nav(el: &ElementRef) -> bool {
    self_and_ancestors(el).any(|node| is_nav_element(&node))
}

pub fn is_in_job_container(el: &ElementRef) -> bool {
    self_and_ancestors(el).any(|node| is_job_container_element(&node))
}

/// Extraction policy for a DOM candidate: blocked URLs never pass;
/// header/footer/nav content passes only inside a job container.
pub fn should_extract(el: &ElementRef, url: Option<&str>) -> bool {
    if url.is_some_and(is_blocked_url) {
        return false;
    }
    if is_in_header_footer_nav(el) {
        return is_in_job_container(el);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        let sel = Selector::parse(css).unwrap();
        doc.select(&sel).next().unwrap()
    }

    #[test]
    fn test_blocked_paths_are_anchored() {
        assert!(is_blocked_url("https://acme.com/about"));
        assert!(is_blocked_url("https://acme.com/about/"));
        assert!(is_blocked_url("https://acme.com/company/team/leadership"));
        assert!(is_blocked_url("/pricing"));
        assert!(!is_blocked_url("https://acme.com/about-our-jobs"));
        assert!(!is_blocked_url("https://acme.com/jobs/blogger-wanted"));
        assert!(!is_blocked_url("https://acme.com/careers"));
    }

    #[test]
    fn test_blocked_schemes() {
        assert!(is_blocked_url("mailto:jobs@acme.com"));
        assert!(is_blocked_url("javascript:void(0)"));
        assert!(is_blocked_url("#apply"));
    }

    #[test]
    fn test_header_link_rejected() {
        let doc = Html::parse_document(
            r#"<body><header><a id="x" href="/jobs/1">Software Engineer</a></header></body>"#,
        );
        let link = first(&doc, "#x");
        assert!(is_in_header_footer_nav(&link));
        assert!(!should_extract(&link, Some("https://acme.com/jobs/1")));
    }

    #[test]
    fn test_footer_job_widget_allowed() {
        let doc = Html::parse_document(
            r#"<footer><div class="jobs-widget"><a id="x" href="/jobs/2">Designer</a></div></footer>"#,
        );
        let link = first(&doc, "#x");
        assert!(is_in_job_container(&link));
        assert!(should_extract(&link, Some("https://acme.com/jobs/2")));
    }

    #[test]
    fn test_nav_detected_by_role_and_class() {
        let doc = Html::parse_document(
            r#"<div role="navigation"><a id="a" href="/x">A</a></div>
               <div class="site-menu"><a id="b" href="/y">B</a></div>
               <div aria-label="Main Menu"><a id="c" href="/z">C</a></div>
               <main><a id="d" href="/w">D</a></main>"#,
        );
        assert!(is_in_header_footer_nav(&first(&doc, "#a")));
        assert!(is_in_header_footer_nav(&first(&doc, "#b")));
        assert!(is_in_header_footer_nav(&first(&doc, "#c")));
        assert!(!is_in_header_footer_nav(&first(&doc, "#d")));
    }

    #[test]
    fn test_data_attributes_mark_job_container() {
        let doc = Html::parse_document(r#"<nav><div data-job="1"><span id="x">Role</span></div></nav>"#);
        assert!(should_extract(&first(&doc, "#x"), None));
    }

    #[test]
    fn test_blocked_url_wins_inside_container() {
        let doc = Html::parse_document(r#"<div class="job-list"><a id="x" href="/about">About</a></div>"#);
        assert!(!should_extract(&first(&doc, "#x"), Some("https://acme.com/about")));
    }
}
