use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::classify::ClassifierSettings;
use crate::crawler::CrawlSettings;
use crate::error::AppError;
use crate::models::job::Role;

#[derive(Parser, Debug, Clone)]
#[command(name = "careerscout", about = "Career page crawler and job scorer")]
pub struct Config {
    /// JSON list of company websites to crawl
    #[arg(long, env = "DOMAINS_FILE", default_value = "domains.json")]
    pub domains_file: PathBuf,

    /// Incremental job cache
    #[arg(long, env = "CACHE_FILE", default_value = "data/job_cache.json")]
    pub cache_file: PathBuf,

    #[arg(long, env = "MAX_PAGES_PER_DOMAIN", default_value = "12")]
    pub max_pages_per_domain: usize,

    #[arg(long, env = "MAX_DEPTH", default_value = "2")]
    pub max_depth: usize,

    #[arg(long, env = "PAGE_TIMEOUT_MS", default_value = "30000")]
    pub page_timeout_ms: u64,

    /// Base delay between requests to one host, in seconds
    #[arg(long, env = "RATE_LIMIT_DELAY", default_value = "1.0")]
    pub rate_limit_delay: f64,

    /// Career page links followed per page
    #[arg(long, env = "MAX_CANDIDATES", default_value = "5")]
    pub max_candidates: usize,

    /// Domains crawled in parallel
    #[arg(long, env = "CONCURRENCY", default_value = "1")]
    pub concurrency: usize,

    /// Comma-separated roles to keep (developer, consultant, architect, senior_consultant)
    #[arg(long, env = "ROLE_FILTER", value_delimiter = ',')]
    pub role_filter: Vec<String>,

    #[arg(long, env = "REMOTE_ONLY", default_value = "false")]
    pub remote_only: bool,

    #[arg(long, env = "ALLOW_AGENCIES", default_value = "false")]
    pub allow_agencies: bool,

    #[arg(long, env = "FUZZY_THRESHOLD", default_value = "0.85")]
    pub fuzzy_threshold: f64,

    #[arg(long, env = "TITLE_ONLY_THRESHOLD", default_value = "0.95")]
    pub title_only_threshold: f64,

    /// Overrides the rotated browser user agents
    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Postgres URL; jobs are only persisted when set
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Log output: pretty or json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Crawl every domain once and print the report (default)
    Crawl {
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Start the control API
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,
    },
}

impl Config {
    /// Resolve the command, defaulting to a one-shot crawl.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Crawl { output: None })
    }

    pub fn to_settings(&self) -> Result<CrawlSettings, AppError> {
        let role_filter = self
            .role_filter
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|r| Role::parse(r).ok_or_else(|| AppError::Input(format!("Unknown role in ROLE_FILTER: {r}"))))
            .collect::<Result<Vec<_>, _>>()?;

        if !self.rate_limit_delay.is_finite() || self.rate_limit_delay < 0.0 {
            return Err(AppError::Input(format!(
                "RATE_LIMIT_DELAY must be a non-negative number of seconds, got {}",
                self.rate_limit_delay
            )));
        }
        for (name, value) in [
            ("FUZZY_THRESHOLD", self.fuzzy_threshold),
            ("TITLE_ONLY_THRESHOLD", self.title_only_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Input(format!("{name} must be between 0 and 1, got {value}")));
            }
        }

        Ok(CrawlSettings {
            max_pages_per_domain: self.max_pages_per_domain,
            max_depth: self.max_depth,
            page_timeout: Duration::from_millis(self.page_timeout_ms),
            rate_limit_delay: Duration::from_secs_f64(self.rate_limit_delay),
            max_candidates: self.max_candidates,
            concurrency: self.concurrency.max(1),
            fuzzy_threshold: self.fuzzy_threshold,
            title_only_threshold: self.title_only_threshold,
            classifier: ClassifierSettings {
                role_filter,
                remote_only: self.remote_only,
                allow_agencies: self.allow_agencies,
            },
            cache_file: self.cache_file.clone(),
            user_agent: self.user_agent.clone().filter(|ua| !ua.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["careerscout"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&[]).to_settings().unwrap();
        assert_eq!(settings.max_pages_per_domain, 12);
        assert_eq!(settings.max_depth, 2);
        assert_eq!(settings.page_timeout, Duration::from_secs(30));
        assert_eq!(settings.rate_limit_delay, Duration::from_secs(1));
        assert_eq!(settings.max_candidates, 5);
        assert!(settings.classifier.role_filter.is_empty());
        assert!(!settings.classifier.remote_only);
    }

    #[test]
    fn test_role_filter_list() {
        let settings = parse(&["--role-filter", "developer, architect", "--remote-only"])
            .to_settings()
            .unwrap();
        assert_eq!(settings.classifier.role_filter, vec![Role::Developer, Role::Architect]);
        assert!(settings.classifier.remote_only);
    }

    #[test]
    fn test_bad_settings_are_input_errors() {
        assert!(matches!(
            parse(&["--role-filter", "recruiter"]).to_settings(),
            Err(AppError::Input(_))
        ));
        assert!(matches!(
            parse(&["--fuzzy-threshold", "1.5"]).to_settings(),
            Err(AppError::Input(_))
        ));
    }

    #[test]
    fn test_crawl_is_default_command() {
        assert!(matches!(parse(&[]).resolved_command(), Command::Crawl { output: None }));
        assert!(matches!(
            parse(&["serve", "--listen-addr", "127.0.0.1:9000"]).resolved_command(),
            Command::Serve { listen_addr } if listen_addr == "127.0.0.1:9000"
        ));
    }
}
