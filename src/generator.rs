//! Periodic mock postings so a fresh deployment has something to show.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::db;
use crate::models::{JobRecord, JobRequest};

const TITLES: [&str; 4] = [
    "Senior Java Developer",
    "React Frontend Engineer",
    "Full Stack Architect",
    "DevOps Engineer",
];
const COMPANIES: [&str; 5] = ["Google", "Amazon", "Netflix", "Startup Inc", "TechFlow"];
const LOCATIONS: [&str; 4] = ["Remote", "New York, NY", "San Francisco, CA", "Austin, TX"];
const TAGS: [&str; 4] = ["Java", "Spring Boot", "React", "Remote"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub interval: Duration,
    /// No postings are generated once the table holds this many rows.
    pub cap: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            cap: 50,
        }
    }
}

impl GeneratorConfig {
    /// Defaults with any configured interval or cap applied; the interval never drops below a second.
    pub fn with_overrides(interval_secs: Option<u64>, cap: Option<i64>) -> Self {
        let mut config = Self::default();
        if let Some(secs) = interval_secs {
            config.interval = Duration::from_secs(secs.max(1));
        }
        if let Some(cap) = cap {
            config.cap = cap;
        }
        config
    }
}

pub fn mock_job<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> JobRequest {
    let title = TITLES[rng.random_range(0..TITLES.len())];
    let company = COMPANIES[rng.random_range(0..COMPANIES.len())];
    let location = LOCATIONS[rng.random_range(0..LOCATIONS.len())];
    let low = 100 + rng.random_range(0..50);
    let high = 160 + rng.random_range(0..40);
    let hours_ago = rng.random_range(0..24);

    JobRequest {
        title: title.to_string(),
        company: company.to_string(),
        location: Some(location.to_string()),
        description: "<p>We are looking for a talented engineer to join our team.</p>\
                      <h3>Requirements</h3><ul><li>Java 21</li><li>Spring Boot</li><li>React</li></ul>"
            .to_string(),
        salary_range: Some(format!("${low}k - ${high}k")),
        posted_at: Some(now - chrono::Duration::hours(hours_ago)),
        source_url: "https://linkedin.com/jobs/view/123456".to_string(),
        tags: TAGS.iter().map(|tag| tag.to_string()).collect(),
    }
}

/// A new posting is due only while the table holds fewer than `cap` rows.
pub fn should_generate(count: i64, cap: i64) -> bool {
    count < cap
}

/// Inserts one mock posting unless the table already holds `cap` rows.
pub async fn tick(pool: &PgPool, cap: i64) -> Result<Option<JobRecord>, sqlx::Error> {
    let count = db::count_jobs(pool).await?;
    if !should_generate(count, cap) {
        tracing::debug!("skipping mock job, {count} jobs stored (cap {cap})");
        return Ok(None);
    }
    let job = mock_job(&mut rand::rng(), Utc::now());
    let saved = db::insert_job(pool, &job).await?;
    tracing::info!("saved mock job: {} at {}", saved.title, saved.company);
    Ok(Some(saved))
}

pub fn spawn(pool: PgPool, config: GeneratorConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "mock job generator running every {:?} (cap {})",
            config.interval,
            config.cap
        );
        let mut ticker = tokio::time::interval(config.interval);
        loop {
            ticker.tick().await;
            if let Err(err) = tick(&pool, config.cap).await {
                tracing::warn!("mock job generation failed: {err}");
            }
        }
    })
}
