use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{JobFilter, JobQuery, JobRecord, JobRequest, PageResponse};

const JOB_COLUMNS: &str = "id, title, company, location, description, salary_range, posted_at, \
                           source_url, tags, created_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let now = Utc::now();
    let postings = vec![
        (
            Uuid::parse_str("6b1f0c52-4d7e-4a9b-9a57-0f3f1d2c8e01")?,
            "Senior Rust Engineer",
            "TechFlow",
            Some("Remote"),
            "<p>Own the ingestion pipeline end to end.</p><ul><li>Rust</li><li>PostgreSQL</li></ul>",
            Some("$150k - $190k"),
            now - Duration::hours(3),
            "https://techflow.example.com/careers/rust",
            vec!["Rust", "PostgreSQL", "Remote"],
        ),
        (
            Uuid::parse_str("1f9d8e3a-7b2c-4f0e-8d61-5a4b3c2d1e02")?,
            "React Frontend Engineer",
            "Netflix",
            Some("San Francisco, CA"),
            "<p>Ship the next generation of our member-facing UI.</p>",
            Some("$140k - $180k"),
            now - Duration::days(2),
            "https://jobs.netflix.example.com/react",
            vec!["React", "TypeScript"],
        ),
        (
            Uuid::parse_str("c3a2b1d0-9e8f-4a7b-8c6d-5e4f3a2b1c03")?,
            "DevOps Engineer",
            "Startup Inc",
            Some("Austin, TX"),
            "<p>Keep our Kubernetes fleet healthy and boring.</p>",
            None,
            now - Duration::days(9),
            "https://startup.example.com/jobs/devops",
            vec!["Kubernetes", "Terraform"],
        ),
        (
            Uuid::parse_str("9a8b7c6d-5e4f-4a3b-9c1d-0e9f8a7b6c04")?,
            "Full Stack Architect",
            "Google",
            Some("New York, NY"),
            "<p>Lead design reviews across product teams.</p>",
            Some("$180k - $230k"),
            now - Duration::days(21),
            "https://careers.google.example.com/architect",
            vec!["Java", "Spring Boot", "React"],
        ),
        (
            Uuid::parse_str("0d1e2f3a-4b5c-4d6e-8f70-8192a3b4c505")?,
            "Data Platform Engineer",
            "Amazon",
            None,
            "<p>Build the warehouse the rest of the company queries.</p>",
            None,
            now - Duration::days(35),
            "https://amazon.example.com/jobs/data-platform",
            vec!["Spark", "Python"],
        ),
    ];

    let mut inserted = 0usize;
    for (id, title, company, location, description, salary, posted_at, source_url, tags) in
        postings
    {
        let tags: Vec<String> = tags.into_iter().map(str::to_string).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO jobs
            (id, title, company, location, description, salary_range, posted_at, source_url, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(company)
        .bind(location)
        .bind(description)
        .bind(salary)
        .bind(posted_at)
        .bind(source_url)
        .bind(&tags)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    title: String,
    company: String,
    location: Option<String>,
    description: String,
    salary_range: Option<String>,
    #[serde(deserialize_with = "crate::models::deserialize_timestamp")]
    posted_at: Option<DateTime<Utc>>,
    source_url: String,
    tags: Option<String>,
}

/// Turns a CSV row into a storable request, or the validation failure that rules it out.
fn csv_row_request(row: CsvRow) -> Result<JobRequest, ApiError> {
    let request = JobRequest {
        title: row.title,
        company: row.company,
        location: row.location,
        description: row.description,
        salary_range: row.salary_range,
        posted_at: row.posted_at,
        source_url: row.source_url,
        tags: row
            .tags
            .map(|raw| raw.split(';').map(str::to_string).collect())
            .unwrap_or_default(),
    };
    request.validate()?;
    Ok(request.normalized())
}

/// Loads postings from CSV. Rows that fail validation or repeat an existing `source_url` are skipped.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", line + 1))?;
        let request = match csv_row_request(row) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("skipping CSV record {}: {err:?}", line + 1);
                continue;
            }
        };

        if insert_job_if_new(pool, &request).await?.is_some() {
            inserted += 1;
        } else {
            tracing::debug!("skipping CSV record {}: {} already stored", line + 1, request.source_url);
        }
    }

    Ok(inserted)
}

pub async fn insert_job(pool: &PgPool, job: &JobRequest) -> Result<JobRecord, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO jobs
        (id, title, company, location, description, salary_range, posted_at, source_url, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {JOB_COLUMNS}
        "#
    );
    sqlx::query_as::<_, JobRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(&job.salary_range)
        .bind(job.posted_at.unwrap_or_else(Utc::now))
        .bind(&job.source_url)
        .bind(&job.tags)
        .fetch_one(pool)
        .await
}

async fn insert_job_if_new(
    pool: &PgPool,
    job: &JobRequest,
) -> Result<Option<JobRecord>, sqlx::Error> {
    let sql = insert_if_new_sql();
    sqlx::query_as::<_, JobRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(&job.salary_range)
        .bind(job.posted_at.unwrap_or_else(Utc::now))
        .bind(&job.source_url)
        .bind(&job.tags)
        .fetch_optional(pool)
        .await
}

fn insert_if_new_sql() -> String {
    format!(
        r#"
        INSERT INTO jobs
        (id, title, company, location, description, salary_range, posted_at, source_url, tags)
        SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
        WHERE NOT EXISTS (SELECT 1 FROM jobs WHERE source_url = $8)
        RETURNING {JOB_COLUMNS}
        "#
    )
}

/// Replaces every editable field; `created_at` keeps its original value.
pub async fn update_job(
    pool: &PgPool,
    id: Uuid,
    job: &JobRequest,
) -> Result<Option<JobRecord>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE jobs
        SET title = $2, company = $3, location = $4, description = $5,
            salary_range = $6, posted_at = $7, source_url = $8, tags = $9
        WHERE id = $1
        RETURNING {JOB_COLUMNS}
        "#
    );
    sqlx::query_as::<_, JobRecord>(&sql)
        .bind(id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(&job.salary_range)
        .bind(job.posted_at.unwrap_or_else(Utc::now))
        .bind(&job.source_url)
        .bind(&job.tags)
        .fetch_optional(pool)
        .await
}

pub async fn delete_job(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<JobRecord>, sqlx::Error> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
    sqlx::query_as::<_, JobRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count_jobs(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await
}

/// Every stored posting, for the dashboard.
pub async fn fetch_all_jobs(pool: &PgPool) -> Result<Vec<JobRecord>, sqlx::Error> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs");
    sqlx::query_as::<_, JobRecord>(&sql).fetch_all(pool).await
}

pub async fn list_jobs(
    pool: &PgPool,
    query: &JobQuery,
) -> Result<PageResponse<JobRecord>, sqlx::Error> {
    let total: i64 = count_query(&query.filter)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;
    let content = list_query(query)
        .build_query_as::<JobRecord>()
        .fetch_all(pool)
        .await?;
    Ok(PageResponse::new(content, query.page, query.size, total))
}

fn count_query(filter: &JobFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE 1 = 1");
    push_filter(&mut builder, filter);
    builder
}

fn list_query(query: &JobQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1 = 1"));
    push_filter(&mut builder, &query.filter);
    let direction = if query.descending { "DESC" } else { "ASC" };
    builder.push(format!(
        " ORDER BY {} {direction}, id ASC LIMIT ",
        query.sort.column()
    ));
    builder.push_bind(query.size);
    builder.push(" OFFSET ");
    builder.push_bind(query.page.saturating_mul(query.size));
    builder
}

fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &JobFilter) {
    let text_filters = [
        ("company", &filter.company),
        ("location", &filter.location),
        ("title", &filter.title),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value {
            builder.push(format!(" AND lower({column}) LIKE "));
            builder.push_bind(contains_pattern(value));
        }
    }
    if !filter.tags.is_empty() {
        builder.push(" AND tags && ");
        builder.push_bind(filter.tags.clone());
    }
}

/// `%term%` for a case-insensitive substring match, with LIKE wildcards in the term escaped.
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortField;

    fn query(filter: JobFilter) -> JobQuery {
        JobQuery {
            filter,
            sort: SortField::PostedAt,
            descending: true,
            page: 2,
            size: 10,
        }
    }

    #[test]
    fn unfiltered_listing_only_pages() {
        let builder = list_query(&query(JobFilter::default()));
        assert_eq!(
            builder.sql(),
            format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE 1 = 1 ORDER BY posted_at DESC, id ASC LIMIT $1 OFFSET $2"
            )
        );
    }

    #[test]
    fn filters_bind_in_order() {
        let filter = JobFilter {
            company: Some("Acme".to_string()),
            location: None,
            title: Some("engineer".to_string()),
            tags: vec!["Rust".to_string(), "Remote".to_string()],
        };
        let builder = count_query(&filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM jobs WHERE 1 = 1 AND lower(company) LIKE $1 \
             AND lower(title) LIKE $2 AND tags && $3"
        );
    }

    #[test]
    fn ascending_sort_uses_whitelisted_column() {
        let mut q = query(JobFilter::default());
        q.sort = SortField::SalaryRange;
        q.descending = false;
        assert!(list_query(&q)
            .sql()
            .contains("ORDER BY salary_range ASC, id ASC"));
    }

    const CSV: &str = "\
title,company,location,description,salary_range,posted_at,source_url,tags
 Rust Engineer ,Acme,,<p>Build it</p>,,2026-03-01T09:00:00,https://acme.example.com/1,Rust; Remote;
,Globex,Remote,<p>No title</p>,,2026-03-01T09:00:00Z,https://globex.example.com/1,
Hacker,Initech,Remote,<script>alert(1)</script>,,2026-03-01T09:00:00Z,https://initech.example.com/1,
Undated,Umbrella,Remote,<p>Soon</p>,,,https://umbrella.example.com/1,
";

    fn csv_requests() -> Vec<Result<JobRequest, ApiError>> {
        csv::Reader::from_reader(CSV.as_bytes())
            .deserialize::<CsvRow>()
            .map(|row| csv_row_request(row.unwrap()))
            .collect()
    }

    #[test]
    fn csv_rows_become_normalized_requests() {
        let requests = csv_requests();
        let first = requests[0].as_ref().unwrap();
        assert_eq!(first.title, "Rust Engineer");
        assert_eq!(first.location, None);
        assert_eq!(first.tags, vec!["Rust".to_string(), "Remote".to_string()]);
        assert_eq!(
            first.posted_at,
            crate::models::parse_timestamp("2026-03-01T09:00:00Z")
        );
    }

    #[test]
    fn invalid_csv_rows_are_skipped_with_reason() {
        let requests = csv_requests();
        assert_eq!(requests.len(), 4);
        let failed_fields: Vec<Vec<String>> = requests[1..]
            .iter()
            .map(|request| match request {
                Err(ApiError::Validation(errors)) => errors.keys().cloned().collect(),
                other => panic!("expected validation failure, got {other:?}"),
            })
            .collect();
        assert_eq!(
            failed_fields,
            vec![
                vec!["title".to_string()],
                vec!["description".to_string()],
                vec!["postedAt".to_string()],
            ]
        );
    }

    #[test]
    fn import_insert_is_guarded_by_source_url() {
        let sql = insert_if_new_sql();
        assert!(sql.contains("WHERE NOT EXISTS (SELECT 1 FROM jobs WHERE source_url = $8)"));
        assert!(sql.contains(&format!("RETURNING {JOB_COLUMNS}")));
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(contains_pattern("Acme"), "%acme%");
        assert_eq!(contains_pattern("100%_remote"), "%100\\%\\_remote%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }
}
