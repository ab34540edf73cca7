use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::sanitize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: String,
    pub salary_range: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub source_url: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of the admin create and update endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    pub location: Option<String>,
    #[serde(default)]
    pub description: String,
    pub salary_range: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Accepts RFC 3339 timestamps as well as zone-less ISO 8601 ones, which are read as UTC.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{value}`"))),
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

impl JobRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = BTreeMap::new();

        if self.title.trim().is_empty() {
            errors.insert("title".to_string(), "Title is required".to_string());
        }
        if self.company.trim().is_empty() {
            errors.insert("company".to_string(), "Company is required".to_string());
        }
        if sanitize::is_blank_rich_text(&self.description) {
            errors.insert(
                "description".to_string(),
                "Description is required".to_string(),
            );
        } else if !sanitize::is_valid_rich_text(&self.description) {
            errors.insert(
                "description".to_string(),
                "Rich text content contains invalid or potentially dangerous HTML".to_string(),
            );
        }
        if self.posted_at.is_none() {
            errors.insert("postedAt".to_string(), "Posted date is required".to_string());
        }
        if self.source_url.trim().is_empty() {
            errors.insert("sourceUrl".to_string(), "Source URL is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    /// Trims text fields, drops blank optionals and empty tags, and sanitizes the description.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            company: self.company.trim().to_string(),
            location: non_blank(self.location),
            description: sanitize::sanitize_rich_text(&self.description),
            salary_range: non_blank(self.salary_range),
            posted_at: self.posted_at,
            source_url: self.source_url.trim().to_string(),
            tags: self
                .tags
                .into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Raw query string of the public listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilters {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    PostedAt,
    CreatedAt,
    Title,
    Company,
    Location,
    SalaryRange,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "postedAt" => Some(Self::PostedAt),
            "createdAt" => Some(Self::CreatedAt),
            "title" => Some(Self::Title),
            "company" => Some(Self::Company),
            "location" => Some(Self::Location),
            "salaryRange" => Some(Self::SalaryRange),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::PostedAt => "posted_at",
            Self::CreatedAt => "created_at",
            Self::Title => "title",
            Self::Company => "company",
            Self::Location => "location",
            Self::SalaryRange => "salary_range",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub company: Option<String>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub filter: JobFilter,
    pub sort: SortField,
    pub descending: bool,
    pub page: i64,
    pub size: i64,
}

impl JobFilters {
    pub fn into_query(self) -> Result<JobQuery, ApiError> {
        let mut errors = BTreeMap::new();

        let page = self.page.unwrap_or(0);
        if page < 0 {
            errors.insert("page".to_string(), "Page must not be negative".to_string());
        }
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            errors.insert(
                "size".to_string(),
                format!("Size must be between 1 and {MAX_PAGE_SIZE}"),
            );
        } else if page >= 0 && page.checked_mul(size).is_none() {
            errors.insert("page".to_string(), "Page is out of range".to_string());
        }
        let sort = match self.sort_by.as_deref().map(str::trim) {
            None | Some("") => SortField::PostedAt,
            Some(field) => SortField::parse(field).unwrap_or_else(|| {
                errors.insert("sortBy".to_string(), format!("Cannot sort by `{field}`"));
                SortField::PostedAt
            }),
        };
        let descending = match self.sort_dir.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
            Some(dir) => {
                errors.insert("sortDir".to_string(), format!("Unknown sort direction `{dir}`"));
                true
            }
        };

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        let tags = self
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(JobQuery {
            filter: JobFilter {
                company: non_blank(self.company),
                location: non_blank(self.location),
                title: non_blank(self.title),
                tags,
            },
            sort,
            descending,
            page,
            size,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page_number: i64,
    pub page_size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
    pub first: bool,
    pub last: bool,
}

impl<T> PageResponse<T> {
    pub fn new(content: Vec<T>, page_number: i64, page_size: i64, total_elements: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_elements + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            content,
            page_number,
            page_size,
            total_elements,
            total_pages,
            first: page_number == 0,
            last: page_number.saturating_add(1) >= total_pages,
        }
    }
}

/// Dashboard figures that are not backed by any tracked data yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderMetrics {
    pub total_visitors: i64,
    pub active_applications: i64,
    pub visitors_growth_percentage: f64,
    pub applications_growth_percentage: f64,
}

impl Default for PlaceholderMetrics {
    fn default() -> Self {
        Self {
            total_visitors: 12_345,
            active_applications: 156,
            visitors_growth_percentage: 12.0,
            applications_growth_percentage: 23.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_jobs: i64,
    pub jobs_posted_today: i64,
    pub jobs_posted_this_month: i64,
    pub total_visitors: i64,
    pub active_applications: i64,
    pub jobs_growth_percentage: f64,
    pub visitors_growth_percentage: f64,
    pub applications_growth_percentage: f64,
    pub top_locations: Vec<LocationStats>,
    pub top_companies: Vec<CompanyStats>,
    pub recent_activities: Vec<RecentActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStats {
    pub location: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyStats {
    pub company: String,
    pub count: i64,
    pub percentage: f64,
}

/// Source of a dashboard feed entry, serialized as its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Job,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentActivity {
    pub message: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_request() -> JobRequest {
        JobRequest {
            title: "  Platform Engineer ".to_string(),
            company: "Acme".to_string(),
            location: Some("   ".to_string()),
            description: "<p>Build things</p><script>alert(1)</script>".to_string(),
            salary_range: Some("$120k - $160k".to_string()),
            posted_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
            source_url: "https://example.com/jobs/1".to_string(),
            tags: vec![" Rust ".to_string(), "".to_string(), "Postgres".to_string()],
        }
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let err = JobRequest::default().validate().unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.get("title").unwrap(), "Title is required");
                assert_eq!(errors.get("company").unwrap(), "Company is required");
                assert_eq!(errors.get("description").unwrap(), "Description is required");
                assert_eq!(errors.get("postedAt").unwrap(), "Posted date is required");
                assert_eq!(errors.get("sourceUrl").unwrap(), "Source URL is required");
                assert!(!errors.contains_key("location"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dangerous_description_is_rejected() {
        let request = JobRequest {
            description: "<p onclick=\"steal()\">hi</p>".to_string(),
            ..valid_request()
        };
        let err = request.validate().unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains_key("description")));
    }

    #[test]
    fn tag_only_description_counts_as_blank() {
        let request = JobRequest {
            description: "<p><br></p>".to_string(),
            ..valid_request()
        };
        match request.validate().unwrap_err() {
            ApiError::Validation(errors) => {
                assert_eq!(errors.get("description").unwrap(), "Description is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn normalized_request_is_trimmed_and_sanitized() {
        let request = JobRequest {
            description: "<p>Build things</p>".to_string(),
            ..valid_request()
        };
        assert!(request.validate().is_ok());

        let normalized = valid_request().normalized();
        assert_eq!(normalized.title, "Platform Engineer");
        assert_eq!(normalized.location, None);
        assert_eq!(normalized.description, "<p>Build things</p>");
        assert_eq!(normalized.tags, vec!["Rust".to_string(), "Postgres".to_string()]);
    }

    #[test]
    fn request_accepts_zoned_and_local_timestamps() {
        let zoned: JobRequest =
            serde_json::from_str(r#"{"postedAt": "2026-03-01T09:00:00+02:00"}"#).unwrap();
        assert_eq!(
            zoned.posted_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap())
        );

        let local: JobRequest =
            serde_json::from_str(r#"{"postedAt": "2026-03-01T09:00:00"}"#).unwrap();
        assert_eq!(
            local.posted_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
        );

        assert!(serde_json::from_str::<JobRequest>(r#"{"postedAt": "yesterday"}"#).is_err());
    }

    #[test]
    fn default_filters_sort_by_posted_at_descending() {
        let query = JobFilters::default().into_query().unwrap();
        assert_eq!(query.sort, SortField::PostedAt);
        assert!(query.descending);
        assert_eq!(query.page, 0);
        assert_eq!(query.size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.filter, JobFilter::default());
    }

    #[test]
    fn filters_split_tags_and_drop_blank_terms() {
        let query = JobFilters {
            sort_by: Some("company".to_string()),
            sort_dir: Some("asc".to_string()),
            company: Some("  ".to_string()),
            title: Some("engineer".to_string()),
            tags: Some("Rust, ,Remote ".to_string()),
            ..JobFilters::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(query.sort, SortField::Company);
        assert!(!query.descending);
        assert_eq!(query.filter.company, None);
        assert_eq!(query.filter.title.as_deref(), Some("engineer"));
        assert_eq!(query.filter.tags, vec!["Rust".to_string(), "Remote".to_string()]);
    }

    #[test]
    fn out_of_range_paging_is_rejected() {
        let err = JobFilters {
            page: Some(-1),
            size: Some(0),
            sort_by: Some("salary".to_string()),
            sort_dir: Some("sideways".to_string()),
            ..JobFilters::default()
        }
        .into_query()
        .unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                let keys: Vec<&str> = errors.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["page", "size", "sortBy", "sortDir"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn page_past_addressable_offset_is_rejected() {
        let err = JobFilters {
            page: Some(i64::MAX),
            ..JobFilters::default()
        }
        .into_query()
        .unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.get("page").map(String::as_str), Some("Page is out of range"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let query = JobFilters {
            page: Some(i64::MAX / MAX_PAGE_SIZE),
            size: Some(MAX_PAGE_SIZE),
            ..JobFilters::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(query.page, i64::MAX / MAX_PAGE_SIZE);
    }

    #[test]
    fn page_response_tolerates_last_possible_page_number() {
        let page: PageResponse<u8> = PageResponse::new(vec![], i64::MAX, 10, 0);
        assert!(page.last);
        assert!(!page.first);
    }

    #[test]
    fn page_response_reports_position() {
        let page: PageResponse<u8> = PageResponse::new(vec![1, 2, 3], 0, 3, 7);
        assert_eq!(page.total_pages, 3);
        assert!(page.first);
        assert!(!page.last);

        let tail: PageResponse<u8> = PageResponse::new(vec![7], 2, 3, 7);
        assert!(!tail.first);
        assert!(tail.last);

        let empty: PageResponse<u8> = PageResponse::new(vec![], 0, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.first && empty.last);
    }

    #[test]
    fn activity_serializes_with_type_field() {
        let activity = RecentActivity {
            message: "New job posted: Engineer at Acme".to_string(),
            time: "5 minutes ago".to_string(),
            kind: ActivityKind::Job,
        };
        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["type"], "job");
        assert_eq!(value["time"], "5 minutes ago");
    }
}
