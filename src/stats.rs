use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::models::{
    ActivityKind, CompanyStats, DashboardStats, JobRecord, LocationStats, PlaceholderMetrics,
    RecentActivity,
};

pub const TOP_N: usize = 5;
pub const RECENT_ACTIVITY_LIMIT: usize = 5;
pub const UNSPECIFIED_LOCATION: &str = "Unspecified";

/// Calendar boundaries, in UTC, around the instant the dashboard is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub start_of_today: DateTime<Utc>,
    pub start_of_month: DateTime<Utc>,
    pub start_of_last_month: DateTime<Utc>,
}

impl Periods {
    pub fn containing(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let month_start = first_of_month(today);
        let last_month_start = first_of_month(month_start - Duration::days(1));
        Self {
            start_of_today: midnight(today),
            start_of_month: midnight(month_start),
            start_of_last_month: midnight(last_month_start),
        }
    }

    pub fn is_today(&self, at: DateTime<Utc>) -> bool {
        at > self.start_of_today
    }

    pub fn is_this_month(&self, at: DateTime<Utc>) -> bool {
        at > self.start_of_month
    }

    pub fn is_last_month(&self, at: DateTime<Utc>) -> bool {
        at >= self.start_of_last_month && at < self.start_of_month
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Percentage change from `previous` to `current`; a zero baseline reads as 100% when anything appeared.
pub fn growth_percentage(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    (current - previous) as f64 / previous as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub key: String,
    pub count: i64,
    pub percentage: f64,
}

/// Groups records by `key` and returns the `limit` largest groups.
///
/// Percentages use the whole snapshot as denominator. Equal counts are ordered by key.
pub fn top_shares<F>(records: &[JobRecord], limit: usize, key: F) -> Vec<Share>
where
    F: Fn(&JobRecord) -> String,
{
    let mut counts: HashMap<String, i64> = HashMap::new();
    for record in records {
        *counts.entry(key(record)).or_insert(0) += 1;
    }

    let total = records.len() as f64;
    let mut shares: Vec<Share> = counts
        .into_iter()
        .map(|(key, count)| Share {
            key,
            count,
            percentage: if total > 0.0 {
                count as f64 * 100.0 / total
            } else {
                0.0
            },
        })
        .collect();

    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    shares.truncate(limit);
    shares
}

fn location_key(record: &JobRecord) -> String {
    record
        .location
        .as_deref()
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .unwrap_or(UNSPECIFIED_LOCATION)
        .to_string()
}

pub fn top_locations(records: &[JobRecord]) -> Vec<LocationStats> {
    top_shares(records, TOP_N, location_key)
        .into_iter()
        .map(|share| LocationStats {
            location: share.key,
            count: share.count,
            percentage: share.percentage,
        })
        .collect()
}

pub fn top_companies(records: &[JobRecord]) -> Vec<CompanyStats> {
    top_shares(records, TOP_N, |record| record.company.clone())
        .into_iter()
        .map(|share| CompanyStats {
            company: share.key,
            count: share.count,
            percentage: share.percentage,
        })
        .collect()
}

/// Coarse age such as `3 hours ago`. Months are 30-day blocks; future instants read as `0 minutes ago`.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - at).max(Duration::zero());
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 60 {
        ago(minutes, "minute")
    } else if hours < 24 {
        ago(hours, "hour")
    } else if days < 30 {
        ago(days, "day")
    } else {
        ago(days / 30, "month")
    }
}

fn ago(count: i64, unit: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{suffix} ago")
}

pub fn recent_activities(records: &[JobRecord], now: DateTime<Utc>) -> Vec<RecentActivity> {
    let mut recent: Vec<&JobRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    recent
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .map(|record| RecentActivity {
            message: format!("New job posted: {} at {}", record.title, record.company),
            time: relative_time(record.created_at, now),
            kind: ActivityKind::Job,
        })
        .collect()
}

pub fn compute_stats(
    records: &[JobRecord],
    now: DateTime<Utc>,
    placeholders: &PlaceholderMetrics,
) -> DashboardStats {
    let periods = Periods::containing(now);

    let mut today = 0;
    let mut this_month = 0;
    let mut last_month = 0;
    for record in records {
        if periods.is_today(record.created_at) {
            today += 1;
        }
        if periods.is_this_month(record.created_at) {
            this_month += 1;
        }
        if periods.is_last_month(record.created_at) {
            last_month += 1;
        }
    }

    DashboardStats {
        total_jobs: records.len() as i64,
        jobs_posted_today: today,
        jobs_posted_this_month: this_month,
        total_visitors: placeholders.total_visitors,
        active_applications: placeholders.active_applications,
        jobs_growth_percentage: growth_percentage(this_month, last_month),
        visitors_growth_percentage: placeholders.visitors_growth_percentage,
        applications_growth_percentage: placeholders.applications_growth_percentage,
        top_locations: top_locations(records),
        top_companies: top_companies(records),
        recent_activities: recent_activities(records, now),
    }
}
