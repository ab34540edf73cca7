use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::DashboardStats;

pub fn build_report(stats: &DashboardStats, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Job Board Dashboard Report");
    let _ = writeln!(
        output,
        "Generated at {} (UTC calendar)",
        generated_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Postings");
    let _ = writeln!(output, "- Total jobs: {}", stats.total_jobs);
    let _ = writeln!(output, "- Posted today: {}", stats.jobs_posted_today);
    let _ = writeln!(
        output,
        "- Posted this month: {} ({:+.1}% vs last month)",
        stats.jobs_posted_this_month, stats.jobs_growth_percentage
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Locations");

    if stats.top_locations.is_empty() {
        let _ = writeln!(output, "No postings recorded yet.");
    } else {
        for entry in stats.top_locations.iter() {
            let _ = writeln!(
                output,
                "- {}: {} jobs ({:.1}%)",
                entry.location, entry.count, entry.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Companies");

    if stats.top_companies.is_empty() {
        let _ = writeln!(output, "No postings recorded yet.");
    } else {
        for entry in stats.top_companies.iter() {
            let _ = writeln!(
                output,
                "- {}: {} jobs ({:.1}%)",
                entry.company, entry.count, entry.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Activity");

    if stats.recent_activities.is_empty() {
        let _ = writeln!(output, "No activity yet.");
    } else {
        for activity in stats.recent_activities.iter() {
            let _ = writeln!(output, "- {} ({})", activity.message, activity.time);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Placeholder Metrics");
    let _ = writeln!(
        output,
        "Not measured yet; configured values only."
    );
    let _ = writeln!(
        output,
        "- Visitors: {} ({:+.1}%)",
        stats.total_visitors, stats.visitors_growth_percentage
    );
    let _ = writeln!(
        output,
        "- Active applications: {} ({:+.1}%)",
        stats.active_applications, stats.applications_growth_percentage
    );

    output
}
