use crate::analyzer::{AnalyticsResult, DailyBucket, TagBucket};
use crate::tracker::time::{calculate_progress, format_duration};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

pub fn render_markdown(result: &AnalyticsResult, today: NaiveDate) -> String {
    let today_minutes = result.minutes_on(today);
    let progress = calculate_progress(today_minutes, result.daily_goal_minutes);

    let streak = match result.current_streak_days {
        0 => "no active streak".to_string(),
        1 => "1 day".to_string(),
        days => format!("{days} days"),
    };

    format!(
        "# Activity Analytics - {}\n\n## Summary\n- Total tracked time: {}\n- Activities: {}\n- Average per active day: {}\n- Longest session: {}\n- Current streak: {}\n\n## Today\n- Logged: {} of {} goal ({}%)\n\n## Time by Day\n{}\n\n## Time by Tag\n{}\n",
        today.format("%Y-%m-%d"),
        format_duration(result.total_minutes),
        result.total_activities,
        format_duration(result.average_minutes_per_active_day),
        format_duration(result.longest_session_minutes),
        streak,
        format_duration(today_minutes),
        format_duration(result.daily_goal_minutes),
        progress,
        day_rows(&result.daily_buckets, result.daily_goal_minutes),
        tag_rows(&result.tag_buckets, result.total_minutes),
    )
}

pub fn save_report_files(
    result: &AnalyticsResult,
    today: NaiveDate,
    report_dir: &Path,
) -> Result<SavedReport> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let stem = format!("analytics-{}", today.format("%Y-%m-%d"));
    let markdown_path = report_dir.join(format!("{stem}.md"));
    let json_path = report_dir.join(format!("{stem}.json"));

    fs::write(&markdown_path, render_markdown(result, today)).with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(result).context("Failed to serialize analytics JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
    })
}

fn day_rows(buckets: &[DailyBucket], goal_minutes: i64) -> String {
    if buckets.is_empty() {
        return "- No data".to_string();
    }

    let rows = buckets
        .iter()
        .map(|bucket| {
            format!(
                "| {} | {} | {} | {}% |",
                bucket.date.format("%Y-%m-%d"),
                format_duration(bucket.total_minutes),
                bucket.activity_count,
                calculate_progress(bucket.total_minutes, goal_minutes)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("| Date | Time | Activities | Goal |\n|------|------|------------|------|\n{rows}")
}

fn tag_rows(buckets: &[TagBucket], total_minutes: i64) -> String {
    if buckets.is_empty() {
        return "- No tagged activity".to_string();
    }

    buckets
        .iter()
        .enumerate()
        .map(|(index, bucket)| {
            let ratio = if total_minutes == 0 {
                0.0
            } else {
                (bucket.total_minutes as f64 / total_minutes as f64) * 100.0
            };

            format!(
                "{}. {} - {} ({} activities, {:.0}%)",
                index + 1,
                bucket.tag.name,
                format_duration(bucket.total_minutes),
                bucket.activity_count,
                ratio
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Tag;

    fn sample() -> AnalyticsResult {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date");
        AnalyticsResult {
            daily_buckets: vec![DailyBucket {
                date,
                total_minutes: 90,
                activity_count: 2,
            }],
            tag_buckets: vec![TagBucket {
                tag: Tag {
                    id: 1,
                    user_id: "alice".to_string(),
                    name: "Focus".to_string(),
                    color: "#ef4444".to_string(),
                },
                total_minutes: 45,
                activity_count: 1,
            }],
            total_minutes: 90,
            total_activities: 2,
            average_minutes_per_active_day: 90,
            longest_session_minutes: 60,
            current_streak_days: 1,
            daily_goal_minutes: 180,
        }
    }

    #[test]
    fn markdown_includes_progress_and_tags() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date");
        let markdown = render_markdown(&sample(), today);

        assert!(markdown.contains("# Activity Analytics - 2026-03-10"));
        assert!(markdown.contains("- Logged: 1h 30m of 3h goal (50%)"));
        assert!(markdown.contains("| 2026-03-10 | 1h 30m | 2 | 50% |"));
        assert!(markdown.contains("1. Focus - 45m (1 activities, 50%)"));
        assert!(markdown.contains("- Current streak: 1 day"));
    }

    #[test]
    fn saves_markdown_and_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date");

        let saved = save_report_files(&sample(), today, &dir.path().join("reports")).expect("save");

        assert!(saved.markdown_path.ends_with("analytics-2026-03-10.md"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&saved.json_path).expect("read json"))
                .expect("parse json");
        assert_eq!(json["total_minutes"], 90);
        assert_eq!(json["daily_buckets"][0]["date"], "2026-03-10");
    }
}
