//! Consecutive-day streak over daily buckets.
//!
//! A streak ends today or, before the first log of the day, yesterday. Any fully
//! skipped day breaks it.

use crate::analyzer::DailyBucket;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    NotStarted,
    Matching { expected: NaiveDate, count: u32 },
    Broken(u32),
}

impl Walk {
    fn step(self, date: NaiveDate, today: NaiveDate) -> Self {
        match self {
            Self::NotStarted => {
                let yesterday = today.pred_opt();
                if date == today || Some(date) == yesterday {
                    Self::matched(date, 0)
                } else {
                    Self::Broken(0)
                }
            }
            Self::Matching { expected, count } if date == expected => {
                Self::matched(expected, count)
            }
            Self::Matching { count, .. } => Self::Broken(count),
            broken @ Self::Broken(_) => broken,
        }
    }

    fn matched(date: NaiveDate, count: u32) -> Self {
        match date.pred_opt() {
            Some(expected) => Self::Matching {
                expected,
                count: count + 1,
            },
            None => Self::Broken(count + 1),
        }
    }

    fn count(self) -> u32 {
        match self {
            Self::NotStarted => 0,
            Self::Matching { count, .. } | Self::Broken(count) => count,
        }
    }
}

/// Number of consecutive active days ending today or yesterday.
///
/// Buckets may arrive in any order; days after `today` are ignored.
pub fn current_streak(buckets: &[DailyBucket], today: NaiveDate) -> u32 {
    let mut dates = buckets
        .iter()
        .filter(|bucket| bucket.activity_count > 0)
        .map(|bucket| bucket.date)
        .filter(|date| *date <= today)
        .collect::<Vec<_>>();
    dates.sort_unstable_by(|left, right| right.cmp(left));
    dates.dedup();

    let mut walk = Walk::NotStarted;
    for date in dates {
        walk = walk.step(date, today);
        if matches!(walk, Walk::Broken(_)) {
            break;
        }
    }

    walk.count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date")
    }

    fn buckets(days_back: &[u64]) -> Vec<DailyBucket> {
        days_back
            .iter()
            .map(|days| DailyBucket {
                date: today() - chrono::Days::new(*days),
                total_minutes: 30,
                activity_count: 1,
            })
            .collect()
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(current_streak(&[], today()), 0);
    }

    #[test]
    fn consecutive_days_ending_today() {
        assert_eq!(current_streak(&buckets(&[3, 2, 1, 0]), today()), 4);
    }

    #[test]
    fn gap_after_today_stops_the_count() {
        assert_eq!(current_streak(&buckets(&[3, 0]), today()), 1);
    }

    #[test]
    fn yesterday_keeps_streak_alive_before_first_log_today() {
        assert_eq!(current_streak(&buckets(&[1]), today()), 1);
        assert_eq!(current_streak(&buckets(&[4, 3, 2, 1]), today()), 4);
    }

    #[test]
    fn skipped_day_breaks_streak() {
        assert_eq!(current_streak(&buckets(&[2]), today()), 0);
        assert_eq!(current_streak(&buckets(&[5, 4, 3, 2]), today()), 0);
    }

    #[test]
    fn ignores_order_duplicates_and_future_days() {
        let mut input = buckets(&[0, 2, 1, 1]);
        input.push(DailyBucket {
            date: today() + chrono::Days::new(1),
            total_minutes: 10,
            activity_count: 1,
        });

        assert_eq!(current_streak(&input, today()), 3);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let input = [
            NaiveDate::from_ymd_opt(2026, 2, 27),
            NaiveDate::from_ymd_opt(2026, 2, 28),
            Some(today),
        ]
        .into_iter()
        .flatten()
        .map(|date| DailyBucket {
            date,
            total_minutes: 5,
            activity_count: 1,
        })
        .collect::<Vec<_>>();

        assert_eq!(current_streak(&input, today), 3);
    }
}
