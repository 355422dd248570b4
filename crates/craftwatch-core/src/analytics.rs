//! Account growth and activity counts for the admin view.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::models::Profile;

/// Window covered by an analytics report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    /// Last 7 days, one bucket per day
    #[default]
    Week,
    /// Last month, one bucket per day
    Month,
    /// Last year, one bucket per month
    Year,
}

impl TimePeriod {
    pub const ALL: [Self; 3] = [Self::Week, Self::Month, Self::Year];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    const fn interval(self) -> Interval {
        match self {
            Self::Week | Self::Month => Interval::Day,
            Self::Year => Interval::Month,
        }
    }

    fn start(self, today: NaiveDate) -> NaiveDate {
        let start = match self {
            Self::Week => today.checked_sub_days(Days::new(7)),
            Self::Month => today.checked_sub_months(Months::new(1)),
            Self::Year => today.checked_sub_months(Months::new(12)),
        };
        start.unwrap_or(today)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|period| period.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown period '{s}' (expected week, month or year)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interval {
    Day,
    Month,
}

impl Interval {
    /// Start of bucket `n`, always measured from `start` so month-end
    /// clamping does not carry over into later buckets.
    fn nth(self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Self::Day => start.checked_add_days(Days::new(n.into())),
            Self::Month => start.checked_add_months(Months::new(n)),
        }
    }

    fn label(self, date: NaiveDate) -> String {
        match self {
            Self::Day => date.format("%b %-d").to_string(),
            Self::Month => date.format("%b %Y").to_string(),
        }
    }
}

/// Counts for one date bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsBucket {
    pub label: String,
    pub start: NaiveDate,
    pub new_users: usize,
    pub active_users: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleDistribution {
    pub admins: usize,
    pub users: usize,
}

impl RoleDistribution {
    #[must_use]
    pub fn from_profiles(profiles: &[Profile]) -> Self {
        let admins = profiles.iter().filter(|profile| profile.is_admin).count();
        Self {
            admins,
            users: profiles.len() - admins,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsReport {
    pub period: TimePeriod,
    pub buckets: Vec<AnalyticsBucket>,
    pub roles: RoleDistribution,
}

/// Bucket `profiles` by signup (`created_at`) and last activity
/// (`updated_at`) over `period`, ending on the day of `now` inclusive.
///
/// Each bucket covers `[start, next start)` in UTC calendar days.
#[must_use]
pub fn aggregate(profiles: &[Profile], period: TimePeriod, now: DateTime<Utc>) -> AnalyticsReport {
    let today = now.date_naive();
    let interval = period.interval();

    let start = period.start(today);
    let mut buckets = Vec::new();
    for n in 0u32.. {
        let (Some(current), Some(next)) = (interval.nth(start, n), interval.nth(start, n + 1))
        else {
            break;
        };
        if current > today {
            break;
        }
        let in_bucket = |at: DateTime<Utc>| {
            let day = at.date_naive();
            day >= current && day < next
        };

        buckets.push(AnalyticsBucket {
            label: interval.label(current),
            start: current,
            new_users: profiles.iter().filter(|p| in_bucket(p.created_at)).count(),
            active_users: profiles
                .iter()
                .filter(|p| p.updated_at.is_some_and(in_bucket))
                .count(),
        });
    }

    AnalyticsReport {
        period,
        buckets,
        roles: RoleDistribution::from_profiles(profiles),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn profile(id: &str, created: DateTime<Utc>, active: Option<DateTime<Utc>>) -> Profile {
        Profile {
            id: id.to_string(),
            username: None,
            avatar_url: None,
            is_admin: false,
            created_at: created,
            updated_at: active,
        }
    }

    #[test]
    fn week_has_eight_daily_buckets_ending_today() {
        let report = aggregate(&[], TimePeriod::Week, at(2026, 10, 16));
        let labels: Vec<&str> = report.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Oct 9", "Oct 10", "Oct 11", "Oct 12", "Oct 13", "Oct 14", "Oct 15", "Oct 16"]
        );
    }

    #[test]
    fn month_spans_previous_month_daily() {
        let report = aggregate(&[], TimePeriod::Month, at(2026, 3, 31));
        // Feb 28 through Mar 31
        assert_eq!(report.buckets.first().unwrap().label, "Feb 28");
        assert_eq!(report.buckets.last().unwrap().label, "Mar 31");
        assert_eq!(report.buckets.len(), 32);
    }

    #[test]
    fn year_has_monthly_buckets() {
        let report = aggregate(&[], TimePeriod::Year, at(2026, 10, 16));
        assert_eq!(report.buckets.len(), 13);
        assert_eq!(report.buckets[0].label, "Oct 2025");
        assert_eq!(report.buckets[12].label, "Oct 2026");
    }

    #[test]
    fn monthly_buckets_keep_the_month_end_anchor() {
        let report = aggregate(&[], TimePeriod::Year, at(2026, 10, 31));
        let starts: Vec<String> = report
            .buckets
            .iter()
            .map(|bucket| bucket.start.format("%m-%d").to_string())
            .collect();
        assert_eq!(
            starts,
            vec![
                "10-31", "11-30", "12-31", "01-31", "02-28", "03-31", "04-30", "05-31", "06-30",
                "07-31", "08-31", "09-30", "10-31"
            ]
        );
    }

    #[test]
    fn counts_signups_and_activity_per_bucket() {
        let profiles = vec![
            profile("a", at(2026, 10, 15), Some(at(2026, 10, 16))),
            profile("b", at(2026, 10, 15), None),
            profile("c", at(2026, 1, 1), Some(at(2026, 10, 15))),
        ];
        let report = aggregate(&profiles, TimePeriod::Week, at(2026, 10, 16));
        let oct15 = &report.buckets[6];
        let oct16 = &report.buckets[7];

        assert_eq!((oct15.new_users, oct15.active_users), (2, 1));
        assert_eq!((oct16.new_users, oct16.active_users), (0, 1));
    }

    #[test]
    fn role_distribution_splits_admins() {
        let mut admin = profile("a", at(2026, 1, 1), None);
        admin.is_admin = true;
        let roles = RoleDistribution::from_profiles(&[admin, profile("b", at(2026, 1, 1), None)]);
        assert_eq!(roles, RoleDistribution { admins: 1, users: 1 });
    }

    #[test]
    fn period_parses_from_text() {
        assert_eq!("Year".parse::<TimePeriod>().unwrap(), TimePeriod::Year);
        assert!("decade".parse::<TimePeriod>().is_err());
    }
}
