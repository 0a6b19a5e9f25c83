use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::CoreResult;
use crate::models::{
    ActivityCalendar, ActivityDay, CalendarDay, Category, SessionRecord, UserStats,
};
use crate::services::clock::ClockSource;
use crate::services::store::{SessionStore, StatsStore};
use crate::utils::time::CalendarZone;

/// Derives [`UserStats`] from session history. Stateless and pure.
pub struct StatsAggregator;

impl StatsAggregator {
    /// Computes stats from a user's sessions. Incomplete records are ignored.
    pub fn compute(
        user_id: &str,
        records: &[SessionRecord],
        today: NaiveDate,
        zone: CalendarZone,
    ) -> UserStats {
        let completed: Vec<&SessionRecord> = records.iter().filter(|r| r.completed).collect();

        let mut stats = UserStats::empty(user_id);
        stats.total_solved = completed.len() as u32;

        for category in Category::ALL {
            let scores: Vec<f64> = completed
                .iter()
                .filter(|r| r.category == category)
                .filter_map(|r| r.composite_score)
                .collect();
            stats.set_average(category, mean(&scores));
        }

        let mut counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        for record in &completed {
            *counts.entry(activity_date(record, zone)).or_insert(0) += 1;
        }

        let dates: BTreeSet<NaiveDate> = counts.keys().copied().collect();
        stats.current_streak = current_streak(&dates, today);
        stats.longest_streak = longest_streak(&dates);
        stats.last_activity_date = dates.iter().next_back().copied();
        stats.activity = counts
            .into_iter()
            .map(|(date, count)| ActivityDay { date, count })
            .collect();

        stats
    }
}

/// Activity date of a completed session: its explicit date, else the
/// calendar day of its creation instant.
pub fn activity_date(record: &SessionRecord, zone: CalendarZone) -> NaiveDate {
    record
        .date
        .unwrap_or_else(|| zone.date_of(record.created_date))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Consecutive active days ending today, or yesterday when today has no
/// activity yet.
fn current_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if dates.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while dates.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Longest run of consecutive days. Dates are distinct, so several sessions
/// on one day count once.
fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        run = match previous {
            Some(prev) if date - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

/// Month view of activity counts.
pub fn build_calendar(stats: &UserStats, year: i32, month: u32, today: NaiveDate) -> Option<ActivityCalendar> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days: Vec<CalendarDay> = first
        .iter_days()
        .take_while(|date| date.month() == month)
        .map(|date| {
            let count = stats.sessions_on(date);
            CalendarDay {
                date,
                count,
                level: CalendarDay::level_for(count),
                is_today: date == today,
            }
        })
        .collect();

    Some(ActivityCalendar {
        year,
        month,
        active_days: days.iter().filter(|day| day.count > 0).count() as u32,
        total_sessions: days.iter().map(|day| day.count).sum(),
        days,
    })
}

/// Recomputes and stores user stats from persisted history.
#[derive(Clone)]
pub struct StatsService {
    sessions: Arc<dyn SessionStore>,
    stats: Arc<dyn StatsStore>,
    clock: Arc<dyn ClockSource>,
}

impl StatsService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        stats: Arc<dyn StatsStore>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        Self {
            sessions,
            stats,
            clock,
        }
    }

    /// Reads the full completed history, recomputes and replaces the stored
    /// stats wholesale.
    pub async fn recompute(&self, user_id: &str) -> CoreResult<UserStats> {
        let records = self.sessions.list_completed_sessions(user_id).await?;
        let stats = StatsAggregator::compute(
            user_id,
            &records,
            self.clock.today(),
            self.clock.zone(),
        );

        let applied = self
            .stats
            .upsert_user_stats(user_id, &stats)
            .await
            .inspect_err(|e| tracing::error!(user_id, "Failed to store user stats: {}", e))?;

        if !applied {
            tracing::debug!(
                user_id,
                total_solved = stats.total_solved,
                "Stored stats are newer, keeping them"
            );
            return self.get(user_id).await;
        }

        tracing::info!(
            user_id,
            total_solved = stats.total_solved,
            current_streak = stats.current_streak,
            longest_streak = stats.longest_streak,
            "User stats recomputed"
        );
        Ok(stats)
    }

    /// Stored stats, or zeroed stats for users with no history.
    pub async fn get(&self, user_id: &str) -> CoreResult<UserStats> {
        Ok(self
            .stats
            .get_user_stats(user_id)
            .await?
            .unwrap_or_else(|| UserStats::empty(user_id)))
    }

    /// `None` when `year`/`month` is not a real month.
    pub async fn calendar(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> CoreResult<Option<ActivityCalendar>> {
        let stats = self.get(user_id).await?;
        Ok(build_calendar(&stats, year, month, self.clock.today()))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Evaluation, Feedback, SessionPatch};
    use crate::models::ConversationLog;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn utc() -> CalendarZone {
        CalendarZone::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn completed(id: &str, category: Category, score: f64, date: NaiveDate) -> SessionRecord {
        let created = Utc
            .with_ymd_and_hms(date.year(), date.month(), date.day(), 12, 0, 0)
            .unwrap();
        let mut record = SessionRecord::new(id, "u1", "q1", category, created);
        record.apply(SessionPatch::completion(
            ConversationLog::new(),
            10.0,
            Evaluation {
                composite_score: score,
                dimension_scores: [("Communication", score)].into_iter().collect(),
                feedback: Feedback::default(),
            },
            date,
        ));
        record
    }

    #[test]
    fn streak_with_gap_counts_only_today() {
        let records: Vec<SessionRecord> = [day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3), day(2024, 1, 5)]
            .into_iter()
            .enumerate()
            .map(|(i, date)| completed(&format!("s{}", i), Category::Design, 5.0, date))
            .collect();

        let stats = StatsAggregator::compute("u1", &records, day(2024, 1, 5), utc());
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.total_solved, 4);
        assert_eq!(stats.last_activity_date, Some(day(2024, 1, 5)));
    }

    #[test]
    fn streak_counts_back_from_yesterday() {
        let records = vec![
            completed("s1", Category::Rca, 5.0, day(2024, 1, 4)),
            completed("s2", Category::Rca, 5.0, day(2024, 1, 5)),
        ];

        let stats = StatsAggregator::compute("u1", &records, day(2024, 1, 6), utc());
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 2);
    }

    #[test]
    fn streak_is_zero_after_two_missed_days() {
        let records = vec![completed("s1", Category::Rca, 5.0, day(2024, 1, 4))];
        let stats = StatsAggregator::compute("u1", &records, day(2024, 1, 6), utc());
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 1);
    }

    #[test]
    fn same_day_sessions_neither_break_nor_extend_a_streak() {
        let records = vec![
            completed("s1", Category::Design, 5.0, day(2024, 1, 4)),
            completed("s2", Category::Design, 6.0, day(2024, 1, 5)),
            completed("s3", Category::Rca, 7.0, day(2024, 1, 5)),
            completed("s4", Category::Guesstimate, 8.0, day(2024, 1, 6)),
        ];

        let stats = StatsAggregator::compute("u1", &records, day(2024, 1, 6), utc());
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.total_solved, 4);
        assert_eq!(stats.sessions_on(day(2024, 1, 5)), 2);
    }

    #[test]
    fn averages_are_per_category_and_absent_without_sessions() {
        let records = vec![
            completed("s1", Category::Design, 4.0, day(2024, 1, 4)),
            completed("s2", Category::Design, 8.0, day(2024, 1, 5)),
        ];

        let stats = StatsAggregator::compute("u1", &records, day(2024, 1, 5), utc());
        assert_eq!(stats.avg_score_design, Some(6.0));
        assert_eq!(stats.avg_score_rca, None);
        assert_eq!(stats.average_for(Category::Guesstimate), None);
    }

    #[test]
    fn empty_history_is_all_zero() {
        let stats = StatsAggregator::compute("u1", &[], day(2024, 1, 5), utc());
        assert_eq!(stats, UserStats::empty("u1"));
    }

    #[test]
    fn compute_is_pure() {
        let records = vec![
            completed("s1", Category::Design, 4.0, day(2024, 1, 4)),
            completed("s2", Category::Improvement, 8.0, day(2024, 1, 5)),
        ];
        let first = StatsAggregator::compute("u1", &records, day(2024, 1, 5), utc());
        let second = StatsAggregator::compute("u1", &records, day(2024, 1, 5), utc());
        assert_eq!(first, second);
    }

    #[test]
    fn incomplete_records_are_ignored() {
        let pending = SessionRecord::new("s9", "u1", "q1", Category::Design, Utc::now());
        let stats = StatsAggregator::compute("u1", &[pending], day(2024, 1, 5), utc());
        assert_eq!(stats.total_solved, 0);
    }

    #[test]
    fn missing_date_falls_back_to_created_instant_in_zone() {
        let created = Utc.with_ymd_and_hms(2024, 1, 6, 3, 0, 0).unwrap();
        let mut record = completed("s1", Category::Design, 5.0, day(2024, 1, 6));
        record.date = None;
        record.created_date = created;

        let new_york = CalendarZone::Fixed(FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(activity_date(&record, new_york), day(2024, 1, 5));
        assert_eq!(activity_date(&record, utc()), day(2024, 1, 6));
    }

    #[test]
    fn calendar_levels_follow_counts() {
        let records = vec![
            completed("s1", Category::Design, 5.0, day(2024, 2, 3)),
            completed("s2", Category::Design, 5.0, day(2024, 2, 10)),
            completed("s3", Category::Design, 5.0, day(2024, 2, 10)),
        ];
        let stats = StatsAggregator::compute("u1", &records, day(2024, 2, 10), utc());

        let calendar = build_calendar(&stats, 2024, 2, day(2024, 2, 10)).unwrap();
        assert_eq!(calendar.days.len(), 29);
        assert_eq!(calendar.active_days, 2);
        assert_eq!(calendar.total_sessions, 3);
        assert_eq!(calendar.days[2].level, 1);
        assert_eq!(calendar.days[9].level, 2);
        assert!(calendar.days[9].is_today);
        assert!(build_calendar(&stats, 2024, 13, day(2024, 2, 10)).is_none());
    }
}
