use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Category;

/// Statistics derived from a user's completed sessions. Always recomputed
/// wholesale; nothing in here is absent from session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_solved: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_score_design: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_score_improvement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_score_rca: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_score_guesstimate: Option<f64>,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    /// Completed sessions per activity date, ascending by date.
    #[serde(default)]
    pub activity: Vec<ActivityDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
    pub date: NaiveDate,
    pub count: u32,
}

impl UserStats {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_streak: 0,
            longest_streak: 0,
            total_solved: 0,
            avg_score_design: None,
            avg_score_improvement: None,
            avg_score_rca: None,
            avg_score_guesstimate: None,
            last_activity_date: None,
            activity: Vec::new(),
        }
    }

    pub fn average_for(&self, category: Category) -> Option<f64> {
        match category {
            Category::Design => self.avg_score_design,
            Category::Improvement => self.avg_score_improvement,
            Category::Rca => self.avg_score_rca,
            Category::Guesstimate => self.avg_score_guesstimate,
        }
    }

    pub fn set_average(&mut self, category: Category, average: Option<f64>) {
        let slot = match category {
            Category::Design => &mut self.avg_score_design,
            Category::Improvement => &mut self.avg_score_improvement,
            Category::Rca => &mut self.avg_score_rca,
            Category::Guesstimate => &mut self.avg_score_guesstimate,
        };
        *slot = average;
    }

    pub fn sessions_on(&self, date: NaiveDate) -> u32 {
        self.activity
            .binary_search_by_key(&date, |day| day.date)
            .map(|index| self.activity[index].count)
            .unwrap_or(0)
    }
}

/// Month view of completed-session activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityCalendar {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
    pub active_days: u32,
    pub total_sessions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub count: u32,
    /// 0 = none, 1 = one session, 2 = two or three, 3 = four or more.
    pub level: u8,
    pub is_today: bool,
}

impl CalendarDay {
    pub fn level_for(count: u32) -> u8 {
        match count {
            0 => 0,
            1 => 1,
            2..=3 => 2,
            _ => 3,
        }
    }
}
