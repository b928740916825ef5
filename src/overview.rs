use serde::Serialize;

use crate::mood::Mood;
use crate::sleep::Sleep;

/// A shallow snapshot for the dashboard: the most recent entries plus
/// per-resource totals. Deliberately no statistics beyond counting.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub latest_mood: Option<Mood>,
    pub latest_sleep: Option<Sleep>,
    pub mood_count: i64,
    pub journal_count: i64,
    pub habit_count: i64,
    pub sleep_count: i64,
}
