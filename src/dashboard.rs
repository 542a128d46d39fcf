//! Writing statistics for the dashboard.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::store::Entry;

const TREND_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodPoint {
    pub date: NaiveDate,
    /// Average score (1–10) of the day's entries that carry a mood.
    pub mood: f64,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_entries: usize,
    pub current_streak: u32,
    pub this_week_entries: usize,
    pub avg_mood_score: f64,
    pub total_words: i64,
    pub time_spent_minutes: i64,
    pub mood_trend: Vec<MoodPoint>,
}

pub fn mood_label(score: f64) -> &'static str {
    if score >= 8.0 {
        "great"
    } else if score >= 6.0 {
        "good"
    } else if score >= 4.0 {
        "okay"
    } else {
        "low"
    }
}

fn created_on(entry: &Entry) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(&entry.created_at)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Consecutive days with at least one entry, ending today or yesterday.
fn streak(days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };
    let mut count = 0;
    while days.contains(&day) {
        count += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    count
}

/// Compute stats over live entries as of `today` (UTC).
pub fn compute(entries: &[Entry], today: NaiveDate) -> DashboardStats {
    let week_start = today
        .checked_sub_days(Days::new(TREND_DAYS - 1))
        .unwrap_or(today);

    let mut days = HashSet::new();
    let mut this_week_entries = 0;
    let mut mood_sum = 0.0;
    let mut mood_count = 0usize;
    let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

    for entry in entries {
        let date = created_on(entry);
        if let Some(date) = date {
            days.insert(date);
        }
        let in_week = date.is_some_and(|d| d >= week_start && d <= today);
        if in_week {
            this_week_entries += 1;
        }
        if let Some(mood) = entry.mood {
            mood_sum += mood.score();
            mood_count += 1;
            if let (true, Some(date)) = (in_week, date) {
                let slot = per_day.entry(date).or_insert((0.0, 0));
                slot.0 += mood.score();
                slot.1 += 1;
            }
        }
    }

    let avg_mood_score = if mood_count == 0 {
        0.0
    } else {
        round1(mood_sum / mood_count as f64)
    };

    let mood_trend = per_day
        .into_iter()
        .map(|(date, (sum, n))| {
            let mood = round1(sum / n as f64);
            MoodPoint {
                date,
                mood,
                label: mood_label(mood),
            }
        })
        .collect();

    DashboardStats {
        total_entries: entries.len(),
        current_streak: streak(&days, today),
        this_week_entries,
        avg_mood_score,
        total_words: entries.iter().map(|e| e.word_count).sum(),
        time_spent_minutes: entries.iter().map(|e| e.reading_time).sum(),
        mood_trend,
    }
}
