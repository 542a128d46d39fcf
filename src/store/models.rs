use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Sad,
    Calm,
    Anxious,
    Excited,
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Self::Happy,
        Self::Sad,
        Self::Calm,
        Self::Anxious,
        Self::Excited,
        Self::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Calm => "calm",
            Self::Anxious => "anxious",
            Self::Excited => "excited",
            Self::Neutral => "neutral",
        }
    }

    /// Position on the dashboard's 1–10 mood scale.
    pub fn score(&self) -> f64 {
        match self {
            Self::Excited => 9.0,
            Self::Happy => 8.0,
            Self::Calm => 7.0,
            Self::Neutral => 5.0,
            Self::Anxious => 3.0,
            Self::Sad => 2.0,
        }
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Self::Happy),
            "sad" => Ok(Self::Sad),
            "calm" => Ok(Self::Calm),
            "anxious" => Ok(Self::Anxious),
            "excited" => Ok(Self::Excited),
            "neutral" => Ok(Self::Neutral),
            _ => Err(format!("Invalid mood: {}", s)),
        }
    }
}

/// One journal document owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub word_count: i64,
    /// Estimated minutes.
    pub reading_time: i64,
    pub mood: Option<Mood>,
    pub is_private: bool,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Listing row: the entry without its body, plus a text preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntrySummary {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub word_count: i64,
    pub mood: Option<Mood>,
    pub is_private: bool,
    pub is_favorite: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

impl NewEntry {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub is_private: Option<bool>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
}

impl EntryPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    /// Id of the last entry of the previous page.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Case-insensitive search over title and content.
    #[serde(default)]
    pub q: Option<String>,
}

impl ListQuery {
    pub fn page_size(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPage {
    pub entries: Vec<EntrySummary>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}
