use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::heal::{Error, Result};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Mood {
    pub id: String,

    #[serde(skip)]
    pub user_id: String,

    pub mood: String,
    pub note: Option<String>,
    pub created: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct MoodCreate {
    #[serde(default)]
    pub mood: String,
    pub note: Option<String>,
}

impl MoodCreate {
    pub fn validate(&self) -> Result<()> {
        (!self.mood.is_empty()).then_some(()).ok_or(Error::Validation)
    }
}
