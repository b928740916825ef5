use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::heal::{Error, Result};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Journal {
    pub id: String,

    #[serde(skip)]
    pub user_id: String,

    pub title: String,
    pub content: String,
    pub created: Timestamp,
    pub updated: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct JournalCreate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Partial update - absent fields keep their stored value.
#[derive(Debug, Deserialize)]
pub struct JournalUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl JournalCreate {
    pub fn validate(&self) -> Result<()> {
        (!self.title.is_empty() && !self.content.is_empty())
            .then_some(())
            .ok_or(Error::Validation)
    }
}
