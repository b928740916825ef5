use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::heal::{Error, Result};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,

    #[serde(skip)]
    pub user_id: String,

    pub name: String,
    pub frequency: Frequency,
    pub streak: i64,
    pub last_done: Option<Timestamp>,
    pub created: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
}

#[derive(Debug, Deserialize)]
pub struct HabitCreate {
    #[serde(default)]
    pub name: String,
    pub frequency: Frequency,
}

impl HabitCreate {
    pub fn validate(&self) -> Result<()> {
        (!self.name.is_empty()).then_some(()).ok_or(Error::Validation)
    }
}
