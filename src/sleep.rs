use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::heal::{Error, Result};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Sleep {
    pub id: String,

    #[serde(skip)]
    pub user_id: String,

    pub started: Timestamp,
    pub ended: Timestamp,
    /// Self-reported quality, 1 (awful) to 5 (great).
    pub quality: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SleepCreate {
    #[serde(default)]
    pub started: Timestamp,
    #[serde(default)]
    pub ended: Timestamp,
    #[serde(default)]
    pub quality: i64,
    pub note: Option<String>,
}

impl SleepCreate {
    pub fn validate(&self) -> Result<()> {
        let ok = self.started < self.ended && (1..=5).contains(&self.quality);
        ok.then_some(()).ok_or(Error::Validation)
    }
}
