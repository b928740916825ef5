use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::heal::{Error, Result};
use crate::time::Timestamp;

/// A payment record only - no gateway is contacted. Records are created
/// as `Pending` and settled out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Payment {
    pub id: String,

    #[serde(skip)]
    pub user_id: String,

    /// Amount in minor units (cents, pence, ...).
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCreate {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

impl PaymentCreate {
    pub fn validate(&self) -> Result<()> {
        let ok = self.amount > 0 && !self.currency.is_empty();
        ok.then_some(()).ok_or(Error::Validation)
    }
}
