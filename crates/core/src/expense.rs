use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::currency::CurrencyCode;
use crate::money::Amount;

/// Workflow state of a stored expense. New expenses start as `Draft`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseStatus::Draft => write!(f, "draft"),
            ExpenseStatus::Submitted => write!(f, "submitted"),
            ExpenseStatus::Approved => write!(f, "approved"),
            ExpenseStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ExpenseStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ExpenseStatus::Draft),
            "submitted" => Ok(ExpenseStatus::Submitted),
            "approved" => Ok(ExpenseStatus::Approved),
            "rejected" => Ok(ExpenseStatus::Rejected),
            other => Err(format!("Unknown expense status: '{other}'")),
        }
    }
}

/// An expense as submitted by a user, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub description: String,
    pub merchant: String,
    pub receipt_url: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// UUID v4, generated at insert time.
    pub id: String,
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub description: String,
    pub merchant: String,
    pub receipt_url: Option<String>,
    pub category: Option<String>,
    pub status: ExpenseStatus,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn from_new(id: String, new: NewExpense, created_at: DateTime<Utc>) -> Self {
        Expense {
            id,
            amount: new.amount,
            currency: new.currency,
            date: new.date,
            description: new.description,
            merchant: new.merchant,
            receipt_url: new.receipt_url,
            category: new.category,
            status: ExpenseStatus::Draft,
            created_at,
        }
    }
}
