use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LeadPriority, LeadStatus};

/// The owning actor every customer record is scoped to. Principals are only
/// minted through the CLI; the HTTP surface merely resolves them from tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub principal_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A customer record. `owner_id` is set once at creation from the requesting
/// principal and is never written again by any update path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sales lead. Ownership is never stored here: it is always derived by
/// dereferencing `customer_id`, so access checks must go through the
/// customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub customer_id: String,
    pub title: String,
    pub description: String,
    pub status: LeadStatus,
    pub value: f64,
    pub priority: LeadPriority,
    pub source: String,
    pub assigned_to: String,
    pub notes: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_close_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One per-status aggregation group. The status is kept as its display name
/// since groups are already keyed and sorted by that name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStatusStat {
    pub status: String,
    pub count: i64,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadTotals {
    pub total_leads: i64,
    pub total_value: f64,
    pub avg_value: f64,
}
