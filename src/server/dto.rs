use serde::{Deserialize, Serialize};

use crate::types::{Customer, Lead, LeadStatusStat, LeadTotals};

// Request payloads. All fields come in optional so the validation layer can
// produce field-level messages instead of deserialization failures; numeric
// page/limit arrive as raw strings so non-numeric values coerce to defaults.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub expected_close_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersParams {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLeadsParams {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

// Response envelopes, matching the documented request/response shapes.

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CustomerEnvelope {
    pub message: &'static str,
    pub customer: Customer,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<Customer>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetailResponse {
    pub customer: Customer,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Serialize)]
pub struct LeadEnvelope {
    pub message: &'static str,
    pub lead: Lead,
}

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<Lead>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct LeadStatsResponse {
    pub stats: Vec<LeadStatusStat>,
    pub totals: LeadTotals,
}
