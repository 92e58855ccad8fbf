mod cascade;
mod schema;
mod sqlite;

pub use cascade::delete_customer_with_leads;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Optional filters for lead listings. Status and priority are matched as
/// raw strings; a value outside the known sets simply matches nothing.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Principal operations
    fn create_principal(&self, principal: &Principal) -> Result<()>;
    fn get_principal(&self, id: &str) -> Result<Option<Principal>>;
    fn get_principal_by_name(&self, name: &str) -> Result<Option<Principal>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Customer operations. Lookups always filter by (id, owner_id) in one
    // step so a mismatched owner is indistinguishable from a missing row.
    fn create_customer(&self, customer: &Customer) -> Result<()>;
    fn get_owned_customer(&self, id: &str, owner_id: &str) -> Result<Option<Customer>>;
    fn list_customers(
        &self,
        owner_id: &str,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Customer>>;
    fn count_customers(&self, owner_id: &str, search: Option<&str>) -> Result<i64>;
    fn update_customer(&self, customer: &Customer) -> Result<()>;
    fn delete_customer(&self, id: &str) -> Result<bool>;

    // Lead operations
    fn create_lead(&self, lead: &Lead) -> Result<()>;
    fn get_lead(&self, id: &str) -> Result<Option<Lead>>;
    fn list_customer_leads(&self, customer_id: &str, filter: &LeadFilter) -> Result<Vec<Lead>>;
    fn list_owner_leads(&self, owner_id: &str, filter: &LeadFilter) -> Result<Vec<Lead>>;
    fn update_lead(&self, lead: &Lead) -> Result<()>;
    fn delete_lead(&self, id: &str) -> Result<bool>;
    /// Removes every lead referencing the customer. Idempotent: deleting an
    /// already-empty set succeeds with a count of zero.
    fn delete_customer_leads(&self, customer_id: &str) -> Result<usize>;

    // Aggregation across all leads transitively owned by a principal
    fn lead_stats_by_status(&self, owner_id: &str) -> Result<Vec<LeadStatusStat>>;
    fn lead_totals(&self, owner_id: &str) -> Result<LeadTotals>;
}
