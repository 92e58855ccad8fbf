use crate::server::response::{ApiError, StoreResultExt};
use crate::store::Store;
use crate::types::{Customer, Lead};

/// Resolves a customer by `(id, owner_id)` in a single step. A customer that
/// belongs to someone else is indistinguishable from one that does not
/// exist, so the lookup never confirms another owner's record.
pub fn resolve_owned_customer(
    store: &dyn Store,
    customer_id: &str,
    owner_id: &str,
) -> Result<Customer, ApiError> {
    store
        .get_owned_customer(customer_id, owner_id)
        .api_err("Failed to look up customer")?
        .ok_or_else(|| ApiError::not_found("Customer not found"))
}

/// Two-step lead resolution: the lead by its own id first, then its customer
/// compared against the caller. Ownership lives on the customer, never on
/// the lead, so this extra lookup is mandatory for every lead mutation.
///
/// A lead whose customer belongs to someone else comes back as forbidden
/// rather than not found. Lead ids carry no guessable business data, so the
/// asymmetry with customer lookups is accepted in exchange for the more
/// diagnosable status.
pub fn resolve_lead_with_ownership(
    store: &dyn Store,
    lead_id: &str,
    owner_id: &str,
) -> Result<(Lead, Customer), ApiError> {
    let lead = store
        .get_lead(lead_id)
        .api_err("Failed to look up lead")?
        .ok_or_else(|| ApiError::not_found("Lead not found"))?;

    let customer = store
        .get_owned_customer(&lead.customer_id, owner_id)
        .api_err("Failed to look up customer")?
        .ok_or_else(|| ApiError::forbidden("Access denied"))?;

    Ok((lead, customer))
}
