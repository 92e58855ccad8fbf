use super::Store;
use crate::error::{Error, Result};

/// Deletes a customer together with every lead that references it.
///
/// The ordering is load-bearing: leads are removed first, and the customer
/// row only once the sweep has succeeded. An interruption between the two
/// steps leaves a customer with zero leads, which is fully consistent and
/// can be fixed by re-issuing the delete. The reverse order could leave
/// leads whose customer no longer exists and whose owner is therefore
/// undiscoverable. The lead sweep itself is idempotent, so the whole
/// operation is safe to retry after any failure.
///
/// Callers must have already verified that the customer belongs to the
/// requesting principal.
///
/// Returns the number of leads removed.
pub fn delete_customer_with_leads(store: &dyn Store, customer_id: &str) -> Result<usize> {
    let removed = store.delete_customer_leads(customer_id)?;
    if removed > 0 {
        tracing::debug!("removed {removed} leads for customer {customer_id}");
    }

    if !store.delete_customer(customer_id)? {
        // Leads are already gone at this point; a retry deletes zero leads
        // and fails here again, which is the correct terminal state.
        return Err(Error::NotFound);
    }

    Ok(removed)
}
