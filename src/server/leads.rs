use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequirePrincipal;
use crate::server::AppState;
use crate::server::access::{resolve_lead_with_ownership, resolve_owned_customer};
use crate::server::dto::{
    LeadEnvelope, LeadListResponse, LeadPayload, LeadStatsResponse, ListLeadsParams,
    MessageResponse,
};
use crate::server::response::{ApiError, StoreResultExt};
use crate::server::validation::{validate_lead, validate_lead_update};
use crate::store::LeadFilter;
use crate::types::Lead;

pub async fn create_lead(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LeadPayload>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let valid = validate_lead(payload)?;

    // The customer reference must resolve for the caller before anything is
    // written; this is what keeps leads from ever pointing outside the
    // caller's customer set.
    let customer = store
        .get_owned_customer(&valid.customer_id, &auth.principal.id)
        .api_err("Failed to look up customer")?
        .ok_or_else(|| ApiError::not_found("Customer not found or access denied"))?;

    let now = Utc::now();
    let lead = Lead {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id,
        title: valid.title,
        description: valid.description,
        status: valid.status,
        value: valid.value,
        priority: valid.priority,
        source: valid.source,
        assigned_to: valid.assigned_to,
        notes: valid.notes,
        tags: valid.tags,
        expected_close_date: valid.expected_close_date,
        created_at: now,
        updated_at: now,
    };

    store.create_lead(&lead).api_err("Failed to create lead")?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(LeadEnvelope {
            message: "Lead created successfully",
            lead,
        }),
    ))
}

pub async fn list_leads(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLeadsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let owner_id = &auth.principal.id;

    let filter = LeadFilter {
        status: params.status.filter(|s| !s.is_empty()),
        priority: params.priority.filter(|p| !p.is_empty()),
    };

    let leads = match params.customer_id.as_deref().filter(|c| !c.is_empty()) {
        Some(customer_id) => {
            let customer = store
                .get_owned_customer(customer_id, owner_id)
                .api_err("Failed to look up customer")?
                .ok_or_else(|| ApiError::not_found("Customer not found or access denied"))?;
            store
                .list_customer_leads(&customer.id, &filter)
                .api_err("Failed to list leads")?
        }
        None => store
            .list_owner_leads(owner_id, &filter)
            .api_err("Failed to list leads")?,
    };

    Ok::<_, ApiError>(Json(LeadListResponse {
        total: leads.len(),
        leads,
    }))
}

pub async fn lead_stats(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let owner_id = &auth.principal.id;

    let stats = store
        .lead_stats_by_status(owner_id)
        .api_err("Failed to aggregate leads")?;
    let totals = store
        .lead_totals(owner_id)
        .api_err("Failed to aggregate leads")?;

    Ok::<_, ApiError>(Json(LeadStatsResponse { stats, totals }))
}

pub async fn update_lead(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<LeadPayload>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let owner_id = &auth.principal.id;
    let changes = validate_lead_update(payload)?;

    let (mut lead, _customer) = resolve_lead_with_ownership(store, &id, owner_id)?;

    // A re-supplied customer reference is checked for ownership again, but
    // the stored reference is immutable and never rewritten.
    if let Some(ref customer_id) = changes.customer_id {
        store
            .get_owned_customer(customer_id, owner_id)
            .api_err("Failed to look up customer")?
            .ok_or_else(|| ApiError::forbidden("Access denied"))?;
    }

    if let Some(title) = changes.title {
        lead.title = title;
    }
    if let Some(description) = changes.description {
        lead.description = description;
    }
    if let Some(status) = changes.status {
        lead.status = status;
    }
    if let Some(value) = changes.value {
        lead.value = value;
    }
    if let Some(priority) = changes.priority {
        lead.priority = priority;
    }
    if let Some(source) = changes.source {
        lead.source = source;
    }
    if let Some(assigned_to) = changes.assigned_to {
        lead.assigned_to = assigned_to;
    }
    if let Some(notes) = changes.notes {
        lead.notes = notes;
    }
    if let Some(tags) = changes.tags {
        lead.tags = tags;
    }
    if let Some(expected_close_date) = changes.expected_close_date {
        lead.expected_close_date = Some(expected_close_date);
    }
    lead.updated_at = Utc::now();

    store.update_lead(&lead).api_err("Failed to update lead")?;

    Ok::<_, ApiError>(Json(LeadEnvelope {
        message: "Lead updated successfully",
        lead,
    }))
}

pub async fn delete_lead(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let (lead, _customer) = resolve_lead_with_ownership(store, &id, &auth.principal.id)?;

    store.delete_lead(&lead.id).api_err("Failed to delete lead")?;

    Ok::<_, ApiError>(Json(MessageResponse {
        message: "Lead deleted successfully",
    }))
}
