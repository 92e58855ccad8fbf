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
use crate::server::access::resolve_owned_customer;
use crate::server::dto::{
    CustomerDetailResponse, CustomerEnvelope, CustomerListResponse, CustomerPayload,
    ListCustomersParams, MessageResponse, Pagination,
};
use crate::server::response::{
    ApiError, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, StoreResultExt, page_count, page_offset,
    positive_or_default,
};
use crate::server::validation::validate_customer;
use crate::store::{LeadFilter, delete_customer_with_leads};
use crate::types::Customer;

pub async fn create_customer(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CustomerPayload>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let valid = validate_customer(payload)?;

    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        owner_id: auth.principal.id.clone(),
        name: valid.name,
        email: valid.email,
        phone: valid.phone,
        company: valid.company,
        created_at: now,
        updated_at: now,
    };

    store
        .create_customer(&customer)
        .api_err("Failed to create customer")?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(CustomerEnvelope {
            message: "Customer created successfully",
            customer,
        }),
    ))
}

pub async fn list_customers(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCustomersParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let owner_id = &auth.principal.id;

    let page = positive_or_default(params.page.as_deref(), DEFAULT_PAGE);
    let limit = positive_or_default(params.limit.as_deref(), DEFAULT_PAGE_SIZE);
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let total = store
        .count_customers(owner_id, search)
        .api_err("Failed to count customers")?;
    // Pages beyond the end just produce an empty item list
    let customers = store
        .list_customers(owner_id, search, limit, page_offset(page, limit))
        .api_err("Failed to list customers")?;

    Ok::<_, ApiError>(Json(CustomerListResponse {
        customers,
        pagination: Pagination {
            current: page,
            pages: page_count(total, limit),
            total,
        },
    }))
}

pub async fn get_customer(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let customer = resolve_owned_customer(store, &id, &auth.principal.id)?;
    let leads = store
        .list_customer_leads(&customer.id, &LeadFilter::default())
        .api_err("Failed to list leads")?;

    Ok::<_, ApiError>(Json(CustomerDetailResponse { customer, leads }))
}

pub async fn update_customer(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CustomerPayload>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let valid = validate_customer(payload)?;

    // id, owner_id, and created_at survive every update untouched
    let mut customer = resolve_owned_customer(store, &id, &auth.principal.id)?;
    customer.name = valid.name;
    customer.email = valid.email;
    customer.phone = valid.phone;
    customer.company = valid.company;
    customer.updated_at = Utc::now();

    store
        .update_customer(&customer)
        .api_err("Failed to update customer")?;

    Ok::<_, ApiError>(Json(CustomerEnvelope {
        message: "Customer updated successfully",
        customer,
    }))
}

pub async fn delete_customer(
    auth: RequirePrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let customer = resolve_owned_customer(store, &id, &auth.principal.id)?;

    // Leads first, then the customer. A failure here leaves the customer in
    // place with whatever leads remain, so the caller can safely retry.
    delete_customer_with_leads(store, &customer.id)
        .api_err("Failed to delete customer")?;

    Ok::<_, ApiError>(Json(MessageResponse {
        message: "Customer and associated leads deleted successfully",
    }))
}
