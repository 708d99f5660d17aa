//! Customer endpoints. The rollup aggregates are visible on every
//! response but are never accepted from a request body.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{Page, DEFAULT_PAGE_SIZE};
use crate::models::{CreateCustomer, Customer, ListCustomersFilter, UpdateCustomer};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    request.validate()?;

    let customer = state
        .db
        .create_customer(&CreateCustomer {
            name: request.name,
            email: request.email,
            phone: request.phone,
            address: request.address,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

#[tracing::instrument(skip(state))]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .db
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

#[tracing::instrument(skip(state, query))]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<Page<Customer>>, AppError> {
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);

    let customers = state
        .db
        .list_customers(&ListCustomersFilter {
            search: query.search,
            page_size,
            page_token: query.page_token,
        })
        .await?;

    Ok(Json(Page::new(customers, page_size, |c| c.customer_id)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    request.validate()?;

    let customer = state
        .db
        .update_customer(
            customer_id,
            &UpdateCustomer {
                name: request.name,
                email: request.email,
                phone: request.phone,
                address: request.address,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

#[tracing::instrument(skip(state))]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_customer(customer_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
