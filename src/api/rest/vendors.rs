use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::vendor::{BillingProfile, GeoPoint, Vendor};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vendors", post(create_vendor).get(list_vendors))
        .route("/vendors/:id", patch(update_vendor))
        .route("/vendors/:id/location", patch(update_vendor_location))
}

#[derive(Deserialize)]
pub struct CreateVendorRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub heavy_duty: bool,
    #[serde(default)]
    pub billing: Option<BillingProfile>,
}

async fn create_vendor(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateVendorRequest>,
) -> Result<Json<Vendor>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }

    let now = Utc::now();
    let vendor = Vendor {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        location: payload.location,
        active: true,
        updates_paused: false,
        services: payload.services,
        heavy_duty: payload.heavy_duty,
        billing: payload.billing.unwrap_or_default(),
        compliance_ok: true,
        created_at: now,
        updated_at: now,
    };

    state.vendors.insert(vendor.id, vendor.clone());
    Ok(Json(vendor))
}

async fn list_vendors(State(state): State<Arc<AppState>>) -> Json<Vec<Vendor>> {
    let vendors = state
        .vendors
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(vendors)
}

#[derive(Deserialize)]
pub struct UpdateVendorRequest {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub updates_paused: Option<bool>,
    #[serde(default)]
    pub services: Option<Vec<String>>,
    #[serde(default)]
    pub heavy_duty: Option<bool>,
    #[serde(default)]
    pub billing: Option<BillingProfile>,
    #[serde(default)]
    pub compliance_ok: Option<bool>,
}

async fn update_vendor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVendorRequest>,
) -> Result<Json<Vendor>, AppError> {
    let mut vendor = state
        .vendors
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))?;

    if let Some(active) = payload.active {
        vendor.active = active;
    }
    if let Some(paused) = payload.updates_paused {
        vendor.updates_paused = paused;
    }
    if let Some(services) = payload.services {
        vendor.services = services;
    }
    if let Some(heavy_duty) = payload.heavy_duty {
        vendor.heavy_duty = heavy_duty;
    }
    if let Some(billing) = payload.billing {
        vendor.billing = billing;
    }
    if let Some(compliance_ok) = payload.compliance_ok {
        vendor.compliance_ok = compliance_ok;
    }
    vendor.updated_at = Utc::now();

    Ok(Json(vendor.clone()))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn update_vendor_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Vendor>, AppError> {
    let mut vendor = state
        .vendors
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))?;

    vendor.location = Some(payload.location);
    vendor.updated_at = Utc::now();

    Ok(Json(vendor.clone()))
}
