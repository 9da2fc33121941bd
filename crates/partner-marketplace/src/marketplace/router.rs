use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    AdminId, BookingId, BookingRequest, CommissionId, NewPartnerService, NewPartnerUser,
    PartnerId, PartnerRegistration, PartnerType, ServiceId, TenantId,
};
use super::geocode::Geocoder;
use super::lifecycle::LifecycleAction;
use super::ranking::{SearchQuery, SortKey};
use super::repository::MarketplaceStore;
use super::service::{MarketplaceError, MarketplaceService};

type Shared<S, G> = State<Arc<MarketplaceService<S, G>>>;

/// Router builder exposing the marketplace HTTP endpoints.
pub fn marketplace_router<S, G>(service: Arc<MarketplaceService<S, G>>) -> Router
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    Router::new()
        .route(
            "/api/v1/marketplace/partners",
            post(register_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/search",
            get(search_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/search/address",
            post(address_search_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id",
            get(partner_handler::<S, G>).delete(remove_partner_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/approve",
            post(approve_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/reject",
            post(reject_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/suspend",
            post(suspend_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/reactivate",
            post(reactivate_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/history",
            get(history_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/geocode",
            post(geocode_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/commission-rate",
            put(commission_rate_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/services",
            get(list_services_handler::<S, G>).post(add_service_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/users",
            get(list_users_handler::<S, G>).post(add_user_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/reviews",
            post(review_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/partners/:partner_id/preferred",
            put(preferred_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/services/:service_id",
            put(service_state_handler::<S, G>).delete(remove_service_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/bookings",
            post(book_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/bookings/:booking_id",
            get(booking_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/bookings/:booking_id/complete",
            post(complete_booking_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/bookings/:booking_id/cancel",
            post(cancel_booking_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/commissions/pending",
            get(pending_commissions_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/commissions/:commission_id",
            get(commission_handler::<S, G>),
        )
        .route(
            "/api/v1/marketplace/commissions/:commission_id/pay",
            post(pay_commission_handler::<S, G>),
        )
        .with_state(service)
}

/// Error body shared by every handler; `kind` is stable across message changes.
pub(crate) fn error_response(error: MarketplaceError) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        tracing::error!(%error, "marketplace request failed");
    }
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, MarketplaceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressSearchRequest {
    pub address: String,
    pub radius_km: f64,
    #[serde(default, rename = "type")]
    pub partner_type: Option<PartnerType>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminActionRequest {
    pub admin_id: AdminId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommissionRateRequest {
    pub commission_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceStateRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub tenant_id: TenantId,
    pub rating: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreferredRequest {
    pub tenant_id: TenantId,
    pub preferred: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    pub payment_reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingFilter {
    #[serde(default)]
    pub partner_id: Option<PartnerId>,
}

pub(crate) async fn search_handler<S, G>(
    State(service): Shared<S, G>,
    Query(query): Query<SearchQuery>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    match service.search_partners(&query) {
        Ok(results) => {
            let payload = json!({
                "count": results.len(),
                "results": results,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn address_search_handler<S, G>(
    State(service): Shared<S, G>,
    Json(request): Json<AddressSearchRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    let mut query = SearchQuery::new(0.0, 0.0, request.radius_km).sorted_by(request.sort_by);
    query.partner_type = request.partner_type;
    query.min_rating = request.min_rating;
    query.service = request.service;
    query.limit = request.limit;
    query.tenant_id = request.tenant_id;

    match service.search_near_address(&request.address, query) {
        Ok(results) => {
            let payload = json!({
                "count": results.len(),
                "results": results,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_handler<S, G>(
    State(service): Shared<S, G>,
    Json(registration): Json<PartnerRegistration>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::CREATED, service.register_partner(registration))
}

pub(crate) async fn partner_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.get_partner(&PartnerId(partner_id)))
}

pub(crate) async fn remove_partner_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.remove_partner(&PartnerId(partner_id)))
}

fn apply_action<S, G>(
    service: &MarketplaceService<S, G>,
    partner_id: String,
    admin_id: &AdminId,
    action: LifecycleAction,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.transition(&PartnerId(partner_id), admin_id, action),
    )
}

pub(crate) async fn approve_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<AdminActionRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    apply_action(&service, partner_id, &request.admin_id, LifecycleAction::Approve)
}

pub(crate) async fn reject_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<AdminActionRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    let action = LifecycleAction::Reject {
        reason: request.reason.unwrap_or_default(),
    };
    apply_action(&service, partner_id, &request.admin_id, action)
}

pub(crate) async fn suspend_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<AdminActionRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    let action = LifecycleAction::Suspend {
        reason: request.reason.unwrap_or_default(),
    };
    apply_action(&service, partner_id, &request.admin_id, action)
}

pub(crate) async fn reactivate_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<AdminActionRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    apply_action(&service, partner_id, &request.admin_id, LifecycleAction::Reactivate)
}

pub(crate) async fn history_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.status_history(&PartnerId(partner_id)))
}

pub(crate) async fn geocode_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.geocode_partner(&PartnerId(partner_id)))
}

pub(crate) async fn commission_rate_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<CommissionRateRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.update_commission_rate(&PartnerId(partner_id), request.commission_rate),
    )
}

pub(crate) async fn list_services_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.partner_services(&PartnerId(partner_id)))
}

pub(crate) async fn add_service_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<NewPartnerService>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::CREATED,
        service.add_service(&PartnerId(partner_id), request),
    )
}

pub(crate) async fn list_users_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.partner_users(&PartnerId(partner_id)))
}

pub(crate) async fn add_user_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<NewPartnerUser>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::CREATED,
        service.add_partner_user(&PartnerId(partner_id), request),
    )
}

pub(crate) async fn review_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.record_review(&request.tenant_id, &PartnerId(partner_id), request.rating),
    )
}

pub(crate) async fn preferred_handler<S, G>(
    State(service): Shared<S, G>,
    Path(partner_id): Path<String>,
    Json(request): Json<PreferredRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    let partner_id = PartnerId(partner_id);
    match service.set_preferred_partner(&request.tenant_id, &partner_id, request.preferred) {
        Ok(()) => {
            let payload = json!({
                "tenant_id": request.tenant_id,
                "partner_id": partner_id,
                "is_preferred": request.preferred,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn service_state_handler<S, G>(
    State(service): Shared<S, G>,
    Path(service_id): Path<String>,
    Json(request): Json<ServiceStateRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.set_service_active(&ServiceId(service_id), request.is_active),
    )
}

pub(crate) async fn remove_service_handler<S, G>(
    State(service): Shared<S, G>,
    Path(service_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.remove_service(&ServiceId(service_id)))
}

pub(crate) async fn book_handler<S, G>(
    State(service): Shared<S, G>,
    Json(request): Json<BookingRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::CREATED, service.book_service(request))
}

pub(crate) async fn booking_handler<S, G>(
    State(service): Shared<S, G>,
    Path(booking_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.get_booking(&BookingId(booking_id)))
}

pub(crate) async fn complete_booking_handler<S, G>(
    State(service): Shared<S, G>,
    Path(booking_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.complete_booking(&BookingId(booking_id)))
}

pub(crate) async fn cancel_booking_handler<S, G>(
    State(service): Shared<S, G>,
    Path(booking_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(StatusCode::OK, service.cancel_booking(&BookingId(booking_id)))
}

pub(crate) async fn pending_commissions_handler<S, G>(
    State(service): Shared<S, G>,
    Query(filter): Query<PendingFilter>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.list_pending_commissions(filter.partner_id.as_ref()),
    )
}

pub(crate) async fn commission_handler<S, G>(
    State(service): Shared<S, G>,
    Path(commission_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.get_commission(&CommissionId(commission_id)),
    )
}

pub(crate) async fn pay_commission_handler<S, G>(
    State(service): Shared<S, G>,
    Path(commission_id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    respond(
        StatusCode::OK,
        service.mark_commission_paid(&CommissionId(commission_id), &request.payment_reference),
    )
}
