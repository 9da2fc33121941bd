use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::marketplace::domain::{
    AdminId, BookingRequest, Coordinates, NewPartnerService, NewPartnerUser, Partner,
    PartnerRegistration, PartnerRole, PartnerService, PartnerType, PostalAddress, TenantId,
};
use crate::marketplace::{
    marketplace_router, InMemoryMarketplaceStore, MarketplaceService, StaticGeocoder,
};

pub(super) const PARIS: Coordinates = Coordinates::new(48.8566, 2.3522);
pub(super) const PARIS_NORTH: Coordinates = Coordinates::new(48.8966, 2.3522);
pub(super) const LYON: Coordinates = Coordinates::new(45.7640, 4.8357);

pub(super) type TestService = MarketplaceService<InMemoryMarketplaceStore, StaticGeocoder>;

pub(super) fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

pub(super) fn admin() -> AdminId {
    AdminId::from("adm-ops")
}

pub(super) fn tenant() -> TenantId {
    TenantId::from("tnt-fleet-01")
}

pub(super) fn address(street: &str, city: &str) -> PostalAddress {
    PostalAddress {
        street: street.to_string(),
        city: city.to_string(),
        postal_code: "75001".to_string(),
        country: "FR".to_string(),
    }
}

pub(super) fn geocoder() -> StaticGeocoder {
    StaticGeocoder::new()
        .with_entry("1 Rue de Rivoli, 75001, Paris, FR", PARIS)
        .with_entry("Place Bellecour, Lyon", LYON)
}

pub(super) fn build_service() -> (TestService, Arc<InMemoryMarketplaceStore>) {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let service = MarketplaceService::new(
        store.clone(),
        Arc::new(geocoder()),
        MarketplaceConfig::default(),
    );
    (service, store)
}

pub(super) fn registration(
    company: &str,
    partner_type: PartnerType,
    coordinates: Option<Coordinates>,
) -> PartnerRegistration {
    let slug = company.to_ascii_lowercase().replace(' ', "-");
    PartnerRegistration {
        company_name: company.to_string(),
        partner_type,
        email: format!("contact@{slug}.example"),
        phone: Some("+33 1 23 45 67 89".to_string()),
        address: address("1 Rue de Rivoli", "Paris"),
        coordinates,
        commission_rate: None,
        owner: NewPartnerUser {
            name: format!("{company} Owner"),
            email: format!("owner@{slug}.example"),
            role: PartnerRole::Owner,
        },
    }
}

pub(super) fn approved_partner(
    service: &TestService,
    company: &str,
    coordinates: Coordinates,
) -> Partner {
    let partner = service
        .register_partner(registration(company, PartnerType::Garage, Some(coordinates)))
        .expect("registered");
    service
        .approve_partner(&partner.id, &admin())
        .expect("approved")
}

pub(super) fn offer(
    service: &TestService,
    partner: &Partner,
    name: &str,
    price: &str,
) -> PartnerService {
    service
        .add_service(
            &partner.id,
            NewPartnerService {
                name: name.to_string(),
                price: dec(price),
                duration_minutes: 60,
            },
        )
        .expect("service added")
}

pub(super) fn booking_request(partner: &Partner, offered: &PartnerService) -> BookingRequest {
    BookingRequest {
        tenant_id: tenant(),
        partner_id: partner.id.clone(),
        service_id: offered.id.clone(),
        scheduled_at: Utc::now() + Duration::days(2),
        notes: Some("Van 3, brake noise".to_string()),
    }
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    marketplace_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
