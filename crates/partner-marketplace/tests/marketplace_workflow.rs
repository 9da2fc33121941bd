//! End-to-end marketplace scenarios driven through the public service facade and HTTP
//! router: tenant search, partner approval, booking, and commission settlement.

mod common {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use partner_marketplace::config::MarketplaceConfig;
    use partner_marketplace::marketplace::{
        AdminId, BookingRequest, Coordinates, InMemoryMarketplaceStore, MarketplaceService,
        NewPartnerService, NewPartnerUser, Partner, PartnerRegistration, PartnerRole,
        PartnerService, PartnerType, PostalAddress, StaticGeocoder, TenantId,
    };

    pub(super) type Service = MarketplaceService<InMemoryMarketplaceStore, StaticGeocoder>;

    pub(super) const PARIS: Coordinates = Coordinates::new(48.8566, 2.3522);

    pub(super) fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    pub(super) fn admin() -> AdminId {
        AdminId::from("adm-workflow")
    }

    pub(super) fn tenant() -> TenantId {
        TenantId::from("tnt-workflow")
    }

    pub(super) fn build_service() -> Service {
        let geocoder = StaticGeocoder::new().with_entry("Gare de Lyon, Paris", PARIS);
        MarketplaceService::new(
            Arc::new(InMemoryMarketplaceStore::new()),
            Arc::new(geocoder),
            MarketplaceConfig::default(),
        )
    }

    pub(super) fn register(service: &Service, company: &str, at: Coordinates) -> Partner {
        let slug = company.to_ascii_lowercase().replace(' ', "-");
        service
            .register_partner(PartnerRegistration {
                company_name: company.to_string(),
                partner_type: PartnerType::Garage,
                email: format!("hello@{slug}.example"),
                phone: None,
                address: PostalAddress {
                    street: "12 Boulevard Diderot".to_string(),
                    city: "Paris".to_string(),
                    postal_code: "75012".to_string(),
                    country: "FR".to_string(),
                },
                coordinates: Some(at),
                commission_rate: Some(dec("10")),
                owner: NewPartnerUser {
                    name: "Owner".to_string(),
                    email: format!("owner@{slug}.example"),
                    role: PartnerRole::Owner,
                },
            })
            .expect("registered")
    }

    pub(super) fn approve(service: &Service, partner: &Partner) -> Partner {
        service
            .approve_partner(&partner.id, &admin())
            .expect("approved")
    }

    pub(super) fn offer(service: &Service, partner: &Partner, price: &str) -> PartnerService {
        service
            .add_service(
                &partner.id,
                NewPartnerService {
                    name: "Full service".to_string(),
                    price: dec(price),
                    duration_minutes: 90,
                },
            )
            .expect("service")
    }

    pub(super) fn request(partner: &Partner, offered: &PartnerService) -> BookingRequest {
        BookingRequest {
            tenant_id: tenant(),
            partner_id: partner.id.clone(),
            service_id: offered.id.clone(),
            scheduled_at: Utc::now() + Duration::days(1),
            notes: None,
        }
    }
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use partner_marketplace::marketplace::{
    haversine_km, marketplace_router, CommissionStatus, Coordinates, LedgerError,
    MarketplaceError, PartnerStatus, SearchQuery, SortKey,
};

#[test]
fn tenant_books_and_platform_settles_once() {
    let service = build_service();
    let partner = approve(&service, &register(&service, "Diderot Motors", PARIS));
    let offered = offer(&service, &partner, "100");

    let results = service
        .search_partners(&SearchQuery::at(PARIS, 5.0))
        .expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].partner.id, partner.id);

    let receipt = service
        .book_service(request(&partner, &offered))
        .expect("booked");
    assert_eq!(receipt.commission.amount, dec("10.00"));
    assert_eq!(receipt.commission.status, CommissionStatus::Pending);

    let paid = service
        .mark_commission_paid(&receipt.commission.id, "REF-001")
        .expect("paid");
    assert_eq!(paid.status, CommissionStatus::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("REF-001"));
    assert_eq!(paid.amount, dec("10.00"));

    let second = service.mark_commission_paid(&receipt.commission.id, "REF-001");
    assert!(matches!(
        second,
        Err(MarketplaceError::Ledger(LedgerError::AlreadyPaid(_)))
    ));
    let settled = service
        .get_commission(&receipt.commission.id)
        .expect("commission");
    assert_eq!(settled.amount, receipt.commission.amount);
    assert_eq!(settled.paid_at, paid.paid_at);
    assert!(service
        .list_pending_commissions(None)
        .expect("pending")
        .is_empty());
}

#[test]
fn pending_partner_is_invisible_under_every_ordering() {
    let service = build_service();
    let pending = register(&service, "Pending Works", PARIS);
    assert_eq!(pending.status, PartnerStatus::Pending);

    for sort_by in [
        SortKey::Distance,
        SortKey::Rating,
        SortKey::Price,
        SortKey::Relevance,
    ] {
        let results = service
            .search_partners(&SearchQuery::at(PARIS, 10_000.0).sorted_by(sort_by))
            .expect("search");
        assert!(
            results.iter().all(|hit| hit.partner.id != pending.id),
            "pending partner leaked under {sort_by:?}"
        );
    }
}

#[test]
fn every_result_is_bookable_and_inside_the_radius() {
    let service = build_service();
    let mut index = 0;
    for lat_step in 0..5 {
        for lon_step in 0..5 {
            let at = Coordinates::new(
                48.6 + f64::from(lat_step) * 0.1,
                2.1 + f64::from(lon_step) * 0.1,
            );
            let partner = register(&service, &format!("Grid Garage {index}"), at);
            match index % 3 {
                0 => {
                    approve(&service, &partner);
                }
                1 => {
                    approve(&service, &partner);
                    service
                        .suspend_partner(&partner.id, &admin(), "grid audit")
                        .expect("suspended");
                }
                _ => {}
            }
            index += 1;
        }
    }

    for radius_km in [0.5, 5.0, 12.0, 30.0, 100.0] {
        for sort_by in [SortKey::Distance, SortKey::Relevance] {
            let results = service
                .search_partners(&SearchQuery::at(PARIS, radius_km).sorted_by(sort_by))
                .expect("search");
            for hit in &results {
                assert_eq!(hit.partner.status, PartnerStatus::Approved);
                let at = hit.partner.coordinates.expect("geocoded");
                let distance = haversine_km(PARIS, at);
                assert!(distance <= radius_km, "{distance} > {radius_km}");
                assert!((hit.distance_km - distance).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn concurrent_bookings_each_accrue_one_commission() {
    let service = build_service();
    let partner = approve(&service, &register(&service, "Busy Garage", PARIS));
    let offered = offer(&service, &partner, "89.90");

    let receipts: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = &service;
                let request = request(&partner, &offered);
                scope.spawn(move || service.book_service(request))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread").expect("booked"))
            .collect()
    });

    let mut commission_ids: Vec<_> = receipts
        .iter()
        .map(|receipt| receipt.commission.id.clone())
        .collect();
    commission_ids.sort();
    commission_ids.dedup();
    assert_eq!(commission_ids.len(), 6);
    assert!(receipts
        .iter()
        .all(|receipt| receipt.commission.amount == dec("8.99")));
    assert_eq!(
        service
            .list_pending_commissions(Some(&partner.id))
            .expect("pending")
            .len(),
        6
    );
}

#[tokio::test]
async fn address_search_through_router() {
    let service = build_service();
    let partner = approve(&service, &register(&service, "Address Garage", PARIS));
    let router = marketplace_router(Arc::new(service));

    let body = serde_json::json!({
        "address": "gare de lyon paris",
        "radius_km": 2.0,
        "type": "garage",
    });
    let response = router
        .oneshot(
            Request::post("/api/v1/marketplace/partners/search/address")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(payload["count"], 1);
    assert_eq!(
        payload["results"][0]["partner"]["id"],
        partner.id.to_string()
    );
}
