use super::common::*;
use axum::http::StatusCode;

use crate::marketplace::domain::{NewPartnerUser, PartnerRole, PartnerStatus, PartnerType};
use crate::marketplace::{MarketplaceError, PartnerRepository, TransitionError};

#[test]
fn registration_starts_pending_with_owner_and_default_rate() {
    let (service, store) = build_service();

    let partner = service
        .register_partner(registration("Atelier Nord", PartnerType::Garage, Some(PARIS)))
        .expect("registered");

    assert_eq!(partner.status, PartnerStatus::Pending);
    assert_eq!(partner.commission_rate, dec("10"));
    assert_eq!(partner.total_reviews, 0);
    let users = store.users_for(&partner.id).expect("users");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, PartnerRole::Owner);
    assert_eq!(users[0].email, "owner@atelier-nord.example");
}

#[test]
fn registration_rejects_bad_input() {
    let (service, _) = build_service();

    let mut blank = registration("Blank Garage", PartnerType::Garage, None);
    blank.company_name = "   ".to_string();
    assert!(matches!(
        service.register_partner(blank),
        Err(MarketplaceError::Validation(_))
    ));

    let mut bad_email = registration("Mail Garage", PartnerType::Garage, None);
    bad_email.email = "not-an-email".to_string();
    assert!(matches!(
        service.register_partner(bad_email),
        Err(MarketplaceError::Validation(_))
    ));

    let mut bad_rate = registration("Rate Garage", PartnerType::Garage, None);
    bad_rate.commission_rate = Some(dec("120"));
    assert!(matches!(
        service.register_partner(bad_rate),
        Err(MarketplaceError::Validation(_))
    ));

    service
        .register_partner(registration("Twin Garage", PartnerType::Garage, None))
        .expect("first registration");
    let error = service
        .register_partner(registration("Twin Garage", PartnerType::Garage, None))
        .expect_err("duplicate email");
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
}

#[test]
fn approval_is_recorded_with_admin() {
    let (service, _) = build_service();
    let partner = service
        .register_partner(registration("Audit Garage", PartnerType::Garage, Some(PARIS)))
        .expect("registered");

    let approved = service
        .approve_partner(&partner.id, &admin())
        .expect("approved");

    assert_eq!(approved.status, PartnerStatus::Approved);
    let history = service.status_history(&partner.id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, PartnerStatus::Pending);
    assert_eq!(history[0].to, PartnerStatus::Approved);
    assert_eq!(history[0].admin_id, admin());
    assert_eq!(history[0].reason, None);
}

#[test]
fn repeated_action_is_a_silent_no_op() {
    let (service, _) = build_service();
    let partner = approved_partner(&service, "Idempotent Garage", PARIS);

    let again = service
        .approve_partner(&partner.id, &admin())
        .expect("no-op");

    assert_eq!(again.status, PartnerStatus::Approved);
    assert_eq!(service.status_history(&partner.id).expect("history").len(), 1);
}

#[test]
fn reject_and_suspend_require_a_reason() {
    let (service, _) = build_service();
    let pending = service
        .register_partner(registration("Reasonless Garage", PartnerType::Garage, None))
        .expect("registered");

    let error = service
        .reject_partner(&pending.id, &admin(), "  ")
        .expect_err("reason required");
    assert!(matches!(
        error,
        MarketplaceError::Transition(TransitionError::MissingReason { .. })
    ));
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        service.get_partner(&pending.id).expect("partner").status,
        PartnerStatus::Pending
    );

    let approved = approved_partner(&service, "Suspend Me Garage", PARIS);
    assert!(service
        .suspend_partner(&approved.id, &admin(), "")
        .is_err());
}

#[test]
fn disallowed_transitions_conflict() {
    let (service, _) = build_service();
    let rejected = service
        .register_partner(registration("Closed Garage", PartnerType::Garage, None))
        .expect("registered");
    service
        .reject_partner(&rejected.id, &admin(), "duplicate listing")
        .expect("rejected");

    let error = service
        .approve_partner(&rejected.id, &admin())
        .expect_err("rejected is terminal");
    assert!(matches!(
        error,
        MarketplaceError::Transition(TransitionError::InvalidTransition { .. })
    ));
    assert_eq!(error.status_code(), StatusCode::CONFLICT);

    let pending = service
        .register_partner(registration("Early Garage", PartnerType::Garage, None))
        .expect("registered");
    assert!(service
        .suspend_partner(&pending.id, &admin(), "too early")
        .is_err());
    assert!(service.reactivate_partner(&pending.id, &admin()).is_err());
}

#[test]
fn suspend_and_reactivate_round_trip_through_history() {
    let (service, _) = build_service();
    let partner = approved_partner(&service, "Cycle Garage", PARIS);

    service
        .suspend_partner(&partner.id, &admin(), "late invoices")
        .expect("suspended");
    let reactivated = service
        .reactivate_partner(&partner.id, &admin())
        .expect("reactivated");

    assert_eq!(reactivated.status, PartnerStatus::Approved);
    let history = service.status_history(&partner.id).expect("history");
    let moves: Vec<(PartnerStatus, PartnerStatus)> =
        history.iter().map(|change| (change.from, change.to)).collect();
    assert_eq!(
        moves,
        vec![
            (PartnerStatus::Pending, PartnerStatus::Approved),
            (PartnerStatus::Approved, PartnerStatus::Suspended),
            (PartnerStatus::Suspended, PartnerStatus::Approved),
        ]
    );
    assert_eq!(history[1].reason.as_deref(), Some("late invoices"));
}

#[test]
fn removed_partners_cannot_transition() {
    let (service, _) = build_service();
    let partner = approved_partner(&service, "Gone Garage", PARIS);
    service.remove_partner(&partner.id).expect("removed");

    let error = service
        .suspend_partner(&partner.id, &admin(), "gone")
        .expect_err("removed");
    assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn partner_users_and_catalogue_management() {
    let (service, _) = build_service();
    let partner = approved_partner(&service, "Staffed Garage", PARIS);

    service
        .add_partner_user(
            &partner.id,
            NewPartnerUser {
                name: "Front Desk".to_string(),
                email: "desk@staffed-garage.example".to_string(),
                role: PartnerRole::Employee,
            },
        )
        .expect("user added");
    assert_eq!(service.partner_users(&partner.id).expect("users").len(), 2);

    let offered = offer(&service, &partner, "Diagnostics", "55.00");
    service.remove_service(&offered.id).expect("removed");
    assert!(service
        .partner_services(&partner.id)
        .expect("services")
        .is_empty());
    assert!(service.set_service_active(&offered.id, true).is_err());

    let updated = service
        .update_commission_rate(&partner.id, dec("12.5"))
        .expect("rate updated");
    assert_eq!(updated.commission_rate, dec("12.5"));
    assert!(service
        .update_commission_rate(&partner.id, dec("-1"))
        .is_err());
}

#[test]
fn reviews_fold_into_running_average() {
    let (service, _) = build_service();
    let partner = approved_partner(&service, "Reviewed Garage", PARIS);

    service.record_review(&tenant(), &partner.id, 5).expect("review");
    let updated = service.record_review(&tenant(), &partner.id, 2).expect("review");

    assert_eq!(updated.total_reviews, 2);
    assert!((updated.rating - 3.5).abs() < 1e-9);
    assert!(matches!(
        service.record_review(&tenant(), &partner.id, 6),
        Err(MarketplaceError::Validation(_))
    ));
    assert!(service.record_review(&tenant(), &partner.id, 0).is_err());
}
