use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::booking::{BookingError, BookingOrchestrator, BookingReceipt};
use super::domain::{
    AdminId, Booking, BookingId, BookingRequest, Commission, CommissionId, NewPartnerService,
    NewPartnerUser, Partner, PartnerId, PartnerRegistration, PartnerReview, PartnerService,
    PartnerStatus, PartnerStatusChange, PartnerUser, PartnerUserId, ServiceId, TenantId,
    TenantPartnerRelation,
};
use super::geocode::{GeocodeError, Geocoder};
use super::ledger::{CommissionLedger, LedgerError};
use super::lifecycle::{self, LifecycleAction, Transition, TransitionError};
use super::ranking::{RankedPartner, RankingEngine, SearchError, SearchQuery};
use super::repository::{MarketplaceStore, RepositoryError};
use crate::config::MarketplaceConfig;

/// Error raised by the marketplace service.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MarketplaceError {
    fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable, caller-facing classification of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketplaceError::Validation(_) => "validation",
            MarketplaceError::NotFound { .. } => "not_found",
            MarketplaceError::Search(SearchError::InvalidOrigin(_) | SearchError::InvalidQuery(_)) => {
                "invalid_query"
            }
            MarketplaceError::Search(SearchError::Repository(error)) => repository_kind(error),
            MarketplaceError::Transition(TransitionError::InvalidTransition { .. }) => {
                "invalid_transition"
            }
            MarketplaceError::Transition(TransitionError::MissingReason { .. }) => "validation",
            MarketplaceError::Booking(error) => match error {
                BookingError::PartnerNotFound(_)
                | BookingError::ServiceNotFound(_)
                | BookingError::BookingNotFound(_) => "not_found",
                BookingError::PartnerUnavailable { .. } => "partner_unavailable",
                BookingError::ServiceUnavailable { .. } => "service_unavailable",
                BookingError::InvalidSchedule { .. } => "invalid_schedule",
                BookingError::InvalidStatusChange { .. } => "invalid_transition",
                BookingError::Ledger(error) => ledger_kind(error),
                BookingError::Repository(error) => repository_kind(error),
            },
            MarketplaceError::Ledger(error) => ledger_kind(error),
            MarketplaceError::Geocode(GeocodeError::NotFound(_)) => "geocode_not_found",
            MarketplaceError::Geocode(GeocodeError::Unavailable(_)) => "unavailable",
            MarketplaceError::Repository(error) => repository_kind(error),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            "validation" | "invalid_query" => StatusCode::BAD_REQUEST,
            "not_found" | "geocode_not_found" => StatusCode::NOT_FOUND,
            "invalid_transition" | "already_paid" | "conflict" => StatusCode::CONFLICT,
            "partner_unavailable" | "service_unavailable" | "invalid_schedule" => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn ledger_kind(error: &LedgerError) -> &'static str {
    match error {
        LedgerError::AlreadyPaid(_) => "already_paid",
        LedgerError::CommissionNotFound(_) | LedgerError::BookingNotFound(_) => "not_found",
        LedgerError::PartnerMismatch { .. }
        | LedgerError::NegativeAmount(_)
        | LedgerError::EmptyPaymentReference => "validation",
        LedgerError::Repository(error) => repository_kind(error),
    }
}

fn repository_kind(error: &RepositoryError) -> &'static str {
    match error {
        RepositoryError::Conflict => "conflict",
        RepositoryError::NotFound => "not_found",
        RepositoryError::Unavailable(_) => "unavailable",
        RepositoryError::Invalid(_) => "validation",
    }
}

/// Facade exposing every marketplace operation to the HTTP and CLI layers.
pub struct MarketplaceService<S, G> {
    store: Arc<S>,
    geocoder: Arc<G>,
    config: MarketplaceConfig,
    ranking: RankingEngine,
    bookings: BookingOrchestrator<S>,
    ledger: CommissionLedger<S>,
}

impl<S, G> MarketplaceService<S, G>
where
    S: MarketplaceStore + 'static,
    G: Geocoder + 'static,
{
    pub fn new(store: Arc<S>, geocoder: Arc<G>, config: MarketplaceConfig) -> Self {
        let ranking = RankingEngine::new(config.relevance_weights);
        Self {
            bookings: BookingOrchestrator::new(store.clone()),
            ledger: CommissionLedger::new(store.clone()),
            store,
            geocoder,
            config,
            ranking,
        }
    }

    pub fn ledger(&self) -> &CommissionLedger<S> {
        &self.ledger
    }

    pub fn bookings(&self) -> &BookingOrchestrator<S> {
        &self.bookings
    }

    // --- partner catalogue -------------------------------------------------

    /// Register a partner in `pending` together with its owner account.
    pub fn register_partner(
        &self,
        registration: PartnerRegistration,
    ) -> Result<Partner, MarketplaceError> {
        let company_name = registration.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(MarketplaceError::Validation(
                "company name must not be empty".to_string(),
            ));
        }
        let email = validate_email(&registration.email)?;
        if let Some(coordinates) = &registration.coordinates {
            coordinates
                .validate()
                .map_err(|error| MarketplaceError::Validation(error.to_string()))?;
        }
        let commission_rate = registration
            .commission_rate
            .unwrap_or(self.config.default_commission_rate);
        validate_rate(commission_rate)?;
        let owner_email = validate_email(&registration.owner.email)?;
        validate_name(&registration.owner.name)?;

        let now = Utc::now();
        let partner = Partner {
            id: PartnerId::next(),
            company_name,
            partner_type: registration.partner_type,
            email,
            phone: registration
                .phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
            address: registration.address,
            coordinates: registration.coordinates,
            commission_rate,
            rating: 0.0,
            total_reviews: 0,
            status: PartnerStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let owner = PartnerUser {
            id: PartnerUserId::next(),
            partner_id: partner.id.clone(),
            name: registration.owner.name.trim().to_string(),
            email: owner_email,
            role: registration.owner.role,
            created_at: now,
        };

        let partner = self
            .store
            .insert_partner(partner, owner)
            .map_err(|error| match error {
                RepositoryError::Conflict => MarketplaceError::Validation(format!(
                    "a partner with email {} is already registered",
                    registration.email.trim()
                )),
                other => other.into(),
            })?;

        info!(
            partner_id = %partner.id,
            partner_type = partner.partner_type.label(),
            geocoded = partner.coordinates.is_some(),
            "partner registered"
        );
        Ok(partner)
    }

    pub fn get_partner(&self, partner_id: &PartnerId) -> Result<Partner, MarketplaceError> {
        self.store
            .fetch_partner(partner_id)?
            .ok_or_else(|| MarketplaceError::not_found("partner", partner_id))
    }

    pub fn add_partner_user(
        &self,
        partner_id: &PartnerId,
        user: NewPartnerUser,
    ) -> Result<PartnerUser, MarketplaceError> {
        let partner = self.live_partner(partner_id)?;
        validate_name(&user.name)?;
        let email = validate_email(&user.email)?;
        let user = PartnerUser {
            id: PartnerUserId::next(),
            partner_id: partner.id,
            name: user.name.trim().to_string(),
            email,
            role: user.role,
            created_at: Utc::now(),
        };
        self.store.insert_user(user).map_err(|error| match error {
            RepositoryError::Conflict => {
                MarketplaceError::Validation("user email already exists for partner".to_string())
            }
            other => other.into(),
        })
    }

    pub fn partner_users(&self, partner_id: &PartnerId) -> Result<Vec<PartnerUser>, MarketplaceError> {
        self.get_partner(partner_id)?;
        Ok(self.store.users_for(partner_id)?)
    }

    pub fn add_service(
        &self,
        partner_id: &PartnerId,
        service: NewPartnerService,
    ) -> Result<PartnerService, MarketplaceError> {
        let partner = self.live_partner(partner_id)?;
        validate_name(&service.name)?;
        if service.price < Decimal::ZERO {
            return Err(MarketplaceError::Validation(
                "service price must not be negative".to_string(),
            ));
        }
        if service.duration_minutes == 0 {
            return Err(MarketplaceError::Validation(
                "service duration must be positive".to_string(),
            ));
        }

        let service = self.store.insert_service(PartnerService {
            id: ServiceId::next(),
            partner_id: partner.id,
            name: service.name.trim().to_string(),
            price: service.price,
            duration_minutes: service.duration_minutes,
            is_active: true,
            deleted_at: None,
        })?;
        info!(service_id = %service.id, partner_id = %service.partner_id, price = %service.price, "partner service added");
        Ok(service)
    }

    pub fn partner_services(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Vec<PartnerService>, MarketplaceError> {
        self.get_partner(partner_id)?;
        Ok(self
            .store
            .services_for(partner_id)?
            .into_iter()
            .filter(|service| service.deleted_at.is_none())
            .collect())
    }

    pub fn set_service_active(
        &self,
        service_id: &ServiceId,
        active: bool,
    ) -> Result<PartnerService, MarketplaceError> {
        let mut service = self.live_service(service_id)?;
        service.is_active = active;
        self.store.update_service(service.clone())?;
        Ok(service)
    }

    pub fn remove_service(&self, service_id: &ServiceId) -> Result<PartnerService, MarketplaceError> {
        let mut service = self.live_service(service_id)?;
        service.deleted_at = Some(Utc::now());
        self.store.update_service(service.clone())?;
        info!(%service_id, "partner service removed");
        Ok(service)
    }

    /// Fill missing coordinates from the postal address.
    pub fn geocode_partner(&self, partner_id: &PartnerId) -> Result<Partner, MarketplaceError> {
        let address = self.live_partner(partner_id)?.address.one_line();
        let coordinates = self.geocoder.geocode(&address)?;
        coordinates
            .validate()
            .map_err(|error| MarketplaceError::Validation(error.to_string()))?;
        let partner = self.edit_live_partner(partner_id, |partner| {
            partner.coordinates = Some(coordinates);
        })?;
        info!(%partner_id, lat = coordinates.latitude, lon = coordinates.longitude, "partner geocoded");
        Ok(partner)
    }

    /// Only future bookings see the new rate; accrued commissions keep their amount.
    pub fn update_commission_rate(
        &self,
        partner_id: &PartnerId,
        rate: Decimal,
    ) -> Result<Partner, MarketplaceError> {
        validate_rate(rate)?;
        let partner = self.edit_live_partner(partner_id, |partner| {
            partner.commission_rate = rate;
        })?;
        info!(%partner_id, %rate, "commission rate updated");
        Ok(partner)
    }

    /// Soft delete; removed partners drop out of search and booking.
    pub fn remove_partner(&self, partner_id: &PartnerId) -> Result<Partner, MarketplaceError> {
        let (partner, removed) = self
            .store
            .modify_partner(partner_id, |partner| -> Result<_, MarketplaceError> {
                if partner.is_deleted() {
                    return Ok((partner.clone(), false));
                }
                let now = Utc::now();
                partner.deleted_at = Some(now);
                partner.updated_at = now;
                Ok((partner.clone(), true))
            })
            .map_err(|error| missing_partner(error, partner_id))?;
        if removed {
            info!(%partner_id, "partner removed");
        }
        Ok(partner)
    }

    // --- lifecycle -----------------------------------------------------------

    pub fn approve_partner(
        &self,
        partner_id: &PartnerId,
        admin_id: &AdminId,
    ) -> Result<Partner, MarketplaceError> {
        self.transition(partner_id, admin_id, LifecycleAction::Approve)
    }

    pub fn reject_partner(
        &self,
        partner_id: &PartnerId,
        admin_id: &AdminId,
        reason: &str,
    ) -> Result<Partner, MarketplaceError> {
        self.transition(
            partner_id,
            admin_id,
            LifecycleAction::Reject {
                reason: reason.to_string(),
            },
        )
    }

    pub fn suspend_partner(
        &self,
        partner_id: &PartnerId,
        admin_id: &AdminId,
        reason: &str,
    ) -> Result<Partner, MarketplaceError> {
        self.transition(
            partner_id,
            admin_id,
            LifecycleAction::Suspend {
                reason: reason.to_string(),
            },
        )
    }

    pub fn reactivate_partner(
        &self,
        partner_id: &PartnerId,
        admin_id: &AdminId,
    ) -> Result<Partner, MarketplaceError> {
        self.transition(partner_id, admin_id, LifecycleAction::Reactivate)
    }

    /// Apply an admin action. Re-applying the current state is a silent no-op.
    pub fn transition(
        &self,
        partner_id: &PartnerId,
        admin_id: &AdminId,
        action: LifecycleAction,
    ) -> Result<Partner, MarketplaceError> {
        // status is read and written under the store lock
        let (partner, outcome) = self
            .store
            .modify_partner(partner_id, |partner| -> Result<_, MarketplaceError> {
                if partner.is_deleted() {
                    return Err(MarketplaceError::not_found("partner", partner_id));
                }
                let outcome = lifecycle::apply(partner.status, &action)?;
                if let Transition::Applied { to, .. } = outcome {
                    partner.status = to;
                    partner.updated_at = Utc::now();
                }
                Ok((partner.clone(), outcome))
            })
            .map_err(|error| missing_partner(error, partner_id))?;

        match outcome {
            Transition::Unchanged(status) => {
                info!(%partner_id, status = status.label(), action = action.name(), "lifecycle action already applied");
                Ok(partner)
            }
            Transition::Applied { from, to } => {
                self.store.record_status_change(PartnerStatusChange {
                    partner_id: partner.id.clone(),
                    from,
                    to,
                    admin_id: admin_id.clone(),
                    reason: action.reason().map(|reason| reason.trim().to_string()),
                    changed_at: partner.updated_at,
                })?;
                info!(
                    %partner_id,
                    %admin_id,
                    from = from.label(),
                    to = to.label(),
                    "partner status changed"
                );
                Ok(partner)
            }
        }
    }

    pub fn status_history(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Vec<PartnerStatusChange>, MarketplaceError> {
        self.get_partner(partner_id)?;
        Ok(self.store.status_history(partner_id)?)
    }

    // --- search ----------------------------------------------------------------

    pub fn search_partners(&self, query: &SearchQuery) -> Result<Vec<RankedPartner>, MarketplaceError> {
        let mut results = self.ranking.search(self.store.as_ref(), query)?;
        if let Some(tenant_id) = &query.tenant_id {
            self.attach_relations(tenant_id, &mut results)?;
        }
        info!(
            lat = query.lat,
            lon = query.lon,
            radius_km = query.radius_km,
            results = results.len(),
            "partner search completed"
        );
        Ok(results)
    }

    /// Geocode `address` first, then search around it with the rest of `query`.
    pub fn search_near_address(
        &self,
        address: &str,
        mut query: SearchQuery,
    ) -> Result<Vec<RankedPartner>, MarketplaceError> {
        if address.trim().is_empty() {
            return Err(MarketplaceError::Validation(
                "address must not be empty".to_string(),
            ));
        }
        let origin = self.geocoder.geocode(address).map_err(|error| {
            warn!(address, %error, "address lookup failed");
            error
        })?;
        query.lat = origin.latitude;
        query.lon = origin.longitude;
        self.search_partners(&query)
    }

    fn attach_relations(
        &self,
        tenant_id: &TenantId,
        results: &mut [RankedPartner],
    ) -> Result<(), MarketplaceError> {
        let mut history: BTreeMap<PartnerId, (u32, Option<DateTime<Utc>>)> = BTreeMap::new();
        for booking in self.store.bookings_for_tenant(tenant_id)? {
            let entry = history.entry(booking.partner_id).or_insert((0, None));
            entry.0 += 1;
            entry.1 = entry.1.max(Some(booking.created_at));
        }

        let preferred: HashSet<PartnerId> =
            self.store.preferred_partners(tenant_id)?.into_iter().collect();

        let mut ratings: BTreeMap<PartnerId, (DateTime<Utc>, u8)> = BTreeMap::new();
        for review in self.store.tenant_reviews(tenant_id)? {
            let slot = ratings
                .entry(review.partner_id)
                .or_insert((review.created_at, review.rating));
            if review.created_at >= slot.0 {
                *slot = (review.created_at, review.rating);
            }
        }

        for result in results.iter_mut() {
            let id = &result.partner.id;
            let (booking_count, last_booking_at) = history.get(id).copied().unwrap_or((0, None));
            result.relation = Some(TenantPartnerRelation {
                tenant_id: tenant_id.clone(),
                partner_id: id.clone(),
                distance_km: result.distance_km,
                is_preferred: preferred.contains(id),
                tenant_rating: ratings.get(id).map(|(_, rating)| *rating),
                booking_count,
                last_booking_at,
            });
        }
        Ok(())
    }

    // --- tenant feedback ---------------------------------------------------------

    pub fn record_review(
        &self,
        tenant_id: &TenantId,
        partner_id: &PartnerId,
        rating: u8,
    ) -> Result<Partner, MarketplaceError> {
        if !(1..=5).contains(&rating) {
            return Err(MarketplaceError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        self.live_partner(partner_id)?;
        let partner = self.store.record_review(PartnerReview {
            tenant_id: tenant_id.clone(),
            partner_id: partner_id.clone(),
            rating,
            created_at: Utc::now(),
        })?;
        info!(%partner_id, %tenant_id, rating, average = partner.rating, "partner review recorded");
        Ok(partner)
    }

    pub fn set_preferred_partner(
        &self,
        tenant_id: &TenantId,
        partner_id: &PartnerId,
        preferred: bool,
    ) -> Result<(), MarketplaceError> {
        self.live_partner(partner_id)?;
        Ok(self.store.set_preferred(tenant_id, partner_id, preferred)?)
    }

    // --- bookings & commissions --------------------------------------------------

    pub fn book_service(&self, request: BookingRequest) -> Result<BookingReceipt, MarketplaceError> {
        Ok(self.bookings.book(request)?)
    }

    pub fn get_booking(&self, booking_id: &BookingId) -> Result<Booking, MarketplaceError> {
        Ok(self.bookings.get(booking_id)?)
    }

    pub fn complete_booking(&self, booking_id: &BookingId) -> Result<Booking, MarketplaceError> {
        Ok(self.bookings.complete(booking_id)?)
    }

    pub fn cancel_booking(&self, booking_id: &BookingId) -> Result<Booking, MarketplaceError> {
        Ok(self.bookings.cancel(booking_id)?)
    }

    pub fn mark_commission_paid(
        &self,
        commission_id: &CommissionId,
        payment_reference: &str,
    ) -> Result<Commission, MarketplaceError> {
        Ok(self.ledger.mark_paid(commission_id, payment_reference)?)
    }

    pub fn get_commission(&self, commission_id: &CommissionId) -> Result<Commission, MarketplaceError> {
        Ok(self.ledger.get(commission_id)?)
    }

    pub fn list_pending_commissions(
        &self,
        partner_id: Option<&PartnerId>,
    ) -> Result<Vec<Commission>, MarketplaceError> {
        Ok(self.ledger.pending(partner_id)?)
    }

    fn live_partner(&self, partner_id: &PartnerId) -> Result<Partner, MarketplaceError> {
        let partner = self.get_partner(partner_id)?;
        if partner.is_deleted() {
            return Err(MarketplaceError::not_found("partner", partner_id));
        }
        Ok(partner)
    }

    /// Apply a field edit to the stored partner atomically. Removed partners are not found.
    fn edit_live_partner<F>(
        &self,
        partner_id: &PartnerId,
        edit: F,
    ) -> Result<Partner, MarketplaceError>
    where
        F: FnOnce(&mut Partner),
    {
        self.store
            .modify_partner(partner_id, |partner| -> Result<_, MarketplaceError> {
                if partner.is_deleted() {
                    return Err(MarketplaceError::not_found("partner", partner_id));
                }
                edit(partner);
                partner.updated_at = Utc::now();
                Ok(partner.clone())
            })
            .map_err(|error| missing_partner(error, partner_id))
    }

    fn live_service(&self, service_id: &ServiceId) -> Result<PartnerService, MarketplaceError> {
        self.store
            .fetch_service(service_id)?
            .filter(|service| service.deleted_at.is_none())
            .ok_or_else(|| MarketplaceError::not_found("service", service_id))
    }
}

fn missing_partner(error: MarketplaceError, partner_id: &PartnerId) -> MarketplaceError {
    match error {
        MarketplaceError::Repository(RepositoryError::NotFound) => {
            MarketplaceError::not_found("partner", partner_id)
        }
        other => other,
    }
}

fn validate_email(raw: &str) -> Result<String, MarketplaceError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(email.to_ascii_lowercase())
    } else {
        Err(MarketplaceError::Validation(format!(
            "'{email}' is not a valid email address"
        )))
    }
}

fn validate_name(raw: &str) -> Result<(), MarketplaceError> {
    if raw.trim().is_empty() {
        Err(MarketplaceError::Validation("name must not be empty".to_string()))
    } else {
        Ok(())
    }
}

fn validate_rate(rate: Decimal) -> Result<(), MarketplaceError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        Err(MarketplaceError::Validation(format!(
            "commission rate must be between 0 and 100 (got {rate})"
        )))
    } else {
        Ok(())
    }
}
