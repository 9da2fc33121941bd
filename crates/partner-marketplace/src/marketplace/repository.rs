use chrono::{DateTime, Utc};

use super::domain::{
    Booking, BookingId, Commission, CommissionId, Partner, PartnerId, PartnerReview,
    PartnerService, PartnerStatusChange, PartnerUser, ServiceId, TenantId,
};

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("record rejected: {0}")]
    Invalid(String),
}

/// Partner catalogue: partners, their services, staff, reviews and tenant preferences.
pub trait PartnerRepository: Send + Sync {
    /// Stores the partner together with its owner account, or neither. Fails with
    /// `Conflict` when the email (case-insensitive) is already registered.
    fn insert_partner(&self, partner: Partner, owner: PartnerUser)
        -> Result<Partner, RepositoryError>;
    /// Read-modify-write of one partner under the catalogue write lock. `change` sees
    /// the current record; nothing is stored when it fails. Unknown ids fail with
    /// `NotFound`.
    fn modify_partner<T, E, F>(&self, id: &PartnerId, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut Partner) -> Result<T, E>,
        E: From<RepositoryError>;
    fn fetch_partner(&self, id: &PartnerId) -> Result<Option<Partner>, RepositoryError>;
    /// Every stored partner, soft-deleted ones included.
    fn partners(&self) -> Result<Vec<Partner>, RepositoryError>;

    fn insert_service(&self, service: PartnerService) -> Result<PartnerService, RepositoryError>;
    fn update_service(&self, service: PartnerService) -> Result<(), RepositoryError>;
    fn fetch_service(&self, id: &ServiceId) -> Result<Option<PartnerService>, RepositoryError>;
    fn services_for(&self, partner_id: &PartnerId) -> Result<Vec<PartnerService>, RepositoryError>;

    fn insert_user(&self, user: PartnerUser) -> Result<PartnerUser, RepositoryError>;
    fn users_for(&self, partner_id: &PartnerId) -> Result<Vec<PartnerUser>, RepositoryError>;

    fn record_status_change(&self, change: PartnerStatusChange) -> Result<(), RepositoryError>;
    fn status_history(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Vec<PartnerStatusChange>, RepositoryError>;

    /// Folds the review into the partner's running average in one step.
    fn record_review(&self, review: PartnerReview) -> Result<Partner, RepositoryError>;
    fn tenant_reviews(&self, tenant_id: &TenantId) -> Result<Vec<PartnerReview>, RepositoryError>;
    fn set_preferred(
        &self,
        tenant_id: &TenantId,
        partner_id: &PartnerId,
        preferred: bool,
    ) -> Result<(), RepositoryError>;
    fn preferred_partners(&self, tenant_id: &TenantId) -> Result<Vec<PartnerId>, RepositoryError>;
}

/// Writes visible inside a ledger transaction. Nothing is observable outside until commit.
pub trait LedgerUnitOfWork {
    fn booking(&self, id: &BookingId) -> Option<Booking>;
    fn insert_booking(&mut self, booking: Booking) -> Result<(), RepositoryError>;
    fn commission_for_booking(&self, booking_id: &BookingId) -> Option<Commission>;
    fn insert_commission(&mut self, commission: Commission) -> Result<(), RepositoryError>;
}

pub trait BookingRepository: Send + Sync {
    /// Run `work` atomically: its staged writes commit on `Ok` and are discarded on `Err`.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerUnitOfWork) -> Result<T, E>,
        E: From<RepositoryError>;

    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;
    /// Read-modify-write of one booking under the ledger lock, same contract as
    /// [`PartnerRepository::modify_partner`].
    fn modify_booking<T, E, F>(&self, id: &BookingId, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut Booking) -> Result<T, E>,
        E: From<RepositoryError>;
    fn bookings_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Booking>, RepositoryError>;
}

/// Outcome of the pending to paid compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Settled(Commission),
    AlreadyPaid(Commission),
}

pub trait CommissionRepository: Send + Sync {
    fn fetch_commission(&self, id: &CommissionId) -> Result<Option<Commission>, RepositoryError>;
    fn commission_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<Commission>, RepositoryError>;
    /// Transition `pending -> paid` only if the stored status is still `pending`.
    /// Unknown ids fail with `NotFound`.
    fn settle(
        &self,
        id: &CommissionId,
        payment_reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Settlement, RepositoryError>;
    fn pending_commissions(
        &self,
        partner_id: Option<&PartnerId>,
    ) -> Result<Vec<Commission>, RepositoryError>;
}

/// Everything the marketplace service needs from storage.
pub trait MarketplaceStore: PartnerRepository + BookingRepository + CommissionRepository {}

impl<T> MarketplaceStore for T where T: PartnerRepository + BookingRepository + CommissionRepository {}
