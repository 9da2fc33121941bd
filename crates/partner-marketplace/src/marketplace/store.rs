use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use super::domain::{
    Booking, BookingId, Commission, CommissionId, CommissionStatus, Partner, PartnerId,
    PartnerReview, PartnerService, PartnerStatusChange, PartnerUser, ServiceId, TenantId,
};
use super::repository::{
    BookingRepository, CommissionRepository, LedgerUnitOfWork, PartnerRepository,
    RepositoryError, Settlement,
};

/// Process-local store backing the service and the test suites.
///
/// The partner catalogue sits behind a `RwLock` so concurrent searches never wait on
/// each other; the ledger sits behind a single `Mutex` which doubles as the
/// serialization point for booking transactions and settlement compare-and-set.
#[derive(Default, Clone)]
pub struct InMemoryMarketplaceStore {
    catalogue: Arc<RwLock<Catalogue>>,
    ledger: Arc<Mutex<Ledger>>,
}

#[derive(Default)]
struct Catalogue {
    partners: BTreeMap<PartnerId, Partner>,
    services: BTreeMap<ServiceId, PartnerService>,
    users: Vec<PartnerUser>,
    history: Vec<PartnerStatusChange>,
    reviews: Vec<PartnerReview>,
    preferred: HashSet<(TenantId, PartnerId)>,
}

#[derive(Default)]
struct Ledger {
    bookings: HashMap<BookingId, Booking>,
    commissions: HashMap<CommissionId, Commission>,
    by_booking: HashMap<BookingId, CommissionId>,
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("store lock poisoned".to_string())
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Catalogue>, RepositoryError> {
        self.catalogue.read().map_err(poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Catalogue>, RepositoryError> {
        self.catalogue.write().map_err(poisoned)
    }

    fn ledger(&self) -> Result<std::sync::MutexGuard<'_, Ledger>, RepositoryError> {
        self.ledger.lock().map_err(poisoned)
    }
}

impl PartnerRepository for InMemoryMarketplaceStore {
    fn insert_partner(
        &self,
        partner: Partner,
        owner: PartnerUser,
    ) -> Result<Partner, RepositoryError> {
        if owner.partner_id != partner.id {
            return Err(RepositoryError::Invalid(format!(
                "owner account {} belongs to partner {}, not {}",
                owner.id, owner.partner_id, partner.id
            )));
        }
        let mut guard = self.write()?;
        let duplicate = guard.partners.contains_key(&partner.id)
            || guard
                .partners
                .values()
                .any(|existing| existing.email.eq_ignore_ascii_case(&partner.email));
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.partners.insert(partner.id.clone(), partner.clone());
        guard.users.push(owner);
        Ok(partner)
    }

    fn modify_partner<T, E, F>(&self, id: &PartnerId, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut Partner) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.write()?;
        let slot = guard
            .partners
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        let mut draft = slot.clone();
        let output = change(&mut draft)?;
        *slot = draft;
        Ok(output)
    }

    fn fetch_partner(&self, id: &PartnerId) -> Result<Option<Partner>, RepositoryError> {
        Ok(self.read()?.partners.get(id).cloned())
    }

    fn partners(&self) -> Result<Vec<Partner>, RepositoryError> {
        Ok(self.read()?.partners.values().cloned().collect())
    }

    fn insert_service(&self, service: PartnerService) -> Result<PartnerService, RepositoryError> {
        let mut guard = self.write()?;
        if !guard.partners.contains_key(&service.partner_id) {
            return Err(RepositoryError::NotFound);
        }
        if guard.services.contains_key(&service.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.services.insert(service.id.clone(), service.clone());
        Ok(service)
    }

    fn update_service(&self, service: PartnerService) -> Result<(), RepositoryError> {
        let mut guard = self.write()?;
        match guard.services.get_mut(&service.id) {
            Some(slot) => {
                *slot = service;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_service(&self, id: &ServiceId) -> Result<Option<PartnerService>, RepositoryError> {
        Ok(self.read()?.services.get(id).cloned())
    }

    fn services_for(&self, partner_id: &PartnerId) -> Result<Vec<PartnerService>, RepositoryError> {
        Ok(self
            .read()?
            .services
            .values()
            .filter(|service| &service.partner_id == partner_id)
            .cloned()
            .collect())
    }

    fn insert_user(&self, user: PartnerUser) -> Result<PartnerUser, RepositoryError> {
        let mut guard = self.write()?;
        if !guard.partners.contains_key(&user.partner_id) {
            return Err(RepositoryError::NotFound);
        }
        if guard.users.iter().any(|existing| {
            existing.partner_id == user.partner_id && existing.email.eq_ignore_ascii_case(&user.email)
        }) {
            return Err(RepositoryError::Conflict);
        }
        guard.users.push(user.clone());
        Ok(user)
    }

    fn users_for(&self, partner_id: &PartnerId) -> Result<Vec<PartnerUser>, RepositoryError> {
        Ok(self
            .read()?
            .users
            .iter()
            .filter(|user| &user.partner_id == partner_id)
            .cloned()
            .collect())
    }

    fn record_status_change(&self, change: PartnerStatusChange) -> Result<(), RepositoryError> {
        self.write()?.history.push(change);
        Ok(())
    }

    fn status_history(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Vec<PartnerStatusChange>, RepositoryError> {
        Ok(self
            .read()?
            .history
            .iter()
            .filter(|change| &change.partner_id == partner_id)
            .cloned()
            .collect())
    }

    fn record_review(&self, review: PartnerReview) -> Result<Partner, RepositoryError> {
        let mut guard = self.write()?;
        let partner = guard
            .partners
            .get_mut(&review.partner_id)
            .ok_or(RepositoryError::NotFound)?;
        partner.apply_review(review.rating, review.created_at);
        let updated = partner.clone();
        guard.reviews.push(review);
        Ok(updated)
    }

    fn tenant_reviews(&self, tenant_id: &TenantId) -> Result<Vec<PartnerReview>, RepositoryError> {
        Ok(self
            .read()?
            .reviews
            .iter()
            .filter(|review| &review.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn set_preferred(
        &self,
        tenant_id: &TenantId,
        partner_id: &PartnerId,
        preferred: bool,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.write()?;
        if !guard.partners.contains_key(partner_id) {
            return Err(RepositoryError::NotFound);
        }
        let key = (tenant_id.clone(), partner_id.clone());
        if preferred {
            guard.preferred.insert(key);
        } else {
            guard.preferred.remove(&key);
        }
        Ok(())
    }

    fn preferred_partners(&self, tenant_id: &TenantId) -> Result<Vec<PartnerId>, RepositoryError> {
        let mut preferred: Vec<PartnerId> = self
            .read()?
            .preferred
            .iter()
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, partner)| partner.clone())
            .collect();
        preferred.sort();
        Ok(preferred)
    }
}

/// Staged writes over a locked ledger.
struct LedgerTx<'a> {
    committed: &'a Ledger,
    bookings: Vec<Booking>,
    commissions: Vec<Commission>,
}

impl LedgerUnitOfWork for LedgerTx<'_> {
    fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.bookings
            .iter()
            .find(|booking| &booking.id == id)
            .or_else(|| self.committed.bookings.get(id))
            .cloned()
    }

    fn insert_booking(&mut self, booking: Booking) -> Result<(), RepositoryError> {
        if self.booking(&booking.id).is_some() {
            return Err(RepositoryError::Conflict);
        }
        self.bookings.push(booking);
        Ok(())
    }

    fn commission_for_booking(&self, booking_id: &BookingId) -> Option<Commission> {
        self.commissions
            .iter()
            .find(|commission| &commission.booking_id == booking_id)
            .cloned()
            .or_else(|| {
                self.committed
                    .by_booking
                    .get(booking_id)
                    .and_then(|id| self.committed.commissions.get(id))
                    .cloned()
            })
    }

    fn insert_commission(&mut self, commission: Commission) -> Result<(), RepositoryError> {
        let taken = self.commission_for_booking(&commission.booking_id).is_some()
            || self.committed.commissions.contains_key(&commission.id)
            || self.commissions.iter().any(|staged| staged.id == commission.id);
        if taken {
            return Err(RepositoryError::Conflict);
        }
        self.commissions.push(commission);
        Ok(())
    }
}

impl BookingRepository for InMemoryMarketplaceStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerUnitOfWork) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.ledger()?;
        let (output, bookings, commissions) = {
            let mut tx = LedgerTx {
                committed: &*guard,
                bookings: Vec::new(),
                commissions: Vec::new(),
            };
            let output = work(&mut tx)?;
            (output, tx.bookings, tx.commissions)
        };

        for booking in bookings {
            guard.bookings.insert(booking.id.clone(), booking);
        }
        for commission in commissions {
            guard
                .by_booking
                .insert(commission.booking_id.clone(), commission.id.clone());
            guard.commissions.insert(commission.id.clone(), commission);
        }
        Ok(output)
    }

    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.ledger()?.bookings.get(id).cloned())
    }

    fn modify_booking<T, E, F>(&self, id: &BookingId, change: F) -> Result<T, E>
    where
        F: FnOnce(&mut Booking) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.ledger()?;
        let slot = guard
            .bookings
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        let mut draft = slot.clone();
        let output = change(&mut draft)?;
        *slot = draft;
        Ok(output)
    }

    fn bookings_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Booking>, RepositoryError> {
        let mut bookings: Vec<Booking> = self
            .ledger()?
            .bookings
            .values()
            .filter(|booking| &booking.tenant_id == tenant_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }
}

impl CommissionRepository for InMemoryMarketplaceStore {
    fn fetch_commission(&self, id: &CommissionId) -> Result<Option<Commission>, RepositoryError> {
        Ok(self.ledger()?.commissions.get(id).cloned())
    }

    fn commission_for_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Option<Commission>, RepositoryError> {
        let guard = self.ledger()?;
        Ok(guard
            .by_booking
            .get(booking_id)
            .and_then(|id| guard.commissions.get(id))
            .cloned())
    }

    fn settle(
        &self,
        id: &CommissionId,
        payment_reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Settlement, RepositoryError> {
        let mut guard = self.ledger()?;
        let commission = guard
            .commissions
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;

        if commission.status != CommissionStatus::Pending {
            return Ok(Settlement::AlreadyPaid(commission.clone()));
        }

        commission.status = CommissionStatus::Paid;
        commission.payment_reference = Some(payment_reference.to_string());
        commission.paid_at = Some(paid_at);
        Ok(Settlement::Settled(commission.clone()))
    }

    fn pending_commissions(
        &self,
        partner_id: Option<&PartnerId>,
    ) -> Result<Vec<Commission>, RepositoryError> {
        let mut pending: Vec<Commission> = self
            .ledger()?
            .commissions
            .values()
            .filter(|commission| commission.status == CommissionStatus::Pending)
            .filter(|commission| partner_id.map_or(true, |id| &commission.partner_id == id))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }
}
