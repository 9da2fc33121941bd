use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use super::domain::{BookingId, Commission, CommissionId, CommissionStatus, PartnerId};
use super::repository::{
    BookingRepository, CommissionRepository, LedgerUnitOfWork, RepositoryError, Settlement,
};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("commission {0} is already paid")]
    AlreadyPaid(CommissionId),
    #[error("commission {0} not found")]
    CommissionNotFound(CommissionId),
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("booking {booking_id} belongs to partner {expected}, not {found}")]
    PartnerMismatch {
        booking_id: BookingId,
        expected: PartnerId,
        found: PartnerId,
    },
    #[error("commission amount must not be negative (got {0})")]
    NegativeAmount(Decimal),
    #[error("payment reference must not be empty")]
    EmptyPaymentReference,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// `price * rate / 100`, rounded to cents (half away from zero).
pub fn commission_amount(price: Decimal, rate_percent: Decimal) -> Decimal {
    let mut amount = (price * rate_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);
    amount
}

/// Accrue inside an open unit of work. Returns the existing record when the booking
/// already has a commission.
pub(crate) fn accrue_in(
    tx: &mut dyn LedgerUnitOfWork,
    booking_id: &BookingId,
    partner_id: &PartnerId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Commission, LedgerError> {
    if let Some(existing) = tx.commission_for_booking(booking_id) {
        debug!(%booking_id, commission_id = %existing.id, "commission already accrued");
        return Ok(existing);
    }

    let booking = tx
        .booking(booking_id)
        .ok_or_else(|| LedgerError::BookingNotFound(booking_id.clone()))?;
    if &booking.partner_id != partner_id {
        return Err(LedgerError::PartnerMismatch {
            booking_id: booking_id.clone(),
            expected: booking.partner_id,
            found: partner_id.clone(),
        });
    }
    if amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(amount));
    }

    let commission = Commission {
        id: CommissionId::next(),
        booking_id: booking_id.clone(),
        partner_id: partner_id.clone(),
        amount,
        status: CommissionStatus::Pending,
        payment_reference: None,
        created_at: now,
        paid_at: None,
    };
    tx.insert_commission(commission.clone())?;

    info!(
        commission_id = %commission.id,
        %booking_id,
        %partner_id,
        amount = %commission.amount,
        "commission accrued"
    );
    Ok(commission)
}

/// Per-booking commission accrual and at-most-once settlement.
pub struct CommissionLedger<S> {
    store: Arc<S>,
}

impl<S> CommissionLedger<S>
where
    S: BookingRepository + CommissionRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Idempotent per booking: a second call hands back the first record untouched.
    pub fn accrue(
        &self,
        booking_id: &BookingId,
        partner_id: &PartnerId,
        amount: Decimal,
    ) -> Result<Commission, LedgerError> {
        let now = Utc::now();
        self.store
            .transaction(|tx| accrue_in(tx, booking_id, partner_id, amount, now))
    }

    /// Settle a pending commission. Only one caller can ever win the transition;
    /// every later call gets `AlreadyPaid`.
    pub fn mark_paid(
        &self,
        commission_id: &CommissionId,
        payment_reference: &str,
    ) -> Result<Commission, LedgerError> {
        if payment_reference.trim().is_empty() {
            return Err(LedgerError::EmptyPaymentReference);
        }

        match self.store.settle(commission_id, payment_reference, Utc::now()) {
            Ok(Settlement::Settled(commission)) => {
                info!(
                    %commission_id,
                    partner_id = %commission.partner_id,
                    amount = %commission.amount,
                    payment_reference,
                    "commission settled"
                );
                Ok(commission)
            }
            Ok(Settlement::AlreadyPaid(commission)) => {
                warn!(
                    %commission_id,
                    existing_reference = commission.payment_reference.as_deref().unwrap_or_default(),
                    "duplicate settlement attempt rejected"
                );
                Err(LedgerError::AlreadyPaid(commission.id))
            }
            Err(RepositoryError::NotFound) => {
                Err(LedgerError::CommissionNotFound(commission_id.clone()))
            }
            Err(other) => Err(other.into()),
        }
    }

    pub fn get(&self, commission_id: &CommissionId) -> Result<Commission, LedgerError> {
        self.store
            .fetch_commission(commission_id)?
            .ok_or_else(|| LedgerError::CommissionNotFound(commission_id.clone()))
    }

    pub fn for_booking(&self, booking_id: &BookingId) -> Result<Option<Commission>, LedgerError> {
        Ok(self.store.commission_for_booking(booking_id)?)
    }

    pub fn pending(&self, partner_id: Option<&PartnerId>) -> Result<Vec<Commission>, LedgerError> {
        Ok(self.store.pending_commissions(partner_id)?)
    }
}
