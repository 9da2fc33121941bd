use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{
    Booking, BookingId, BookingRequest, BookingStatus, Commission, PartnerId, PartnerStatus,
    ServiceId,
};
use super::ledger::{accrue_in, commission_amount, LedgerError};
use super::repository::{
    BookingRepository, CommissionRepository, PartnerRepository, RepositoryError,
};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("partner {0} not found")]
    PartnerNotFound(PartnerId),
    #[error("partner {partner_id} is not available for booking (status {status}, removed: {deleted})")]
    PartnerUnavailable {
        partner_id: PartnerId,
        status: PartnerStatus,
        deleted: bool,
    },
    #[error("service {0} not found")]
    ServiceNotFound(ServiceId),
    #[error("service {service_id} is not bookable with partner {partner_id}")]
    ServiceUnavailable {
        service_id: ServiceId,
        partner_id: PartnerId,
    },
    #[error("booking must be scheduled in the future (requested {scheduled_at})")]
    InvalidSchedule { scheduled_at: DateTime<Utc> },
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidStatusChange {
        id: BookingId,
        from: &'static str,
        to: &'static str,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A committed booking together with the commission accrued for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub commission: Commission,
}

/// Binds tenant, partner and service into a booking and accrues its commission in
/// the same transaction.
pub struct BookingOrchestrator<S> {
    store: Arc<S>,
}

impl<S> BookingOrchestrator<S>
where
    S: PartnerRepository + BookingRepository + CommissionRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn book(&self, request: BookingRequest) -> Result<BookingReceipt, BookingError> {
        self.book_at(request, Utc::now())
    }

    /// Same as [`Self::book`] with an explicit clock reading.
    pub fn book_at(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingReceipt, BookingError> {
        let partner = self
            .store
            .fetch_partner(&request.partner_id)?
            .ok_or_else(|| BookingError::PartnerNotFound(request.partner_id.clone()))?;
        if !partner.is_bookable() {
            return Err(BookingError::PartnerUnavailable {
                partner_id: partner.id,
                status: partner.status,
                deleted: partner.deleted_at.is_some(),
            });
        }

        let service = self
            .store
            .fetch_service(&request.service_id)?
            .ok_or_else(|| BookingError::ServiceNotFound(request.service_id.clone()))?;
        if service.partner_id != partner.id || !service.is_available() {
            return Err(BookingError::ServiceUnavailable {
                service_id: service.id,
                partner_id: partner.id,
            });
        }

        if request.scheduled_at <= now {
            return Err(BookingError::InvalidSchedule {
                scheduled_at: request.scheduled_at,
            });
        }

        let booking = Booking {
            id: BookingId::next(),
            tenant_id: request.tenant_id,
            partner_id: partner.id.clone(),
            service_id: service.id.clone(),
            scheduled_at: request.scheduled_at,
            ends_at: request.scheduled_at + Duration::minutes(i64::from(service.duration_minutes)),
            price: service.price,
            notes: request.notes,
            status: BookingStatus::Scheduled,
            created_at: now,
        };
        let amount = commission_amount(service.price, partner.commission_rate);

        let commission = self.store.transaction(|tx| -> Result<Commission, BookingError> {
            tx.insert_booking(booking.clone())?;
            Ok(accrue_in(tx, &booking.id, &partner.id, amount, now)?)
        })?;

        info!(
            booking_id = %booking.id,
            tenant_id = %booking.tenant_id,
            partner_id = %booking.partner_id,
            service_id = %booking.service_id,
            scheduled_at = %booking.scheduled_at,
            "booking created"
        );

        Ok(BookingReceipt {
            booking,
            commission,
        })
    }

    pub fn get(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        self.store
            .fetch_booking(booking_id)?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.clone()))
    }

    /// Commissions are untouched by completion or cancellation.
    pub fn complete(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        self.move_to(booking_id, BookingStatus::Completed)
    }

    pub fn cancel(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        self.move_to(booking_id, BookingStatus::Cancelled)
    }

    fn move_to(&self, booking_id: &BookingId, to: BookingStatus) -> Result<Booking, BookingError> {
        let (booking, changed) = self
            .store
            .modify_booking(booking_id, |booking| -> Result<_, BookingError> {
                if booking.status == to {
                    return Ok((booking.clone(), false));
                }
                if booking.status != BookingStatus::Scheduled {
                    return Err(BookingError::InvalidStatusChange {
                        id: booking.id.clone(),
                        from: booking.status.label(),
                        to: to.label(),
                    });
                }
                booking.status = to;
                Ok((booking.clone(), true))
            })
            .map_err(|error| match error {
                BookingError::Repository(RepositoryError::NotFound) => {
                    BookingError::BookingNotFound(booking_id.clone())
                }
                other => other,
            })?;
        if changed {
            info!(%booking_id, status = to.label(), "booking status updated");
        }
        Ok(booking)
    }
}
