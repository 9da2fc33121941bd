//! Partner marketplace: geo search and ranking, the admin-gated partner lifecycle,
//! bookings and the commission ledger behind them.
//!
//! Every write goes through [`MarketplaceService`]. Search reads partner status at
//! query time, so a suspension is visible on the very next query.

pub mod booking;
pub mod domain;
pub mod geo;
pub mod geocode;
pub mod ledger;
pub mod lifecycle;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use booking::{BookingError, BookingOrchestrator, BookingReceipt};
pub use domain::{
    AdminId, Booking, BookingId, BookingRequest, BookingStatus, Commission, CommissionId,
    CommissionStatus, Coordinates, NewPartnerService, NewPartnerUser, Partner, PartnerId,
    PartnerRegistration, PartnerReview, PartnerRole, PartnerService, PartnerStatus,
    PartnerStatusChange, PartnerType, PartnerUser, PartnerUserId, PostalAddress, ServiceId,
    TenantId, TenantPartnerRelation,
};
pub use geo::{haversine_km, CoordinateError, GeoIndex};
pub use geocode::{GeocodeError, Geocoder, StaticGeocoder};
pub use ledger::{commission_amount, CommissionLedger, LedgerError};
pub use lifecycle::{LifecycleAction, Transition, TransitionError};
pub use ranking::{
    RankedPartner, RankingEngine, RelevanceWeights, SearchError, SearchQuery, SortKey,
};
pub use repository::{
    BookingRepository, CommissionRepository, LedgerUnitOfWork, MarketplaceStore,
    PartnerRepository, RepositoryError, Settlement,
};
pub use router::marketplace_router;
pub use service::{MarketplaceError, MarketplaceService};
pub use store::InMemoryMarketplaceStore;
