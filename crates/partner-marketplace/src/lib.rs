//! Partner marketplace core: geo ranking of service partners, admin-gated partner
//! lifecycle, booking orchestration and the commission ledger.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
