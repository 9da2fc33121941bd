use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub(crate) fn next() -> Self {
                static SEQUENCE: AtomicU64 = AtomicU64::new(1);
                let id = SEQUENCE.fetch_add(1, Ordering::Relaxed);
                Self(format!(concat!($prefix, "-{:06}"), id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for marketplace partners.
    PartnerId,
    "ptn"
);
identifier!(ServiceId, "svc");
identifier!(PartnerUserId, "usr");
identifier!(BookingId, "bkg");
identifier!(CommissionId, "com");
identifier!(
    /// Tenant identity supplied by the (external) authentication layer.
    TenantId,
    "tnt"
);
identifier!(AdminId, "adm");

/// Category of service a partner offers to fleet tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    Garage,
    CtCenter,
    Insurance,
    PartsSupplier,
}

impl PartnerType {
    pub const fn label(self) -> &'static str {
        match self {
            PartnerType::Garage => "garage",
            PartnerType::CtCenter => "ct_center",
            PartnerType::Insurance => "insurance",
            PartnerType::PartsSupplier => "parts_supplier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "garage" => Some(Self::Garage),
            "ct_center" => Some(Self::CtCenter),
            "insurance" => Some(Self::Insurance),
            "parts_supplier" => Some(Self::PartsSupplier),
            _ => None,
        }
    }
}

/// Partner approval state. Transitions are governed by [`super::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl PartnerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PartnerStatus::Pending => "pending",
            PartnerStatus::Approved => "approved",
            PartnerStatus::Rejected => "rejected",
            PartnerStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl PostalAddress {
    /// Free-text form handed to the geocoding collaborator.
    pub fn one_line(&self) -> String {
        [
            self.street.as_str(),
            self.postal_code.as_str(),
            self.city.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Third-party provider bookable by tenants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub company_name: String,
    pub partner_type: PartnerType,
    pub email: String,
    pub phone: Option<String>,
    pub address: PostalAddress,
    /// `None` until geocoded; such partners never show up in geo search.
    pub coordinates: Option<Coordinates>,
    /// Percentage in `[0, 100]`.
    pub commission_rate: Decimal,
    /// Running average in `[0, 5]`.
    pub rating: f64,
    pub total_reviews: u32,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Partner {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Approved and not soft-deleted. Suspended partners carry their own status.
    pub fn is_bookable(&self) -> bool {
        self.status == PartnerStatus::Approved && !self.is_deleted()
    }

    /// Fold one 1..=5 review into the running average.
    pub fn apply_review(&mut self, rating: u8, at: DateTime<Utc>) {
        let count = f64::from(self.total_reviews);
        let average = (self.rating * count + f64::from(rating)) / (count + 1.0);
        self.rating = average.clamp(0.0, 5.0);
        self.total_reviews += 1;
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerService {
    pub id: ServiceId,
    pub partner_id: PartnerId,
    pub name: String,
    pub price: Decimal,
    pub duration_minutes: u32,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PartnerService {
    pub fn is_available(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn matches_name(&self, needle: &str) -> bool {
        self.name
            .to_ascii_lowercase()
            .contains(&needle.trim().to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerRole {
    Owner,
    Manager,
    Employee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerUser {
    pub id: PartnerUserId,
    pub partner_id: PartnerId,
    pub name: String,
    pub email: String,
    pub role: PartnerRole,
    pub created_at: DateTime<Utc>,
}

/// Per tenant view of a partner, recomputed on every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPartnerRelation {
    pub tenant_id: TenantId,
    pub partner_id: PartnerId,
    pub distance_km: f64,
    pub is_preferred: bool,
    pub tenant_rating: Option<u8>,
    pub booking_count: u32,
    pub last_booking_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub tenant_id: TenantId,
    pub partner_id: PartnerId,
    pub service_id: ServiceId,
    pub scheduled_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Service price captured when the booking was made.
    pub price: Decimal,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Paid,
}

impl CommissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
        }
    }
}

/// Platform share of a booking. `amount` is frozen at accrual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub booking_id: BookingId,
    pub partner_id: PartnerId,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerReview {
    pub tenant_id: TenantId,
    pub partner_id: PartnerId,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

/// Audit entry for an applied lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerStatusChange {
    pub partner_id: PartnerId,
    pub from: PartnerStatus,
    pub to: PartnerStatus,
    pub admin_id: AdminId,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Registration payload for a new partner; lands in `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerRegistration {
    pub company_name: String,
    pub partner_type: PartnerType,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: PostalAddress,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub commission_rate: Option<Decimal>,
    pub owner: NewPartnerUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartnerUser {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: PartnerRole,
}

fn default_role() -> PartnerRole {
    PartnerRole::Owner
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPartnerService {
    pub name: String,
    pub price: Decimal,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub tenant_id: TenantId,
    pub partner_id: PartnerId,
    pub service_id: ServiceId,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}
