use metrics_exporter_prometheus::PrometheusHandle;
use partner_marketplace::config::MarketplaceConfig;
use partner_marketplace::marketplace::{
    AdminId, Coordinates, InMemoryMarketplaceStore, MarketplaceError, MarketplaceService,
    NewPartnerService, NewPartnerUser, Partner, PartnerRegistration, PartnerRole, PartnerType,
    PostalAddress, SortKey, StaticGeocoder, TenantId,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ApiService = MarketplaceService<InMemoryMarketplaceStore, StaticGeocoder>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const SEED_ADMIN: &str = "adm-seed";

/// Addresses the bundled geocoder can resolve.
pub(crate) fn sample_geocoder() -> StaticGeocoder {
    StaticGeocoder::new()
        .with_entry("Gare de Lyon, Paris", Coordinates::new(48.8443, 2.3744))
        .with_entry("La Defense, Puteaux", Coordinates::new(48.8919, 2.2384))
        .with_entry("Place Bellecour, Lyon", Coordinates::new(45.7578, 4.8320))
        .with_entry(
            "14 Rue des Pyrenees, 75020, Paris, FR",
            Coordinates::new(48.8530, 2.4060),
        )
}

pub(crate) fn build_service(config: MarketplaceConfig) -> ApiService {
    MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::new()),
        Arc::new(sample_geocoder()),
        config,
    )
}

struct SeedPartner {
    company: &'static str,
    partner_type: PartnerType,
    street: &'static str,
    postal_code: &'static str,
    city: &'static str,
    coordinates: Option<Coordinates>,
    rate: Option<&'static str>,
    services: &'static [(&'static str, &'static str, u32)],
    reviews: &'static [u8],
    state: SeedState,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SeedState {
    Approved,
    Pending,
    Suspended,
}

const CATALOGUE: &[SeedPartner] = &[
    SeedPartner {
        company: "Garage Bastille",
        partner_type: PartnerType::Garage,
        street: "3 Rue de la Roquette",
        postal_code: "75011",
        city: "Paris",
        coordinates: Some(Coordinates::new(48.8546, 2.3714)),
        rate: None,
        services: &[("Full service", "189.00", 120), ("Oil change", "79.90", 45)],
        reviews: &[5, 4, 5],
        state: SeedState::Approved,
    },
    SeedPartner {
        company: "Controle Technique Nation",
        partner_type: PartnerType::CtCenter,
        street: "22 Avenue du Trone",
        postal_code: "75012",
        city: "Paris",
        coordinates: Some(Coordinates::new(48.8481, 2.3961)),
        rate: Some("8"),
        services: &[("Technical inspection", "78.00", 60)],
        reviews: &[4],
        state: SeedState::Approved,
    },
    SeedPartner {
        company: "Pneus Montparnasse",
        partner_type: PartnerType::Garage,
        street: "40 Rue du Depart",
        postal_code: "75014",
        city: "Paris",
        coordinates: Some(Coordinates::new(48.8421, 2.3219)),
        rate: Some("12.5"),
        services: &[("Tyre fitting", "35.00", 30), ("Oil change", "69.00", 45)],
        reviews: &[3, 4],
        state: SeedState::Approved,
    },
    SeedPartner {
        company: "Assurflotte",
        partner_type: PartnerType::Insurance,
        street: "1 Parvis de la Defense",
        postal_code: "92800",
        city: "Puteaux",
        coordinates: Some(Coordinates::new(48.8919, 2.2384)),
        rate: Some("5"),
        services: &[("Fleet policy review", "0.00", 60)],
        reviews: &[],
        state: SeedState::Approved,
    },
    SeedPartner {
        company: "Pieces Auto Est",
        partner_type: PartnerType::PartsSupplier,
        street: "14 Rue des Pyrenees",
        postal_code: "75020",
        city: "Paris",
        coordinates: None,
        rate: None,
        services: &[("Brake pads", "54.00", 15)],
        reviews: &[],
        state: SeedState::Approved,
    },
    SeedPartner {
        company: "Garage En Attente",
        partner_type: PartnerType::Garage,
        street: "8 Rue de Lappe",
        postal_code: "75011",
        city: "Paris",
        coordinates: Some(Coordinates::new(48.8533, 2.3729)),
        rate: None,
        services: &[("Oil change", "49.00", 45)],
        reviews: &[],
        state: SeedState::Pending,
    },
    SeedPartner {
        company: "Garage Suspendu",
        partner_type: PartnerType::Garage,
        street: "60 Boulevard Voltaire",
        postal_code: "75011",
        city: "Paris",
        coordinates: Some(Coordinates::new(48.8610, 2.3735)),
        rate: None,
        services: &[("Oil change", "39.00", 45)],
        reviews: &[2],
        state: SeedState::Suspended,
    },
    SeedPartner {
        company: "Garage Bellecour",
        partner_type: PartnerType::Garage,
        street: "Place Bellecour",
        postal_code: "69002",
        city: "Lyon",
        coordinates: Some(Coordinates::new(45.7578, 4.8320)),
        rate: None,
        services: &[("Full service", "159.00", 120)],
        reviews: &[5],
        state: SeedState::Approved,
    },
];

/// Load the sample catalogue. Partners without coordinates are geocoded from their address.
pub(crate) fn seed_catalogue(service: &ApiService) -> Result<Vec<Partner>, MarketplaceError> {
    let admin = AdminId::from(SEED_ADMIN);
    let reviewer = TenantId::from("tnt-seed-reviewer");
    let mut seeded = Vec::with_capacity(CATALOGUE.len());

    for entry in CATALOGUE {
        let slug = entry.company.to_ascii_lowercase().replace(' ', "-");
        let rate = entry
            .rate
            .map(parse_decimal)
            .transpose()
            .map_err(MarketplaceError::Validation)?;
        let mut partner = service.register_partner(PartnerRegistration {
            company_name: entry.company.to_string(),
            partner_type: entry.partner_type,
            email: format!("contact@{slug}.example"),
            phone: None,
            address: PostalAddress {
                street: entry.street.to_string(),
                city: entry.city.to_string(),
                postal_code: entry.postal_code.to_string(),
                country: "FR".to_string(),
            },
            coordinates: entry.coordinates,
            commission_rate: rate,
            owner: NewPartnerUser {
                name: format!("{} owner", entry.company),
                email: format!("owner@{slug}.example"),
                role: PartnerRole::Owner,
            },
        })?;

        if partner.coordinates.is_none() {
            partner = service.geocode_partner(&partner.id)?;
        }

        for (name, price, duration_minutes) in entry.services {
            service.add_service(
                &partner.id,
                NewPartnerService {
                    name: (*name).to_string(),
                    price: parse_decimal(price).map_err(MarketplaceError::Validation)?,
                    duration_minutes: *duration_minutes,
                },
            )?;
        }

        if entry.state != SeedState::Pending {
            partner = service.approve_partner(&partner.id, &admin)?;
        }
        for rating in entry.reviews {
            partner = service.record_review(&reviewer, &partner.id, *rating)?;
        }
        if entry.state == SeedState::Suspended {
            partner = service.suspend_partner(&partner.id, &admin, "unpaid commissions")?;
        }

        seeded.push(partner);
    }

    Ok(seeded)
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim())
        .map_err(|err| format!("failed to parse '{raw}' as a decimal ({err})"))
}

pub(crate) fn parse_partner_type(raw: &str) -> Result<PartnerType, String> {
    PartnerType::parse(raw).ok_or_else(|| {
        format!("unknown partner type '{raw}' (expected garage, ct_center, insurance or parts_supplier)")
    })
}

pub(crate) fn parse_sort_key(raw: &str) -> Result<SortKey, String> {
    SortKey::parse(raw).ok_or_else(|| {
        format!("unknown sort key '{raw}' (expected distance, rating, price or relevance)")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use partner_marketplace::marketplace::{PartnerStatus, SearchQuery};

    #[test]
    fn seeded_catalogue_hides_pending_and_suspended() {
        let service = build_service(MarketplaceConfig::default());
        let seeded = seed_catalogue(&service).expect("catalogue seeds");
        assert_eq!(seeded.len(), CATALOGUE.len());
        assert!(seeded.iter().all(|partner| partner.coordinates.is_some()));

        let results = service
            .search_partners(&SearchQuery::new(48.8566, 2.3522, 15.0))
            .expect("search");
        assert!(!results.is_empty());
        assert!(results
            .iter()
            .all(|hit| hit.partner.status == PartnerStatus::Approved));
        assert!(results
            .iter()
            .all(|hit| hit.partner.address.city != "Lyon"));
    }

    #[test]
    fn parsers_reject_unknown_values() {
        assert_eq!(parse_partner_type("ct_center"), Ok(PartnerType::CtCenter));
        assert!(parse_partner_type("bakery").is_err());
        assert_eq!(parse_sort_key("PRICE"), Ok(SortKey::Price));
        assert!(parse_sort_key("cheapest").is_err());
        assert_eq!(parse_decimal(" 12.5 "), Ok(Decimal::new(125, 1)));
        assert!(parse_decimal("twelve").is_err());
    }
}
