use crate::infra::{
    build_service, parse_decimal, parse_partner_type, parse_sort_key, seed_catalogue, ApiService,
};
use chrono::{Duration, Utc};
use clap::Args;
use partner_marketplace::config::AppConfig;
use partner_marketplace::error::AppError;
use partner_marketplace::marketplace::{
    BookingRequest, Coordinates, PartnerType, RankedPartner, SearchQuery, SortKey, TenantId,
};
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub(crate) struct SearchArgs {
    /// Latitude of the search origin
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) lat: f64,
    /// Longitude of the search origin
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) lon: f64,
    /// Search radius in kilometres
    #[arg(long, default_value_t = 10.0)]
    pub(crate) radius_km: f64,
    /// Restrict to one partner type (garage, ct_center, insurance, parts_supplier)
    #[arg(long = "type", value_parser = parse_partner_type)]
    pub(crate) partner_type: Option<PartnerType>,
    /// Minimum average rating (0-5)
    #[arg(long)]
    pub(crate) min_rating: Option<f64>,
    /// Result ordering (distance, rating, price, relevance)
    #[arg(long, value_parser = parse_sort_key, default_value = "relevance")]
    pub(crate) sort_by: SortKey,
    /// Service name used for price ordering
    #[arg(long)]
    pub(crate) service: Option<String>,
    /// Maximum number of partners to print
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Commission rate applied to the demo partner (defaults to the configured rate)
    #[arg(long, value_parser = parse_decimal)]
    pub(crate) commission_rate: Option<Decimal>,
    /// Payment reference used when settling the demo commission
    #[arg(long, default_value = "REF-001")]
    pub(crate) payment_reference: String,
}

impl SearchArgs {
    fn query(self) -> SearchQuery {
        let mut query =
            SearchQuery::new(self.lat, self.lon, self.radius_km).sorted_by(self.sort_by);
        query.partner_type = self.partner_type;
        query.min_rating = self.min_rating;
        query.service = self.service;
        query.limit = self.limit;
        query
    }
}

fn seeded_service() -> Result<ApiService, AppError> {
    let config = AppConfig::load()?;
    let service = build_service(config.marketplace);
    seed_catalogue(&service)?;
    Ok(service)
}

pub(crate) fn run_search(args: SearchArgs) -> Result<(), AppError> {
    let service = seeded_service()?;
    let query = args.query();
    let results = service.search_partners(&query)?;

    println!(
        "Partners within {:.1} km of ({:.4}, {:.4}), sorted by {:?}",
        query.radius_km, query.lat, query.lon, query.sort_by
    );
    render_results(&results);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        commission_rate,
        payment_reference,
    } = args;

    let service = seeded_service()?;
    let origin = Coordinates::new(48.8566, 2.3522);
    let tenant = TenantId::from("tnt-demo-fleet");

    println!("Partner marketplace demo");
    println!("\n1. Tenant search around Paris centre (10 km, relevance)");
    let query = SearchQuery::at(origin, 10.0).for_tenant(tenant.clone());
    let results = service.search_partners(&query)?;
    render_results(&results);

    let Some(best) = results
        .iter()
        .find(|hit| hit.partner.partner_type == PartnerType::Garage)
    else {
        println!("No garage in range; nothing to book.");
        return Ok(());
    };
    let mut partner = best.partner.clone();
    if let Some(rate) = commission_rate {
        partner = service.update_commission_rate(&partner.id, rate)?;
    }

    let offered = service
        .partner_services(&partner.id)?
        .into_iter()
        .filter(|offered| offered.is_available())
        .min_by(|a, b| a.price.cmp(&b.price));
    let Some(offered) = offered else {
        println!("{} has no active services; nothing to book.", partner.company_name);
        return Ok(());
    };

    println!(
        "\n2. Booking '{}' at {} ({} EUR, commission rate {}%)",
        offered.name, partner.company_name, offered.price, partner.commission_rate
    );
    let receipt = service.book_service(BookingRequest {
        tenant_id: tenant.clone(),
        partner_id: partner.id.clone(),
        service_id: offered.id.clone(),
        scheduled_at: Utc::now() + Duration::days(1),
        notes: Some("Demo booking".to_string()),
    })?;
    println!(
        "   booking {} scheduled {} -> commission {} ({} EUR, {})",
        receipt.booking.id,
        receipt.booking.scheduled_at.format("%Y-%m-%d %H:%M"),
        receipt.commission.id,
        receipt.commission.amount,
        receipt.commission.status.label()
    );

    println!("\n3. Settling commission with reference {payment_reference}");
    let paid = service.mark_commission_paid(&receipt.commission.id, &payment_reference)?;
    println!(
        "   status {} at {}",
        paid.status.label(),
        paid.paid_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    match service.mark_commission_paid(&receipt.commission.id, &payment_reference) {
        Ok(_) => println!("   unexpected: second settlement accepted"),
        Err(err) => println!("   second settlement refused: {err}"),
    }

    println!("\n4. Suspending {} and searching again", partner.company_name);
    service.suspend_partner(&partner.id, &"adm-demo".into(), "demo suspension")?;
    let after = service.search_partners(&query)?;
    let still_listed = after.iter().any(|hit| hit.partner.id == partner.id);
    println!(
        "   {} results, suspended partner listed: {}",
        after.len(),
        still_listed
    );

    let pending = service.list_pending_commissions(None)?;
    println!("\nPending commissions: {}", pending.len());
    Ok(())
}

fn render_results(results: &[RankedPartner]) {
    if results.is_empty() {
        println!("  (no partners found)");
        return;
    }

    for (rank, hit) in results.iter().enumerate() {
        let price = hit
            .min_price
            .map(|price| format!("from {price} EUR"))
            .unwrap_or_else(|| "no matching service".to_string());
        let relevance = hit
            .relevance
            .map(|score| format!(", relevance {score:.3}"))
            .unwrap_or_default();
        let relation = hit
            .relation
            .as_ref()
            .map(|relation| {
                format!(
                    ", {} booking(s){}",
                    relation.booking_count,
                    if relation.is_preferred { ", preferred" } else { "" }
                )
            })
            .unwrap_or_default();
        println!(
            "  {:>2}. {:<28} {:<15} {:>6.2} km  rating {:.1} ({} reviews)  {}{}{}",
            rank + 1,
            hit.partner.company_name,
            hit.partner.partner_type.label(),
            hit.distance_km,
            hit.partner.rating,
            hit.partner.total_reviews,
            price,
            relevance,
            relation
        );
    }
}
