use partner_marketplace_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("partner marketplace: {err}");
        std::process::exit(err.exit_code());
    }
}
