use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;

use partner_discount::logging::init_logger;
use partner_discount::{
    count_sales_records, discount_for, get_events_for_entity, insert_legal_addresses,
    insert_partners, insert_products, insert_sales_records, load_legal_addresses_csv,
    load_partners_csv, load_products_csv, load_sales_csv, open_database, partner_discounts,
    total_sales, AppConfig, DiscountReport, PartnerStore, SqliteStore, STANDARD_TIERS, VERSION,
};

#[derive(Debug, Parser)]
#[command(name = "partner-discount")]
#[command(about = "Partner sales history and volume discounts", version = VERSION)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides config and PARTNER_DISCOUNT_DB)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database schema
    Init,
    /// Import legal addresses from CSV (id,postal_index,region,city,street,house)
    ImportAddresses { csv: PathBuf },
    /// Import partners from CSV (id,partner_type,name,legal_address_id,inn,director,...)
    ImportPartners { csv: PathBuf },
    /// Import products from CSV (id,product_type_id,name,min_partner_price)
    ImportProducts { csv: PathBuf },
    /// Import sales history from CSV (partner_id,product_id,quantity,sale_date)
    ImportSales { csv: PathBuf },
    /// Show total sales and discount for one partner
    Discount { partner_id: i64 },
    /// List every partner with its discount
    Partners,
    /// Show sales history with partner and product names
    Sales {
        #[arg(long)]
        partner: Option<i64>,
    },
    /// Show the import audit trail of one partner
    Events { partner_id: i64 },
    /// Print the discount tiers
    Tiers,
    /// Build the discount report; CSV goes to --output, summary to stdout
    Report {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.database {
        config.database.path = db.clone();
    }

    init_logger(&config.logging, cli.verbose);
    tracing::debug!(?config, "loaded configuration");

    let conn = open_database(&config.database.path)
        .with_context(|| format!("Failed to open database {:?}", config.database.path))?;
    let store = SqliteStore::new(&conn);

    match cli.command {
        Command::Init => {
            println!("✓ Database ready at {:?}", config.database.path);
        }
        Command::ImportAddresses { csv } => {
            let addresses = load_legal_addresses_csv(&csv)?;
            let written = insert_legal_addresses(&conn, &addresses)?;
            println!("✓ Imported {} legal addresses", written);
        }
        Command::ImportPartners { csv } => {
            let rows = load_partners_csv(&csv)?;
            let written = insert_partners(&conn, &rows)?;
            println!("✓ Imported {} partners", written);
        }
        Command::ImportProducts { csv } => {
            let products = load_products_csv(&csv)?;
            let written = insert_products(&conn, &products)?;
            println!("✓ Imported {} products", written);
        }
        Command::ImportSales { csv } => {
            let records = load_sales_csv(&csv)?;
            let summary = insert_sales_records(&conn, &records)?;
            println!("✓ Inserted: {} sales records", summary.inserted);
            println!("✓ Skipped duplicates: {}", summary.duplicates);
            println!("📊 Sales records in database: {}", count_sales_records(&conn)?);
        }
        Command::Discount { partner_id } => {
            let partner = store
                .find_partner(partner_id)?
                .with_context(|| format!("Partner {} not found", partner_id))?;
            let total = total_sales(&store, partner_id)?;
            let discount = discount_for(total)?;

            println!("{} (#{})", partner.name, partner.id);
            println!("  Total sales: {}", total);
            println!("  Discount:    {}%", discount);
        }
        Command::Partners => {
            for row in partner_discounts(&store)? {
                println!(
                    "#{:<4} {:<30} {:<6} rating {:>2}  sales {:>9}  discount {:>2}%  {}",
                    row.partner_id,
                    row.name,
                    row.partner_type.as_deref().unwrap_or("-"),
                    row.rating,
                    row.total_sales,
                    row.discount_percent,
                    row.address.as_deref().unwrap_or("")
                );
            }
        }
        Command::Sales { partner } => {
            let entries = store.sales_history_view(partner)?;
            if entries.is_empty() {
                println!("No sales recorded");
            }
            for entry in entries {
                println!(
                    "{:<30} {:<40} {:>9}  {}",
                    entry.partner_name,
                    entry.product_name,
                    entry.quantity.as_deref().unwrap_or("-"),
                    entry
                        .sale_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Command::Events { partner_id } => {
            for event in get_events_for_entity(&conn, "partner", &partner_id.to_string())? {
                println!(
                    "{}  {:<16} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.data
                );
            }
        }
        Command::Tiers => {
            for tier in STANDARD_TIERS.iter() {
                println!("{:<18} {:>2}%", tier.range_label(), tier.percent);
            }
        }
        Command::Report { output } => {
            let report = DiscountReport::build(&store)?;

            if let Some(path) = output {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create report file {:?}", path))?;
                report.write_csv(file)?;
                println!("📁 Report saved to {:?}", path);
            }

            for tier in report.tier_summary() {
                println!(
                    "{:<18} {:>2}%  {:>4} partners  {:>10} sold",
                    tier.range, tier.discount_percent, tier.partner_count, tier.total_sales
                );
            }
            println!("{}", report.summary());
        }
    }

    Ok(())
}
