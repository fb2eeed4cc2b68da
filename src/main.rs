use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use catalog_import::catalog::driver::{run_import, ImportOptions};
use catalog_import::catalog::pg::PgCatalogStore;
use catalog_import::catalog::record::read_records;
use catalog_import::util::db::Db;
use catalog_import::util::env as env_util;

#[derive(Parser, Debug)]
#[command(
    name = "import-products",
    version,
    about = "Import products from a JSON feed into the catalog"
)]
struct Cli {
    /// Path to the JSON file with product records.
    json_file: PathBuf,

    /// Channel code(s) to enable imported products in.
    channels: Vec<String>,

    /// Update existing products with matching codes (default: skip them).
    #[arg(short = 'u', long = "update-existing-products")]
    update_existing: bool,

    /// Create and apply taxons for `category_id` field values
    /// (the field is ignored without this option).
    #[arg(short = 'c', long = "create-category-taxons")]
    create_category_taxons: bool,

    /// Create and apply taxons for `producer_id` field values
    /// (the field is ignored without this option).
    #[arg(short = 'p', long = "create-producer-taxons")]
    create_producer_taxons: bool,

    /// Skip the first N records.
    #[arg(short = 's', long = "skip-records", default_value_t = 0)]
    skip_records: usize,

    /// Only process the first N records (after skipping).
    #[arg(short = 'm', long = "max-records")]
    max_records: Option<usize>,

    /// Locale the feed's names, slugs and descriptions belong to.
    #[arg(long, default_value = "en_US")]
    locale: String,

    /// Override the Postgres DSN (defaults to DATABASE_URL).
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    catalog_import::tracing::init_tracing("info,sqlx=warn")?;
    let cli = Cli::parse();

    let records = read_records(&cli.json_file)?;
    info!(
        total = records.len(),
        file = %cli.json_file.display(),
        "feed read and parsed"
    );

    if cli.channels.is_empty() {
        warn!("no channels specified; imported products will not be visible in any store");
    }

    let database_url = match cli.database_url.clone() {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 5);
    let db = Db::connect(&database_url, max_conns)
        .await
        .context("Db::connect failed")?;
    let store = PgCatalogStore::new(db);

    let options = ImportOptions {
        update_existing: cli.update_existing,
        skip_records: cli.skip_records,
        max_records: cli.max_records,
        create_category_taxons: cli.create_category_taxons,
        create_producer_taxons: cli.create_producer_taxons,
        locale: cli.locale.clone(),
    };
    let summary = run_import(&store, &records, &cli.channels, &options).await?;

    if summary.invalid > 0 {
        warn!(
            created = summary.created,
            updated = summary.updated,
            skipped_duplicate = summary.skipped_duplicate,
            invalid = summary.invalid,
            "done, but some records lacked mandatory fields"
        );
    } else {
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped_duplicate = summary.skipped_duplicate,
            "done"
        );
    }
    Ok(())
}
