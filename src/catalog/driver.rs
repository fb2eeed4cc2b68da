use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::catalog::import::{import_product, ImportOutcome, ProductImport};
use crate::catalog::record::ProductRecord;
use crate::catalog::store::{CatalogStore, ChannelRef};

/// Records between resource-cleanup checkpoints, counted by absolute index.
pub const CHECKPOINT_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Update existing products with matching codes instead of skipping them.
    pub update_existing: bool,
    /// Skip the first N records.
    pub skip_records: usize,
    /// Process at most N records after skipping; `None` means unbounded.
    pub max_records: Option<usize>,
    /// Create and apply taxons for `category_id` values (`cat_` prefix).
    pub create_category_taxons: bool,
    /// Create and apply taxons for `producer_id` values (`prod_` prefix).
    pub create_producer_taxons: bool,
    /// Locale the feed's names, slugs and descriptions belong to.
    pub locale: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            update_existing: false,
            skip_records: 0,
            max_records: None,
            create_category_taxons: false,
            create_producer_taxons: false,
            locale: "en_US".to_string(),
        }
    }
}

/// Outcome counters for one run. Always satisfies
/// `created + updated + skipped_duplicate + invalid == records processed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped_duplicate: usize,
    pub invalid: usize,
}

impl ImportSummary {
    #[must_use]
    pub fn absorb(mut self, outcome: ImportOutcome) -> Self {
        match outcome {
            ImportOutcome::Created => self.created += 1,
            ImportOutcome::Updated => self.updated += 1,
            ImportOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
        }
        self
    }

    #[must_use]
    pub fn absorb_invalid(mut self) -> Self {
        self.invalid += 1;
        self
    }

    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped_duplicate + self.invalid
    }
}

/// Runs the batch import over `records`.
///
/// Channel codes are resolved once up front (fatal when any is unknown) and
/// re-resolved after every checkpoint, because a checkpoint invalidates
/// previously resolved references. Records missing a mandatory field count
/// as invalid and are never touched; everything else flows through the
/// product reconciler and lands in one of the outcome counters.
pub async fn run_import<S: CatalogStore>(
    store: &S,
    records: &[ProductRecord],
    channel_codes: &[String],
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let mut channels = resolve_channels(store, channel_codes).await?;

    let total = records.len();
    let mut summary = ImportSummary::default();
    if options.skip_records >= total {
        info!(
            skip = options.skip_records,
            total, "skip window covers the whole feed; nothing to process"
        );
        return Ok(summary);
    }

    let to_process = (total - options.skip_records).min(options.max_records.unwrap_or(usize::MAX));
    info!(
        total,
        skip = options.skip_records,
        to_process,
        update = options.update_existing,
        "starting import"
    );

    for i in options.skip_records..options.skip_records + to_process {
        // Periodic resource-cleanup checkpoint, keyed on the absolute record
        // index and never on the very first record. Channel refs resolved
        // before the checkpoint must not be reused afterwards.
        if i % CHECKPOINT_EVERY == 0 && i != 0 {
            store.checkpoint().await?;
            channels = resolve_channels(store, channel_codes).await?;
            debug!(index = i, "checkpoint done, channels re-resolved");
        }

        let record = &records[i];
        if !record.has_mandatory_fields() {
            debug!(index = i, "record lacks mandatory fields; counted invalid");
            summary = summary.absorb_invalid();
            continue;
        }

        let mut taxon_names = Vec::new();
        if options.create_category_taxons {
            if let Some(category) = &record.category_id {
                taxon_names.push(format!("cat_{category}"));
            }
        }
        if options.create_producer_taxons {
            if let Some(producer) = &record.producer_id {
                taxon_names.push(format!("prod_{producer}"));
            }
        }

        let price_minor = (record.price.unwrap_or(0.0) * 100.0).round() as i64;
        let import = ProductImport {
            code: &record.ean,
            slug: &record.slug,
            name: &record.title,
            locale: &options.locale,
            description: record.description.as_deref().unwrap_or(""),
            quantity: record.quantity.unwrap_or(0) as i32,
            price_minor,
            channels: &channels,
            taxon_names: &taxon_names,
            update_existing: options.update_existing,
        };
        let outcome = import_product(store, &import).await?;
        summary = summary.absorb(outcome);
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        skipped_duplicate = summary.skipped_duplicate,
        invalid = summary.invalid,
        "import finished"
    );
    Ok(summary)
}

async fn resolve_channels<S: CatalogStore>(
    store: &S,
    codes: &[String],
) -> Result<Vec<ChannelRef>> {
    let mut channels = Vec::with_capacity(codes.len());
    for code in codes {
        let channel = store
            .resolve_channel(code)
            .await
            .with_context(|| format!("resolving channel `{code}`"))?;
        channels.push(channel);
    }
    Ok(channels)
}
