use anyhow::Result;
use tracing::debug;

use crate::catalog::slug::resolve_slug;
use crate::catalog::store::{CatalogStore, ChannelRef, Product};
use crate::normalization::html::html_to_text;

/// Terminal state of one record's reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Updated,
    SkippedDuplicate,
}

/// One record's worth of import input, already validated and derived by the
/// driver (mandatory fields non-empty, price in minor units, taxon names
/// prefixed, channels resolved).
#[derive(Debug, Clone)]
pub struct ProductImport<'a> {
    pub code: &'a str,
    pub slug: &'a str,
    pub name: &'a str,
    pub locale: &'a str,
    /// Rich text; converted to plain text before storage.
    pub description: &'a str,
    pub quantity: i32,
    /// Integer minor currency units. Zero means "no price": the product is
    /// neither attached to a channel nor priced in it.
    pub price_minor: i64,
    pub channels: &'a [ChannelRef],
    pub taxon_names: &'a [String],
    pub update_existing: bool,
}

/// Creates or updates one product and its child entities (taxon links,
/// default variant, per-channel pricing).
///
/// A duplicate code with `update_existing = false` short-circuits before any
/// write: the skip is a true no-op so re-running an import is idempotent and
/// the counters reflect zero mutation.
pub async fn import_product<S: CatalogStore>(
    store: &S,
    import: &ProductImport<'_>,
) -> Result<ImportOutcome> {
    let existing = store
        .find_product_by_code(import.code, import.locale)
        .await?;
    // Slug resolution runs before the create/update branch, excluding the
    // product found above, so a product keeping its prior slug is not forced
    // onto a suffixed one.
    let slug = resolve_slug(
        store,
        import.slug,
        import.locale,
        existing.as_ref().map(|p| p.id),
    )
    .await?;

    let (product, outcome) = match existing {
        Some(product) => {
            if !import.update_existing {
                debug!(code = %import.code, "existing product, update disabled; skipping");
                return Ok(ImportOutcome::SkippedDuplicate);
            }
            // Only name and description are mutable; empty new values keep
            // the old ones. Code and slug never change here.
            let name = (!import.name.is_empty()).then_some(import.name);
            let description = html_to_text(import.description);
            let description = (!description.is_empty()).then_some(description);
            store
                .update_product_texts(product.id, import.locale, name, description.as_deref())
                .await?;
            let product = Product {
                name: name.map(str::to_string).unwrap_or(product.name),
                description: description.unwrap_or(product.description),
                ..product
            };
            (product, ImportOutcome::Updated)
        }
        None => {
            // Description is always set on create, even when it converts to
            // an empty string.
            let description = html_to_text(import.description);
            let product = store
                .insert_product(import.code, &slug, import.name, &description, import.locale)
                .await?;
            (product, ImportOutcome::Created)
        }
    };

    for taxon_name in import.taxon_names {
        add_product_taxon(store, &product, taxon_name, false).await?;
    }

    let variant_id = upsert_default_variant(store, &product, import.quantity).await?;

    for channel in import.channels {
        if import.price_minor != 0 {
            store.attach_channel(product.id, channel).await?;
            upsert_channel_pricing(store, variant_id, channel, import.price_minor).await?;
        }
    }

    Ok(outcome)
}

/// Links `product` to the taxon with `taxon_code`, creating the taxon when it
/// does not exist yet (name and slug default to the code). With `set_as_main`
/// the taxon becomes the product's main taxon only if none is set; an
/// existing main taxon is never overwritten. The link is created at most once
/// per (product, taxon) pair.
pub async fn add_product_taxon<S: CatalogStore>(
    store: &S,
    product: &Product,
    taxon_code: &str,
    set_as_main: bool,
) -> Result<()> {
    let (taxon_id, created) = taxon_or_create(store, taxon_code).await?;
    if created {
        debug!(taxon_code = %taxon_code, taxon_id, "taxon created");
    }

    if set_as_main {
        store.set_main_taxon_if_unset(product.id, taxon_id).await?;
    }

    if !store.has_product_taxon(product.id, taxon_id).await? {
        store.insert_product_taxon(product.id, taxon_id).await?;
    }
    Ok(())
}

/// Get-or-create for the product's single default variant, keyed by
/// (code = product code, product). On-hand quantity is overwritten on every
/// import, found or new.
pub async fn upsert_default_variant<S: CatalogStore>(
    store: &S,
    product: &Product,
    quantity: i32,
) -> Result<i64> {
    let (variant_id, _) = variant_or_create(store, product, quantity).await?;
    store.set_variant_on_hand(variant_id, quantity).await?;
    Ok(variant_id)
}

/// Get-or-create for the (variant, channel) pricing row; the price is
/// overwritten on every import. The lookup goes straight to the repository —
/// never through cached associations on the variant, which would be stale
/// after a checkpoint and would turn a blind create into a uniqueness
/// violation.
pub async fn upsert_channel_pricing<S: CatalogStore>(
    store: &S,
    variant_id: i64,
    channel: &ChannelRef,
    price_minor: i64,
) -> Result<i64> {
    let (pricing_id, _) = pricing_or_create(store, variant_id, &channel.code, price_minor).await?;
    store
        .set_channel_pricing_price(pricing_id, price_minor)
        .await?;
    Ok(pricing_id)
}

pub async fn taxon_or_create<S: CatalogStore>(store: &S, code: &str) -> Result<(i64, bool)> {
    if let Some(id) = store.find_taxon_by_code(code).await? {
        return Ok((id, false));
    }
    Ok((store.insert_taxon(code).await?, true))
}

pub async fn variant_or_create<S: CatalogStore>(
    store: &S,
    product: &Product,
    quantity: i32,
) -> Result<(i64, bool)> {
    if let Some(id) = store.find_variant(&product.code, product.id).await? {
        return Ok((id, false));
    }
    let id = store
        .insert_variant(product.id, &product.code, &product.name, quantity)
        .await?;
    Ok((id, true))
}

pub async fn pricing_or_create<S: CatalogStore>(
    store: &S,
    variant_id: i64,
    channel_code: &str,
    price_minor: i64,
) -> Result<(i64, bool)> {
    if let Some(id) = store.find_channel_pricing(variant_id, channel_code).await? {
        return Ok((id, false));
    }
    let id = store
        .insert_channel_pricing(variant_id, channel_code, price_minor)
        .await?;
    Ok((id, true))
}
