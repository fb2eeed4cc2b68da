use anyhow::Result;

use crate::catalog::store::CatalogStore;

/// Resolves a candidate slug to one that is free among *enabled* products for
/// the locale.
///
/// A hit on `exclude` counts as free — the product being updated may keep its
/// own slug (identity comparison by id, never by value). On a collision with
/// a different product, `-1`, `-2`, … are appended until a free slug is
/// found; the loop terminates for any finite catalog. Read-only.
pub async fn resolve_slug<S: CatalogStore + ?Sized>(
    store: &S,
    candidate: &str,
    locale: &str,
    exclude: Option<i64>,
) -> Result<String> {
    let taken_by_other =
        |found: Option<i64>| found.is_some_and(|id| exclude.is_none_or(|ex| ex != id));

    let found = store
        .find_enabled_product_id_by_slug(candidate, locale)
        .await?;
    if !taken_by_other(found) {
        return Ok(candidate.to_string());
    }

    let mut suffix: u64 = 0;
    loop {
        suffix += 1;
        let slug = format!("{candidate}-{suffix}");
        let found = store.find_enabled_product_id_by_slug(&slug, locale).await?;
        if !taken_by_other(found) {
            return Ok(slug);
        }
    }
}
