use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

use crate::catalog::store::{CatalogStore, ChannelRef, Product};
use crate::util::db::Db;

/// `CatalogStore` backed by Postgres through sqlx.
///
/// Writes are autocommitted, so `checkpoint` has nothing to flush; it only
/// advances the epoch that invalidates previously resolved channel refs.
pub struct PgCatalogStore {
    db: Db,
    epoch: AtomicU64,
}

impl PgCatalogStore {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            epoch: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_product_by_code(&self, code: &str, locale: &str) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT p.id, p.code, p.enabled, p.main_taxon_id, t.name, t.slug, t.description
             FROM products p
             LEFT JOIN product_translations t ON t.product_id = p.id AND t.locale = $2
             WHERE p.code = $1",
        )
        .persistent(false)
        .bind(code)
        .bind(locale)
        .fetch_optional(&self.db.pool)
        .await?;
        let product = match row {
            Some(r) => Some(Product {
                id: r.get("id"),
                code: r.get("code"),
                enabled: r.get("enabled"),
                main_taxon_id: r.get("main_taxon_id"),
                name: r.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
                slug: r.try_get::<Option<String>, _>("slug")?.unwrap_or_default(),
                description: r
                    .try_get::<Option<String>, _>("description")?
                    .unwrap_or_default(),
            }),
            None => None,
        };
        Ok(product)
    }

    async fn find_enabled_product_id_by_slug(
        &self,
        slug: &str,
        locale: &str,
    ) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT p.id
             FROM products p
             JOIN product_translations t ON t.product_id = p.id
             WHERE t.locale = $1 AND t.slug = $2 AND p.enabled = TRUE",
        )
        .persistent(false)
        .bind(locale)
        .bind(slug)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(|r| r.get("id")))
    }

    async fn insert_product(
        &self,
        code: &str,
        slug: &str,
        name: &str,
        description: &str,
        locale: &str,
    ) -> Result<Product> {
        let inserted = sqlx::query("INSERT INTO products (code) VALUES ($1) RETURNING id")
            .persistent(false)
            .bind(code)
            .fetch_one(&self.db.pool)
            .await?;
        let id: i64 = inserted.get("id");
        sqlx::query(
            "INSERT INTO product_translations (product_id, locale, slug, name, description)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .persistent(false)
        .bind(id)
        .bind(locale)
        .bind(slug)
        .bind(name)
        .bind(description)
        .execute(&self.db.pool)
        .await?;
        debug!(product_code = %code, product_id = id, %slug, "product inserted");
        Ok(Product {
            id,
            code: code.to_string(),
            enabled: true,
            main_taxon_id: None,
            name: name.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    async fn update_product_texts(
        &self,
        product_id: i64,
        locale: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE product_translations
             SET name = COALESCE($3, name), description = COALESCE($4, description)
             WHERE product_id = $1 AND locale = $2",
        )
        .persistent(false)
        .bind(product_id)
        .bind(locale)
        .bind(name)
        .bind(description)
        .execute(&self.db.pool)
        .await?;
        debug!(product_id, "product translation updated");
        Ok(())
    }

    async fn find_taxon_by_code(&self, code: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM taxons WHERE code = $1")
            .persistent(false)
            .bind(code)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    async fn insert_taxon(&self, code: &str) -> Result<i64> {
        // Name and slug default to the code; the feed carries no display name.
        let inserted =
            sqlx::query("INSERT INTO taxons (code, name, slug) VALUES ($1, $1, $1) RETURNING id")
                .persistent(false)
                .bind(code)
                .fetch_one(&self.db.pool)
                .await?;
        let id: i64 = inserted.get("id");
        debug!(taxon_code = %code, taxon_id = id, "taxon inserted");
        Ok(id)
    }

    async fn set_main_taxon_if_unset(&self, product_id: i64, taxon_id: i64) -> Result<()> {
        sqlx::query("UPDATE products SET main_taxon_id = $2 WHERE id = $1 AND main_taxon_id IS NULL")
            .persistent(false)
            .bind(product_id)
            .bind(taxon_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn has_product_taxon(&self, product_id: i64, taxon_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM product_taxons WHERE product_id = $1 AND taxon_id = $2)",
        )
        .persistent(false)
        .bind(product_id)
        .bind(taxon_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_product_taxon(&self, product_id: i64, taxon_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO product_taxons (product_id, taxon_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .persistent(false)
        .bind(product_id)
        .bind(taxon_id)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn find_variant(&self, code: &str, product_id: i64) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM product_variants WHERE code = $1 AND product_id = $2")
            .persistent(false)
            .bind(code)
            .bind(product_id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    async fn insert_variant(
        &self,
        product_id: i64,
        code: &str,
        name: &str,
        on_hand: i32,
    ) -> Result<i64> {
        let inserted = sqlx::query(
            "INSERT INTO product_variants (product_id, code, name, on_hand)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .persistent(false)
        .bind(product_id)
        .bind(code)
        .bind(name)
        .bind(on_hand)
        .fetch_one(&self.db.pool)
        .await?;
        let id: i64 = inserted.get("id");
        debug!(variant_code = %code, variant_id = id, product_id, "variant inserted");
        Ok(id)
    }

    async fn set_variant_on_hand(&self, variant_id: i64, on_hand: i32) -> Result<()> {
        sqlx::query("UPDATE product_variants SET on_hand = $2 WHERE id = $1")
            .persistent(false)
            .bind(variant_id)
            .bind(on_hand)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn find_channel_pricing(
        &self,
        variant_id: i64,
        channel_code: &str,
    ) -> Result<Option<i64>> {
        let row =
            sqlx::query("SELECT id FROM channel_pricings WHERE variant_id = $1 AND channel_code = $2")
                .persistent(false)
                .bind(variant_id)
                .bind(channel_code)
                .fetch_optional(&self.db.pool)
                .await?;
        Ok(row.map(|r| r.get("id")))
    }

    async fn insert_channel_pricing(
        &self,
        variant_id: i64,
        channel_code: &str,
        price: i64,
    ) -> Result<i64> {
        let inserted = sqlx::query(
            "INSERT INTO channel_pricings (variant_id, channel_code, price)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .persistent(false)
        .bind(variant_id)
        .bind(channel_code)
        .bind(price)
        .fetch_one(&self.db.pool)
        .await?;
        let id: i64 = inserted.get("id");
        debug!(variant_id, %channel_code, price, "channel pricing inserted");
        Ok(id)
    }

    async fn set_channel_pricing_price(&self, pricing_id: i64, price: i64) -> Result<()> {
        sqlx::query("UPDATE channel_pricings SET price = $2 WHERE id = $1")
            .persistent(false)
            .bind(pricing_id)
            .bind(price)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn attach_channel(&self, product_id: i64, channel: &ChannelRef) -> Result<()> {
        if channel.is_stale(self.epoch()) {
            bail!(
                "stale channel reference `{}` (resolved before the last checkpoint)",
                channel.code
            );
        }
        sqlx::query(
            "INSERT INTO product_channels (product_id, channel_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .persistent(false)
        .bind(product_id)
        .bind(channel.id)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn resolve_channel(&self, code: &str) -> Result<ChannelRef> {
        let row = sqlx::query("SELECT id FROM channels WHERE code = $1")
            .persistent(false)
            .bind(code)
            .fetch_optional(&self.db.pool)
            .await?;
        match row {
            Some(r) => Ok(ChannelRef {
                id: r.get("id"),
                code: code.to_string(),
                epoch: self.epoch(),
            }),
            None => bail!("channel `{}` could not be found", code),
        }
    }

    async fn checkpoint(&self) -> Result<()> {
        let next = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch = next, "checkpoint: previously resolved references are now stale");
        Ok(())
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}
