//! In-memory `CatalogStore` double for exercising the reconcilers and the
//! driver without a database. Test-only.

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::catalog::store::{CatalogStore, ChannelRef, Product};

#[derive(Debug, Clone)]
struct ProductRow {
    id: i64,
    code: String,
    enabled: bool,
    main_taxon_id: Option<i64>,
}

#[derive(Debug, Clone)]
struct TranslationRow {
    product_id: i64,
    locale: String,
    slug: String,
    name: String,
    description: String,
}

#[derive(Debug, Clone)]
struct TaxonRow {
    id: i64,
    code: String,
}

#[derive(Debug, Clone)]
pub struct VariantRow {
    pub id: i64,
    pub code: String,
    pub product_id: i64,
    pub name: String,
    pub on_hand: i32,
}

#[derive(Debug, Clone)]
struct PricingRow {
    id: i64,
    variant_id: i64,
    channel_code: String,
    price: i64,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    products: Vec<ProductRow>,
    translations: Vec<TranslationRow>,
    taxons: Vec<TaxonRow>,
    product_taxons: Vec<(i64, i64)>,
    variants: Vec<VariantRow>,
    pricings: Vec<PricingRow>,
    channels: Vec<(i64, String)>,
    product_channels: Vec<(i64, i64)>,
    epoch: u64,
    checkpoints: usize,
}

impl Inner {
    fn alloc(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product(&self, product_id: i64, locale: &str) -> Option<Product> {
        let row = self.products.iter().find(|p| p.id == product_id)?;
        let tr = self
            .translations
            .iter()
            .find(|t| t.product_id == product_id && t.locale == locale);
        Some(Product {
            id: row.id,
            code: row.code.clone(),
            enabled: row.enabled,
            main_taxon_id: row.main_taxon_id,
            name: tr.map(|t| t.name.clone()).unwrap_or_default(),
            slug: tr.map(|t| t.slug.clone()).unwrap_or_default(),
            description: tr.map(|t| t.description.clone()).unwrap_or_default(),
        })
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

/// Seeding and inspection helpers for tests.
impl MemoryCatalog {
    pub async fn seed_channel(&self, code: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.alloc();
        inner.channels.push((id, code.to_string()));
        id
    }

    pub async fn seed_product(&self, code: &str, locale: &str, slug: &str, enabled: bool) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.alloc();
        inner.products.push(ProductRow {
            id,
            code: code.to_string(),
            enabled,
            main_taxon_id: None,
        });
        inner.translations.push(TranslationRow {
            product_id: id,
            locale: locale.to_string(),
            slug: slug.to_string(),
            name: code.to_string(),
            description: String::new(),
        });
        id
    }

    pub async fn product_by_code(&self, code: &str, locale: &str) -> Option<Product> {
        let inner = self.inner.lock().unwrap();
        let id = inner.products.iter().find(|p| p.code == code)?.id;
        inner.product(id, locale)
    }

    pub async fn product_count(&self) -> usize {
        self.inner.lock().unwrap().products.len()
    }

    pub async fn taxon_count(&self) -> usize {
        self.inner.lock().unwrap().taxons.len()
    }

    pub async fn link_count(&self) -> usize {
        self.inner.lock().unwrap().product_taxons.len()
    }

    pub async fn taxon_codes(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.taxons.iter().map(|t| t.code.clone()).collect()
    }

    pub async fn main_taxon_of(&self, product_id: i64) -> Option<i64> {
        let inner = self.inner.lock().unwrap();
        inner
            .products
            .iter()
            .find(|p| p.id == product_id)
            .and_then(|p| p.main_taxon_id)
    }

    pub async fn variant_of(&self, product_code: &str) -> Option<VariantRow> {
        let inner = self.inner.lock().unwrap();
        let product_id = inner.products.iter().find(|p| p.code == product_code)?.id;
        inner
            .variants
            .iter()
            .find(|v| v.product_id == product_id)
            .cloned()
    }

    pub async fn pricing_of(&self, variant_id: i64, channel_code: &str) -> Option<i64> {
        let inner = self.inner.lock().unwrap();
        inner
            .pricings
            .iter()
            .find(|p| p.variant_id == variant_id && p.channel_code == channel_code)
            .map(|p| p.price)
    }

    pub async fn pricing_count(&self) -> usize {
        self.inner.lock().unwrap().pricings.len()
    }

    pub async fn attached_channels_of(&self, product_id: i64) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .product_channels
            .iter()
            .filter(|(p, _)| *p == product_id)
            .count()
    }

    pub async fn checkpoints(&self) -> usize {
        self.inner.lock().unwrap().checkpoints
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_product_by_code(&self, code: &str, locale: &str) -> Result<Option<Product>> {
        let inner = self.inner.lock().unwrap();
        let id = match inner.products.iter().find(|p| p.code == code) {
            Some(p) => p.id,
            None => return Ok(None),
        };
        Ok(inner.product(id, locale))
    }

    async fn find_enabled_product_id_by_slug(
        &self,
        slug: &str,
        locale: &str,
    ) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .translations
            .iter()
            .filter(|t| t.locale == locale && t.slug == slug)
            .map(|t| t.product_id)
            .find(|id| {
                inner
                    .products
                    .iter()
                    .any(|p| p.id == *id && p.enabled)
            }))
    }

    async fn insert_product(
        &self,
        code: &str,
        slug: &str,
        name: &str,
        description: &str,
        locale: &str,
    ) -> Result<Product> {
        let mut inner = self.inner.lock().unwrap();
        if inner.products.iter().any(|p| p.code == code) {
            bail!("duplicate product code `{code}`");
        }
        let id = inner.alloc();
        inner.products.push(ProductRow {
            id,
            code: code.to_string(),
            enabled: true,
            main_taxon_id: None,
        });
        inner.translations.push(TranslationRow {
            product_id: id,
            locale: locale.to_string(),
            slug: slug.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        });
        Ok(inner.product(id, locale).expect("just inserted"))
    }

    async fn update_product_texts(
        &self,
        product_id: i64,
        locale: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tr) = inner
            .translations
            .iter_mut()
            .find(|t| t.product_id == product_id && t.locale == locale)
        {
            if let Some(name) = name {
                tr.name = name.to_string();
            }
            if let Some(description) = description {
                tr.description = description.to_string();
            }
        }
        Ok(())
    }

    async fn find_taxon_by_code(&self, code: &str) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.taxons.iter().find(|t| t.code == code).map(|t| t.id))
    }

    async fn insert_taxon(&self, code: &str) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.taxons.iter().any(|t| t.code == code) {
            bail!("duplicate taxon code `{code}`");
        }
        let id = inner.alloc();
        inner.taxons.push(TaxonRow {
            id,
            code: code.to_string(),
        });
        Ok(id)
    }

    async fn set_main_taxon_if_unset(&self, product_id: i64, taxon_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.products.iter_mut().find(|p| p.id == product_id) {
            if p.main_taxon_id.is_none() {
                p.main_taxon_id = Some(taxon_id);
            }
        }
        Ok(())
    }

    async fn has_product_taxon(&self, product_id: i64, taxon_id: i64) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.product_taxons.contains(&(product_id, taxon_id)))
    }

    async fn insert_product_taxon(&self, product_id: i64, taxon_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.product_taxons.contains(&(product_id, taxon_id)) {
            bail!("duplicate product taxon ({product_id}, {taxon_id})");
        }
        inner.product_taxons.push((product_id, taxon_id));
        Ok(())
    }

    async fn find_variant(&self, code: &str, product_id: i64) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .variants
            .iter()
            .find(|v| v.code == code && v.product_id == product_id)
            .map(|v| v.id))
    }

    async fn insert_variant(
        &self,
        product_id: i64,
        code: &str,
        name: &str,
        on_hand: i32,
    ) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .variants
            .iter()
            .any(|v| v.code == code && v.product_id == product_id)
        {
            bail!("duplicate variant ({code}, {product_id})");
        }
        let id = inner.alloc();
        inner.variants.push(VariantRow {
            id,
            code: code.to_string(),
            product_id,
            name: name.to_string(),
            on_hand,
        });
        Ok(id)
    }

    async fn set_variant_on_hand(&self, variant_id: i64, on_hand: i32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(v) = inner.variants.iter_mut().find(|v| v.id == variant_id) {
            v.on_hand = on_hand;
        }
        Ok(())
    }

    async fn find_channel_pricing(
        &self,
        variant_id: i64,
        channel_code: &str,
    ) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .pricings
            .iter()
            .find(|p| p.variant_id == variant_id && p.channel_code == channel_code)
            .map(|p| p.id))
    }

    async fn insert_channel_pricing(
        &self,
        variant_id: i64,
        channel_code: &str,
        price: i64,
    ) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .pricings
            .iter()
            .any(|p| p.variant_id == variant_id && p.channel_code == channel_code)
        {
            bail!("duplicate channel pricing ({variant_id}, {channel_code})");
        }
        let id = inner.alloc();
        inner.pricings.push(PricingRow {
            id,
            variant_id,
            channel_code: channel_code.to_string(),
            price,
        });
        Ok(id)
    }

    async fn set_channel_pricing_price(&self, pricing_id: i64, price: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.pricings.iter_mut().find(|p| p.id == pricing_id) {
            p.price = price;
        }
        Ok(())
    }

    async fn attach_channel(&self, product_id: i64, channel: &ChannelRef) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if channel.is_stale(inner.epoch) {
            bail!(
                "stale channel reference `{}` (resolved before the last checkpoint)",
                channel.code
            );
        }
        if !inner.product_channels.contains(&(product_id, channel.id)) {
            inner.product_channels.push((product_id, channel.id));
        }
        Ok(())
    }

    async fn resolve_channel(&self, code: &str) -> Result<ChannelRef> {
        let inner = self.inner.lock().unwrap();
        match inner.channels.iter().find(|(_, c)| c == code) {
            Some((id, _)) => Ok(ChannelRef {
                id: *id,
                code: code.to_string(),
                epoch: inner.epoch,
            }),
            None => bail!("channel `{}` could not be found", code),
        }
    }

    async fn checkpoint(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.epoch += 1;
        inner.checkpoints += 1;
        Ok(())
    }

    fn epoch(&self) -> u64 {
        self.inner.lock().unwrap().epoch
    }
}
