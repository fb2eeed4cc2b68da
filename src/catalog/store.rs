use anyhow::Result;
use async_trait::async_trait;

/// A product row joined with its translation for the import locale.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub enabled: bool,
    pub main_taxon_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
}

/// A resolved sales-channel reference.
///
/// `epoch` is the store checkpoint generation the reference was resolved
/// under. A checkpoint invalidates every previously resolved reference, so
/// writes must reject refs whose epoch no longer matches the store's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: i64,
    pub code: String,
    pub epoch: u64,
}

impl ChannelRef {
    pub fn is_stale(&self, current_epoch: u64) -> bool {
        self.epoch != current_epoch
    }
}

/// Persistence seam for the reconciliation engine: repositories for the
/// catalog entity graph, channel resolution, and the commit-boundary
/// collaborator (`checkpoint`). Everything the engine writes goes through
/// here; everything it reads comes fresh from here (no cached associations).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // -- products -----------------------------------------------------------
    async fn find_product_by_code(&self, code: &str, locale: &str) -> Result<Option<Product>>;
    /// Slug lookup scoped to *enabled* products; disabled/draft products do
    /// not block a slug.
    async fn find_enabled_product_id_by_slug(&self, slug: &str, locale: &str)
        -> Result<Option<i64>>;
    async fn insert_product(
        &self,
        code: &str,
        slug: &str,
        name: &str,
        description: &str,
        locale: &str,
    ) -> Result<Product>;
    /// Patch the translation row; `None` fields are left untouched.
    async fn update_product_texts(
        &self,
        product_id: i64,
        locale: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()>;

    // -- taxons -------------------------------------------------------------
    async fn find_taxon_by_code(&self, code: &str) -> Result<Option<i64>>;
    /// New taxons take their name and slug from the code.
    async fn insert_taxon(&self, code: &str) -> Result<i64>;
    /// No-op when the product already has a main taxon.
    async fn set_main_taxon_if_unset(&self, product_id: i64, taxon_id: i64) -> Result<()>;
    async fn has_product_taxon(&self, product_id: i64, taxon_id: i64) -> Result<bool>;
    async fn insert_product_taxon(&self, product_id: i64, taxon_id: i64) -> Result<()>;

    // -- variants & pricing -------------------------------------------------
    async fn find_variant(&self, code: &str, product_id: i64) -> Result<Option<i64>>;
    async fn insert_variant(
        &self,
        product_id: i64,
        code: &str,
        name: &str,
        on_hand: i32,
    ) -> Result<i64>;
    async fn set_variant_on_hand(&self, variant_id: i64, on_hand: i32) -> Result<()>;
    async fn find_channel_pricing(
        &self,
        variant_id: i64,
        channel_code: &str,
    ) -> Result<Option<i64>>;
    async fn insert_channel_pricing(
        &self,
        variant_id: i64,
        channel_code: &str,
        price: i64,
    ) -> Result<i64>;
    async fn set_channel_pricing_price(&self, pricing_id: i64, price: i64) -> Result<()>;

    // -- channels -----------------------------------------------------------
    /// Idempotent set-add of the product/channel association. Fails on a
    /// stale `ChannelRef`.
    async fn attach_channel(&self, product_id: i64, channel: &ChannelRef) -> Result<()>;
    /// Errors when the code is unknown; the driver treats that as fatal.
    async fn resolve_channel(&self, code: &str) -> Result<ChannelRef>;

    // -- session ------------------------------------------------------------
    /// Commit boundary: flush pending writes, drop identity tracking and bump
    /// the epoch. Entity references obtained earlier must not be reused.
    async fn checkpoint(&self) -> Result<()>;
    /// Current checkpoint generation.
    fn epoch(&self) -> u64;
}
