pub mod driver;
pub mod import;
pub mod pg;
pub mod record;
pub mod slug;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;
