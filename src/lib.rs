pub mod catalog;
pub mod normalization;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}
