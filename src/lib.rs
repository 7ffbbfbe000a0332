pub mod config;
pub mod cosmo;
pub mod domain;
pub mod drive;
pub mod error;
pub mod fetcher;
pub mod frontier;
pub mod index;
pub mod maps;
pub mod output;
pub mod store;
