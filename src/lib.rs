pub mod app;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod flatten;
mod http;
pub mod output;
pub mod pdbe;
pub mod query;
pub mod rcsb;
pub mod store;
pub mod view;
