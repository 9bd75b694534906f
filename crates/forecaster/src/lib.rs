//! Energy forecaster HTTP service

pub mod api;
pub mod config;
mod startup;

pub use startup::build_state;
