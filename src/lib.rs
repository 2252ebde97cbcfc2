pub mod analytics;
pub mod app;
pub mod autocomplete;
pub mod cli;
pub mod clipboard;
pub mod codec;
pub mod config;
pub mod document;
pub mod geolocate;
pub mod interstitial;
pub mod output;
pub mod registry;
pub mod reload;
pub mod sort;
pub mod state;
pub mod toggle;
pub mod utils;

#[cfg(test)]
mod tests;
