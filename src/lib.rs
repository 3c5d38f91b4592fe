pub mod checkout;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod generation;
pub mod image_processing;
pub mod logging;
pub mod payments;
pub mod reducer;
pub mod routes;
pub mod settings;
pub mod store;
pub mod styles;
pub mod uploads;
pub mod validation;
