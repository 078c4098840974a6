// Core library: listing data, filtering, sanitizing of scraped listings,
// site content, contact validation, and configuration. No network or async.

pub mod config;
pub mod contact;
pub mod external;
pub mod filter;
pub mod format;
pub mod listing;
pub mod repository;
pub mod site;
