//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A typed entity struct used by every other crate
//! - A `FromRow` row struct with text enum columns, converted via `TryFrom`
//! - `Deserialize` DTOs for inserts and list queries

pub mod job;
pub mod prospect;
pub mod scraper_config;
