//! Export du territoire

pub mod geojson;

pub use geojson::{export_regions, write_regions};
