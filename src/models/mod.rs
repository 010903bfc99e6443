pub mod analysis;
pub mod api;
pub mod asset;
pub mod brand;
pub mod compliance;
pub mod job;
