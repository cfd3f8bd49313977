//! Business services

pub mod backup;
pub mod export;
pub mod geo;
pub mod geocoding;
pub mod nominatim;
pub mod rate_limiter;
pub mod schedule;
