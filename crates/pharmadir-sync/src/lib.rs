//! Sync layer: pulls candidate pharmacies from record sources, geocodes the
//! ones without coordinates, and hands the batch to the store.

pub mod collector;
pub mod geocode;
pub mod sources;

pub use collector::{CandidateSink, Collector, Pacing, RunPhase, RunReport};
pub use geocode::{DEFAULT_CITY_SUFFIX, GeocodeBackend, GeocodeError, Geocoder, NominatimGeocoder};
pub use sources::{RecordSource, SourceError, collect_from, default_sources};
