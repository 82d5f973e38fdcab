//! Core types shared by the store, sync, and HTTP layers.

pub mod extract;
pub mod pharmacy;

pub use extract::{extract_email, extract_phone};
pub use pharmacy::{Candidate, Coordinates, Pharmacy, PharmacyPatch, merge};
