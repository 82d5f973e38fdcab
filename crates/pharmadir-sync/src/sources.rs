//! Record sources: independent origins of candidate pharmacies.
//!
//! The built-in sources serve fixed listings for Abidjan (on-duty rota,
//! directory, well-known landmarks). Contact details arrive as free text and
//! go through the field extractors, the same path a scraped page would take.

use async_trait::async_trait;
use pharmadir_core::{Candidate, extract_email, extract_phone};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("listing {index} in {source_name} is missing its {field}")]
    Incomplete {
        source_name: String,
        index: usize,
        field: &'static str,
    },
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    /// Every candidate this source currently knows about.
    async fn fetch(&self) -> Result<Vec<Candidate>, SourceError>;
}

/// Fetch from one source, logging and swallowing its failure.
pub async fn collect_from(source: &dyn RecordSource) -> Vec<Candidate> {
    match source.fetch().await {
        Ok(candidates) => {
            info!(source = source.name(), count = candidates.len(), "source fetched");
            candidates
        }
        Err(e) => {
            error!(source = source.name(), error = %e, "source failed; skipping");
            Vec::new()
        }
    }
}

/// The built-in sources, in collection order.
pub fn default_sources() -> Vec<Box<dyn RecordSource>> {
    vec![
        Box::new(StaticSource::new("on-duty", ON_DUTY)),
        Box::new(StaticSource::new("directory", DIRECTORY)),
        Box::new(StaticSource::new("landmarks", LANDMARKS)),
    ]
}

/// One raw listing as it would appear on a page.
#[derive(Debug, Clone, Copy)]
pub struct Listing {
    pub name: &'static str,
    pub address: &'static str,
    /// Free-form contact line; phone and email are extracted from it.
    pub contact: &'static str,
    pub hours: Option<&'static str>,
}

/// A source backed by a fixed listing table.
pub struct StaticSource {
    name: &'static str,
    listings: &'static [Listing],
}

impl StaticSource {
    pub const fn new(name: &'static str, listings: &'static [Listing]) -> Self {
        Self { name, listings }
    }

    fn to_candidate(&self, index: usize, listing: &Listing) -> Result<Candidate, SourceError> {
        let incomplete = |field| SourceError::Incomplete {
            source_name: self.name.to_string(),
            index,
            field,
        };
        let name = listing.name.trim();
        if name.is_empty() {
            return Err(incomplete("name"));
        }
        let address = listing.address.trim();
        if address.is_empty() {
            return Err(incomplete("address"));
        }
        Ok(Candidate {
            name: name.to_string(),
            address: address.to_string(),
            phone: extract_phone(listing.contact),
            email: extract_email(listing.contact),
            hours: listing.hours.map(str::to_string),
            latitude: None,
            longitude: None,
        })
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<Candidate>, SourceError> {
        self.listings
            .iter()
            .enumerate()
            .map(|(i, l)| self.to_candidate(i, l))
            .collect()
    }
}

const ON_DUTY: &[Listing] = &[
    Listing {
        name: "Pharmacie de Garde Cocody",
        address: "Cocody, Abidjan, Côte d'Ivoire",
        contact: "Tél : +225 27 22 12 34 / garde.cocody@pharma.ci",
        hours: None,
    },
    Listing {
        name: "Pharmacie de Garde Plateau",
        address: "Plateau, Abidjan, Côte d'Ivoire",
        contact: "Tél : +225 27 22 56 78 / garde.plateau@pharma.ci",
        hours: None,
    },
];

const DIRECTORY: &[Listing] = &[
    Listing {
        name: "Pharmacie Centrale",
        address: "Boulevard Roume, Plateau, Abidjan",
        contact: "+225 27 22 90 12 - contact@pharmacie-centrale.ci",
        hours: None,
    },
    Listing {
        name: "Pharmacie Saint-Jean",
        address: "Rue des Jardins, Cocody, Abidjan",
        contact: "+225 27 22 34 56 - info@pharmacie-saintjean.ci",
        hours: None,
    },
    Listing {
        name: "Pharmacie du Marché",
        address: "Marché de Treichville, Abidjan",
        contact: "+225 27 22 78 90",
        hours: None,
    },
];

const LANDMARKS: &[Listing] = &[
    Listing {
        name: "Pharmacie de l'Aéroport",
        address: "Aéroport Félix Houphouët-Boigny, Abidjan",
        contact: "+225 27 22 11 22, aeroport@pharma.ci",
        hours: Some("24h/24"),
    },
    Listing {
        name: "Pharmacie de l'Université",
        address: "Université Félix Houphouët-Boigny, Cocody, Abidjan",
        contact: "+225 27 22 33 44, universite@pharma.ci",
        hours: Some("8h-18h"),
    },
    Listing {
        name: "Pharmacie du Port",
        address: "Port Autonome d'Abidjan",
        contact: "+225 27 22 55 66, port@pharma.ci",
        hours: Some("7h-19h"),
    },
];
