//! Pharmacy entity, transient candidate records, and the partial-merge rule.
//!
//! A [`Pharmacy`] is what the store persists. A [`Candidate`] is what a record
//! source produces before it has been reconciled. Both meet in [`merge`], which
//! applies only the fields present on a [`PharmacyPatch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair. The two halves are always stored together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A persisted pharmacy row.
///
/// Serializes to the transfer shape served by the HTTP layer, with RFC 3339
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub hours: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pharmacy {
    /// Build a new entity from a candidate. Both timestamps are set to `now`.
    pub fn from_candidate(id: i64, candidate: &Candidate, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: candidate.name.clone(),
            address: candidate.address.clone(),
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            phone: candidate.phone.clone(),
            email: candidate.email.clone(),
            hours: candidate.hours.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// A not-yet-persisted pharmacy description produced by a record source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub hours: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_hours(mut self, hours: impl Into<String>) -> Self {
        self.hours = Some(hours.into());
        self
    }

    pub fn with_coordinates(mut self, coords: Coordinates) -> Self {
        self.set_coordinates(coords);
        self
    }

    /// True only when both halves of the coordinate pair are present.
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn set_coordinates(&mut self, coords: Coordinates) {
        self.latitude = Some(coords.latitude);
        self.longitude = Some(coords.longitude);
    }

    /// The candidate's present fields as a patch.
    ///
    /// The name is left out: it is the reconciliation key, so it already
    /// equals the stored name whenever this patch is applied.
    pub fn to_patch(&self) -> PharmacyPatch {
        PharmacyPatch {
            name: None,
            address: Some(self.address.clone()),
            latitude: self.latitude,
            longitude: self.longitude,
            phone: self.phone.clone(),
            email: self.email.clone(),
            hours: self.hours.clone(),
        }
    }
}

/// A partial update. `None` means "leave the stored value alone".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PharmacyPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub hours: Option<String>,
}

impl PharmacyPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.hours.is_none()
    }
}

/// Apply every field present on `patch` to `entity` and stamp `updated_at`.
///
/// `updated_at` is refreshed even when the patch carries no field that differs
/// from the stored value.
pub fn merge(entity: &mut Pharmacy, patch: &PharmacyPatch, now: DateTime<Utc>) {
    fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
        if let Some(v) = value {
            *slot = v.clone();
        }
    }
    fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            slot.clone_from(value);
        }
    }

    set(&mut entity.name, &patch.name);
    set(&mut entity.address, &patch.address);
    set_opt(&mut entity.latitude, &patch.latitude);
    set_opt(&mut entity.longitude, &patch.longitude);
    set_opt(&mut entity.phone, &patch.phone);
    set_opt(&mut entity.email, &patch.email);
    set_opt(&mut entity.hours, &patch.hours);
    entity.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn stored() -> Pharmacy {
        Pharmacy {
            id: 7,
            name: "Pharmacie Centrale".into(),
            address: "Boulevard Roume, Plateau".into(),
            latitude: Some(5.32),
            longitude: Some(-4.02),
            phone: Some("+22527229012".into()),
            email: Some("contact@pharmacie-centrale.ci".into()),
            hours: None,
            created_at: ts(1_000),
            updated_at: ts(1_000),
        }
    }

    #[test]
    fn from_candidate_sets_equal_timestamps() {
        let cand = Candidate::new("Pharmacie du Port", "Port Autonome d'Abidjan")
            .with_phone("+22527225566")
            .with_hours("7h-19h");
        let p = Pharmacy::from_candidate(1, &cand, ts(2_000));
        assert_eq!(p.created_at, p.updated_at);
        assert_eq!(p.phone.as_deref(), Some("+22527225566"));
        assert_eq!(p.hours.as_deref(), Some("7h-19h"));
        assert!(p.email.is_none());
        assert!(p.coordinates().is_none());
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let mut p = stored();
        let patch = PharmacyPatch {
            hours: Some("24h/24".into()),
            ..Default::default()
        };
        merge(&mut p, &patch, ts(5_000));

        assert_eq!(p.hours.as_deref(), Some("24h/24"));
        assert_eq!(p.address, "Boulevard Roume, Plateau");
        assert_eq!(p.phone.as_deref(), Some("+22527229012"));
        assert_eq!(p.coordinates(), Some(Coordinates::new(5.32, -4.02)));
        assert_eq!(p.created_at, ts(1_000));
        assert_eq!(p.updated_at, ts(5_000));
    }

    #[test]
    fn candidate_patch_never_renames() {
        let cand = Candidate::new("Other Name", "Cocody");
        let patch = cand.to_patch();
        assert!(patch.name.is_none());
        assert_eq!(patch.address.as_deref(), Some("Cocody"));
        assert!(patch.phone.is_none());
    }

    #[test]
    fn merge_accumulates_across_patches() {
        let mut p = stored();
        p.phone = None;
        merge(&mut p, &Candidate::new("A", "Y").with_phone("1").to_patch(), ts(2));
        merge(&mut p, &Candidate::new("A", "X").to_patch(), ts(3));
        assert_eq!(p.phone.as_deref(), Some("1"));
        assert_eq!(p.address, "X");
    }

    #[test]
    fn patch_deserializes_missing_fields_as_absent() {
        let patch: PharmacyPatch = serde_json::from_str(r#"{"phone": "+22507070707"}"#).unwrap();
        assert_eq!(patch.phone.as_deref(), Some("+22507070707"));
        assert!(patch.address.is_none());
        assert!(!patch.is_empty());

        let empty: PharmacyPatch = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn transfer_shape_uses_rfc3339() {
        let json = serde_json::to_value(stored()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["name"], "Pharmacie Centrale");
        assert_eq!(json["hours"], serde_json::Value::Null);
        assert_eq!(json["created_at"], "1970-01-01T00:16:40Z");
    }
}
