//! Report categories.
//!
//! The category set is closed. Labels arriving from clients are parsed once
//! at the boundary and rejected if unknown, so repositories and queries only
//! ever see a [`Category`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Traffic,
    RoadDamage,
    WaterDrainage,
    FallenTree,
    StreetLightIssue,
    UnderMaintenance,
    GarbageDumping,
    IllegalParking,
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 9] = [
        Self::Traffic,
        Self::RoadDamage,
        Self::WaterDrainage,
        Self::FallenTree,
        Self::StreetLightIssue,
        Self::UnderMaintenance,
        Self::GarbageDumping,
        Self::IllegalParking,
        Self::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "Traffic",
            Self::RoadDamage => "Road Damage",
            Self::WaterDrainage => "Water Drainage",
            Self::FallenTree => "Fallen Tree",
            Self::StreetLightIssue => "Street Light Issue",
            Self::UnderMaintenance => "Under Maintenance",
            Self::GarbageDumping => "Garbage Dumping",
            Self::IllegalParking => "Illegal Parking",
            Self::Other => "Other",
        }
    }

    /// Exact label match after trimming surrounding whitespace.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }

    /// Parse a client-supplied label.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for labels outside the closed set.
    pub fn parse(label: &str) -> Result<Self, ServiceError> {
        Self::from_label(label).ok_or_else(|| ServiceError::Validation(format!("unknown category: {label:?}")))
    }

    /// Parse an optional filter value. Missing or blank means "all categories".
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for non-blank unknown labels.
    pub fn parse_filter(raw: Option<&str>) -> Result<Option<Self>, ServiceError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(label) => Self::parse(label).map(Some),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_label(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown category: {raw:?}")))
    }
}

#[cfg(test)]
#[path = "category_test.rs"]
mod tests;
