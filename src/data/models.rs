//! Record types shared by extraction, persistence, and fan-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Address text used when the source gives no usable location.
pub const UNKNOWN_ADDRESS: &str = "장소 미상";

/// Marker that flags an address value as a placeholder rather than a place.
pub const UNKNOWN_MARKER: &str = "미상";

/// Description used when the source lists no clothing or distinguishing features.
pub const NO_FEATURES: &str = "특이사항 없음";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }
}

/// Target group a report belongs to, as published by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Category {
    MissingChild,
    Disabled,
    Dementia,
    Runaway,
    FacilityWard,
    Unidentified,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingChild => "missing_child",
            Self::Disabled => "disabled",
            Self::Dementia => "dementia",
            Self::Runaway => "runaway",
            Self::FacilityWard => "facility_ward",
            Self::Unidentified => "unidentified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RecordStatus {
    Active,
    Found,
    Archived,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Found => "found",
            Self::Archived => "archived",
        }
    }
}

/// Where a persisted record came from. Ingestion only ever writes `ApiIngested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReportSource {
    ApiIngested,
    UserSubmitted,
}

impl ReportSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiIngested => "api_ingested",
            Self::UserSubmitted => "user_submitted",
        }
    }
}

/// Error returned when a stored enum column holds an unrecognized value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} value: {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

macro_rules! impl_from_str {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(UnknownVariant {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_from_str!(Gender, "gender", [Male, Female, Unknown]);
impl_from_str!(
    Category,
    "category",
    [MissingChild, Disabled, Dementia, Runaway, FacilityWard, Unidentified]
);
impl_from_str!(RecordStatus, "status", [Active, Found, Archived]);
impl_from_str!(ReportSource, "report source", [ApiIngested, UserSubmitted]);

/// A resolved coordinate paired with the free-text address it was resolved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// A person record extracted from one listing page, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    /// `name_age_gender`, used to collapse repeated entries within one page.
    pub fingerprint: String,
    pub source_id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub category: Category,
    pub missing_date: String,
    pub address: String,
    pub location: Location,
    pub photo_url: Option<String>,
    pub description: String,
    pub clothing: String,
}

impl CandidateRecord {
    /// Promote to the persisted shape, stamped with the store's write time.
    pub fn into_record(self, updated_at: DateTime<Utc>) -> MissingPerson {
        MissingPerson {
            id: self.source_id,
            fingerprint: self.fingerprint,
            name: self.name,
            age: self.age,
            gender: self.gender,
            category: self.category,
            missing_date: self.missing_date,
            address: self.address,
            location: self.location,
            photo_url: self.photo_url,
            description: self.description,
            clothing: self.clothing,
            status: RecordStatus::Active,
            report_source: ReportSource::ApiIngested,
            updated_at,
        }
    }
}

/// The canonical stored record, as served to subscribers and the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MissingPerson {
    pub id: String,
    pub fingerprint: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub category: Category,
    pub missing_date: String,
    pub address: String,
    pub location: Location,
    pub photo_url: Option<String>,
    pub description: String,
    pub clothing: String,
    pub status: RecordStatus,
    pub report_source: ReportSource,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_str() {
        for category in [
            Category::MissingChild,
            Category::Disabled,
            Category::Dementia,
            Category::Runaway,
            Category::FacilityWard,
            Category::Unidentified,
        ] {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert!("woman".parse::<Gender>().is_err());
    }

    #[test]
    fn test_serde_names_match_column_values() {
        let json = serde_json::to_string(&Category::FacilityWard).unwrap();
        assert_eq!(json, "\"facility_ward\"");
        let json = serde_json::to_string(&ReportSource::ApiIngested).unwrap();
        assert_eq!(json, "\"api_ingested\"");
    }

    #[test]
    fn test_into_record_defaults_to_active_api_ingested() {
        let candidate = CandidateRecord {
            fingerprint: "홍길동_10_male".into(),
            source_id: "1234".into(),
            name: "홍길동".into(),
            age: 10,
            gender: Gender::Male,
            category: Category::MissingChild,
            missing_date: "2026-10-01".into(),
            address: UNKNOWN_ADDRESS.into(),
            location: Location {
                lat: 37.5665,
                lng: 126.9780,
                address: UNKNOWN_ADDRESS.into(),
            },
            photo_url: None,
            description: NO_FEATURES.into(),
            clothing: NO_FEATURES.into(),
        };
        let now = Utc::now();
        let record = candidate.into_record(now);
        assert_eq!(record.id, "1234");
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.report_source, ReportSource::ApiIngested);
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = CandidateRecord {
            fingerprint: "a_1_unknown".into(),
            source_id: "x".into(),
            name: "a".into(),
            age: 1,
            gender: Gender::Unknown,
            category: Category::MissingChild,
            missing_date: "2026-10-01".into(),
            address: "a".into(),
            location: Location {
                lat: 0.0,
                lng: 0.0,
                address: "a".into(),
            },
            photo_url: None,
            description: "d".into(),
            clothing: "c".into(),
        }
        .into_record(Utc::now());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("photoUrl").is_some());
        assert!(value.get("reportSource").is_some());
        assert!(value.get("updatedAt").is_some());
    }
}
