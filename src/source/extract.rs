//! Extraction of person records from one listing page.
//!
//! The listing renders each person as an `<li>` holding a link to the detail
//! page, a photo, and loosely labeled text ("실종일: ...", "실종장소: ...").
//! There is no stable structure below the `<li>`, so fields are pulled from the
//! block's flattened text with the rules in [`CompiledPatterns`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::{DateTime, Utc};
use html_scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};
use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::data::models::{
    CandidateRecord, Category, Gender, NO_FEATURES, UNKNOWN_ADDRESS, UNKNOWN_MARKER,
};
use crate::geocode::AddressResolver;
use crate::source::dates::normalize_date_text;
use crate::source::errors::ExtractError;
use crate::source::patterns::{CompiledPatterns, first_capture, first_capture_where, first_rule};

static IMG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// Name, age, and gender of one person block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    name: String,
    age: u32,
    gender: Gender,
}

impl Identity {
    fn fingerprint(&self) -> String {
        fingerprint(&self.name, self.age, self.gender)
    }
}

/// `name_age_gender`, with the name NFC-normalized and stripped of whitespace.
pub fn fingerprint(name: &str, age: u32, gender: Gender) -> String {
    let name: String = name.nfc().filter(|c| !c.is_whitespace()).collect();
    format!("{name}_{age}_{}", gender.as_str())
}

/// Deterministic id for records whose detail link carries no numeric id.
pub fn synthetic_id(fingerprint: &str) -> String {
    STANDARD_NO_PAD.encode(fingerprint.as_bytes())
}

pub struct RecordExtractor {
    patterns: CompiledPatterns,
    base: Url,
    resolver: AddressResolver,
}

impl RecordExtractor {
    /// `base` is the upstream origin; relative links and photo paths resolve against it.
    pub fn new(patterns: CompiledPatterns, base: Url, resolver: AddressResolver) -> Self {
        Self {
            patterns,
            base,
            resolver,
        }
    }

    /// Extract candidates from one page. Never fails: a page that cannot be
    /// processed yields no records, and a malformed person block is skipped.
    pub fn extract(&self, html: &str, now: DateTime<Utc>) -> Vec<CandidateRecord> {
        match self.try_extract(html, now) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = ?e, "Failed to parse listing page, treating as empty");
                Vec::new()
            }
        }
    }

    fn try_extract(&self, html: &str, now: DateTime<Utc>) -> Result<Vec<CandidateRecord>, ExtractError> {
        if html.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let document = Html::parse_document(html);
        let anchors: Vec<ElementRef<'_>> = document.select(&self.patterns.detail_selector).collect();
        if anchors.is_empty() {
            debug!("No detail links on page");
            return Ok(Vec::new());
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        for (index, anchor) in anchors.into_iter().enumerate() {
            let container = person_block(anchor);
            let text = block_text(container);

            let identity = match self.parse_identity(&text) {
                Ok(Some(identity)) => identity,
                Ok(None) => {
                    trace!(index, "Link block has no name and age, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(index, error = ?e, "Failed to extract record, skipping");
                    continue;
                }
            };

            let fingerprint = identity.fingerprint();
            if seen.contains(&fingerprint) {
                trace!(index, fingerprint = %fingerprint, "Duplicate person block on page");
                continue;
            }

            match self.build_record(anchor, container, &text, identity, fingerprint, now) {
                Ok(record) => {
                    seen.insert(record.fingerprint.clone());
                    records.push(record);
                }
                Err(e) => warn!(index, error = ?e, "Failed to extract record, skipping"),
            }
        }

        debug!(count = records.len(), "Extracted records from page");
        Ok(records)
    }

    fn parse_identity(&self, text: &str) -> Result<Option<Identity>, ExtractError> {
        let Some(caps) = self.patterns.name_age.captures(text) else {
            return Ok(None);
        };
        let (Some(name), Some(age)) = (caps.get(1), caps.get(2)) else {
            return Ok(None);
        };
        let age = parse_age(age.as_str())?;
        let gender = first_rule(&self.patterns.gender, text).unwrap_or(Gender::Unknown);

        Ok(Some(Identity {
            name: name.as_str().to_string(),
            age,
            gender,
        }))
    }

    fn build_record(
        &self,
        anchor: ElementRef<'_>,
        container: ElementRef<'_>,
        text: &str,
        identity: Identity,
        fingerprint: String,
        now: DateTime<Utc>,
    ) -> Result<CandidateRecord, ExtractError> {
        let source_id = anchor
            .attr("href")
            .and_then(|href| self.link_id(href))
            .unwrap_or_else(|| synthetic_id(&fingerprint));

        let category = first_rule(&self.patterns.category, text).unwrap_or(Category::MissingChild);

        let photo_url = container
            .select(&IMG_SELECTOR)
            .next()
            .and_then(|img| img.attr("src"))
            .and_then(|src| self.photo_url(src));

        let age = match first_capture(&self.patterns.current_age, text) {
            Some(current) => parse_age(&current)?,
            None => identity.age,
        };

        let missing_date = first_capture(&self.patterns.missing_date, text)
            .map(|raw| normalize_date_text(&raw))
            .unwrap_or_else(|| now.to_rfc3339());

        let address = first_capture_where(&self.patterns.address, text, |value| {
            value.chars().count() > 2 && !value.contains(UNKNOWN_MARKER)
        })
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

        let clothing = first_capture(&self.patterns.clothing, text);
        let description = clothing.clone().unwrap_or_else(|| NO_FEATURES.to_string());

        let location = self.resolver.resolve(&address);

        Ok(CandidateRecord {
            fingerprint,
            source_id,
            name: identity.name,
            age,
            gender: identity.gender,
            category,
            missing_date,
            address,
            location,
            photo_url,
            description,
            clothing: clothing.unwrap_or_else(|| NO_FEATURES.to_string()),
        })
    }

    /// Numeric person id from a detail link's query string.
    fn link_id(&self, href: &str) -> Option<String> {
        let url = self.base.join(href).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == self.patterns.id_param.as_str())
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
    }

    /// Absolute photo URL, or `None` for empty sources and placeholder images.
    fn photo_url(&self, src: &str) -> Option<String> {
        let src = src.trim();
        if src.is_empty() {
            return None;
        }

        let lowered = src.to_lowercase();
        if self
            .patterns
            .no_image_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
        {
            return None;
        }

        let origin = self.base.origin().ascii_serialization();
        Some(if lowered.starts_with("http://") || lowered.starts_with("https://") {
            src.to_string()
        } else if let Some(rest) = src.strip_prefix("//") {
            format!("{}://{rest}", self.base.scheme())
        } else if src.starts_with('/') {
            format!("{origin}{src}")
        } else {
            format!("{origin}/{src}")
        })
    }
}

fn parse_age(digits: &str) -> Result<u32, ExtractError> {
    digits
        .trim()
        .parse()
        .map_err(|_| ExtractError::InvalidAge(digits.to_string()))
}

/// The nearest enclosing `<li>` of a detail link, falling back to its parent element.
fn person_block(anchor: ElementRef<'_>) -> ElementRef<'_> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "li")
        .or_else(|| anchor.parent().and_then(ElementRef::wrap))
        .unwrap_or(anchor)
}

/// All text inside `block`, NFC-normalized, with text nodes joined by single spaces.
fn block_text(block: ElementRef<'_>) -> String {
    let joined = block
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    joined.nfc().collect()
}
