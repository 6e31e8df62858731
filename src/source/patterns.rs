//! Field extraction rules for listing pages.
//!
//! Each field is an ordered chain of regexes evaluated first-match-wins against
//! the text of one person block. The chains are plain data so markup drift on
//! the upstream site can be patched with a TOML override file instead of code.

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use html_scraper::Selector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::models::{Category, Gender};
use crate::source::errors::ExtractError;

/// Labels that start a new field in a person block. A free-text value ends
/// where the next label begins as a whole token, so `신장동` does not end an
/// address the way `신장: 120cm` does.
const LABELS: &str = "실종일시|실종일|발생일시|발생일|실종장소|발생장소|장소|옷차림|착의사항|현재\\s*나이|신체특징|특이사항|신장|체중|성별";

const DATE: &str = r"(\d{4}\s*[-./년]\s*\d{1,2}\s*[-./월]\s*\d{1,2}\s*일?)";

fn labeled_date(label: &str) -> String {
    format!(r"{label}\s*[:：]?\s*{DATE}")
}

fn labeled_text(label: &str) -> String {
    format!(r"{label}\s*[:：]?\s*(.+?)(?:\s+(?:{LABELS})(?:[\s:：]|$)|$)")
}

/// Maps a matching pattern to a fixed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule<T> {
    pub pattern: String,
    pub value: T,
}

impl<T> KeywordRule<T> {
    fn new(pattern: &str, value: T) -> Self {
        Self {
            pattern: pattern.to_string(),
            value,
        }
    }
}

/// Uncompiled extraction rules, deserializable from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPatterns {
    /// Substring identifying per-person detail links.
    pub detail_link: String,
    /// Query parameter of a detail link carrying the numeric person id.
    pub id_param: String,
    /// Must capture the name in group 1 and the age in group 2.
    pub name_age: String,
    pub current_age: Vec<String>,
    pub missing_date: Vec<String>,
    pub address: Vec<String>,
    pub clothing: Vec<String>,
    pub gender: Vec<KeywordRule<Gender>>,
    pub category: Vec<KeywordRule<Category>>,
    /// Photo URLs containing any of these (case-insensitive) are placeholders.
    pub no_image_markers: Vec<String>,
}

impl Default for FieldPatterns {
    fn default() -> Self {
        Self {
            detail_link: "lcmMssGet.do".to_string(),
            id_param: "msspsnIdntfccd".to_string(),
            name_age: r"([가-힣]{2,})\s*\(\s*(\d+)\s*세\s*\)".to_string(),
            current_age: vec![r"현재\s*나이\s*[:：]?\s*(\d+)\s*세".to_string()],
            missing_date: vec![
                labeled_date("실종일"),
                labeled_date("실종일시"),
                labeled_date("발생일"),
            ],
            address: vec![
                labeled_text("실종장소"),
                labeled_text("발생장소"),
                labeled_text(r"(?:^|\s)장소"),
            ],
            clothing: vec![labeled_text("(?:옷차림|착의사항)")],
            gender: vec![
                KeywordRule::new(r"\b(?:남자|남)\b", Gender::Male),
                KeywordRule::new(r"\b(?:여자|여)\b", Gender::Female),
                KeywordRule::new(r"성별\s*[:：]?\s*[Mm]\b", Gender::Male),
                KeywordRule::new(r"성별\s*[:：]?\s*[Ff]\b", Gender::Female),
            ],
            category: vec![
                KeywordRule::new("치매", Category::Dementia),
                KeywordRule::new("지적장애|장애", Category::Disabled),
                KeywordRule::new("가출", Category::Runaway),
                KeywordRule::new("무연고", Category::FacilityWard),
                KeywordRule::new("신원미상", Category::Unidentified),
            ],
            no_image_markers: vec![
                "noimage".to_string(),
                "no_image".to_string(),
                "no-image".to_string(),
                "no image".to_string(),
            ],
        }
    }
}

impl FieldPatterns {
    /// Built-in rules, with fields from the TOML file at `path` taking precedence.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        match path {
            Some(path) => figment.merge(Toml::file(path)).extract(),
            None => figment.extract(),
        }
    }

    pub fn compile(&self) -> Result<CompiledPatterns, ExtractError> {
        let selector_str = format!("a[href*=\"{}\"]", self.detail_link);
        let detail_selector =
            Selector::parse(&selector_str).map_err(|e| ExtractError::InvalidSelector {
                selector: selector_str.clone(),
                reason: e.to_string(),
            })?;

        Ok(CompiledPatterns {
            detail_selector,
            id_param: self.id_param.clone(),
            name_age: compile_one("name_age", &self.name_age)?,
            current_age: compile_chain("current_age", &self.current_age)?,
            missing_date: compile_chain("missing_date", &self.missing_date)?,
            address: compile_chain("address", &self.address)?,
            clothing: compile_chain("clothing", &self.clothing)?,
            gender: compile_rules("gender", &self.gender)?,
            category: compile_rules("category", &self.category)?,
            no_image_markers: self
                .no_image_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        })
    }
}

fn compile_one(field: &'static str, pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|source| ExtractError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_chain(field: &'static str, patterns: &[String]) -> Result<Vec<Regex>, ExtractError> {
    patterns.iter().map(|p| compile_one(field, p)).collect()
}

fn compile_rules<T: Copy>(
    field: &'static str,
    rules: &[KeywordRule<T>],
) -> Result<Vec<(Regex, T)>, ExtractError> {
    rules
        .iter()
        .map(|rule| Ok((compile_one(field, &rule.pattern)?, rule.value)))
        .collect()
}

/// Extraction rules ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub detail_selector: Selector,
    pub id_param: String,
    pub name_age: Regex,
    pub current_age: Vec<Regex>,
    pub missing_date: Vec<Regex>,
    pub address: Vec<Regex>,
    pub clothing: Vec<Regex>,
    pub gender: Vec<(Regex, Gender)>,
    pub category: Vec<(Regex, Category)>,
    pub no_image_markers: Vec<String>,
}

/// Group 1 of the first pattern in `chain` that matches `text`.
pub fn first_capture(chain: &[Regex], text: &str) -> Option<String> {
    first_capture_where(chain, text, |_| true)
}

/// Group 1 of the first pattern whose match satisfies `accept`. Patterns whose
/// match is rejected are skipped in favor of the next pattern in the chain.
pub fn first_capture_where(
    chain: &[Regex],
    text: &str,
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    chain.iter().find_map(|re| {
        let value = re.captures(text)?.get(1)?.as_str().trim();
        accept(value).then(|| value.to_string())
    })
}

/// Value of the first rule whose pattern matches `text`.
pub fn first_rule<T: Copy>(rules: &[(Regex, T)], text: &str) -> Option<T> {
    rules
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, value)| *value)
}
