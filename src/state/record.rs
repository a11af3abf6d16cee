//! Structured species data
//!
//! Base fields captured once from the species index page, and the content
//! carried by individual fragments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields available without any sub-fetch, captured at discovery time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseFields {
    /// Index page URL
    pub url: String,

    /// RFC 3339 timestamp of the discovery fetch
    pub scraped_at: String,

    pub basic_info: BasicInfo,

    pub images: SpecimenImages,

    pub collection_metadata: CollectionMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub scientific_name: Option<String>,
    pub authority: Option<String>,
    pub family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecimenImages {
    pub main_specimen: Option<String>,
    pub dry_herbarium: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub date: Option<String>,
    pub collected_by: Option<String>,
    pub gps_coordinates: Option<GpsCoordinates>,
    pub locality: Option<String>,
}

/// GPS position as printed on the specimen sheet, e.g. "11.99621 N - 79.82411 E"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    pub raw: String,
}

impl GpsCoordinates {
    /// Splits the raw "lat - lon" notation; keeps only `raw` if it doesn't split in two
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() == 2 {
            Self {
                latitude: Some(parts[0].trim().to_string()),
                longitude: Some(parts[1].trim().to_string()),
                raw: raw.to_string(),
            }
        } else {
            Self {
                latitude: None,
                longitude: None,
                raw: raw.to_string(),
            }
        }
    }
}

/// An image with its legend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionedImage {
    pub url: String,
    pub caption: Option<String>,
}

/// Text and images of a generic content page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionContent {
    pub text: Option<String>,
    pub text_html: Option<String>,
    #[serde(default)]
    pub images: Vec<CaptionedImage>,
}

impl SectionContent {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.text_html.is_none() && self.images.is_empty()
    }
}

/// Fields of the nomenclature page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nomenclature {
    pub botanical_name: Option<String>,
    pub author: Option<String>,
    pub family: Option<String>,
    pub english_names: Option<String>,
    /// Language -> names
    pub indian_names: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub etymology: Option<String>,
    pub etymology_html: Option<String>,
}

impl Nomenclature {
    pub fn is_empty(&self) -> bool {
        self.botanical_name.is_none()
            && self.author.is_none()
            && self.family.is_none()
            && self.english_names.is_none()
            && self.indian_names.is_none()
            && self.synonyms.is_empty()
            && self.etymology.is_none()
    }
}

/// Content delivered by one fragment fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FragmentContent {
    /// The combined ecology/distribution page carries two narratives
    EcologyDistribution {
        ecology: SectionContent,
        distribution: SectionContent,
    },
    Nomenclature(Nomenclature),
    Section(SectionContent),
}

impl FragmentContent {
    /// Returns true if the fragment carries no usable data
    ///
    /// Empty content counts as a response but does not fill its slot.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Section(section) => section.is_empty(),
            Self::Nomenclature(nomenclature) => nomenclature.is_empty(),
            Self::EcologyDistribution {
                ecology,
                distribution,
            } => ecology.is_empty() && distribution.is_empty(),
        }
    }
}
