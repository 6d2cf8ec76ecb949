//! Normalized Entities
//!
//! Provider-agnostic records parsed from provider payloads. Every field is
//! optional: a value missing from the source payload stays `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date of birth; providers often omit the year.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthDate {
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl BirthDate {
    /// Parse `MM/DD/YYYY` or `MM/DD`.
    pub fn from_us_format(value: &str) -> Option<Self> {
        let mut parts = value.split('/');
        let month = parts.next()?.trim().parse().ok()?;
        let day = parts.next()?.trim().parse().ok()?;
        let year = parts.next().and_then(|y| y.trim().parse().ok());
        Some(Self {
            day: Some(day),
            month: Some(month),
            year,
        })
    }
}

/// User profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub validated_id: Option<String>,
    pub provider_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<BirthDate>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub profile_image_url: Option<String>,
    /// Extra contact data such as phone numbers or addresses.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contact_info: BTreeMap<String, String>,
}

impl Profile {
    /// Set first/last name from a single full-name string.
    pub fn set_full_name(&mut self, full_name: &str) {
        let (first, last) = split_full_name(full_name);
        self.full_name = Some(full_name.to_string());
        self.first_name = Some(first);
        self.last_name = last;
    }
}

/// A user's friend, follower or connection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_emails: Vec<String>,
    pub profile_url: Option<String>,
    pub profile_image_url: Option<String>,
}

/// One status/feed entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: Option<String>,
    pub from: Option<String>,
    pub screen_name: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Photo with size variants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub thumb_image: Option<String>,
    pub small_image: Option<String>,
    pub medium_image: Option<String>,
    pub large_image: Option<String>,
}

/// Photo album.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: Option<String>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub cover_photo: Option<String>,
    pub photos_count: Option<u32>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

/// Education entry of a career profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub id: Option<String>,
    pub school_name: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Position (job) entry of a career profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub is_current: Option<bool>,
    pub start_year: Option<i32>,
    pub start_month: Option<u32>,
    pub end_year: Option<i32>,
    pub end_month: Option<u32>,
}

/// Received recommendation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Option<String>,
    pub recommendation_type: Option<String>,
    pub text: Option<String>,
    pub recommender_first_name: Option<String>,
    pub recommender_last_name: Option<String>,
}

/// Career data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Career {
    pub id: Option<String>,
    pub headline: Option<String>,
    #[serde(default)]
    pub educations: Vec<Education>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

/// Split a full name on its first space into first and last name.
///
/// A name without a space becomes the first name and the last name stays unset.
pub fn split_full_name(full_name: &str) -> (String, Option<String>) {
    let full_name = full_name.trim();
    match full_name.split_once(' ') {
        Some((first, last)) => (first.to_string(), Some(last.trim().to_string())),
        None => (full_name.to_string(), None),
    }
}
