//! LinkedIn v1 adapter (OAuth 1.0a, XML).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::consumer::{ApiRequest, OAuthConsumer, SharedTransport, SigningMode};
use crate::core::xml::XmlElement;
use crate::error::SocialAuthResult;
use crate::providers::{
    endpoint, AuthProvider, CareerPlugin, FeedPlugin, ProviderBase, Scopes,
};
use crate::strategy::{OAuth1Endpoints, OAuth1Strategy, Strategy};
use crate::types::{
    BirthDate, Capability, Career, Contact, Education, Feed, OAuthConfig, Position, Profile,
    Recommendation,
};

const PROVIDER_ID: &str = "linkedin";
const REQUEST_TOKEN_URL: &str = "https://api.linkedin.com/uas/oauth/requestToken";
const AUTHORIZATION_URL: &str = "https://api.linkedin.com/uas/oauth/authenticate";
const ACCESS_TOKEN_URL: &str = "https://api.linkedin.com/uas/oauth/accessToken";

const PROFILE_URL: &str = "https://api.linkedin.com/v1/people/~:(id,first-name,last-name,formatted-name,headline,location:(name,country:(code)),email-address,picture-url,public-profile-url,date-of-birth,phone-numbers,main-address)";
const CONNECTIONS_URL: &str = "https://api.linkedin.com/v1/people/~/connections:(id,first-name,last-name,public-profile-url,picture-url)";
const STATUS_URL: &str = "https://api.linkedin.com/v1/people/~/current-status";
const UPDATES_URL: &str = "https://api.linkedin.com/v1/people/~/network/updates?type=STAT&count=50";
const CAREER_URL: &str = "https://api.linkedin.com/v1/people/~:(id,headline,educations,positions,recommendations-received)";

const SCOPES: Scopes = Scopes {
    default: "r_basicprofile r_emailaddress",
    all: "r_fullprofile r_emailaddress r_network rw_nus r_contactinfo",
    authenticate_only: None,
};

#[derive(Debug)]
pub struct LinkedInProvider {
    base: ProviderBase,
}

impl LinkedInProvider {
    pub fn new(config: OAuthConfig, transport: SharedTransport) -> Self {
        let consumer = OAuthConsumer::new(
            PROVIDER_ID,
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
            SigningMode::OAuth1,
            transport,
        );
        let endpoints = OAuth1Endpoints {
            request_token_url: endpoint(&config.request_token_url, REQUEST_TOKEN_URL),
            authorization_url: endpoint(&config.authentication_url, AUTHORIZATION_URL),
            access_token_url: endpoint(&config.access_token_url, ACCESS_TOKEN_URL),
        };
        let strategy = Strategy::OAuth1(OAuth1Strategy::new(consumer, endpoints));

        Self {
            base: ProviderBase::new(
                strategy,
                config,
                SCOPES,
                &[Capability::Feed, Capability::Career],
            ),
        }
    }
}

#[async_trait]
impl AuthProvider for LinkedInProvider {
    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    async fn fetch_profile(&self) -> SocialAuthResult<Profile> {
        let person = self.base.get_xml(PROFILE_URL).await?;
        Ok(parse_profile(&person))
    }

    async fn contact_list(&self) -> SocialAuthResult<Vec<Contact>> {
        let connections = self.base.get_xml(CONNECTIONS_URL).await?;
        Ok(parse_connections(&connections))
    }

    async fn update_status(&self, message: &str) -> SocialAuthResult<()> {
        tracing::info!(provider = PROVIDER_ID, "updating status");
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><current-status>{}</current-status>",
            quick_xml::escape::escape(message)
        );
        self.base
            .execute(
                ApiRequest::put(STATUS_URL)
                    .header("Content-Type", "text/xml; charset=UTF-8")
                    .body(body),
            )
            .await?;
        Ok(())
    }

    fn feed_plugin(&self) -> SocialAuthResult<Box<dyn FeedPlugin + '_>> {
        self.base.require_plugin(Capability::Feed)?;
        Ok(Box::new(LinkedInUpdates { base: &self.base }))
    }

    fn career_plugin(&self) -> SocialAuthResult<Box<dyn CareerPlugin + '_>> {
        self.base.require_plugin(Capability::Career)?;
        Ok(Box::new(LinkedInCareer { base: &self.base }))
    }
}

struct LinkedInUpdates<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl FeedPlugin for LinkedInUpdates<'_> {
    async fn feeds(&self) -> SocialAuthResult<Vec<Feed>> {
        let updates = self.base.get_xml(UPDATES_URL).await?;
        Ok(parse_updates(&updates))
    }
}

struct LinkedInCareer<'a> {
    base: &'a ProviderBase,
}

#[async_trait]
impl CareerPlugin for LinkedInCareer<'_> {
    async fn career_details(&self) -> SocialAuthResult<Career> {
        let person = self.base.get_xml(CAREER_URL).await?;
        Ok(parse_career(&person))
    }
}

fn parse_year(element: &XmlElement, path: &[&str]) -> Option<i32> {
    element.text_at(path).and_then(|y| y.parse().ok())
}

fn parse_u32(element: &XmlElement, path: &[&str]) -> Option<u32> {
    element.text_at(path).and_then(|m| m.parse().ok())
}

fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn parse_profile(person: &XmlElement) -> Profile {
    let mut profile = Profile {
        provider_id: Some(PROVIDER_ID.to_string()),
        validated_id: person.text_at(&["id"]),
        first_name: person.text_at(&["first-name"]),
        last_name: person.text_at(&["last-name"]),
        full_name: person.text_at(&["formatted-name"]),
        display_name: person.text_at(&["headline"]),
        email: person.text_at(&["email-address"]),
        location: person.text_at(&["location", "name"]),
        country: person.text_at(&["location", "country", "code"]),
        profile_image_url: person.text_at(&["picture-url"]),
        ..Default::default()
    };

    if let Some(dob) = person.child("date-of-birth") {
        profile.dob = Some(BirthDate {
            day: parse_u32(dob, &["day"]),
            month: parse_u32(dob, &["month"]),
            year: parse_year(dob, &["year"]),
        });
    }
    if let Some(phones) = person.child("phone-numbers") {
        for phone in phones.children_named("phone-number") {
            if let (Some(kind), Some(number)) = (
                phone.text_at(&["phone-type"]),
                phone.text_at(&["phone-number"]),
            ) {
                profile.contact_info.insert(kind, number);
            }
        }
    }
    if let Some(address) = person.text_at(&["main-address"]) {
        profile.contact_info.insert("main_address".to_string(), address);
    }
    if let Some(url) = person.text_at(&["public-profile-url"]) {
        profile.contact_info.insert("public_profile_url".to_string(), url);
    }
    profile
}

fn parse_connections(connections: &XmlElement) -> Vec<Contact> {
    connections
        .children_named("person")
        // Out-of-network members come back with id "private".
        .filter(|person| person.text_at(&["id"]).as_deref() != Some("private"))
        .map(|person| {
            let first_name = person.text_at(&["first-name"]);
            let last_name = person.text_at(&["last-name"]);
            let display_name = match (&first_name, &last_name) {
                (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
                (Some(name), None) | (None, Some(name)) => Some(name.clone()),
                (None, None) => None,
            };
            Contact {
                id: person.text_at(&["id"]),
                first_name,
                last_name,
                display_name,
                profile_url: person.text_at(&["public-profile-url"]),
                profile_image_url: person.text_at(&["picture-url"]),
                ..Default::default()
            }
        })
        .collect()
}

fn parse_updates(updates: &XmlElement) -> Vec<Feed> {
    updates
        .children_named("update")
        .filter_map(|update| {
            let person = update.path(&["update-content", "person"])?;
            let from = match (person.text_at(&["first-name"]), person.text_at(&["last-name"])) {
                (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
                (first, last) => first.or(last),
            };
            Some(Feed {
                id: update.text_at(&["update-key"]),
                from,
                screen_name: person.text_at(&["id"]),
                message: person.text_at(&["current-status"]),
                created_at: update.text_at(&["timestamp"]).and_then(|t| parse_millis(&t)),
            })
        })
        .collect()
}

fn parse_career(person: &XmlElement) -> Career {
    let educations = person
        .child("educations")
        .map(|list| {
            list.children_named("education")
                .map(|education| Education {
                    id: education.text_at(&["id"]),
                    school_name: education.text_at(&["school-name"]),
                    degree: education.text_at(&["degree"]),
                    field_of_study: education.text_at(&["field-of-study"]),
                    start_year: parse_year(education, &["start-date", "year"]),
                    end_year: parse_year(education, &["end-date", "year"]),
                })
                .collect()
        })
        .unwrap_or_default();

    let positions = person
        .child("positions")
        .map(|list| {
            list.children_named("position")
                .map(|position| Position {
                    id: position.text_at(&["id"]),
                    title: position.text_at(&["title"]),
                    company_name: position.text_at(&["company", "name"]),
                    industry: position.text_at(&["company", "industry"]),
                    is_current: position.text_at(&["is-current"]).map(|c| c == "true"),
                    start_year: parse_year(position, &["start-date", "year"]),
                    start_month: parse_u32(position, &["start-date", "month"]),
                    end_year: parse_year(position, &["end-date", "year"]),
                    end_month: parse_u32(position, &["end-date", "month"]),
                })
                .collect()
        })
        .unwrap_or_default();

    let recommendations = person
        .child("recommendations-received")
        .map(|list| {
            list.children_named("recommendation")
                .map(|recommendation| Recommendation {
                    id: recommendation.text_at(&["id"]),
                    recommendation_type: recommendation
                        .text_at(&["recommendation-type", "code"]),
                    text: recommendation.text_at(&["recommendation-text"]),
                    recommender_first_name: recommendation
                        .text_at(&["recommender", "first-name"]),
                    recommender_last_name: recommendation.text_at(&["recommender", "last-name"]),
                })
                .collect()
        })
        .unwrap_or_default();

    Career {
        id: person.text_at(&["id"]),
        headline: person.text_at(&["headline"]),
        educations,
        positions,
        recommendations,
    }
}
