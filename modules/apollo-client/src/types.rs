use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct OrgSearchInput<'a> {
    pub q_organization_name: &'a str,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct OrgSearchResponse {
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Deserialize)]
pub struct OrgEnrichResponse {
    pub organization: Option<Organization>,
}

/// An organization record as returned by the Apollo API.
#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub primary_domain: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub estimated_num_employees: Option<u32>,
    #[serde(default)]
    pub short_description: Option<String>,
}

impl Organization {
    /// City/country rendered as a single display string, if either is known.
    pub fn location(&self) -> Option<String> {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => Some(format!("{city}, {country}")),
            (Some(city), None) => Some(city.clone()),
            (None, Some(country)) => Some(country.clone()),
            (None, None) => None,
        }
    }
}
