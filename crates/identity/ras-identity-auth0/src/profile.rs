//! Auth0 user profile built from `/userinfo`.

use crate::types::UserInfo;
use serde::{Deserialize, Serialize};

pub const PROVIDER_NAME: &str = "auth0";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileName {
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub middle_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auth0Profile {
    pub provider: String,
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub name: Option<ProfileName>,
    pub emails: Vec<String>,
    pub photos: Vec<String>,
    pub organization_id: Option<String>,
    /// The raw `/userinfo` payload.
    pub json: Option<UserInfo>,
}

impl Default for Auth0Profile {
    fn default() -> Self {
        Self {
            provider: PROVIDER_NAME.to_string(),
            id: None,
            display_name: None,
            name: None,
            emails: Vec::new(),
            photos: Vec::new(),
            organization_id: None,
            json: None,
        }
    }
}

impl From<UserInfo> for Auth0Profile {
    fn from(info: UserInfo) -> Self {
        let name = if info.family_name.is_some()
            || info.given_name.is_some()
            || info.middle_name.is_some()
        {
            Some(ProfileName {
                family_name: info.family_name.clone(),
                given_name: info.given_name.clone(),
                middle_name: info.middle_name.clone(),
            })
        } else {
            None
        };

        Self {
            provider: PROVIDER_NAME.to_string(),
            id: info.sub.clone(),
            display_name: info.name.clone(),
            name,
            emails: info.email.iter().cloned().collect(),
            photos: info.picture.iter().cloned().collect(),
            organization_id: info.org_id.clone(),
            json: Some(info),
        }
    }
}
