use serde::{Deserialize, Serialize};

/// `user_metadata` as stored by the auth provider at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Tokens issued by the auth provider after a successful sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// A row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// The authenticated caller, passed explicitly to every data-loading call.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub access_token: String,
}

impl Identity {
    pub fn from_session(session: &Session, display_name: String) -> Self {
        Self {
            user_id: session.user.id.clone(),
            email: session.user.email.clone().unwrap_or_default(),
            display_name,
            access_token: session.access_token.clone(),
        }
    }
}

/// Profile username, then metadata full name, then email, then "Guest".
pub fn resolve_display_name(profile: Option<&Profile>, user: &User) -> String {
    let from_profile = profile
        .and_then(|p| p.username.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let from_metadata = user
        .user_metadata
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let from_email = user.email.as_deref().filter(|s| !s.is_empty());

    from_profile
        .or(from_metadata)
        .or(from_email)
        .unwrap_or("Guest")
        .to_string()
}
