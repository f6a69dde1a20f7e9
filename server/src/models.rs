use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried in the account record and in issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Profile picture. The legacy schema carried two optional string fields
/// (inline base64 and external URL) that could both be set; the tagged
/// variant makes the representations mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Avatar {
    #[default]
    None,
    Inline {
        #[serde(rename = "contentType")]
        content_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
    Url {
        url: String,
    },
}

/// A character paired with the perks chosen for it, stored as a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterBuild {
    pub character_name: String,
    /// The game allows four perk slots, but that is advisory capacity only;
    /// the stored form does not enforce a cap, matching the legacy schema.
    pub perks: Vec<String>,
}

/// A peer rating received by a profile. At most one per rater; a resubmission
/// replaces the earlier score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRating {
    pub rater_id: Uuid,
    pub score: u8,
}

/// A comment left on a profile. The commenter's display name is snapshotted
/// at post time; comments are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileComment {
    pub commenter_id: Uuid,
    pub commenter_display_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A user identity record with credentials, profile fields, and the social
/// sub-documents owned by the profile (ratings received, comments received).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    /// Immutable after creation. Unique among active accounts only.
    pub username: String,
    pub display_name: String,
    pub email: String,
    /// Argon2 PHC string. Never exposed through any response.
    pub password_hash: String,
    pub role: Role,
    /// Soft-delete marker. The only transition is active -> inactive.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: Avatar,
    #[serde(default)]
    pub favorite_killers: Vec<CharacterBuild>,
    #[serde(default)]
    pub favorite_survivors: Vec<CharacterBuild>,
    #[serde(default)]
    pub ratings: Vec<ProfileRating>,
    #[serde(default)]
    pub comments: Vec<ProfileComment>,
}

impl Account {
    /// A freshly registered account: role `user`, active, empty profile.
    pub fn new(username: &str, display_name: &str, email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::User,
            is_active: true,
            created_at: Utc::now(),
            bio: String::new(),
            avatar: Avatar::None,
            favorite_killers: Vec::new(),
            favorite_survivors: Vec::new(),
            ratings: Vec::new(),
            comments: Vec::new(),
        }
    }
}
