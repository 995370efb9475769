use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::data::Id;
use crate::role::Role;

pub mod db;

pub use db::USER_COLLECTION_NAME;

const BCRYPT_COST: u32 = 12;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PasswordHash([u8; 24]);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>) -> PasswordHash {
        let mut pw_hash: [u8; 24] = [0; 24];

        let mut sha = Sha256::new();
        sha2::Digest::update(&mut sha, password.as_ref().as_bytes());

        bcrypt(
            BCRYPT_COST,
            &crate::SECURITY.salt,
            sha.finalize().as_slice(),
            &mut pw_hash,
        );

        PasswordHash(pw_hash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    pub email: String,
    pub username: String,
    pub pw_hash: PasswordHash,
    pub role: Role,

    /// Grade level the user belongs to; tutors and admins usually have none.
    #[serde(default)]
    pub standard: Option<Id>,
    #[serde(default)]
    pub subjects: Vec<Id>,
    #[serde(default)]
    pub announcements: Vec<Id>,

    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub created: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl ToString,
        username: impl ToString,
        password: impl AsRef<str>,
        role: Role,
    ) -> User {
        let id = Id::new();
        tracing::info!("Creating a new {} with id: {}", role, id);

        User {
            id,
            email: email.to_string().to_lowercase(),
            username: username.to_string(),
            pw_hash: PasswordHash::new(password),
            role,
            standard: None,
            subjects: vec![],
            announcements: vec![],
            created: Utc::now(),
        }
    }

    pub fn is_enrolled(&self, subject: Id) -> bool {
        self.subjects.contains(&subject)
    }
}

/// User as exposed through the API, without credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: Id,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub standard: Option<Id>,
    pub subjects: Vec<Id>,
    pub created: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        UserResponse {
            id: value.id,
            email: value.email,
            username: value.username,
            role: value.role,
            standard: value.standard,
            subjects: value.subjects,
            created: value.created,
        }
    }
}
