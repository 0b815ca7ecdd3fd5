use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Privilege level of an account.
///
/// Role strings are normalized (trimmed, lowercased) when parsed; anything
/// other than `admin` or `user` is rejected, so a profile carrying an unknown
/// role never makes it out of the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in account as stored alongside the session token.
///
/// Fields the frontend does not interpret are kept in `extra` so that a
/// profile written by the backend survives a save/load cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    pub role: Role,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Merge an accepted profile edit into this record.
    pub fn apply_update(&mut self, update: &ProfileUpdate) {
        if let Some(ref first_name) = update.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(ref last_name) = update.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(ref username) = update.username {
            self.username = username.clone();
        }
    }
}

/// Self-service profile edit (`PUT /api/auth/profile`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.username.is_none()
    }
}

/// Admin edit of another account (`PUT /api/admin/users/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminUserUpdate {
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Payload for `POST {auth}/signup`.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_parse_normalizes() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" USER ".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_profile_rejects_unknown_role() {
        let value = json!({"username": "bob", "role": "owner"});
        assert!(serde_json::from_value::<UserProfile>(value).is_err());
    }

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let value = json!({
            "_id": "665f",
            "username": "alice",
            "email": "alice@example.com",
            "firstName": "Alice",
            "lastName": "Smith",
            "role": "admin",
            "isVerified": true
        });
        let profile: UserProfile = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.extra.get("isVerified"), Some(&json!(true)));
        assert_eq!(serde_json::to_value(&profile).unwrap(), value);
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let profile: UserProfile =
            serde_json::from_value(json!({"username": "carol", "role": "user"})).unwrap();
        assert_eq!(profile.full_name(), "carol");
    }

    #[test]
    fn test_apply_update_only_touches_given_fields() {
        let mut profile: UserProfile = serde_json::from_value(json!({
            "username": "dave", "firstName": "Dave", "lastName": "Jones", "role": "user"
        }))
        .unwrap();
        profile.apply_update(&ProfileUpdate {
            last_name: Some("Brown".to_string()),
            ..Default::default()
        });
        assert_eq!(profile.first_name, "Dave");
        assert_eq!(profile.last_name, "Brown");
        assert_eq!(profile.username, "dave");
    }
}
