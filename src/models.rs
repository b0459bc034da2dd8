use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity & Roles ---

/// Role
///
/// The authorization category carried inside a resolved identity. `member` is a display
/// synonym for `user`: it is kept as-is for rendering and collapsed only for access checks.
/// Any value the backend sends that is not one of the three known roles lands in `Unknown`,
/// which every access check treats as the most restrictive case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    User,
    Member,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// normalized
    ///
    /// Collapses `member` into `user`. Only used for membership checks.
    pub fn normalized(self) -> Role {
        match self {
            Role::Member => Role::User,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Member => "member",
            Role::Unknown => "unknown",
        }
    }
}

/// Identity
///
/// The user profile a token resolves to, in the backend's wire shape
/// (`_id`, camelCase field names). Never stored independently of a successful resolution,
/// login, or explicit identity update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Identity {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub role: Role,
    // Absolute after the Session Store has accepted the identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

// --- Session Snapshot (Output) ---

/// PhaseKind
///
/// The four lifecycle states without their payload, used for logging and for the
/// serialized session view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PhaseKind {
    Initializing,
    Resolving,
    Ready,
    Unauthenticated,
}

/// SessionView
///
/// What the shell hands to the view layer for `GET /session`. The token is never exposed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub phase: PhaseKind,
    pub identity: Option<Identity>,
    pub generation: u64,
    pub last_error: Option<String>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials for `POST /session/login`, forwarded to the backend's login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Sign-up payload for `POST /session/register`. The profile image must already be
/// uploaded; only its reference travels here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_invite_token: Option<String>,
}

/// AuthResponse
///
/// Body returned by the backend's login and register endpoints: the identity object
/// with the freshly issued token alongside it.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(flatten)]
    pub identity: Identity,
}

// --- Page Schemas (Output) ---

/// PageView
///
/// Descriptor for a page the guard allowed. The view layer renders `page` with the
/// attached identity; the shell itself renders nothing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PageView {
    pub path: String,
    pub page: String,
    pub identity: Option<Identity>,
}

/// Placeholder
///
/// The neutral body served while the session is still resolving. Not a redirect.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Placeholder {
    pub phase: PhaseKind,
}

/// NavigationView
///
/// The client history as the Navigation Listener last left it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationView {
    pub location: String,
    pub entries: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_normalizes_to_user_only_for_checks() {
        assert_eq!(Role::Member.normalized(), Role::User);
        assert_eq!(Role::Admin.normalized(), Role::Admin);
        assert_eq!(Role::Member.as_str(), "member");
    }

    #[test]
    fn unknown_role_strings_deserialize_to_unknown() {
        let role: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(role, Role::Unknown);
    }

    #[test]
    fn identity_reads_backend_shape() {
        let raw = r#"{
            "_id": "665f1c",
            "name": "Ada",
            "email": "ada@example.com",
            "role": "member",
            "profileImageUrl": "/uploads/ada.png",
            "createdAt": "2024-06-01T00:00:00Z"
        }"#;
        let identity: Identity = serde_json::from_str(raw).unwrap();
        assert_eq!(identity.id, "665f1c");
        assert_eq!(identity.role, Role::Member);
        assert_eq!(identity.profile_image_url.as_deref(), Some("/uploads/ada.png"));
    }

    #[test]
    fn auth_response_splits_token_from_identity() {
        let raw = r#"{"_id":"1","name":"Root","email":"root@example.com","role":"admin","token":"jwt"}"#;
        let response: AuthResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.token, "jwt");
        assert_eq!(response.identity.role, Role::Admin);
        assert!(response.identity.profile_image_url.is_none());
    }

    #[test]
    fn register_request_omits_absent_optionals() {
        let request = RegisterRequest {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "secret1".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("adminInviteToken").is_none());
        assert!(json.get("profileImageUrl").is_none());
    }
}
