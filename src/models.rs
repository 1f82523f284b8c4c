use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::{error::AppError, token::TokenPair};

// --- Roles ---

/// Role
///
/// The two access levels known to the system. Serialized in upper case
/// (`"ADMIN"` / `"USER"`) both in stored documents and in the `userType` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Core Application Schemas (Mapped to Documents) ---

/// User
///
/// The canonical user record stored in the `users` collection. This is the
/// storage shape and carries the password hash, so it is never returned to
/// clients directly; handlers respond with [`UserProfile`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct User {
    // Record key. Stored as the document `_id`.
    #[serde(rename = "_id")]
    pub id: String,
    // The identifier embedded in tokens as `uid`. Mirrors `id`.
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UserProfile
///
/// Client-facing projection of a [`User`]. Carries neither the password hash
/// nor the stored tokens.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: String,
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            subject_id: user.subject_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// AuthResponse
///
/// Body of Signup and Login: the caller's profile plus the pair just issued.
/// The only place tokens leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

impl TryFrom<User> for AuthResponse {
    type Error = AppError;

    fn try_from(mut user: User) -> Result<Self, Self::Error> {
        let (Some(access_token), Some(refresh_token)) =
            (user.access_token.take(), user.refresh_token.take())
        else {
            return Err(AppError::Internal("session issued without tokens".to_string()));
        };

        Ok(Self {
            user: user.into(),
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }
}

/// Task
///
/// A unit of work in the `tasks` collection. Tasks have no owner; mutation is
/// gated by role alone.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[ts(type = "string")]
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: String,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for POST /signup. Structural constraints are declared with
/// `validator` and checked by the Signup use case before any lookup runs.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub role: Role,
}

/// LoginRequest
///
/// Input payload for POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// TaskRequest
///
/// Input payload for creating (POST /tasks) or replacing (PUT /tasks/{id}) a task.
/// On create, an empty or missing `id` gets a generated one; on update the path
/// id wins and this field is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct TaskRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[ts(type = "string")]
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: String,
}

// --- Response Schemas (Output) ---

/// UserPage
///
/// Output schema for GET /users.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserPage {
    pub total_count: u64,
    pub user_items: Vec<UserProfile>,
}

/// PromoteResponse
///
/// Output schema for POST /users/{user_id}/promote. `outcome` is either
/// `"promoted"` or `"no_op"`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PromoteResponse {
    pub outcome: String,
    pub message: String,
}
