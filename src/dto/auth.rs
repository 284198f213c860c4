use crate::domain;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// DTO carrying an email/password pair for sign up and sign in
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct Credentials {
    #[validate(email)]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 6, max = 72))]
    pub password: String,
}

impl From<Credentials> for domain::auth::Credentials {
    fn from(value: Credentials) -> Self {
        domain::auth::Credentials {
            email: value.email,
            password: value.password,
        }
    }
}

/// DTO for a signed-in user. Send `access_token` as a Bearer token to the task endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: &'static str,
    #[schema(value_type = String, example = "5d4a7f0e-2b1c-4c1e-9a43-0c1f7e6f9b11")]
    pub user_id: Uuid,
    /// Seconds until the access token expires
    #[schema(example = 3600)]
    pub expires_in: u64,
}

impl From<domain::auth::Session> for Session {
    fn from(value: domain::auth::Session) -> Self {
        Session {
            access_token: value.access_token,
            token_type: "bearer",
            user_id: value.user_id,
            expires_in: value.expires_in,
        }
    }
}

/// DTO returned when an account was created but its email still has to be confirmed
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmationPending {
    #[schema(example = "Check your inbox to confirm your email address, then sign in.")]
    pub message: String,
}
