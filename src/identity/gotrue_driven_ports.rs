use crate::app_env;
use crate::domain::auth::driven_ports::AuthProvider;
use crate::domain::auth::driving_ports::AuthError;
use crate::domain::auth::{Credentials, Session, SignUpOutcome};
use crate::external_connections::{ExternalConnectivity, failure_body};
use anyhow::{Context, anyhow};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

/// Email/password identity provider speaking the GoTrue REST API
#[derive(Debug, Clone)]
pub struct GoTrueProvider {
    base_url: String,
    api_key: String,
}

impl GoTrueProvider {
    pub fn new(base_url: &str, api_key: &str) -> GoTrueProvider {
        GoTrueProvider {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    pub fn from_env() -> Result<GoTrueProvider, anyhow::Error> {
        let base_url = env::var(app_env::AUTH_BASE_URL)
            .with_context(|| format!("reading {} from the environment", app_env::AUTH_BASE_URL))?;
        let api_key = env::var(app_env::AUTH_API_KEY)
            .with_context(|| format!("reading {} from the environment", app_env::AUTH_API_KEY))?;

        Ok(Self::new(&base_url, &api_key))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    async fn post_credentials(
        &self,
        path: &str,
        credentials: &Credentials,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<reqwest::Response, AuthError> {
        let response = ext_cxn
            .http_client()
            .post(self.url(path))
            .header("apikey", &self.api_key)
            .json(&CredentialBody {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await
            .context("sending credentials to the identity provider")?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = failure_body(response).await;
        Err(classify_auth_failure(status, &body))
    }
}

#[derive(Serialize)]
struct CredentialBody<'cred> {
    email: &'cred str,
    password: &'cred str,
}

#[derive(Deserialize)]
struct SessionBody {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    user: UserBody,
}

impl From<SessionBody> for Session {
    fn from(value: SessionBody) -> Self {
        Session {
            access_token: value.access_token,
            user_id: value.user.id,
            expires_in: value.expires_in,
        }
    }
}

#[derive(Deserialize)]
struct UserBody {
    id: Uuid,
}

/// Sign up answers with a session when email confirmation is off and with the bare user when
/// the user still has to confirm their address
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(SessionBody),
    PendingUser(UserBody),
}

/// The provider has used both of these shapes for errors over time
#[derive(Deserialize, Default)]
struct ErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

/// Maps a failed provider response onto the fixed set of reasons users are told about
fn classify_auth_failure(status: StatusCode, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.or(parsed.error).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .unwrap_or_default();
    let lowered = message.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || (code.starts_with("over_") && code.ends_with("rate_limit"))
    {
        AuthError::RateLimited
    } else if code == "invalid_credentials" || lowered.contains("invalid login credentials") {
        AuthError::InvalidCredentials
    } else if code == "email_not_confirmed" || lowered.contains("email not confirmed") {
        AuthError::EmailNotConfirmed
    } else if code == "user_already_exists"
        || code == "email_exists"
        || lowered.contains("already registered")
    {
        AuthError::AlreadyRegistered
    } else if code == "weak_password" || lowered.contains("password should be") {
        AuthError::WeakPassword
    } else {
        AuthError::PortError(anyhow!(
            "identity provider answered {status} [{code}]: {message}"
        ))
    }
}

impl AuthProvider for GoTrueProvider {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<SignUpOutcome, AuthError> {
        let body: SignUpBody = self
            .post_credentials("/signup", credentials, ext_cxn)
            .await?
            .json()
            .await
            .context("decoding the sign up response")?;

        Ok(match body {
            SignUpBody::Session(session) => SignUpOutcome::SignedIn(session.into()),
            SignUpBody::PendingUser(_) => SignUpOutcome::ConfirmationRequired,
        })
    }

    async fn sign_in(
        &self,
        credentials: &Credentials,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Session, AuthError> {
        let body: SessionBody = self
            .post_credentials("/token?grant_type=password", credentials, ext_cxn)
            .await?
            .json()
            .await
            .context("decoding the sign in response")?;

        Ok(body.into())
    }

    async fn user_for_token(
        &self,
        access_token: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Uuid, AuthError> {
        let response = ext_cxn
            .http_client()
            .get(self.url("/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("resolving an access token with the identity provider")?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Unauthenticated);
        }
        if !status.is_success() {
            let body = failure_body(response).await;
            return Err(classify_auth_failure(status, &body));
        }

        let user: UserBody = response
            .json()
            .await
            .context("decoding the token's user")?;

        Ok(user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod classify_auth_failure {
        use super::*;

        #[test]
        fn recognizes_error_codes() {
            let cases = [
                (StatusCode::BAD_REQUEST, r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#),
                (StatusCode::BAD_REQUEST, r#"{"error_code":"email_not_confirmed","msg":"Email not confirmed"}"#),
                (StatusCode::UNPROCESSABLE_ENTITY, r#"{"error_code":"user_already_exists","msg":"User already registered"}"#),
                (StatusCode::UNPROCESSABLE_ENTITY, r#"{"error_code":"weak_password","msg":"Password should be at least 6 characters."}"#),
                (StatusCode::TOO_MANY_REQUESTS, r#"{"error_code":"over_email_send_rate_limit","msg":"Email rate limit exceeded"}"#),
            ];

            let classified: Vec<AuthError> = cases
                .into_iter()
                .map(|(status, body)| classify_auth_failure(status, body))
                .collect();

            assert!(matches!(
                classified.as_slice(),
                [
                    AuthError::InvalidCredentials,
                    AuthError::EmailNotConfirmed,
                    AuthError::AlreadyRegistered,
                    AuthError::WeakPassword,
                    AuthError::RateLimited,
                ]
            ));
        }

        #[test]
        fn recognizes_legacy_error_shape() {
            let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;

            assert!(matches!(
                classify_auth_failure(StatusCode::BAD_REQUEST, body),
                AuthError::InvalidCredentials
            ));
        }

        #[test]
        fn rate_limit_status_wins_without_body() {
            assert!(matches!(
                classify_auth_failure(StatusCode::TOO_MANY_REQUESTS, ""),
                AuthError::RateLimited
            ));
        }

        #[test]
        fn unknown_failures_are_port_errors() {
            assert!(matches!(
                classify_auth_failure(StatusCode::INTERNAL_SERVER_ERROR, "upstream timeout"),
                AuthError::PortError(_)
            ));
        }
    }

    #[test]
    fn distinguishes_session_from_pending_user() {
        let user_id = Uuid::from_u128(7);
        let session: SignUpBody = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": user_id, "email": "ada@example.com" }
        }))
        .expect("session body deserializes");
        let pending: SignUpBody = serde_json::from_value(json!({
            "id": user_id,
            "email": "ada@example.com",
            "confirmation_sent_at": "2024-01-01T00:00:00Z"
        }))
        .expect("pending user body deserializes");

        assert!(matches!(session, SignUpBody::Session(ref body) if body.user.id == user_id && body.expires_in == 3600));
        assert!(matches!(pending, SignUpBody::PendingUser(_)));
    }

    #[test]
    fn builds_versioned_urls() {
        let provider = GoTrueProvider::new("https://project.example.test/", "anon");
        assert_eq!(
            "https://project.example.test/auth/v1/token?grant_type=password",
            provider.url("/token?grant_type=password")
        );
    }
}
