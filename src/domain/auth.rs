use crate::domain::auth::driven_ports::AuthProvider;
use crate::domain::auth::driving_ports::AuthError;
use crate::external_connections::ExternalConnectivity;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Emails are matched case-insensitively by the identity provider, so send them normalized
    fn normalized(&self) -> Credentials {
        Credentials {
            email: self.email.trim().to_lowercase(),
            password: self.password.clone(),
        }
    }
}

/// A signed-in user's access token. The token is what task endpoints expect as a Bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: Uuid,
    /// Seconds until the access token expires
    pub expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The account exists but the user must confirm their email before signing in
    ConfirmationRequired,
}

pub mod driven_ports {
    use super::*;

    #[allow(async_fn_in_trait)]
    pub trait AuthProvider {
        async fn sign_up(
            &self,
            credentials: &Credentials,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<SignUpOutcome, AuthError>;

        async fn sign_in(
            &self,
            credentials: &Credentials,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Session, AuthError>;

        /// Resolves an access token to the user it was issued to
        async fn user_for_token(
            &self,
            access_token: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Uuid, AuthError>;
    }
}

pub mod driving_ports {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum AuthError {
        #[error("The email or password is incorrect.")]
        InvalidCredentials,
        #[error("The email address has not been confirmed yet.")]
        EmailNotConfirmed,
        #[error("Too many attempts. Please try again later.")]
        RateLimited,
        #[error("An account with this email already exists.")]
        AlreadyRegistered,
        #[error("The password is too weak.")]
        WeakPassword,
        #[error("A valid access token is required.")]
        Unauthenticated,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl AuthError {
        /// Message safe to show to the person signing in. Provider internals never leak.
        pub fn user_message(&self) -> &'static str {
            match self {
                Self::InvalidCredentials => "The email or password is incorrect.",
                Self::EmailNotConfirmed => "Please confirm your email address before signing in.",
                Self::RateLimited => "Too many attempts. Please try again later.",
                Self::AlreadyRegistered => "An account with this email already exists.",
                Self::WeakPassword => "The password is too weak. Please choose a stronger one.",
                Self::Unauthenticated => "A valid access token is required.",
                Self::PortError(_) => "Authentication failed. Please try again.",
            }
        }
    }


    #[allow(async_fn_in_trait)]
    pub trait AuthPort {
        async fn sign_up(
            &self,
            credentials: &Credentials,
            ext_cxn: &mut impl ExternalConnectivity,
            provider: &impl AuthProvider,
        ) -> Result<SignUpOutcome, AuthError>;

        async fn sign_in(
            &self,
            credentials: &Credentials,
            ext_cxn: &mut impl ExternalConnectivity,
            provider: &impl AuthProvider,
        ) -> Result<Session, AuthError>;

        /// Returns the ID of the user owning `access_token`
        async fn identify(
            &self,
            access_token: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            provider: &impl AuthProvider,
        ) -> Result<Uuid, AuthError>;
    }
}

pub struct AuthService {}

impl driving_ports::AuthPort for AuthService {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        ext_cxn: &mut impl ExternalConnectivity,
        provider: &impl AuthProvider,
    ) -> Result<SignUpOutcome, AuthError> {
        let outcome = provider
            .sign_up(&credentials.normalized(), &mut *ext_cxn)
            .await
            .inspect_err(|err| warn!("Sign up failed: {err}"))?;

        match &outcome {
            SignUpOutcome::SignedIn(session) => info!("User {} signed up", session.user_id),
            SignUpOutcome::ConfirmationRequired => info!("Sign up is awaiting email confirmation"),
        }

        Ok(outcome)
    }

    async fn sign_in(
        &self,
        credentials: &Credentials,
        ext_cxn: &mut impl ExternalConnectivity,
        provider: &impl AuthProvider,
    ) -> Result<Session, AuthError> {
        let session = provider
            .sign_in(&credentials.normalized(), &mut *ext_cxn)
            .await
            .inspect_err(|err| warn!("Sign in failed: {err}"))?;
        info!("User {} signed in", session.user_id);

        Ok(session)
    }

    async fn identify(
        &self,
        access_token: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        provider: &impl AuthProvider,
    ) -> Result<Uuid, AuthError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        provider.user_for_token(access_token, &mut *ext_cxn).await
    }
}
