//! Handshake credentials.
//!
//! Tokens are HS256 JWTs carrying `{id, role, iat, exp}`. A token is only
//! accepted if the directory still knows the user under the same role.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rollcall_core::{CoordinatorError, DirectoryError, DirectoryStore, Identity, Role, UserId};
use rollcall_settings::AuthSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a handshake credential was refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `token` query parameter.
    #[error("missing token")]
    MissingToken,
    /// Signature, expiry or shape check failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Token names a user the directory does not have.
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
    /// Token role differs from the stored role.
    #[error("role mismatch for {0}")]
    RoleMismatch(UserId),
    /// The directory could not be asked.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),
    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<AuthError> for CoordinatorError {
    fn from(_: AuthError) -> Self {
        CoordinatorError::Unauthorized
    }
}

/// JWT claims.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: UserId,
    /// Claimed role.
    pub role: Role,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issues and verifies handshake tokens with a shared secret.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenAuthority {
    /// Create an authority for `secret`; issued tokens live `ttl_secs`.
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Create an authority from loaded settings.
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(&settings.jwt_secret, settings.token_ttl_secs)
    }

    /// Sign a token for an identity.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            id: identity.id.clone(),
            role: identity.role,
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature and expiry; return the claimed identity.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Identity::new(data.claims.id, data.claims.role))
    }

    /// Full handshake check: verify the token, then confirm the user still
    /// exists with the claimed role.
    pub async fn authenticate(
        &self,
        token: Option<&str>,
        directory: &dyn DirectoryStore,
    ) -> Result<Identity, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
        let identity = self.verify(token)?;
        let user = directory.find_user(&identity.id).await.map_err(|e| match e {
            DirectoryError::NotFound(_) => AuthError::UnknownUser(identity.id.clone()),
            DirectoryError::Unavailable(detail) => AuthError::DirectoryUnavailable(detail),
        })?;
        if user.role != identity.role {
            debug!(user_id = %identity.id, claimed = %identity.role, stored = %user.role, "role mismatch");
            return Err(AuthError::RoleMismatch(identity.id));
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use rollcall_core::{
        AttendanceRecord, ClassId, ClassRoster, NewAttendanceRecord, UserRecord,
    };

    use super::*;

    struct Users(HashMap<UserId, Role>);

    #[async_trait]
    impl DirectoryStore for Users {
        async fn find_class(&self, id: &ClassId) -> Result<ClassRoster, DirectoryError> {
            Err(DirectoryError::NotFound(id.to_string()))
        }

        async fn find_user(&self, id: &UserId) -> Result<UserRecord, DirectoryError> {
            self.0
                .get(id)
                .map(|role| UserRecord {
                    id: id.clone(),
                    name: "n".into(),
                    email: "n@example.com".into(),
                    role: *role,
                })
                .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
        }

        async fn create_attendance_record(
            &self,
            _record: NewAttendanceRecord,
        ) -> Result<AttendanceRecord, DirectoryError> {
            Err(DirectoryError::Unavailable("read-only".into()))
        }
    }

    fn teacher() -> Identity {
        Identity::new(UserId::from_raw("usr_t"), Role::Teacher)
    }

    #[test]
    fn issue_then_verify() {
        let auth = TokenAuthority::new("secret", 3600);
        let token = auth.issue(&teacher()).unwrap();
        assert_eq!(auth.verify(&token).unwrap(), teacher());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = TokenAuthority::new("one", 3600).issue(&teacher()).unwrap();
        let err = TokenAuthority::new("two", 3600).verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn expired_token_rejected() {
        let auth = TokenAuthority::new("secret", 3600);
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: UserId::from_raw("usr_t"),
            role: Role::Teacher,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(auth.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn garbage_rejected() {
        let auth = TokenAuthority::new("secret", 3600);
        assert!(auth.verify("not.a.jwt").is_err());
    }

    #[tokio::test]
    async fn authenticate_checks_directory() {
        let auth = TokenAuthority::new("secret", 3600);
        let dir = Users(HashMap::from([(UserId::from_raw("usr_t"), Role::Teacher)]));
        let token = auth.issue(&teacher()).unwrap();
        assert_eq!(auth.authenticate(Some(&token), &dir).await.unwrap(), teacher());
    }

    #[tokio::test]
    async fn authenticate_rejects_role_mismatch() {
        let auth = TokenAuthority::new("secret", 3600);
        let dir = Users(HashMap::from([(UserId::from_raw("usr_t"), Role::Student)]));
        let token = auth.issue(&teacher()).unwrap();
        let err = auth.authenticate(Some(&token), &dir).await.unwrap_err();
        assert!(matches!(err, AuthError::RoleMismatch(_)));
    }

    #[tokio::test]
    async fn authenticate_rejects_unknown_user_and_missing_token() {
        let auth = TokenAuthority::new("secret", 3600);
        let dir = Users(HashMap::new());
        let token = auth.issue(&teacher()).unwrap();
        assert!(matches!(
            auth.authenticate(Some(&token), &dir).await,
            Err(AuthError::UnknownUser(_))
        ));
        assert!(matches!(auth.authenticate(None, &dir).await, Err(AuthError::MissingToken)));
        assert!(matches!(auth.authenticate(Some(""), &dir).await, Err(AuthError::MissingToken)));
    }

    #[test]
    fn every_auth_error_is_unauthorized() {
        let err: CoordinatorError = AuthError::MissingToken.into();
        assert_eq!(err, CoordinatorError::Unauthorized);
    }
}
