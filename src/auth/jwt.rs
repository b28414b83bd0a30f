use std::time::Duration;

use anyhow::Context;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, Identity};
use crate::{
    config::JwtConfig,
    error::{AppError, UNAUTHORIZED},
    state::AppState,
};

/// Signing and verification keys plus the claims every token carries.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_seconds),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `identity` that expires after the configured TTL.
    pub fn issue(&self, identity: &Identity) -> anyhow::Result<String> {
        self.issue_with_ttl(identity, self.ttl)
    }

    pub fn issue_with_ttl(&self, identity: &Identity, ttl: Duration) -> anyhow::Result<String> {
        self.issue_at(identity, OffsetDateTime::now_utc(), ttl)
    }

    pub(crate) fn issue_at(
        &self,
        identity: &Identity,
        issued_at: OffsetDateTime,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let expires_at = TimeDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| issued_at.checked_add(ttl))
            .with_context(|| format!("token lifetime of {}s is out of range", ttl.as_secs()))?;
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %identity.user_id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, issuer, audience and expiry (no leeway).
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(reason = ?e.kind(), "jwt rejected");
            AppError::Unauthorized(UNAUTHORIZED)
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;
    use uuid::Uuid;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_seconds: 300,
        })
    }

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "carol@example.com".into(),
            role: Role::Moderator,
        }
    }

    #[test]
    fn issue_and_verify_carries_identity() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let who = identity();
        let token = keys.issue(&who).expect("issue");
        let claims = keys.verify(&token).expect("verify");

        assert_eq!(claims.sub, who.user_id);
        assert_eq!(claims.email, who.email);
        assert_eq!(claims.role, Role::Moderator);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 300);
        assert_eq!(Identity::from(claims), who);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let ttl = Duration::from_secs(60);
        let long_ago = OffsetDateTime::now_utc() - TimeDuration::seconds(61);
        let token = keys.issue_at(&identity(), long_ago, ttl).expect("issue");

        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn token_within_ttl_is_accepted() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let recently = OffsetDateTime::now_utc() - TimeDuration::seconds(30);
        let token = keys
            .issue_at(&identity(), recently, Duration::from_secs(60))
            .expect("issue");
        assert!(keys.verify(&token).is_ok());
    }

    #[test]
    fn huge_lifetime_is_an_error_not_a_panic() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_seconds: 1_000_000_000_000_000,
        });
        let err = keys.issue(&identity()).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let err = keys
            .issue_with_ttl(&identity(), Duration::from_secs(u64::MAX))
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let good = make_keys("secret-one", "iss", "aud");
        let bad = make_keys("secret-two", "iss", "aud");
        let token = good.issue(&identity()).expect("issue");
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let other_iss = make_keys("same-secret", "bad-iss", "good-aud");
        let other_aud = make_keys("same-secret", "good-iss", "bad-aud");
        let token = good.issue(&identity()).expect("issue");
        assert!(other_iss.verify(&token).is_err());
        assert!(other_aud.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage_and_tampering() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(keys.verify("not.a.jwt").is_err());
        assert!(keys.verify("").is_err());

        let token = keys.issue(&identity()).expect("issue");
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = keys
            .issue(&Identity {
                role: Role::Admin,
                ..identity()
            })
            .expect("issue");
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        let spliced = parts.join(".");
        // payload from one token, signature from another
        assert!(keys.verify(&spliced).is_err());
    }
}
