//! Bearer-token verification.
//!
//! Session operations never trust a client-supplied user id. Callers present a
//! signed JWT and [`TokenVerifier::verify`] turns it into a [`UserId`]. The id
//! comes from the `user_id` claim, falling back to a numeric `sub`.

use std::str::FromStr;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AuthConfig;
use crate::conversation::UserId;
use crate::error::{PaintError, PaintResult};

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !config.jwt_secret.is_empty(),
            "auth.jwt_secret is empty (set PAINTWISE_JWT_SECRET)"
        );
        let algorithm = Algorithm::from_str(&config.jwt_algorithm)
            .map_err(|e| anyhow::anyhow!("unsupported jwt_algorithm {}: {e}", config.jwt_algorithm))?;
        anyhow::ensure!(
            matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            "jwt_algorithm must be an HMAC algorithm (HS256, HS384, HS512)"
        );

        let mut validation = Validation::new(algorithm);
        // `exp` is checked when present but not required.
        validation.required_spec_claims.clear();

        Ok(Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }

    /// Verify `token` (with or without a `Bearer ` prefix) and return its user.
    pub fn verify(&self, token: &str) -> PaintResult<UserId> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(PaintError::Auth("missing access token".into()));
        }

        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| PaintError::Auth(format!("invalid token: {e}")))?;

        let claims = data.claims;
        claims
            .user_id
            .as_ref()
            .and_then(user_id_from)
            .or_else(|| claims.sub.as_ref().and_then(user_id_from))
            .map(UserId)
            .ok_or_else(|| PaintError::Auth("token carries no user id".into()))
    }
}

fn user_id_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(&AuthConfig {
            jwt_secret: SECRET.into(),
            ..AuthConfig::default()
        })
        .unwrap()
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn user_id_claim_wins() {
        let t = token(serde_json::json!({"user_id": 42, "sub": "7"}), SECRET);
        assert_eq!(verifier().verify(&t).unwrap(), UserId(42));
    }

    #[test]
    fn numeric_sub_fallback_with_bearer_prefix() {
        let t = token(serde_json::json!({"sub": "7"}), SECRET);
        assert_eq!(verifier().verify(&format!("Bearer {t}")).unwrap(), UserId(7));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let t = token(serde_json::json!({"user_id": 1}), "other");
        assert!(matches!(verifier().verify(&t), Err(PaintError::Auth(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let t = token(serde_json::json!({"user_id": 1, "exp": 1_000_000}), SECRET);
        assert!(matches!(verifier().verify(&t), Err(PaintError::Auth(_))));
    }

    #[test]
    fn token_without_user_is_rejected() {
        let t = token(serde_json::json!({"sub": "alice"}), SECRET);
        assert!(matches!(verifier().verify(&t), Err(PaintError::Auth(_))));
        assert!(matches!(verifier().verify(""), Err(PaintError::Auth(_))));
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(TokenVerifier::new(&AuthConfig::default()).is_err());
    }
}
