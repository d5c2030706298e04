use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "events-hub-rs";

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // user_id
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn sign_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        ttl_minutes: i64,
    ) -> Result<String, String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(ttl_minutes);
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| e.to_string())
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[ISSUER]);

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map_err(|e| e.to_string())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_validate_round_trips_claims() {
        let keys = JwtKeys::from_secret("test-secret");
        let user_id = Uuid::new_v4();
        let token = keys
            .sign_access_token(user_id, "someone@example.com", 15)
            .unwrap();

        let claims = keys.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "someone@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let keys = JwtKeys::from_secret("test-secret");
        let other = JwtKeys::from_secret("other-secret");
        let token = other
            .sign_access_token(Uuid::new_v4(), "someone@example.com", 15)
            .unwrap();

        assert!(keys.validate_access_token(&token).is_err());
    }
}
