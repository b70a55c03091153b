use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::services::errors::auth_service_errors::AuthServiceError;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn from_env() -> Self {
        let jwt_secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET environment variable must be set");
        AuthService { jwt_secret }
    }

    pub fn with_jwt_secret(jwt_secret: String) -> Self {
        AuthService { jwt_secret }
    }

    pub fn generate_token(&self, user_id: i64) -> Result<String, AuthServiceError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            exp: (now + Duration::hours(24)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| AuthServiceError::TokenCreation(format!("{:#?}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthServiceError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::default();

        match decode::<TokenClaims>(token, &decoding_key, &validation) {
            Ok(token_data) => Ok(token_data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(AuthServiceError::ExpiredToken)
                }
                _ => Err(AuthServiceError::InvalidToken),
            },
        }
    }

    pub fn extract_user_id(&self, token: &str) -> Result<i64, AuthServiceError> {
        let claims = self.verify_token(token)?;
        claims
            .sub
            .parse()
            .map_err(|_| AuthServiceError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation_and_verification_roundtrip() {
        let auth_service = AuthService::with_jwt_secret("test-secret-key".to_string());

        let token = auth_service.generate_token(42).unwrap();
        let claims = auth_service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert!(claims.exp > claims.iat);
        assert_eq!(auth_service.extract_user_id(&token).unwrap(), 42);
    }

    #[test]
    fn test_verify_token_invalid() {
        let auth_service = AuthService::with_jwt_secret("test-secret-key".to_string());

        let result = auth_service.verify_token("invalid-token");
        assert!(matches!(
            result.unwrap_err(),
            AuthServiceError::InvalidToken
        ));
    }

    #[test]
    fn test_different_secrets_reject_each_others_tokens() {
        let auth_service1 = AuthService::with_jwt_secret("secret1".to_string());
        let auth_service2 = AuthService::with_jwt_secret("secret2".to_string());

        let token1 = auth_service1.generate_token(7).unwrap();
        let token2 = auth_service2.generate_token(7).unwrap();
        assert_ne!(token1, token2);

        assert!(auth_service1.verify_token(&token1).is_ok());
        assert!(auth_service2.verify_token(&token1).is_err());
        assert!(auth_service1.verify_token(&token2).is_err());
    }
}
