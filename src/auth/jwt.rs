use crate::models::Claims;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::Error};

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Token minting for handler tests; issuance itself lives outside this service.
#[cfg(test)]
pub(crate) mod test_tokens {
    use crate::models::{Claims, TokenType};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    pub const SECRET: &str = "test-secret";

    pub fn token(role: u8, employee_id: Option<u64>, token_type: TokenType, ttl: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            user_id: 900 + role as u64,
            sub: format!("user-{role}"),
            role,
            exp: (now + ttl) as usize,
            jti: Uuid::new_v4().to_string(),
            token_type,
            employee_id,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub fn access(role: u8, employee_id: Option<u64>) -> String {
        token(role, employee_id, TokenType::Access, 900)
    }
}
