use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload: a snapshot of the user's standing at issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,          // user ID
    pub username: String,
    pub is_verified: bool,
    pub is_admin: bool,
    pub iat: usize,         // issued at (unix timestamp)
    pub exp: usize,         // expires at (unix timestamp)
    pub iss: String,        // issuer
    pub aud: String,        // audience
}
