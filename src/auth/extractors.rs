use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::jwt::JwtKeys;
use super::repo_types::User;
use crate::{error::ApiError, state::AppState};

/// Pull the bearer token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the request's token to the live user record. The token is only a
/// snapshot; the store is consulted so deleted users are rejected at once.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthenticated)?;

    let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        ApiError::from(e)
    })?;

    let mut user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "token for missing user");
            ApiError::UserNotFound
        })?;
    user.password_hash.clear();
    Ok(user)
}

pub fn authorize_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        warn!(user_id = %user.id, "admin route denied");
        Err(ApiError::Forbidden)
    }
}

/// Authenticated caller.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await.map(AuthUser)
    }
}

/// Authenticated caller holding the admin flag.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(state, &parts.headers).await?;
        authorize_admin(&user)?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;

    use super::*;
    use crate::auth::identifier::Identifier;
    use crate::auth::repo::UserStore;
    use crate::auth::repo_memory::MemoryUserStore;
    use crate::notify::ConsoleNotifier;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    async fn state_with_user(admin: bool) -> (AppState, Arc<MemoryUserStore>, User) {
        let base = AppState::fake();
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::from_parts(base.config, store.clone(), Arc::new(ConsoleNotifier));
        let mut user = User::pending(
            "alice".into(),
            "hash".into(),
            Identifier::Email("a@x.com".into()),
        );
        user.is_verified = true;
        user.is_admin = admin;
        store.create(&user).await.unwrap();
        (state, store, user)
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn resolves_live_user_without_hash() {
        let (state, _, user) = state_with_user(false).await;
        let token = JwtKeys::from_ref(&state).sign(&user).unwrap();
        let found = authenticate(&state, &headers_with(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.password_hash.is_empty());
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let (state, _, _) = state_with_user(false).await;
        let err = authenticate(&state, &HeaderMap::new()).await.err().unwrap();
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let (state, _, _) = state_with_user(false).await;
        let err = authenticate(&state, &headers_with("Bearer nope"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn deleted_user_is_rejected_despite_valid_token() {
        let (state, store, user) = state_with_user(false).await;
        let token = JwtKeys::from_ref(&state).sign(&user).unwrap();
        store.remove(user.id).unwrap();

        let err = authenticate(&state, &headers_with(&format!("Bearer {token}")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::UserNotFound));
    }

    #[tokio::test]
    async fn admin_gate() {
        let (_, _, user) = state_with_user(false).await;
        assert!(matches!(authorize_admin(&user), Err(ApiError::Forbidden)));
        let (_, _, admin) = state_with_user(true).await;
        assert!(authorize_admin(&admin).is_ok());
    }
}
