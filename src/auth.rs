use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::Role,
    token::{Claims, TokenService},
};

/// AuthUser
///
/// The resolved identity of an authenticated request, built straight from verified token
/// claims. Handlers use it for ownership checks.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// bearer_token
///
/// Pulls the token out of `Authorization: Bearer <token>`. A missing header, a different
/// scheme or an empty token all count as "no token".
pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::MissingToken)
}

/// AuthUser Extractor Implementation
///
/// Reuses the identity attached by `auth_middleware` when present; otherwise verifies the
/// bearer token itself. Rejects with 401 on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let tokens = TokenService::from_ref(state);
        let token = bearer_token(parts)?;
        let claims = tokens.verify(token)?;

        Ok(AuthUser::from(claims))
    }
}

/// AdminUser
///
/// An `AuthUser` whose role is `admin`. Rejects with 401 when unauthenticated and 403 when
/// the role is anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "access denied: administrator role required",
            ));
        }
        Ok(AdminUser(user))
    }
}

/// auth_middleware
///
/// Guards the protected routers. Extracting `AuthUser` performs verification (rejecting
/// with 401 before the handler runs); the identity is then attached to the request so
/// downstream extractors do not verify twice.
pub async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// admin_middleware
///
/// Runs after `auth_middleware` on the admin router and rejects non-admins with 403.
pub async fn admin_middleware(AdminUser(_): AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}
