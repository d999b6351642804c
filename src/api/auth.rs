//! Registration, login, and the bearer-token authorization gate.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{AuthResponse, Employee, EmployeeResponse, LoginRequest, RegisterRequest};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::token::TokenError;
use super::validation::{validate_email, validate_name, validate_password};

/// Verified identity attached to a request by the authorization gate.
/// Handlers behind the gate read it via `Extension<AuthUser>`; no protected
/// handler runs without one.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// Hash a password using Argon2 with a per-call random salt
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash. Returns false on mismatch or on an
/// unparseable hash, never an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    errors.finish()
}

/// Register endpoint
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_register_request(&request)?;

    // Email lookup is case-insensitive (NOCASE collation on the column)
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM employees WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(ApiError::bad_request(
            "An account with this email already exists",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;

    sqlx::query(
        "INSERT INTO employees (id, name, email, password_hash, title, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.title)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    tracing::info!(employee = %request.email, "Registered new employee");

    let token = state.tokens.issue(&id, &request.email).map_err(|e| {
        tracing::error!("Failed to issue token: {}", e);
        ApiError::internal("Failed to issue token")
    })?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: EmployeeResponse {
                id,
                name: request.name,
                email: request.email,
                title: request.title,
            },
        }),
    ))
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let employee: Option<Employee> = sqlx::query_as("SELECT * FROM employees WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    // Unknown email and wrong password are indistinguishable to the caller
    let employee =
        employee.ok_or_else(|| ApiError::bad_request("Invalid credentials"))?;

    if !verify_password(&request.password, &employee.password_hash) {
        return Err(ApiError::bad_request("Invalid credentials"));
    }

    let token = state
        .tokens
        .issue(&employee.id, &employee.email)
        .map_err(|e| {
            tracing::error!("Failed to issue token: {}", e);
            ApiError::internal("Failed to issue token")
        })?;

    Ok(Json(AuthResponse {
        token,
        user: EmployeeResponse::from(employee),
    }))
}

/// Authorization gate for protected routes.
///
/// Per-request transitions: no header -> 403, header without a bearer
/// token -> 403, token that fails verification -> 401, verified token ->
/// identity attached and the request proceeds.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(ApiError::missing_token)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(ApiError::malformed_token)?;

    let claims = state.tokens.verify(token).map_err(|err| match err {
        TokenError::Expired => ApiError::invalid_token("Token expired"),
        TokenError::Invalid => ApiError::invalid_token("Invalid token"),
    })?;

    request.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
    }

    #[test]
    fn test_verify_rejects_altered_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(!verify_password("correct horse battery stapl3", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same password", &a));
        assert!(verify_password("same password", &b));
    }

    #[test]
    fn test_verify_with_garbage_hash_returns_false() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }
}
