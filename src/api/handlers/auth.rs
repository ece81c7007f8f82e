//! REST endpoints for the auth service.
//!
//! Each handler validates its input at the boundary (missing body, empty strings,
//! non-positive ids or levels all return `400` before the service is called), builds a
//! `CallContext` from the request and maps the domain result through [`ApiError`].

use super::ApiError;
use crate::api::ApiState;
use crate::auth::AdminLevel;
use axum::{
    Json,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Deserialize, Serialize)]
pub struct Credentials {
    login: String,
    #[schema(format = Password)]
    password: String,
    app_id: i64,
}

#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct CheckAdminParams {
    user_id: i64,
    app_id: i64,
}

#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct CheckAdminResponse {
    pub is_admin: bool,
    pub lvl: i32,
}

#[derive(ToSchema, Deserialize, Serialize)]
pub struct CreateAdminRequest {
    login: String,
    lvl: i32,
    key: String,
    app_id: i64,
}

#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct CreateAdminResponse {
    pub admin_id: i64,
}

#[derive(ToSchema, Deserialize, Serialize)]
pub struct DeleteAdminRequest {
    login: String,
    key: String,
}

#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct DeleteAdminResponse {
    pub result: bool,
    pub removed: u64,
}

#[derive(ToSchema, Deserialize, Serialize)]
pub struct AddAppRequest {
    name: String,
    secret: String,
    key: String,
}

#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct AddAppResponse {
    pub app_id: i64,
}

fn payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!("Rejected payload: {rejection}");
        ApiError::BadRequest("Missing or malformed payload")
    })
}

fn require(value: &str, reason: &'static str) -> Result<(), ApiError> {
    if value.is_empty() {
        Err(ApiError::BadRequest(reason))
    } else {
        Ok(())
    }
}

fn require_id(value: i64, reason: &'static str) -> Result<(), ApiError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ApiError::BadRequest(reason))
    }
}

#[utoipa::path(
    post,
    path= "/api/auth/register",
    request_body = Credentials,
    responses (
        (status = 200, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid input or unknown application",
            body = super::ErrorBody),
        (status = 409, description = "Login already taken in this application",
            body = super::ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let request = payload(body)?;
    require(&request.login, "Login is required")?;
    require(&request.password, "Password is required")?;
    require_id(request.app_id, "Invalid app_id")?;

    let user_id = state
        .auth()
        .register_user(
            state.call_context(&headers),
            &request.login,
            &request.password,
            request.app_id,
        )
        .await?;

    Ok(Json(RegisterResponse { user_id }))
}

#[utoipa::path(
    post,
    path= "/api/auth/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "Signed session token", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = super::ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = payload(body)?;
    require(&request.login, "Login is required")?;
    require(&request.password, "Password is required")?;
    require_id(request.app_id, "Invalid app_id")?;

    let token = state
        .auth()
        .login_user(
            state.call_context(&headers),
            &request.login,
            &request.password,
            request.app_id,
        )
        .await?;

    Ok(Json(LoginResponse { token }))
}

#[utoipa::path(
    get,
    path= "/api/auth/checkadmin",
    params(CheckAdminParams),
    responses (
        (status = 200, description = "User holds an admin grant", body = CheckAdminResponse),
        (status = 400, description = "Not an admin, or invalid input", body = super::ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn check_admin(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    query: Result<Query<CheckAdminParams>, QueryRejection>,
) -> Result<Json<CheckAdminResponse>, ApiError> {
    let Query(params) = query.map_err(|rejection| {
        debug!("Rejected query: {rejection}");
        ApiError::BadRequest("Missing or malformed query")
    })?;
    require_id(params.user_id, "Invalid user_id")?;
    require_id(params.app_id, "Invalid app_id")?;

    let grant = state
        .auth()
        .check_is_admin(state.call_context(&headers), params.user_id, params.app_id)
        .await?;

    Ok(Json(CheckAdminResponse {
        is_admin: true,
        lvl: grant.level.get(),
    }))
}

#[utoipa::path(
    post,
    path= "/api/auth/createadmin",
    request_body = CreateAdminRequest,
    responses (
        (status = 200, description = "Admin grant created", body = CreateAdminResponse),
        (status = 400, description = "Invalid input or unknown user", body = super::ErrorBody),
        (status = 403, description = "Wrong admin key", body = super::ErrorBody),
        (status = 409, description = "User already holds a grant", body = super::ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn create_admin(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    body: Result<Json<CreateAdminRequest>, JsonRejection>,
) -> Result<Json<CreateAdminResponse>, ApiError> {
    let request = payload(body)?;
    require(&request.login, "Login is required")?;
    require(&request.key, "Key is required")?;
    require_id(request.app_id, "Invalid app_id")?;
    let level =
        AdminLevel::try_from(request.lvl).map_err(|_| ApiError::BadRequest("Invalid lvl"))?;

    let admin_id = state
        .auth()
        .create_admin(
            state.call_context(&headers),
            &request.login,
            level,
            &request.key,
            request.app_id,
        )
        .await?;

    Ok(Json(CreateAdminResponse { admin_id }))
}

#[utoipa::path(
    delete,
    path= "/api/auth/deleteadmin",
    request_body = DeleteAdminRequest,
    responses (
        (status = 200, description = "Grants revoked (removed may be 0)",
            body = DeleteAdminResponse),
        (status = 400, description = "Invalid input or unknown login", body = super::ErrorBody),
        (status = 403, description = "Wrong admin key", body = super::ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn delete_admin(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    body: Result<Json<DeleteAdminRequest>, JsonRejection>,
) -> Result<Json<DeleteAdminResponse>, ApiError> {
    let request = payload(body)?;
    require(&request.login, "Login is required")?;
    require(&request.key, "Key is required")?;

    let revocation = state
        .auth()
        .delete_admin(state.call_context(&headers), &request.login, &request.key)
        .await?;

    Ok(Json(DeleteAdminResponse {
        result: revocation.success(),
        removed: revocation.removed(),
    }))
}

#[utoipa::path(
    post,
    path= "/api/auth/addapp",
    request_body = AddAppRequest,
    responses (
        (status = 200, description = "Application registered", body = AddAppResponse),
        (status = 400, description = "Invalid input", body = super::ErrorBody),
        (status = 403, description = "Wrong admin key", body = super::ErrorBody),
        (status = 409, description = "Application name already taken", body = super::ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn add_app(
    headers: HeaderMap,
    state: Extension<Arc<ApiState>>,
    body: Result<Json<AddAppRequest>, JsonRejection>,
) -> Result<Json<AddAppResponse>, ApiError> {
    let request = payload(body)?;
    require(&request.name, "Name is required")?;
    require(&request.secret, "Secret is required")?;
    require(&request.key, "Key is required")?;

    let app_id = state
        .auth()
        .add_app(
            state.call_context(&headers),
            &request.name,
            &SecretString::from(request.secret),
            &request.key,
        )
        .await?;

    Ok(Json(AddAppResponse { app_id }))
}
