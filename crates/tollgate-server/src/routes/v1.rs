//! API v1 routes.
//!
//! Each route declares the rights it needs through the gate. Routes under
//! `/users/:userId` also let the owner of that user id through.

use crate::{
    auth::{rights, CurrentIdentity, Identity, Right, Role},
    directory::{NewPayment, NewUser, Payment, Profile, UserRecord, UserUpdate},
    error::{not_found, ApiError, ApiResult},
    request::ValidJson,
    response::ApiResponse,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

/// Create the v1 API router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_routes(state))
        .merge(user_routes(state))
        .merge(payment_routes(state))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let gate = &state.gate;
    Router::new()
        .route("/auth/me", get(auth_me).route_layer(gate.authenticated()))
        .route("/roles", get(roles_list).route_layer(gate.authenticated()))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let gate = &state.gate;
    let user_path = format!("/users/:{}", gate.owner_param());

    // Methods sharing a path but not a requirement are gated separately and
    // merged, so one layer never wraps the other's handler.
    Router::new()
        .route(
            "/users",
            get(users_list)
                .route_layer(gate.require([rights::GET_USERS]))
                .merge(post(users_create).route_layer(gate.require([rights::MANAGE_USERS]))),
        )
        .route(
            &user_path,
            get(users_get)
                .route_layer(gate.require([rights::GET_USERS]))
                .merge(
                    patch(users_update)
                        .delete(users_delete)
                        .route_layer(gate.require([rights::MANAGE_USERS])),
                ),
        )
        .route(
            &format!("{user_path}/profile"),
            get(profile_get)
                .route_layer(gate.require([rights::GET_USERS]))
                .merge(put(profile_put).route_layer(gate.require([rights::MANAGE_USERS]))),
        )
}

fn payment_routes(state: &AppState) -> Router<AppState> {
    let gate = &state.gate;
    let path = format!("/users/:{}/payments", gate.owner_param());

    Router::new().route(
        &path,
        get(payments_list)
            .route_layer(gate.require([rights::GET_PAYMENTS]))
            .merge(post(payments_create).route_layer(gate.require([rights::MANAGE_PAYMENTS]))),
    )
}

fn parse_user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid user id: {raw}")))
}

async fn existing_user(state: &AppState, id: Uuid) -> ApiResult<UserRecord> {
    state
        .directory
        .find(id)
        .await?
        .ok_or_else(|| not_found("user", id))
}

// Auth

async fn auth_me(CurrentIdentity(identity): CurrentIdentity) -> ApiResponse<Identity> {
    ApiResponse::success(identity)
}

async fn roles_list(State(state): State<AppState>) -> ApiResponse<BTreeMap<Role, Vec<Right>>> {
    ApiResponse::success(state.registry().to_table())
}

// Users

async fn users_list(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<UserRecord>>> {
    Ok(ApiResponse::success(state.directory.list().await?))
}

async fn users_create(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    ValidJson(body): ValidJson<NewUser>,
) -> ApiResult<(StatusCode, ApiResponse<UserRecord>)> {
    let user = state.directory.insert(body).await?;
    info!(user_id = %user.id, created_by = %caller.id, role = %user.role, "User created");
    Ok(ApiResponse::created(user))
}

async fn users_get(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<ApiResponse<UserRecord>> {
    let id = parse_user_id(&raw)?;
    Ok(ApiResponse::success(existing_user(&state, id).await?))
}

async fn users_update(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(raw): Path<String>,
    ValidJson(body): ValidJson<UserUpdate>,
) -> ApiResult<ApiResponse<UserRecord>> {
    let id = parse_user_id(&raw)?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".into()));
    }

    // Owners may edit themselves, but a role change needs the right itself.
    let may_assign_roles = state
        .registry()
        .grants_all(caller.role, [&rights::MANAGE_USERS]);
    if body.role.is_some() && !may_assign_roles {
        info!(
            event = "gate_denied",
            user_id = %caller.id,
            reason = "role_change",
            "Role change refused"
        );
        return Err(ApiError::Forbidden);
    }

    let user = state.directory.update(id, body).await?;
    Ok(ApiResponse::success(user))
}

async fn users_delete(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(raw): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_user_id(&raw)?;
    state.directory.remove(id).await?;
    info!(user_id = %id, deleted_by = %caller.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn profile_get(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<ApiResponse<Profile>> {
    let id = parse_user_id(&raw)?;
    Ok(ApiResponse::success(existing_user(&state, id).await?.profile))
}

async fn profile_put(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    ValidJson(profile): ValidJson<Profile>,
) -> ApiResult<ApiResponse<Profile>> {
    let id = parse_user_id(&raw)?;
    let user = state.directory.set_profile(id, profile).await?;
    Ok(ApiResponse::success(user.profile))
}

// Payments

#[derive(Serialize)]
struct PaymentList {
    user_id: Uuid,
    // i128 so summing i64 amounts cannot overflow.
    total_cents: i128,
    payments: Vec<Payment>,
}

async fn payments_list(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<ApiResponse<PaymentList>> {
    let id = parse_user_id(&raw)?;
    existing_user(&state, id).await?;

    let payments = state.ledger.list_for(id).await?;
    Ok(ApiResponse::success(PaymentList {
        user_id: id,
        total_cents: payments.iter().map(|p| i128::from(p.amount_cents)).sum(),
        payments,
    }))
}

async fn payments_create(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    ValidJson(body): ValidJson<NewPayment>,
) -> ApiResult<(StatusCode, ApiResponse<Payment>)> {
    let id = parse_user_id(&raw)?;
    existing_user(&state, id).await?;

    let payment = state.ledger.record(id, body).await?;
    info!(
        user_id = %id,
        payment_id = %payment.id,
        amount_cents = payment.amount_cents,
        "Payment recorded"
    );
    Ok(ApiResponse::created(payment))
}
