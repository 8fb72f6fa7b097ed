use axum::{
    extract::{FromRef, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ConfirmationRequest, ConfirmationResponse, LoginRequest,
            PublicUser, SignupRequest, TokenInfoResponse, TokenQuery,
        },
        jwt::{Intent, JwtKeys},
        repo::CreateOutcome,
        repo_types::{User, UserStatus},
    },
    mailer::render_confirmation_email,
    state::AppState,
};

const PASSWORD_MIN: usize = 5;
const PASSWORD_MAX: usize = 128;
const EMAIL_MAX: usize = 128;

pub fn signup_routes() -> Router<AppState> {
    Router::new()
        .route("/signup/confirmation", post(signup_confirmation))
        .route("/signup/tokeninfo", get(signup_token_info))
        .route("/signup", post(signup))
}

pub fn forget_password_routes() -> Router<AppState> {
    Router::new()
        .route("/forgetpassword/confirmation", post(forget_password_confirmation))
        .route("/forgetpassword/tokeninfo", get(forget_password_token_info))
        .route("/password", put(change_password))
}

pub fn login_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn signup_confirmation(
    State(state): State<AppState>,
    Json(mut payload): Json<ConfirmationRequest>,
) -> Result<(axum::http::StatusCode, Json<ConfirmationResponse>), (axum::http::StatusCode, String)>
{
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((axum::http::StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let verify_page = match Url::parse(&payload.verify_page_url) {
        Ok(u) => u,
        Err(_) => {
            warn!(url = %payload.verify_page_url, "invalid verifyPageURL");
            return Err((
                axum::http::StatusCode::BAD_REQUEST,
                "Invalid verifyPageURL".into(),
            ));
        }
    };

    let continuation = payload.continuation.filter(|v| !v.is_empty());
    if let Some(ref next) = continuation {
        if Url::parse(next).is_err() {
            warn!(url = %next, "invalid continue URL");
            return Err((
                axum::http::StatusCode::BAD_REQUEST,
                "Invalid continue URL".into(),
            ));
        }
    }

    match User::find_by_identity(&state.db, &payload.email).await {
        Ok(None) => {}
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err((
                axum::http::StatusCode::CONFLICT,
                "Email already registered".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "find_by_identity failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    let keys = JwtKeys::from_ref(&state);
    let token = match keys.issue(&payload.email, Intent::Signup, continuation) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "token issue failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let link = build_verification_link(verify_page, &token);
    let html = render_confirmation_email(
        &state.config.email.signup_content,
        &link,
        &state.config.email.signup_link_text,
    );

    // Delivery happens off the request path; a lost email is retried by the
    // user resubmitting the form.
    let mailer = state.mailer.clone();
    let to = payload.email.clone();
    let subject = state.config.email.signup_subject.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer.send_html(&to, &subject, &html).await {
            warn!(error = %e, email = %to, "confirmation email delivery failed");
        }
    });

    info!(email = %payload.email, "signup confirmation issued");
    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(ConfirmationResponse { token }),
    ))
}

#[instrument(skip(state, query))]
pub async fn signup_token_info(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenInfoResponse>, (axum::http::StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = match keys.verify(&query.token, Intent::Signup) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "signup token rejected");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "Invalid or expired token".into(),
            ));
        }
    };

    Ok(Json(TokenInfoResponse {
        email: claims.sub,
        continuation: claims.continuation,
    }))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(axum::http::StatusCode, Json<PublicUser>), (axum::http::StatusCode, String)> {
    if !valid_password_len(&payload.password) {
        warn!("invalid password length");
        return Err((
            axum::http::StatusCode::BAD_REQUEST,
            "Invalid password length".into(),
        ));
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = match keys.verify(&payload.token, Intent::Signup) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "signup token rejected");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "Invalid or expired token".into(),
            ));
        }
    };

    let user = match User::create(&state.db, &claims.sub, &payload.password, UserStatus::Enabled)
        .await
    {
        Ok(CreateOutcome::Created(u)) => u,
        Ok(CreateOutcome::IdentityTaken) => {
            warn!(email = %claims.sub, "email already registered");
            return Err((
                axum::http::StatusCode::CONFLICT,
                "Email already registered".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(user_id = %user.id, identity = %user.identity, "user registered");
    Ok((axum::http::StatusCode::CREATED, Json(PublicUser::from(user))))
}

#[instrument(skip(state, payload))]
pub async fn forget_password_confirmation(
    State(state): State<AppState>,
    Json(mut payload): Json<ConfirmationRequest>,
) -> Result<(axum::http::StatusCode, Json<ConfirmationResponse>), (axum::http::StatusCode, String)>
{
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((axum::http::StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let verify_page = match Url::parse(&payload.verify_page_url) {
        Ok(u) => u,
        Err(_) => {
            warn!(url = %payload.verify_page_url, "invalid verifyPageURL");
            return Err((
                axum::http::StatusCode::BAD_REQUEST,
                "Invalid verifyPageURL".into(),
            ));
        }
    };

    let continuation = payload.continuation.filter(|v| !v.is_empty());
    if let Some(ref next) = continuation {
        if Url::parse(next).is_err() {
            warn!(url = %next, "invalid continue URL");
            return Err((
                axum::http::StatusCode::BAD_REQUEST,
                "Invalid continue URL".into(),
            ));
        }
    }

    match User::find_by_identity(&state.db, &payload.email).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(email = %payload.email, "password reset for unknown email");
            return Err((axum::http::StatusCode::NOT_FOUND, "User not found".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_identity failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    let keys = JwtKeys::from_ref(&state);
    let token = match keys.issue(&payload.email, Intent::ResetPassword, continuation) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "token issue failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let link = build_verification_link(verify_page, &token);
    let html = render_confirmation_email(
        &state.config.email.forget_pwd_content,
        &link,
        &state.config.email.forget_pwd_link_text,
    );

    let mailer = state.mailer.clone();
    let to = payload.email.clone();
    let subject = state.config.email.forget_pwd_subject.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer.send_html(&to, &subject, &html).await {
            warn!(error = %e, email = %to, "confirmation email delivery failed");
        }
    });

    info!(email = %payload.email, "password reset confirmation issued");
    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(ConfirmationResponse { token }),
    ))
}

#[instrument(skip(state, query))]
pub async fn forget_password_token_info(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenInfoResponse>, (axum::http::StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = match keys.verify(&query.token, Intent::ResetPassword) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "password reset token rejected");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "Invalid or expired token".into(),
            ));
        }
    };

    Ok(Json(TokenInfoResponse {
        email: claims.sub,
        continuation: claims.continuation,
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<axum::http::StatusCode, (axum::http::StatusCode, String)> {
    if !valid_password_len(&payload.password) {
        warn!("invalid password length");
        return Err((
            axum::http::StatusCode::BAD_REQUEST,
            "Invalid password length".into(),
        ));
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = match keys.verify(&payload.token, Intent::ResetPassword) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "password reset token rejected");
            return Err((
                axum::http::StatusCode::UNAUTHORIZED,
                "Invalid or expired token".into(),
            ));
        }
    };

    let user = match User::find_by_identity(&state.db, &claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %claims.sub, "password reset for unknown email");
            return Err((axum::http::StatusCode::NOT_FOUND, "User not found".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_identity failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    match user.verify_password(&payload.password) {
        Ok(true) => {
            warn!(user_id = %user.id, "new password matches the current one");
            return Err((
                axum::http::StatusCode::CONFLICT,
                "New password matches the current one".into(),
            ));
        }
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    match User::reset_password(&state.db, user.id, &payload.password, &user.salt).await {
        Ok(0) => {
            warn!(user_id = %user.id, "password reset hit a deleted user");
            return Err((axum::http::StatusCode::NOT_FOUND, "User not found".into()));
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "reset_password failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    info!(user_id = %user.id, "password reset");
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<PublicUser>, (axum::http::StatusCode, String)> {
    payload.identity = payload.identity.trim().to_lowercase();

    if !is_valid_email(&payload.identity) {
        warn!(identity = %payload.identity, "invalid identity");
        return Err((
            axum::http::StatusCode::BAD_REQUEST,
            "Invalid identity".into(),
        ));
    }

    if !valid_password_len(&payload.password) {
        warn!("invalid password length");
        return Err((
            axum::http::StatusCode::BAD_REQUEST,
            "Invalid password length".into(),
        ));
    }

    let user = match User::find_by_identity(&state.db, &payload.identity).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(identity = %payload.identity, "login unknown identity");
            return Err((axum::http::StatusCode::NOT_FOUND, "User not found".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_identity failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let ok = match user.verify_password(&payload.password) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !ok {
        warn!(identity = %payload.identity, user_id = %user.id, "login wrong password");
        return Err((
            axum::http::StatusCode::UNAUTHORIZED,
            "Password is wrong.".into(),
        ));
    }

    if user.status != UserStatus::Enabled {
        warn!(identity = %payload.identity, user_id = %user.id, "login for disabled account");
        return Err((
            axum::http::StatusCode::UNAUTHORIZED,
            "This account is not enabled.".into(),
        ));
    }

    info!(user_id = %user.id, identity = %user.identity, "user logged in");
    Ok(Json(PublicUser::from(user)))
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

fn is_valid_email(email: &str) -> bool {
    email.len() <= EMAIL_MAX && EMAIL_RE.is_match(email)
}

fn valid_password_len(password: &str) -> bool {
    (PASSWORD_MIN..=PASSWORD_MAX).contains(&password.len())
}

/// Append the token to the confirmation page URL, keeping whatever query
/// parameters the caller already put there.
fn build_verification_link(mut verify_page: Url, token: &str) -> String {
    verify_page.query_pairs_mut().append_pair("token", token);
    verify_page.to_string()
}
