use std::sync::OnceLock;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::{AccountError, ApiMessage};
use crate::models::{Account, Avatar, CharacterBuild, ProfileComment, Role};
use crate::state::AppState;

/// Upload cap: 9 MiB of decoded image bytes.
const MAX_AVATAR_BYTES: usize = 9 * 1024 * 1024;

/// Request-body cap for the avatar route. Base64 inflates 9 MiB to roughly
/// 12.6 MiB; the rest is headroom for the JSON envelope. Without this the
/// default 2 MB body limit would reject large avatars before
/// `validate_avatar` ever saw them.
const MAX_AVATAR_BODY_BYTES: usize = 16 * 1024 * 1024;

const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Build the application router with all routes.
pub fn routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.frontend_origin);

    Router::new()
        // Account lifecycle
        .route("/register", post(register))
        .route("/login", post(login))
        // Self-service profile editing
        .route("/me", get(my_profile).delete(deactivate_me))
        .route("/me/displayname", put(update_display_name))
        .route("/me/email", put(update_email))
        .route("/me/password", put(update_password))
        .route("/me/bio", put(update_bio))
        .route(
            "/me/avatar",
            put(update_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BODY_BYTES)),
        )
        .route("/me/favorites", put(update_favorites))
        // Public profiles and peer actions
        .route("/profiles/:username", get(profile_by_username))
        .route("/profiles/:username/comment", post(post_comment))
        .route("/profiles/:username/rate", post(post_rating))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cors_layer(frontend_origin: &str) -> CorsLayer {
    match frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(_) => {
            warn!(%frontend_origin, "invalid FRONTEND_ORIGIN, CORS disabled");
            CorsLayer::new()
        }
    }
}

// ---- Request/response bodies ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: String,
    display_name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayNameRequest {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct BioRequest {
    bio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoritesRequest {
    #[serde(default)]
    killer_builds: Vec<CharacterBuild>,
    #[serde(default)]
    survivor_builds: Vec<CharacterBuild>,
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    score: u8,
}

/// Public view of an account. Never carries the password hash or the raw
/// ratings list, matching the original response shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub bio: String,
    pub avatar: Avatar,
    pub favorite_killers: Vec<CharacterBuild>,
    pub favorite_survivors: Vec<CharacterBuild>,
    pub comments: Vec<ProfileComment>,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            display_name: account.display_name,
            email: account.email,
            role: account.role,
            created_at: account.created_at,
            bio: account.bio,
            avatar: account.avatar,
            favorite_killers: account.favorite_killers,
            favorite_survivors: account.favorite_survivors,
            comments: account.comments,
        }
    }
}

// ---- Handlers ----

async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> Response {
    if let Err(msg) = validate_registration(&req) {
        return bad_request(msg);
    }

    match state
        .accounts
        .register(&req.username, &req.display_name, &req.email, &req.password)
        .await
    {
        Ok(message) => (StatusCode::CREATED, Json(ApiMessage::new(message))).into_response(),
        // Conflicts come back as 400 here, same as validation failures.
        Err(err) => err.into_response(),
    }
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    match state.accounts.login(&req.username, &req.password).await {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn my_profile(State(state): State<AppState>, user: AuthUser) -> Response {
    match state.accounts.get_by_id(user.claims.sub).await {
        Ok(Some(account)) => Json(ProfileResponse::from(account)).into_response(),
        Ok(None) => AccountError::NotFound.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn update_display_name(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DisplayNameRequest>,
) -> Response {
    if let Err(msg) = validate_display_name(&req.display_name) {
        return bad_request(msg);
    }
    respond(
        state
            .accounts
            .update_display_name(user.claims.sub, &req.display_name)
            .await,
    )
}

async fn update_email(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<EmailRequest>,
) -> Response {
    if let Err(msg) = validate_email(&req.email) {
        return bad_request(msg);
    }
    respond(state.accounts.update_email(user.claims.sub, &req.email).await)
}

async fn update_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PasswordRequest>,
) -> Response {
    if let Err(msg) = validate_password(&req.new_password) {
        return bad_request(msg);
    }
    match state
        .accounts
        .update_password(user.claims.sub, &req.current_password, &req.new_password)
        .await
    {
        Ok(message) => ok_message(message),
        // A failed current-password check is a 400 on this route, not a 401.
        Err(AccountError::InvalidCredentials(msg)) => bad_request(msg),
        Err(err) => err.into_response(),
    }
}

async fn update_bio(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<BioRequest>,
) -> Response {
    respond(state.accounts.update_bio(user.claims.sub, &req.bio).await)
}

async fn update_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    Json(avatar): Json<Avatar>,
) -> Response {
    if let Err(msg) = validate_avatar(&avatar) {
        return bad_request(msg);
    }
    respond(state.accounts.update_avatar(user.claims.sub, avatar).await)
}

async fn update_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<FavoritesRequest>,
) -> Response {
    respond(
        state
            .accounts
            .update_favorites(user.claims.sub, req.killer_builds, req.survivor_builds)
            .await,
    )
}

async fn deactivate_me(State(state): State<AppState>, user: AuthUser) -> Response {
    respond(state.accounts.deactivate(user.claims.sub).await)
}

async fn profile_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Response {
    match state.accounts.get_by_username(&username).await {
        Ok(Some(account)) if account.is_active => {
            Json(ProfileResponse::from(account)).into_response()
        }
        Ok(_) => not_found("profile not found or inactive"),
        Err(err) => err.into_response(),
    }
}

async fn post_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Response {
    if let Err(msg) = validate_comment(&req.text) {
        return bad_request(msg);
    }

    // Snapshot the commenter's current display name onto the comment.
    let commenter = match state.accounts.get_by_id(user.claims.sub).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            info!(commenter_id = %user.claims.sub, "comment from vanished account");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiMessage::new("account no longer exists")),
            )
                .into_response();
        }
        Err(err) => return err.into_response(),
    };

    let target = match active_profile(&state, &username).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    let comment = ProfileComment {
        commenter_id: commenter.id,
        commenter_display_name: commenter.display_name,
        text: req.text,
        created_at: Utc::now(),
    };
    respond(state.accounts.add_comment(target.id, comment).await)
}

async fn post_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    Json(req): Json<RatingRequest>,
) -> Response {
    if !(1..=5).contains(&req.score) {
        return bad_request("score must be between 1 and 5");
    }

    let target = match active_profile(&state, &username).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    respond(
        state
            .accounts
            .rate_profile(target.id, user.claims.sub, req.score)
            .await,
    )
}

/// Resolve a public profile target: 404 when absent or deactivated.
async fn active_profile(state: &AppState, username: &str) -> Result<Account, Response> {
    match state.accounts.get_by_username(username).await {
        Ok(Some(account)) if account.is_active => Ok(account),
        Ok(_) => Err(not_found("profile not found or inactive")),
        Err(err) => Err(err.into_response()),
    }
}

fn respond(result: Result<String, AccountError>) -> Response {
    match result {
        Ok(message) => ok_message(message),
        Err(err) => err.into_response(),
    }
}

fn ok_message(message: String) -> Response {
    (StatusCode::OK, Json(ApiMessage::new(message))).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiMessage::new(message))).into_response()
}

fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ApiMessage::new(message))).into_response()
}

// ---- Boundary validation (not the account manager's concern) ----

fn username_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9_]{4,30}$").unwrap())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), &'static str> {
    if !username_pattern().is_match(&req.username) {
        return Err("username must be 4-30 lowercase letters, digits, or underscores");
    }
    validate_display_name(&req.display_name)?;
    validate_email(&req.email)?;
    validate_password(&req.password)
}

fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let len = name.chars().count();
    if !(3..=50).contains(&len) {
        return Err("display name must be 3-50 characters");
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), &'static str> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err("email address is not valid");
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if !(6..=100).contains(&len) {
        return Err("password must be 6-100 characters");
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !(has_lower && has_upper && has_digit && has_special) {
        return Err("password needs an uppercase letter, a lowercase letter, a digit, and one of @$!%*?&");
    }
    Ok(())
}

fn validate_comment(text: &str) -> Result<(), &'static str> {
    if text.trim().is_empty() {
        return Err("comment text cannot be empty");
    }
    if text.chars().count() > 1000 {
        return Err("comment cannot exceed 1000 characters");
    }
    Ok(())
}

fn validate_avatar(avatar: &Avatar) -> Result<(), &'static str> {
    if let Avatar::Inline { content_type, data } = avatar {
        if !content_type.starts_with("image/") {
            return Err("avatar content type must be an image");
        }
        let decoded =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
                .map_err(|_| "avatar data is not valid base64")?;
        if decoded.len() > MAX_AVATAR_BYTES {
            return Err("avatar exceeds the 9MB limit");
        }
    }
    Ok(())
}
