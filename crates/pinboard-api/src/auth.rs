use std::path::PathBuf;
use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    Extension, Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tera::{Context, Tera};
use tracing::{info, warn};

use pinboard_db::{Database, is_unique_violation};
use pinboard_types::api::{Claims, LoginForm, SignupForm};
use pinboard_types::models::{CurrentUser, Flash};

use crate::error::ApiError;
use crate::storage::UploadStore;
use crate::{flash, views, with_db};

pub const SESSION_COOKIE: &str = "pinboard_session";

const SESSION_DAYS: i64 = 30;

const MAX_USERNAME_CHARS: usize = 64;
const MAX_EMAIL_CHARS: usize = 120;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    pub uploads: UploadStore,
    pub static_dir: PathBuf,
    pub templates: Tera,
}

impl AppStateInner {
    pub fn new(
        db: Database,
        session_secret: String,
        uploads: UploadStore,
        static_dir: PathBuf,
    ) -> anyhow::Result<AppState> {
        Ok(Arc::new(Self {
            db,
            session_secret,
            uploads,
            static_dir,
            templates: views::templates()?,
        }))
    }
}

pub async fn root(Extension(current_user): Extension<Option<CurrentUser>>) -> Redirect {
    match current_user {
        Some(_) => Redirect::to("/dashboard"),
        None => Redirect::to("/login"),
    }
}

// -- Login --

pub async fn login_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<Option<CurrentUser>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    if current_user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render_login(&state, jar, "", vec![]).map(IntoResponse::into_response)
}

pub async fn login(
    State(state): State<AppState>,
    Extension(current_user): Extension<Option<CurrentUser>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if current_user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let email = form.email.trim().to_string();
    let lookup = email.clone();
    let user = with_db(&state, move |db| db.get_user_by_email(&lookup)).await?;

    // One message for unknown email and wrong password alike.
    let Some(user) = user.filter(|u| verify_password(&form.password, &u.password_hash)) else {
        let page = render_login(&state, jar, &email, vec![Flash::danger("Invalid email or password.")])?;
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    };

    let token = create_token(&state.session_secret, user.id, &user.username)?;
    info!("User {} logged in", user.username);

    let jar = jar.add(session_cookie(token));
    let jar = flash::push(jar, Flash::success("Logged in successfully."));
    Ok((jar, Redirect::to("/dashboard")).into_response())
}

fn render_login(
    state: &AppState,
    jar: CookieJar,
    email: &str,
    extra: Vec<Flash>,
) -> Result<impl IntoResponse, ApiError> {
    let mut ctx = Context::new();
    ctx.insert("form_email", email);
    views::render_page(&state.templates, jar, "auth/login.html", ctx, None, extra)
}

// -- Signup --

pub async fn signup_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<Option<CurrentUser>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    if current_user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render_signup(&state, jar, &SignupForm::default(), vec![]).map(IntoResponse::into_response)
}

pub async fn signup(
    State(state): State<AppState>,
    Extension(current_user): Extension<Option<CurrentUser>>,
    jar: CookieJar,
    Form(mut form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    if current_user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    form.username = form.username.trim().to_string();
    form.email = form.email.trim().to_string();

    match create_account(&state, &form).await {
        Ok(user_id) => {
            info!("New account {} ({})", form.username, user_id);
            let jar = flash::push(jar, Flash::success("Account created. You can now log in."));
            Ok((jar, Redirect::to("/login")).into_response())
        }
        Err(ApiError::Validation(message) | ApiError::Conflict(message)) => {
            let page = render_signup(&state, jar, &form, vec![Flash::danger(message)])?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn create_account(state: &AppState, form: &SignupForm) -> Result<i64, ApiError> {
    if form.username.is_empty() || form.email.is_empty() || form.password.is_empty() {
        return Err(ApiError::validation("Please fill in all required fields."));
    }
    if form.username.chars().count() > MAX_USERNAME_CHARS {
        return Err(ApiError::validation("Username must be at most 64 characters."));
    }
    if form.email.chars().count() > MAX_EMAIL_CHARS {
        return Err(ApiError::validation("Email must be at most 120 characters."));
    }
    if form.password != form.confirm_password {
        return Err(ApiError::validation("Passwords do not match."));
    }

    let (email, username) = (form.email.clone(), form.username.clone());
    let (email_taken, username_taken) = with_db(state, move |db| {
        Ok((
            db.get_user_by_email(&email)?.is_some(),
            db.get_user_by_username(&username)?.is_some(),
        ))
    })
    .await?;

    if email_taken {
        return Err(ApiError::Conflict("Email already registered.".into()));
    }
    if username_taken {
        return Err(ApiError::Conflict("Username already taken.".into()));
    }

    let password_hash = hash_password(&form.password)?;

    let (email, username) = (form.email.clone(), form.username.clone());
    let created = with_db(state, move |db| match db.create_user(&username, &email, &password_hash) {
        Ok(id) => Ok(Some(id)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    })
    .await?;

    // Another signup can land between the checks and the insert.
    created.ok_or_else(|| ApiError::Conflict("Username or email already taken.".into()))
}

fn render_signup(
    state: &AppState,
    jar: CookieJar,
    form: &SignupForm,
    extra: Vec<Flash>,
) -> Result<impl IntoResponse, ApiError> {
    let mut ctx = Context::new();
    ctx.insert("form_username", &form.username);
    ctx.insert("form_email", &form.email);
    views::render_page(&state.templates, jar, "auth/signup.html", ctx, None, extra)
}

// -- Logout --

pub async fn logout(jar: CookieJar, Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    info!("User {} logged out", user.username);
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let jar = flash::push(jar, Flash::info("You have been logged out."));
    (jar, Redirect::to("/login"))
}

// -- Helpers --

/// Argon2id with a random salt, as a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!("Unreadable password hash in store: {}", e);
            false
        }
    }
}

fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
