use axum::{
    Json,
    extract::rejection::{FormRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::error;

use pinboard_types::api::ErrorResponse;
use pinboard_types::models::Flash;

use crate::flash;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Template(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user.
    pub fn public_message(&self) -> String {
        match self {
            Self::Template(_) | Self::Internal(_) => "Internal server error.".to_string(),
            other => other.to_string(),
        }
    }

    /// Form-post flavour: user-correctable failures become a danger flash plus
    /// a redirect to `to`. Not-found and server errors keep their status.
    pub fn into_flash_redirect(self, jar: CookieJar, to: &str) -> Response {
        match self {
            Self::Validation(_) | Self::Unauthorized(_) | Self::Conflict(_) | Self::PayloadTooLarge(_) => {
                let jar = flash::push(jar, Flash::danger(self.to_string()));
                (jar, Redirect::to(to)).into_response()
            }
            other => other.into_response(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if pinboard_db::is_unique_violation(&err) {
            return Self::Conflict("That change conflicts with a concurrent request.".to_string());
        }
        Self::Internal(err)
    }
}

// -- Extractor rejections --

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }

        (
            status,
            Json(ErrorResponse {
                ok: false,
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
