use crate::config::ConfigError;
use crate::marketplace::MarketplaceError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Process-level failure surfaced by the server and CLI entry points.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),
}

impl AppError {
    /// Process exit status: 2 for bad configuration, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Marketplace(_) => 1,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Marketplace(err) => err.kind(),
            AppError::Config(_) => "config",
            AppError::Telemetry(_) => "telemetry",
            AppError::Io(_) | AppError::Server(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Marketplace(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::{BookingError, PartnerId, PartnerStatus};

    #[test]
    fn marketplace_errors_keep_their_status() {
        let err = AppError::from(MarketplaceError::from(BookingError::PartnerUnavailable {
            partner_id: PartnerId::from("ptn-x"),
            status: PartnerStatus::Suspended,
            deleted: false,
        }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn configuration_errors_exit_with_two() {
        let err = AppError::from(ConfigError::InvalidPort);
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
