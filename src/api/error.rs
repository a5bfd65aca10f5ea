use actix_web::http::StatusCode;
use actix_web::{error::JsonPayloadError, HttpRequest, HttpResponse, ResponseError};

use crate::domain::order::OrderError;
use super::response::ApiResponse;

// ============================================================================
// HTTP Error Mapping
// ============================================================================

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation { .. }
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidState(_)
            | OrderError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) | OrderError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Transaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            OrderError::Validation { message, details } => {
                ApiResponse::error(message.clone(), details.clone())
            }
            // Store details stay in the log
            OrderError::Transaction(_) => {
                ApiResponse::error("Order could not be saved, please try again", vec![])
            }
            other => ApiResponse::error(other.to_string(), vec![]),
        };
        body.respond(self.status_code())
    }
}

/// Turn malformed or mistyped JSON bodies into the 400 envelope
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    let response = ApiResponse::error("Invalid request body", vec![err.to_string()])
        .respond(StatusCode::BAD_REQUEST);
    actix_web::error::InternalError::from_response(err, response).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use actix_web::body::to_bytes;
    use uuid::Uuid;

    async fn body_of(err: OrderError) -> (StatusCode, serde_json::Value) {
        let response = err.error_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn test_validation_error_carries_details() {
        let err = OrderError::from_problems(vec!["a".into(), "b".into()]).unwrap();

        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Validation failed with 2 errors");
        assert_eq!(body["details"], serde_json::json!(["a", "b"]));
    }

    #[actix_web::test]
    async fn test_status_codes() {
        let (status, _) = body_of(OrderError::NotFound(Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = body_of(OrderError::InvalidState(
            "Only pending orders can be deleted".into(),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only pending orders can be deleted");
    }

    #[actix_web::test]
    async fn test_store_failure_is_not_leaked() {
        let err = OrderError::Transaction(StoreError::Corrupt("orders row 7 unreadable".into()));

        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("row 7"));
    }
}
