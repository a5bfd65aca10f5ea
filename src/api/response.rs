use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Envelope
// ============================================================================
//
// Every response body has the shape
//   { "success": bool, "data"?: T, "error"?: string, "details"?: [string] }
//
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

impl ApiResponse<()> {
    /// Success without a payload, as returned by `DELETE /orders/:id`
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            details: None,
        }
    }

    pub fn error(message: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            details: (!details.is_empty()).then_some(details),
        }
    }
}

/// Pagination block of `GET /orders`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_omits_empty_fields() {
        let json = serde_json::to_value(ApiResponse::error("boom", vec![])).unwrap();

        assert_eq!(json, serde_json::json!({ "success": false, "error": "boom" }));
    }

    #[test]
    fn test_pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(1, 20, 41).pages, 3);
        assert_eq!(Pagination::new(1, 20, 0).pages, 0);
        assert_eq!(Pagination::new(2, 10, 20).pages, 2);
    }
}
