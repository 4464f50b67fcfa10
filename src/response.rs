use serde::Serialize;
use utoipa::ToSchema;

/// Pagination metadata carried alongside list payloads.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Uniform envelope for every endpoint: a human-readable message, the
/// payload, and optional pagination metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiResponse, Meta};

    #[test]
    fn envelope_omits_absent_meta() {
        let response = ApiResponse::success("OK", serde_json::json!({ "ok": true }), None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], "OK");
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn paged_meta_serializes_all_fields() {
        let json = serde_json::to_value(Meta::new(2, 20, 57)).unwrap();
        assert_eq!(json["page"], 2);
        assert_eq!(json["per_page"], 20);
        assert_eq!(json["total"], 57);
    }
}
