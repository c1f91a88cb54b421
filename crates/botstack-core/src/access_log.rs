//! Gateway access log contract
//!
//! One JSON object per request with a fixed set of nine fields. The stage
//! writes it for every request whatever the status, so consumers can rely
//! on every key being present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLogField {
    RequestId,
    Ip,
    RequestTime,
    HttpMethod,
    RouteKey,
    Status,
    Protocol,
    ResponseLength,
    UserAgent,
}

impl AccessLogField {
    /// Every field, in record order
    pub const ALL: [AccessLogField; 9] = [
        AccessLogField::RequestId,
        AccessLogField::Ip,
        AccessLogField::RequestTime,
        AccessLogField::HttpMethod,
        AccessLogField::RouteKey,
        AccessLogField::Status,
        AccessLogField::Protocol,
        AccessLogField::ResponseLength,
        AccessLogField::UserAgent,
    ];

    /// Key in the emitted record
    pub fn name(&self) -> &'static str {
        match self {
            AccessLogField::RequestId => "requestId",
            AccessLogField::Ip => "ip",
            AccessLogField::RequestTime => "requestTime",
            AccessLogField::HttpMethod => "httpMethod",
            AccessLogField::RouteKey => "routeKey",
            AccessLogField::Status => "status",
            AccessLogField::Protocol => "protocol",
            AccessLogField::ResponseLength => "responseLength",
            AccessLogField::UserAgent => "userAgent",
        }
    }

    /// Gateway context variable that fills the field
    pub fn context_variable(&self) -> &'static str {
        match self {
            AccessLogField::RequestId => "$context.requestId",
            AccessLogField::Ip => "$context.identity.sourceIp",
            AccessLogField::RequestTime => "$context.requestTime",
            AccessLogField::HttpMethod => "$context.httpMethod",
            AccessLogField::RouteKey => "$context.routeKey",
            AccessLogField::Status => "$context.status",
            AccessLogField::Protocol => "$context.protocol",
            AccessLogField::ResponseLength => "$context.responseLength",
            AccessLogField::UserAgent => "$context.identity.userAgent",
        }
    }
}

/// Format string for the stage's access log settings.
///
/// Every value is quoted, so the record stays valid JSON even when the
/// gateway substitutes `-` for an unavailable variable.
pub fn access_log_format() -> String {
    let mut format = Map::new();
    for field in AccessLogField::ALL {
        format.insert(
            field.name().to_string(),
            Json::String(field.context_variable().to_string()),
        );
    }
    Json::Object(format).to_string()
}

/// One parsed access log record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogRecord {
    pub request_id: Option<String>,
    pub ip: Option<String>,
    pub request_time: Option<String>,
    pub http_method: Option<String>,
    pub route_key: Option<String>,
    pub status: Option<String>,
    pub protocol: Option<String>,
    pub response_length: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessLogRecord {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD_NAMES: [&str; 9] = [
        "requestId",
        "ip",
        "requestTime",
        "httpMethod",
        "routeKey",
        "status",
        "protocol",
        "responseLength",
        "userAgent",
    ];

    #[test]
    fn test_format_has_exactly_nine_fields() {
        let format: Json = serde_json::from_str(&access_log_format()).unwrap();
        let obj = format.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys, FIELD_NAMES);
        assert_eq!(obj["ip"], "$context.identity.sourceIp");
    }

    #[test]
    fn test_server_error_record_keeps_all_fields() {
        // gateway output for a failed backend invocation
        let line = r#"{"requestId":"abc=","ip":"203.0.113.9","requestTime":"19/Oct/2026:10:00:00 +0000","httpMethod":"POST","routeKey":"ANY /","status":"500","protocol":"HTTP/1.1","responseLength":"35","userAgent":"Slackbot 1.0"}"#;
        let record = AccessLogRecord::parse(line).unwrap();
        assert_eq!(record.status_code(), Some(500));

        let json = record.to_json();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, FIELD_NAMES);
    }

    #[test]
    fn test_missing_values_serialize_as_null() {
        let record = AccessLogRecord {
            status: Some("502".into()),
            ..Default::default()
        };
        let json = record.to_json();
        assert_eq!(json.as_object().unwrap().len(), 9);
        assert!(json["userAgent"].is_null());
        assert_eq!(json["status"], "502");
    }
}
