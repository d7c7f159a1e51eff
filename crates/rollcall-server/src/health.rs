//! `/health` endpoint.

use std::time::Instant;

use rollcall_core::ClassId;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Whether an attendance session is open.
    pub session_active: bool,
    /// Class of the open session, if any.
    pub active_class_id: Option<ClassId>,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    active_class_id: Option<ClassId>,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        session_active: active_class_id.is_some(),
        active_class_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0, None);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
        assert!(!resp.session_active);
    }

    #[test]
    fn reports_active_class() {
        let resp = health_check(Instant::now(), 3, Some(ClassId::from_raw("cls_1")));
        assert!(resp.session_active);
        assert_eq!(resp.connections, 3);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["activeClassId"], "cls_1");
        assert_eq!(json["sessionActive"], true);
        assert!(json["uptimeSecs"].is_number());
    }

    #[test]
    fn idle_serializes_null_class() {
        let json = serde_json::to_value(health_check(Instant::now(), 0, None)).unwrap();
        assert!(json["activeClassId"].is_null());
    }
}
