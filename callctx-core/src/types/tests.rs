#[cfg(test)]
mod tests {
    use crate::types::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_default_terminal_error() {
        let err = TerminalError::cancelled();
        assert_eq!(err.code, ErrorCode::Cancelled);
        assert_eq!(err.message, "Request cancelled by the client.");
        assert_eq!(err.source, "client");
        assert_eq!(TerminalError::default(), err);
    }

    #[test]
    fn test_deadline_message_contains_timestamp() {
        let deadline = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let err = TerminalError::deadline_exceeded(deadline);
        assert_eq!(err.code, ErrorCode::Cancelled);
        assert_eq!(
            err.message,
            "Request exceeded deadline 2024-05-01T12:30:00.000Z"
        );
    }

    #[test]
    fn test_cancel_reason_override_wins() {
        let merged = CancelReason::new()
            .message("shutdown")
            .source("server")
            .apply(TerminalError::cancelled());

        assert_eq!(merged.code, ErrorCode::Cancelled);
        assert_eq!(merged.message, "shutdown");
        assert_eq!(merged.source, "server");

        let merged = CancelReason::new()
            .code(ErrorCode::Unavailable)
            .apply(TerminalError::cancelled());
        assert_eq!(merged.code, ErrorCode::Unavailable);
        assert_eq!(merged.message, "Request cancelled by the client.");
    }

    #[test]
    fn test_terminal_error_display_and_serde() {
        let err = TerminalError::new(ErrorCode::DeadlineExceeded, "too slow", "server");
        assert_eq!(err.to_string(), "DEADLINE_EXCEEDED: too slow (source: server)");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "DEADLINE_EXCEEDED");
        assert_eq!(json["source"], "server");

        let reason: CancelReason = serde_json::from_str(r#"{"message":"bye"}"#).unwrap();
        assert_eq!(reason, CancelReason::new().message("bye"));
    }

    #[test]
    fn test_metadata_copies_are_independent() {
        let mut supplied: Metadata = [("user", "ryan")].into_iter().collect();
        let copy = supplied.clone();

        supplied.insert("user", "someone-else");
        supplied.insert("extra", "1");

        assert_eq!(copy.get("user"), Some("ryan"));
        assert!(!copy.contains_key("extra"));
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn test_context_error_wraps_scheduler_error() {
        let err: ContextError = SchedulerError::NoRuntime("no reactor".into()).into();
        assert_eq!(err.to_string(), "No timer driver: no reactor");
    }
}
