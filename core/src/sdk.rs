//! SDK identification headers attached to every request.

/// Service name used for trace headers and configuration lookup.
pub const SERVICE_NAME: &str = "discovery";

/// API version tag reported in trace headers.
pub const SERVICE_VERSION: &str = "V2";

pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const ANALYTICS_HEADER: &str = "X-IBMCloud-SDK-Analytics";

/// `User-Agent` value identifying this crate and the host platform.
pub fn user_agent() -> String {
    format!(
        "discovery-rs-{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Trace headers for one operation, in the order they are applied.
pub fn sdk_headers(service_name: &str, service_version: &str, operation_id: &str) -> Vec<(String, String)> {
    vec![
        (USER_AGENT_HEADER.to_string(), user_agent()),
        (
            ANALYTICS_HEADER.to_string(),
            format!(
                "service_name={service_name};service_version={service_version};operation_id={operation_id}"
            ),
        ),
    ]
}
