use gasline_core::error::AppError;

/// Maps a Chromium navigation failure (`net::ERR_*`) onto a short code.
pub fn classify_navigation_error(message: &str) -> &'static str {
    if message.contains("ERR_NAME_NOT_RESOLVED") || message.contains("ERR_NAME_RESOLUTION_FAILED")
    {
        "DNS_FAILED"
    } else if message.contains("ERR_CONNECTION_REFUSED") {
        "CONNECTION_REFUSED"
    } else if message.contains("ERR_CONNECTION_RESET") || message.contains("ERR_CONNECTION_CLOSED")
    {
        "CONNECTION_RESET"
    } else if message.contains("ERR_CONNECTION_TIMED_OUT") || message.contains("ERR_TIMED_OUT") {
        "TIMEOUT"
    } else if message.contains("ERR_CERT") || message.contains("SSL") {
        "SSL_ERROR"
    } else if message.contains("ERR_INTERNET_DISCONNECTED") {
        "OFFLINE"
    } else {
        "NETWORK_ERROR"
    }
}

pub fn navigation_error(url: &str, message: impl std::fmt::Display) -> AppError {
    let message = message.to_string();
    AppError::NavigationError {
        code: classify_navigation_error(&message).to_string(),
        message: format!("{url}: {message}"),
    }
}
