//! Error classification shared by the outbound provider clients.

use reqwest::StatusCode;

use crate::ports::GatewayError;

/// Maps a non-success HTTP status to a gateway error.
pub(crate) fn status_error(status: StatusCode, external_id: &str, body: &str) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        GatewayError::NotFound(external_id.to_string())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::Transient(format!("{}: {}", status, truncate(body)))
    } else {
        GatewayError::Permanent(format!("{}: {}", status, truncate(body)))
    }
}

/// Maps a transport failure to a gateway error.
pub(crate) fn send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(0)
    } else {
        GatewayError::Transient(err.to_string())
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
