use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("rejected: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("remote url cannot take a path: {0}")]
    InvalidRemote(String),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
}

impl ApiError {
    /// Map a non-success response onto the error the naming server meant.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => ApiError::Validation(body),
            StatusCode::CONFLICT => ApiError::Conflict(body),
            StatusCode::NOT_FOUND => ApiError::NotFound(body),
            StatusCode::FORBIDDEN => ApiError::Forbidden(body),
            _ => ApiError::HttpStatus(status, body),
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, "x".into()),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "x".into()),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "x".into()),
            ApiError::HttpStatus(StatusCode::BAD_GATEWAY, _)
        ));
    }
}
