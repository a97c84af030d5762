use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resume permission required for this test")]
    ResumeRequired,

    #[error("Attempt {0} is already completed")]
    AttemptCompleted(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps an error response from the backend onto the error taxonomy.
    pub fn from_status(status: StatusCode, message: Option<String>, needs_resume: bool) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        match status {
            StatusCode::FORBIDDEN if needs_resume => Error::ResumeRequired,
            StatusCode::NOT_FOUND => {
                Error::NotFound(message.unwrap_or_else(|| "Resource not found".to_string()))
            }
            StatusCode::BAD_REQUEST => {
                Error::BadRequest(message.unwrap_or_else(|| "Bad request".to_string()))
            }
            StatusCode::SERVICE_UNAVAILABLE => Error::Unavailable(message.unwrap_or_else(|| {
                "Service temporarily unavailable. Please try again in a moment.".to_string()
            })),
            other => Error::Api {
                status: other.as_u16(),
                message: message.unwrap_or_default(),
            },
        }
    }

    /// Text shown to the candidate or creator for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Error::Timeout => {
                "Request timed out. Please check your internet connection and try again.".to_string()
            }
            Error::Network(_) => {
                "Network error. Please check your internet connection and try again.".to_string()
            }
            Error::Unavailable(msg) => msg.clone(),
            Error::NotFound(_) => "Resource not found.".to_string(),
            Error::ResumeRequired => "You previously closed the test window. The test creator needs to approve your request to start the test again. Please contact the test administrator.".to_string(),
            Error::AttemptCompleted(_) => "This test has already been submitted.".to_string(),
            Error::BadRequest(msg) | Error::InvalidInput(msg) => msg.clone(),
            Error::Validation(errors) => validation_message(errors),
            Error::Api { status, .. } if *status >= 500 => {
                "Server error. Please try again later.".to_string()
            }
            Error::Api { status, message } if *status >= 400 => {
                if message.is_empty() {
                    "Request failed. Please check your input and try again.".to_string()
                } else {
                    message.clone()
                }
            }
            _ => "An unexpected error occurred. Please try again.".to_string(),
        }
    }

    /// Errors that should send the candidate back to the dashboard after a delay.
    pub fn redirects(&self) -> bool {
        !matches!(
            self,
            Error::InvalidInput(_) | Error::Validation(_) | Error::ResumeRequired
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::Network(err.to_string())
        } else {
            Error::Reqwest(err)
        }
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .next()
        .unwrap_or_else(|| errors.to_string())
}
