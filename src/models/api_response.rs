use serde::{Deserialize, Serialize};

/// `{ok, data}` envelope; `warning` is present only on partial settlement.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data,
            warning: None,
        }
    }

    pub fn with_warning(data: T, warning: Option<String>) -> Self {
        Self {
            ok: true,
            data,
            warning,
        }
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub ok: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: &str, error: String) -> Self {
        Self {
            ok: false,
            error,
            code: code.to_string(),
        }
    }
}
