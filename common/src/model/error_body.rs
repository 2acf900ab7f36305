use serde::{Deserialize, Serialize};

/// JSON body returned for every rejected generation request.
///
/// `details` carries the underlying parser or engine message when one is
/// available and is omitted from the payload otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        // An empty message adds nothing for the caller.
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }
}
