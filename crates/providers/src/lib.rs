//! Text generation backends for craftbot.
//!
//! All backends implement the `craftbot_core::TextGenerator` trait.
//! The router builds the configured one.

pub mod gemini;
pub mod openai_compat;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;

use craftbot_core::GeneratorError;

/// Map a non-success HTTP status to a generator error.
pub(crate) fn status_error(status: u16, body: String) -> GeneratorError {
    match status {
        429 => GeneratorError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => GeneratorError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => GeneratorError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(429, String::new()),
            GeneratorError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error(403, String::new()),
            GeneratorError::AuthenticationFailed(_)
        ));
        match status_error(500, "boom".into()) {
            GeneratorError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
