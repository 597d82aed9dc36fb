use axum::body::Bytes;
use axum::extract::FromRequest;
use serde::de::DeserializeOwned;
use vowbook_core::CoreError;

use crate::error::AppError;

/// `Json` whose rejections render as our error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Decode a body that may be left out entirely. An empty body yields the
/// default value; anything else must be valid JSON.
pub fn optional_json<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| CoreError::Validation(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Reason {
        reason: Option<String>,
    }

    #[test]
    fn test_empty_body_is_default() {
        assert_eq!(optional_json::<Reason>(&Bytes::new()).unwrap(), Reason::default());
        assert_eq!(optional_json::<Reason>(&Bytes::from_static(b" \n")).unwrap(), Reason::default());
    }

    #[test]
    fn test_present_body_must_be_json() {
        let parsed: Reason = optional_json(&Bytes::from_static(br#"{"reason":"moved"}"#)).unwrap();
        assert_eq!(parsed.reason.as_deref(), Some("moved"));
        assert!(matches!(
            optional_json::<Reason>(&Bytes::from_static(b"{oops")),
            Err(AppError::Core(CoreError::Validation(_)))
        ));
    }
}
