use serde::{Serialize, Deserialize, Serializer};
use std::fmt;

/// Wraps free text written by customers and vendors (notes, messages) so it
/// never shows up in `Debug` output of logged events. Serialization is
/// transparent.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_masked() {
        let note = Masked("allergic to peanuts".to_string());
        assert_eq!(format!("{:?}", note), "********");
        assert_eq!(note.to_string(), "********");
        assert_eq!(serde_json::to_string(&note).unwrap(), "\"allergic to peanuts\"");
    }
}
