use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Identifier the orchestrator assigns to an upload when it is submitted.
///
/// It stays the same across every retry of the upload, and is distinct from the
/// identifier the gateway hands out with a destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Generate a fresh identifier of the form `upload_<millis>_<suffix>`
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut rng = rand::thread_rng();
        let pick = Uniform::from(0..ID_ALPHABET.len());
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[pick.sample(&mut rng)] as char)
            .collect();
        UploadId(format!("upload_{}_{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UploadId {
    fn from(id: &str) -> Self {
        UploadId(id.to_string())
    }
}

impl From<String> for UploadId {
    fn from(id: String) -> Self {
        UploadId(id)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_id_format() {
        let id = UploadId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "upload");
        assert!(parts[1].parse::<u128>().is_ok());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<UploadId> = (0..1000).map(|_| UploadId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
