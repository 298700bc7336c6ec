use sha2::{Digest, Sha256};

/// Stable fingerprint of an error message: the first 16 hex chars of its SHA-256.
pub fn fingerprint(message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    let result = hasher.finalize();

    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("boom"), fingerprint("boom"));
        assert_eq!(fingerprint("boom").len(), 16);
        assert!(fingerprint("boom").chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_differs() {
        assert_ne!(fingerprint("boom"), fingerprint("boom!"));
    }

    #[test]
    fn test_fingerprint_known_value() {
        // sha256("") = e3b0c44298fc1c14...
        assert_eq!(fingerprint(""), "e3b0c44298fc1c14");
    }
}
