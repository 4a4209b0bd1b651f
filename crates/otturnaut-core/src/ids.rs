use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Number of random bytes backing a generated id. 9 bytes base64-encodes to
/// 12 URL-safe characters, comfortably over the 6-byte entropy floor required
/// for these ids to be safely unguessable.
const ID_BYTES: usize = 9;

/// Generate an opaque, URL-safe, collision-resistant identifier.
///
/// Used for `deployment_id` and as a source of entropy for
/// scratch-directory prefixes.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_url_safe_and_nonempty() {
        for _ in 0..50 {
            let id = generate_id();
            assert!(!id.is_empty());
            assert!(id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn ids_are_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }
}
