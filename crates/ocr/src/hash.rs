use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of an uploaded image. Used only to correlate log
/// events belonging to one scan; nothing is stored under it.
pub fn image_digest(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_receipt_text() {
        assert_eq!(
            image_digest(b"Coffee Shop $4.50"),
            "8abc06593bddbdd52cef6ef1bd1bf60af3cfed6d148bddd40cabd61b4d2bd64b"
        );
    }

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let d = image_digest(&[0xff, 0xd8, 0xff, 0xe0]);
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn different_uploads_get_different_digests() {
        let a = image_digest(b"\x89PNG receipt one");
        let b = image_digest(b"\x89PNG receipt two");
        assert_ne!(a, b);
        assert_eq!(a, image_digest(b"\x89PNG receipt one"));
    }
}
