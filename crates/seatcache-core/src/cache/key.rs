use sha2::{Digest, Sha256};

/// Longest readable prefix kept in a key, so keys stay valid file names.
const MAX_PREFIX_LEN: usize = 100;

/// Hex digits of the content hash appended to every key.
const HASH_LEN: usize = 16;

/// Filesystem-safe key for `raw`.
///
/// The readable part replaces every character that is not ASCII
/// alphanumeric with `_`, which is lossy ("Room A" and "Room_A", or any two
/// Hangul names of equal length, look alike), so a hash of the raw text is
/// always appended to keep distinct inputs apart.
pub fn normalize_key(raw: &str) -> String {
    let readable: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_PREFIX_LEN)
        .collect();

    let digest = format!("{:x}", Sha256::digest(raw.as_bytes()));
    format!("{}_{}", readable, &digest[..HASH_LEN])
}

/// Cache key for a read: backend identity, range and the option fragment.
pub fn cache_key(identity: &str, range: &str, options: &str) -> String {
    normalize_key(&format!("{}|{}|{}", identity, range, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_filesystem_safe() {
        let key = cache_key("https://proxy.example/exec?id=1", "Sheet1!A:H", "all");
        assert!(key.starts_with("https___proxy_example_exec_id_1_Sheet1_A_H_all_"));
        assert_eq!(key.len(), "https___proxy_example_exec_id_1_Sheet1_A_H_all_".len() + HASH_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_cache_key_is_stable() {
        assert_eq!(
            cache_key("sheet", "A:H", "room=Main"),
            cache_key("sheet", "A:H", "room=Main")
        );
        assert_ne!(cache_key("sheet", "A:H", "room=Main"), cache_key("sheet", "A:H", "all"));
    }

    #[test]
    fn test_lookalike_inputs_get_distinct_keys() {
        assert_ne!(
            cache_key("sheet", "시트1!A:H", "all"),
            cache_key("sheet", "명단1!A:H", "all")
        );
        assert_ne!(
            cache_key("sheet", "Sheet1!A:H", "room=Room A"),
            cache_key("sheet", "Sheet1!A:H", "room=Room_A")
        );
    }

    #[test]
    fn test_long_keys_are_shortened() {
        let long = "x".repeat(500);
        let key = cache_key(&long, "A:H", "all");
        assert_eq!(key.len(), MAX_PREFIX_LEN + 1 + HASH_LEN);
        assert_ne!(key, cache_key(&long, "A:G", "all"));
        assert_eq!(key, cache_key(&long, "A:H", "all"));
    }
}
