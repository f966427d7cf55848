pub mod ip;
pub mod slug;
pub mod time_parser;
pub mod url_validator;

pub use ip::extract_client_ip;
pub use slug::{is_valid_slug, slugify};
pub use time_parser::TimeParser;
pub use url_validator::{UrlValidationError, validate_url};

/// Characters used for short codes
pub const SHORT_CODE_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Longest short code the schema can hold
pub const MAX_SHORT_CODE_LENGTH: usize = 10;

pub fn generate_random_code(length: usize) -> String {
    use std::iter;

    iter::repeat_with(|| {
        SHORT_CODE_CHARSET[rand::random_range(0..SHORT_CODE_CHARSET.len())] as char
    })
    .take(length)
    .collect()
}

/// 短码合法性校验（长度 1..=10，仅字母数字）
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_SHORT_CODE_LENGTH
        && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_code_length_and_charset() {
        for len in [1, 6, 10] {
            let code = generate_random_code(len);
            assert_eq!(code.len(), len);
            assert!(code.bytes().all(|b| SHORT_CODE_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn test_generate_random_code_varies() {
        let codes: std::collections::HashSet<String> =
            (0..50).map(|_| generate_random_code(6)).collect();
        assert!(codes.len() > 40);
    }

    #[test]
    fn test_is_valid_short_code() {
        assert!(is_valid_short_code("aB3xY9"));
        assert!(!is_valid_short_code(""));
        assert!(!is_valid_short_code("abc-def"));
        assert!(!is_valid_short_code("abcdefghijk"));
        assert!(!is_valid_short_code("favicon.ico"));
    }
}
