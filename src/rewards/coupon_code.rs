use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

/// Fixed prefix carried by every coupon code
pub const CODE_PREFIX: &str = "CANTEEN";

/// Length of the randomized portion of a code
const RANDOM_LEN: usize = 6;

/// Generate a human-copyable coupon code.
///
/// Format: `CANTEEN-<6 random alphanumerics>-<base36 millisecond timestamp>`.
/// The random suffix makes codes hard to guess, the time-derived tail
/// disambiguates codes minted in the same instant; the coupon store's
/// unique constraint on `code` is the final word on uniqueness.
pub fn generate(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LEN)
        .map(char::from)
        .collect::<String>()
        .to_ascii_uppercase();

    format!("{}-{}-{}", CODE_PREFIX, suffix, base36(now.timestamp_millis()))
}

/// Render a non-negative integer in base 36 using digits then uppercase letters
fn base36(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value <= 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_base36_known_values() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "Z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(36 * 36 + 1), "101");
    }

    #[test]
    fn test_code_has_three_parts_with_fixed_prefix() {
        let now = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();
        let code = generate(now);
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], CODE_PREFIX);
        assert_eq!(parts[1].len(), RANDOM_LEN);
        assert_eq!(parts[2], base36(now.timestamp_millis()));
    }

    #[test]
    fn test_code_charset_is_human_copyable() {
        let now = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();
        let code = generate(now);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_codes_differ_across_timestamps() {
        let first = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();
        let second = first + chrono::Duration::milliseconds(1);
        // The time-derived tail alone guarantees these differ.
        assert_ne!(
            generate(first).rsplit('-').next(),
            generate(second).rsplit('-').next()
        );
    }
}
