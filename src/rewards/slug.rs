// Slug normalization for menu items
//
// Orders, the loyalty ledger and reward rules join on this string key.
// There is no enforced referential integrity between them, so both sides
// of the join must normalize the same way; a slug with no matching rule
// simply means "no reward logic for this item", never an error.

/// Normalize a raw slug or display name into canonical slug form.
///
/// Lowercases ASCII alphanumerics and collapses every run of other
/// characters into a single hyphen. Deterministic and idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Resolve the slug for an order line item.
///
/// An explicit slug wins; the display name is the fallback. Both go
/// through [`normalize`] so that order lines and rule definitions agree
/// on the key. Returns `None` when neither field yields a usable slug.
pub fn resolve(slug: Option<&str>, name: Option<&str>) -> Option<String> {
    slug.map(normalize)
        .filter(|s| !s.is_empty())
        .or_else(|| name.map(normalize).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_hyphenates() {
        assert_eq!(normalize("Veg Burger"), "veg-burger");
        assert_eq!(normalize("Masala   Dosa"), "masala-dosa");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("Idli (2 pc)"), "idli-2-pc");
        assert_eq!(normalize("  Samosa!  "), "samosa");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("Paneer Tikka Roll");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_normalize_empty_and_symbol_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_resolve_prefers_explicit_slug() {
        assert_eq!(
            resolve(Some("veg-burger"), Some("Something Else")),
            Some("veg-burger".to_string())
        );
    }

    #[test]
    fn test_resolve_falls_back_to_name() {
        assert_eq!(resolve(None, Some("Veg Burger")), Some("veg-burger".to_string()));
        assert_eq!(resolve(Some(""), Some("Veg Burger")), Some("veg-burger".to_string()));
    }

    #[test]
    fn test_resolve_none_when_nothing_usable() {
        assert_eq!(resolve(None, None), None);
        assert_eq!(resolve(Some("  "), Some("!!!")), None);
    }
}
