//! Accent and case folding.
//!
//! "Café Molido", "CAFE molido" and "cafe molido" all fold to the same key.
//! Product names are stored next to their folded form so searches can run as a
//! plain `LIKE` in the database. Case-insensitive equality uses a separate
//! lowercased copy that keeps accents: "Óptica" and "óptica" are the same
//! store, "Optica" is not.

use sea_orm::sea_query::LikeExpr;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Decomposes, strips combining marks, recomposes, lowercases and trims.
#[must_use]
pub fn fold(input: &str) -> String {
    let stripped: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped.nfc().collect::<String>().to_lowercase().trim().to_string()
}

/// Folds an optional search term, treating blank input as no filter.
#[must_use]
pub fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(fold).filter(|term| !term.is_empty())
}

/// Builds an escaped `%term%` pattern so `%` and `_` in user input match literally.
#[must_use]
pub fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

/// Trimmed Unicode lowercase, stored in the `*_lower` columns and compared with `=`.
///
/// `SQLite`'s `LOWER()` and `NOCASE` only fold ASCII letters, so the key is
/// computed here instead of in SQL.
#[must_use]
pub fn lower(input: &str) -> String {
    input.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("Café Molido"), "cafe molido");
        assert_eq!(fold("CAFÉ"), "cafe");
        assert_eq!(fold("  Ñandú  "), "nandu");
        assert_eq!(fold("Crème brûlée"), "creme brulee");
    }

    #[test]
    fn test_fold_handles_decomposed_input() {
        // "e" followed by U+0301 COMBINING ACUTE ACCENT
        assert_eq!(fold("cafe\u{301}"), "cafe");
    }

    #[test]
    fn test_lower_folds_non_ascii_case_only() {
        assert_eq!(lower("  ÓPTICA "), "óptica");
        assert_eq!(lower("AÑO NUEVO"), "año nuevo");
        assert_ne!(lower("Óptica"), lower("Optica"));
    }

    #[test]
    fn test_search_term_ignores_blank() {
        assert_eq!(search_term(None), None);
        assert_eq!(search_term(Some("   ")), None);
        assert_eq!(search_term(Some(" Café ")), Some("cafe".to_string()));
    }
}
