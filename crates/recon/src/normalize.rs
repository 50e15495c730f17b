//! Text and code canonicalization.
//!
//! Every comparison the engine makes goes through these functions, so they
//! are total: absent or garbage input yields an empty key, never an error.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Length of a leaf NCM code.
pub const CODE_LEN: usize = 8;

/// Canonical form of free text: accents removed, whitespace collapsed,
/// upper-cased.
///
/// `"  Café   com leite "` → `"CAFE COM LEITE"`.
pub fn normalize_text(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let mut out = String::with_capacity(stripped.len());
    for word in stripped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_uppercase));
    }
    // Uppercasing can reintroduce decomposable sequences for a handful of
    // characters; a second pass keeps the function idempotent.
    if out.chars().any(|c| is_combining_mark(c)) {
        out = out.nfd().filter(|c| !is_combining_mark(*c)).collect();
    }
    out
}

/// Keep only ASCII digits. `"0101.21.00"` → `"01012100"`.
pub fn normalize_code(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Fit a digit string to [`CODE_LEN`]: right-pad with `'0'`, or keep the
/// first eight digits of a longer string.
///
/// Empty input stays empty. `"0101210099"` → `"01012100"`.
pub fn canonicalize_code(digits: &str) -> String {
    if digits.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(CODE_LEN);
    out.push_str(&digits[..digits.len().min(CODE_LEN)]);
    while out.len() < CODE_LEN {
        out.push('0');
    }
    out
}

/// `normalize_code` followed by `canonicalize_code`.
pub fn code_key(raw: &str) -> String {
    canonicalize_code(&normalize_code(raw))
}

/// The first `n` whitespace-separated tokens of an already normalized text.
pub fn leading_tokens(normalized: &str, n: usize) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_collapses_whitespace() {
        assert_eq!(normalize_text("  Café   com\tleite "), "CAFE COM LEITE");
        assert_eq!(normalize_text("Pão de Açúcar"), "PAO DE ACUCAR");
        assert_eq!(normalize_text("ÓLEO   DE soja"), "OLEO DE SOJA");
    }

    #[test]
    fn empty_text_stays_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   \n\t "), "");
    }

    #[test]
    fn code_digits_only() {
        assert_eq!(normalize_code("0101.21.00"), "01012100");
        assert_eq!(normalize_code("NCM: 8471-30"), "847130");
        assert_eq!(normalize_code("n/a"), "");
    }

    #[test]
    fn canonicalize_pads_right() {
        assert_eq!(canonicalize_code("847130"), "84713000");
        assert_eq!(canonicalize_code("01"), "01000000");
        assert_eq!(canonicalize_code("01012100"), "01012100");
        assert_eq!(canonicalize_code(""), "");
    }

    #[test]
    fn canonicalize_truncates_overlong() {
        assert_eq!(canonicalize_code("010121009"), "01012100");
        assert_eq!(code_key("0101.21.00.9"), "01012100");
        assert_eq!(code_key("8471.30.12 / 2024"), "84713012");
    }

    #[test]
    fn leading_tokens_takes_first_n() {
        assert_eq!(leading_tokens("CAVALO VIVO PURO SANGUE", 2), vec!["CAVALO", "VIVO"]);
        assert_eq!(leading_tokens("PARAFUSO", 2), vec!["PARAFUSO"]);
        assert!(leading_tokens("", 2).is_empty());
    }
}
