use once_cell::sync::Lazy;
use regex::Regex;

static TRIPLE_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$\$").unwrap());
static SPACED_DOLLAR_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s+\$").unwrap());
static DOUBLED_DISPLAY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\[\s*\\\[").unwrap());
static DOUBLED_DISPLAY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\]\s*\\\]").unwrap());
static MARKDOWN_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static EMPTY_DISPLAY_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$\s*\$\$").unwrap());
static EMPTY_BRACKET_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\[\s*\\\]|\\\(\s*\\\)").unwrap());

/// Canonicalize raw solver output before classification.
///
/// Trims, collapses doubled delimiters, strips markdown bold and drops empty
/// delimiter pairs. An empty result means there is nothing to render.
pub fn normalize_content(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let collapsed = TRIPLE_DOLLAR.replace_all(trimmed, "$$$$");
    let collapsed = SPACED_DOLLAR_PAIR.replace_all(&collapsed, "$$$$");
    let collapsed = DOUBLED_DISPLAY_OPEN.replace_all(&collapsed, r"\[");
    let collapsed = DOUBLED_DISPLAY_CLOSE.replace_all(&collapsed, r"\]");

    let unbolded = MARKDOWN_BOLD.replace_all(&collapsed, "${1}");

    let without_empty = EMPTY_DISPLAY_PAIR.replace_all(&unbolded, "");
    let without_empty = EMPTY_BRACKET_PAIR.replace_all(&without_empty, "");

    let result = without_empty.trim();
    if result == "$$" || result == "$" {
        return String::new();
    }
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::normalize_content;

    #[test]
    fn trims_and_handles_blank_input() {
        assert_eq!(normalize_content("  x + 1  "), "x + 1");
        assert_eq!(normalize_content("   "), "");
    }

    #[test]
    fn collapses_doubled_delimiters() {
        assert_eq!(normalize_content("$$$x^2$$$"), "$$x^2$$");
        assert_eq!(normalize_content(r"\[ \[ x \] \]"), r"\[ x \]");
    }

    #[test]
    fn spaced_dollar_pair_collapses_to_double() {
        assert_eq!(normalize_content("$a$ $b$"), "$a$$b$");
    }

    #[test]
    fn strips_markdown_bold() {
        assert_eq!(
            normalize_content("**Adım 1:** $x=2$ yazılır"),
            "Adım 1: $x=2$ yazılır"
        );
    }

    #[test]
    fn drops_empty_delimiter_pairs() {
        assert_eq!(normalize_content("Sonuç $$ $$ bulundu"), "Sonuç  bulundu");
        assert_eq!(normalize_content(r"\( \) değer"), "değer");
        assert_eq!(normalize_content("$ $"), "");
    }

    #[test]
    fn keeps_display_math() {
        assert_eq!(normalize_content("$$\\frac{1}{2}$$"), "$$\\frac{1}{2}$$");
    }
}
