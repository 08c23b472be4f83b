//! Reversible escaping of reserved glyphs.
//!
//! Field text may not contain the separator `#` or terminator `%`, and the
//! clients additionally reserve `$` and `&` as sub-field delimiters. Each is
//! replaced by a named token:
//!
//! | glyph | token       |
//! |-------|-------------|
//! | `#`   | `<num>`     |
//! | `%`   | `<percent>` |
//! | `$`   | `<dollar>`  |
//! | `&`   | `<and>`     |
//! | `<`   | `<lt>`      |
//!
//! A `<` is only rewritten to `<lt>` when the text following it would
//! otherwise be read back as one of the tokens. Ordinary text such as `<3`
//! passes through untouched, which keeps output readable by clients that
//! only know the first four tokens, while `unescape(escape(s)) == s` still
//! holds for every input.

/// Token table, longest-match is unnecessary because no token is a prefix
/// of another.
const TOKENS: [(char, &str); 5] = [
    ('#', "<num>"),
    ('%', "<percent>"),
    ('$', "<dollar>"),
    ('&', "<and>"),
    ('<', "<lt>"),
];

/// Token starting at the beginning of `s`, if any.
fn token_at(s: &str) -> Option<(char, &'static str)> {
    TOKENS.iter().copied().find(|(_, token)| s.starts_with(token))
}

/// Escape reserved glyphs in field text.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for (i, c) in input.char_indices() {
        match c {
            '#' => out.push_str("<num>"),
            '%' => out.push_str("<percent>"),
            '$' => out.push_str("<dollar>"),
            '&' => out.push_str("<and>"),
            '<' if token_at(&input[i..]).is_some() => out.push_str("<lt>"),
            _ => out.push(c),
        }
    }

    out
}

/// Reverse [`escape`].
///
/// Single left-to-right pass. Unknown `<...>` sequences are kept literally,
/// so text from clients that never escape `<` decodes to itself.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some((glyph, token)) = token_at(tail) {
            out.push(glyph);
            rest = &tail[token.len()..];
        } else {
            out.push('<');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_glyphs() {
        assert_eq!(escape("a#b%c$d&e"), "a<num>b<percent>c<dollar>d<and>e");
    }

    #[test]
    fn plain_angle_brackets_pass_through() {
        assert_eq!(escape("<3 & <b>"), "<3 <and> <b>");
        assert_eq!(unescape("<3 <and> <b>"), "<3 & <b>");
    }

    #[test]
    fn literal_tokens_survive_round_trip() {
        for text in ["<num>", "<lt>", "<<num>>", "<percent", "x<and>y", "<"] {
            assert_eq!(unescape(&escape(text)), text, "input {text:?}");
        }
    }

    #[test]
    fn literal_token_is_disambiguated() {
        assert_eq!(escape("<num>"), "<lt>num>");
        assert_eq!(unescape("<lt>num>"), "<num>");
    }

    #[test]
    fn unescape_decodes_client_text() {
        assert_eq!(unescape("Objection<num>1 100<percent>"), "Objection#1 100%");
    }

    #[test]
    fn multibyte_text_is_untouched() {
        let text = "🥔 ¿qué? 漢字";
        assert_eq!(escape(text), text);
        assert_eq!(unescape(text), text);
    }
}
