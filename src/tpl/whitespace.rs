use std::sync::LazyLock;

use regex::Regex;

use crate::tpl::lexer::{Token, TokenKind};

/// Quote and last-character state of the whitespace collapse, carried from one
/// literal-text run to the next so a document trims as if it were one string.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripState {
    in_quote: Option<char>,
    last_char: Option<char>,
}

/// Collapses whitespace runs in literal text to at most one space.
///
/// Quoted text is copied verbatim. A collapsed space is dropped between `>` and
/// `<`, next to `=`, between a closing quote and `>`, and at the start or end
/// of the output.
pub fn strip_whitespace(s: &str, state: &mut StripState) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = false;

    for c in s.chars() {
        if let Some(q) = state.in_quote {
            out.push(c);
            if c == q {
                state.in_quote = None;
            }
            state.last_char = Some(c);
            continue;
        }

        if c == '"' || c == '\'' {
            if pending {
                if state.last_char != Some('=') {
                    out.push(' ');
                }
                pending = false;
            }
            state.in_quote = Some(c);
            out.push(c);
            state.last_char = Some(c);
            continue;
        }

        if c.is_whitespace() {
            pending = true;
            continue;
        }

        if pending {
            let keep = match state.last_char {
                None => false,
                Some('>') if c == '<' => false,
                Some('=') => false,
                Some('"' | '\'') if c == '>' => false,
                Some(_) => c != '=',
            };
            if keep {
                out.push(' ');
            }
            pending = false;
        }

        out.push(c);
        state.last_char = Some(c);
    }

    if pending && !matches!(state.last_char, None | Some('>' | '=')) {
        out.push(' ');
    }
    out
}

/// Applies `lstrip_blocks` and `trim_blocks` over adjacent token pairs.
///
/// `lstrip_blocks` removes trailing spaces and tabs from text right before a
/// `{%`; `trim_blocks` removes one newline from text right after a `%}`.
pub fn apply_block_trimming(tokens: &mut [Token], trim_blocks: bool, lstrip_blocks: bool) {
    if !trim_blocks && !lstrip_blocks {
        return;
    }
    for i in 1..tokens.len() {
        let (head, tail) = tokens.split_at_mut(i);
        let prev = &mut head[i - 1];
        let cur = &mut tail[0];

        if lstrip_blocks && prev.kind == TokenKind::Html && cur.is(TokenKind::Symbol, "{%") {
            let kept = prev.val.trim_end_matches(['\t', ' ']).len();
            prev.val.truncate(kept);
        }
        if trim_blocks && prev.is(TokenKind::Symbol, "%}") && cur.kind == TokenKind::Html {
            if cur.val.starts_with('\n') {
                cur.val.remove(0);
            }
        }
    }
}

static SPACELESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?U:(<.*>))([\t\n\v\f\r ]+)(?U:(<.*>))").expect("spaceless pattern is valid")
});

/// Removes whitespace found strictly between two tags, repeating until nothing
/// changes.
pub fn collapse_spaceless(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = SPACELESS.replace_all(&current, "${1}${3}");
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpl::lexer::lex;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn strip(s: &str) -> String {
        strip_whitespace(s, &mut StripState::default())
    }

    #[test]
    fn test_strip_whitespace_cases() {
        let cases = [
            ("<div>\n\t<span>  foo  </span>\n</div>", "<div><span> foo </span></div>"),
            (r#"<div class="  foo  bar  "></div>"#, r#"<div class="  foo  bar  "></div>"#),
            (
                "<div  class=\"  foo  \"  >\n\t\t<span> bar </span>\n\t</div>",
                r#"<div class="  foo  "><span> bar </span></div>"#,
            ),
            ("<div class='  foo  '>", "<div class='  foo  '>"),
            (r#"<div data-val=" ' foo ' ">"#, r#"<div data-val=" ' foo ' ">"#),
            (r#"<div class = "foo">"#, r#"<div class="foo">"#),
            ("<div>   </div>", "<div></div>"),
            ("   <div>", "<div>"),
            ("</div>   ", "</div>"),
        ];
        for (input, expected) in cases {
            assert_eq!(strip(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_strip_state_spans_runs() {
        // `<div class="{% if x %}  foo  {% endif %}">`
        let mut state = StripState::default();
        let parts = ["<div class=\"", "  foo  ", "\">"];
        let out: String = parts
            .iter()
            .map(|p| strip_whitespace(p, &mut state))
            .collect();
        assert_eq!(out, r#"<div class="  foo  ">"#);

        let mut state = StripState::default();
        let first = strip_whitespace("foo ", &mut state);
        let second = strip_whitespace(" baz", &mut state);
        assert_eq!(format!("{}bar{}", first, second), "foo bar baz");
    }

    #[test]
    fn test_spaceless() {
        assert_eq!(
            collapse_spaceless("<p>  \n  </p>  <span> text </span>"),
            "<p></p><span> text </span>"
        );
        assert_eq!(collapse_spaceless("<a>\n\n<b>\t<c>"), "<a><b><c>");
        assert_eq!(collapse_spaceless("no tags  here"), "no tags  here");
    }

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Html)
            .map(|t| t.val.clone())
            .collect()
    }

    #[test]
    fn test_block_trimming() {
        let src = "a  \t{% if x %}\nb\n  {% endif %}\n\nc";
        let mut tokens = lex(Arc::from("t"), src).unwrap();
        apply_block_trimming(&mut tokens, true, false);
        assert_eq!(texts(&tokens), vec!["a  \t", "b\n  ", "\nc"]);

        let mut tokens = lex(Arc::from("t"), src).unwrap();
        apply_block_trimming(&mut tokens, false, true);
        assert_eq!(texts(&tokens), vec!["a", "\nb\n", "\n\nc"]);
    }

    #[test]
    fn test_block_trimming_ignores_variables() {
        let mut tokens = lex(Arc::from("t"), "a  {{ x }}\nb").unwrap();
        apply_block_trimming(&mut tokens, true, true);
        assert_eq!(texts(&tokens), vec!["a  ", "\nb"]);
    }

    proptest! {
        #[test]
        fn test_strip_is_idempotent(s in "[a-c<>=\"' \t\n]{0,40}") {
            let once = strip(&s);
            prop_assert_eq!(strip(&once), once);
        }

        #[test]
        fn test_spaceless_reaches_fixed_point(s in "[a<>/ \n]{0,40}") {
            let once = collapse_spaceless(&s);
            prop_assert_eq!(collapse_spaceless(&once), once);
        }
    }
}
