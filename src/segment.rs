//! Tokenizing text into word groups.
//!
//! Tokens are word runs, single punctuation characters, and whitespace runs.
//! Concatenating the tokens of a text in order always gives the text back.

use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::sync::LazyLock;

use regex::Regex;

/// Class carried by every injected group element.
pub const GROUP_CLASS: &str = "flashread-group";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\s\w]|\s+").expect("token pattern is valid"));

/// A run of whole tokens highlighted as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordGroup {
    tokens: Vec<String>,
}

impl WordGroup {
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Raw text of the group, unescaped.
    pub fn text(&self) -> String {
        self.tokens.concat()
    }

    /// Escaped text, safe to embed as markup content.
    pub fn escaped(&self) -> String {
        self.tokens.iter().map(|t| escape_html(t)).collect()
    }

    pub fn to_markup(&self) -> String {
        format!(r#"<span class="{GROUP_CLASS}">{}</span>"#, self.escaped())
    }
}

pub fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Split `text` into groups of `group_size` tokens. The last group keeps
/// whatever is left over.
pub fn segment(text: &str, group_size: NonZeroUsize) -> Vec<WordGroup> {
    tokenize(text)
        .chunks(group_size.get())
        .map(|chunk| WordGroup {
            tokens: chunk.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}

pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

pub fn render_markup(groups: &[WordGroup]) -> String {
    groups.iter().map(WordGroup::to_markup).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn tokenizes_words_punctuation_and_spaces() {
        assert_eq!(tokenize("Hi, world!"), vec!["Hi", ",", " ", "world", "!"]);
    }

    #[test]
    fn whitespace_runs_stay_whole() {
        assert_eq!(tokenize("a \t\n b"), vec!["a", " \t\n ", "b"]);
    }

    #[test]
    fn tokenization_is_lossless() {
        let samples = [
            "",
            "plain",
            "  leading and trailing  ",
            "it's 3:45pm -- naïve café, 東京!",
            "<b>\"quoted\" & 'single'</b>",
            "tabs\tand\r\nnewlines\n\n",
            "emoji 🎉 mid-word",
        ];
        for s in samples {
            assert_eq!(tokenize(s).concat(), s, "lossless for {s:?}");
        }
    }

    #[test]
    fn groups_hold_group_size_tokens_and_last_absorbs_remainder() {
        let groups = segment("Hi, world!", size(2));
        let texts: Vec<String> = groups.iter().map(WordGroup::text).collect();
        assert_eq!(texts, vec!["Hi,", " world", "!"]);
        assert_eq!(groups[0].tokens(), ["Hi", ","]);
        assert_eq!(groups[2].len(), 1);
    }

    #[test]
    fn group_sizing_holds_for_many_sizes() {
        let text = "The quick brown fox, naturally, jumps over the lazy dog.";
        let total = tokenize(text).len();
        for n in 1..=8 {
            let groups = segment(text, size(n));
            let (last, rest) = groups.split_last().unwrap();
            assert!(rest.iter().all(|g| g.len() == n));
            assert!((1..=n).contains(&last.len()));
            assert_eq!(groups.iter().map(WordGroup::len).sum::<usize>(), total);
            assert_eq!(groups.iter().map(WordGroup::text).collect::<String>(), text);
        }
    }

    #[test]
    fn empty_text_has_no_groups() {
        assert!(segment("", size(3)).is_empty());
    }

    #[test]
    fn words_are_never_split() {
        let groups = segment("extraordinary", size(1));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text(), "extraordinary");
    }

    #[test]
    fn escapes_the_five_reserved_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
        assert!(matches!(escape_html("nothing here"), Cow::Borrowed(_)));
    }

    #[test]
    fn rendered_groups_never_leak_reserved_characters() {
        let text = r#"<script>alert("x")</script> & 'more'"#;
        let markup = render_markup(&segment(text, size(3)));
        let inner: String = markup
            .split(&format!(r#"<span class="{GROUP_CLASS}">"#))
            .map(|part| part.trim_end_matches("</span>"))
            .collect();
        assert!(!inner.contains(['<', '>', '"', '\'']));
        assert!(inner.contains("&lt;script&gt;"));
        assert_eq!(markup.matches("<span").count(), segment(text, size(3)).len());
    }
}
