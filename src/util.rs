use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::OnceLock;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

// -------- text helpers --------

const IGNORED_ELEMENTS: [&str; 3] = ["script", "style", "template"];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+(?:['’]\w+)*|[^\w\s]").expect("static regex"))
}

/// Visible text of an HTML fragment. Markup and comments are dropped, entities decoded,
/// and every element boundary becomes a space.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut text);
    text
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for node in element.children() {
        match node.value() {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(e) if IGNORED_ELEMENTS.contains(&e.name()) => out.push(' '),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(node) {
                    out.push(' ');
                    collect_text(child, out);
                    out.push(' ');
                }
            }
            _ => (),
        }
    }
}

/// Word and punctuation tokens of the visible text.
pub fn tokenize(html: &str) -> Vec<String> {
    let text = strip_html(html);
    token_re().find_iter(&text).map(|m| m.as_str().to_string()).collect()
}

/// Number of tokens (words and punctuation marks) in the visible text.
pub fn count_words(html: &str) -> usize {
    let text = strip_html(html);
    token_re().find_iter(&text).count()
}

/// Similarity in [0, 1] of two texts after sorting their lowercase tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&sorted_tokens(a), &sorted_tokens(b))
}

/// Lowercase word tokens, sorted and space-joined.
pub(crate) fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| t.to_lowercase())
        .collect();
    tokens.sort();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_punctuation_outside_markup() {
        assert_eq!(count_words("<p>Hello, world!</p><!-- hidden words -->"), 4);
        assert_eq!(tokenize("<b>it's</b> fine"), vec!["it's", "fine"]);
    }

    #[test]
    fn markup_is_parsed_not_pattern_matched() {
        assert_eq!(tokenize("caf&eacute; it&#8217;s <i>ok</i>"), vec!["café", "it’s", "ok"]);
        assert_eq!(count_words("<p>a &lt;b&gt; c</p><script>var x = 1;</script>"), 5);
        assert_eq!(strip_html("1 &lt; 2").trim(), "1 < 2");
        assert_eq!(tokenize("<p>one</p><p>two</p>"), vec!["one", "two"]);
    }

    #[test]
    fn token_order_does_not_matter() {
        assert!((token_sort_ratio("solar panel mount", "mount solar panel") - 1.0).abs() < 1e-12);
        assert!(token_sort_ratio("solar panel", "wind turbine") < 0.5);
    }
}
