use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\(.*?\)").expect("image regex"));
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]\(.*?\)").expect("link regex"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").expect("italic regex"));
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#+ ").expect("heading regex"));

/// Reduces markdown to printable plain text.
///
/// Lossy and order-sensitive: images become `[Image]`, links disappear
/// together with their text, bold is unwrapped before italic, heading
/// markers are dropped and `- ` list markers become bullets. Each rule is
/// one regex pass over the output of the previous one.
pub fn strip_markdown(text: &str) -> String {
    let text = IMAGE.replace_all(text, "[Image]");
    let text = LINK.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "${1}");
    let text = ITALIC.replace_all(&text, "${1}");
    let text = HEADING.replace_all(&text, "");
    text.replace("- ", "• ")
}

#[cfg(test)]
mod tests {
    use super::strip_markdown;

    #[test]
    fn strips_emphasis_and_images() {
        assert_eq!(
            strip_markdown("**bold** and *italic* with ![x](y)"),
            "bold and italic with [Image]"
        );
    }

    #[test]
    fn drops_links_including_text() {
        assert_eq!(strip_markdown("see [docs](https://x.io) now"), "see  now");
    }

    #[test]
    fn data_uri_images_collapse_to_placeholder() {
        let text = "before\n![image](data:image/png;base64,iVBORw0KGgo=)\nafter";
        assert_eq!(strip_markdown(text), "before\n[Image]\nafter");
    }

    #[test]
    fn headings_and_list_markers() {
        let text = "# Standup\n## Done\n- fixed build\n- wrote docs";
        assert_eq!(
            strip_markdown(text),
            "Standup\nDone\n• fixed build\n• wrote docs"
        );
    }

    #[test]
    fn bold_is_unwrapped_before_italic() {
        assert_eq!(strip_markdown("***both***"), "both");
        assert_eq!(strip_markdown("a * b * c"), "a  b  c");
    }

    #[test]
    fn patterns_do_not_span_lines() {
        assert_eq!(strip_markdown("*open\nclose*"), "*open\nclose*");
    }
}
