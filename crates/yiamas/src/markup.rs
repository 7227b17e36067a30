//! Reply body sanitization.
//!
//! Model output is untrusted. Everything is escaped except a small set of
//! formatting tags, which pass through with their attributes removed. Any
//! other markup, scripts and links included, is shown as literal text.
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_RE: Regex =
        Regex::new(r"^<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)(?:\s[^<>]*)?/?>").unwrap();
    static ref ENTITY_RE: Regex =
        Regex::new(r"^&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]+);").unwrap();
}

/// Formatting tags allowed through the sanitizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Paragraph,
    Strong,
    Bold,
    Underline,
    Emphasis,
    Italic,
    UnorderedList,
    OrderedList,
    ListItem,
}

impl Tag {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "p" => Some(Tag::Paragraph),
            "strong" => Some(Tag::Strong),
            "b" => Some(Tag::Bold),
            "u" => Some(Tag::Underline),
            "em" => Some(Tag::Emphasis),
            "i" => Some(Tag::Italic),
            "ul" => Some(Tag::UnorderedList),
            "ol" => Some(Tag::OrderedList),
            "li" => Some(Tag::ListItem),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tag::Paragraph => "p",
            Tag::Strong => "strong",
            Tag::Bold => "b",
            Tag::Underline => "u",
            Tag::Emphasis => "em",
            Tag::Italic => "i",
            Tag::UnorderedList => "ul",
            Tag::OrderedList => "ol",
            Tag::ListItem => "li",
        }
    }
}

/// A piece of sanitized markup. Text is stored unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Open(Tag),
    Close(Tag),
    LineBreak,
}

/// Split a body into balanced segments.
///
/// Allowed tags become `Open`/`Close`, `<br>` becomes `LineBreak`, entities are
/// decoded and everything else stays text. Stray closing tags are dropped and
/// tags left open are closed at the end.
pub fn parse(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open: Vec<Tag> = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(pos) = rest.find(['<', '&']) {
        text.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with('<') {
            if let Some(caps) = TAG_RE.captures(rest) {
                let matched = caps[0].len();
                let closing = !caps[1].is_empty();
                let name = caps[2].to_ascii_lowercase();

                if name == "br" {
                    flush_text(&mut text, &mut segments);
                    segments.push(Segment::LineBreak);
                    rest = &rest[matched..];
                    continue;
                }

                if let Some(tag) = Tag::from_name(&name) {
                    flush_text(&mut text, &mut segments);
                    if closing {
                        close_tag(tag, &mut open, &mut segments);
                    } else {
                        open.push(tag);
                        segments.push(Segment::Open(tag));
                    }
                    rest = &rest[matched..];
                    continue;
                }
            }
            text.push('<');
            rest = &rest[1..];
        } else if let Some((decoded, len)) = take_entity(rest) {
            text.push(decoded);
            rest = &rest[len..];
        } else {
            text.push('&');
            rest = &rest[1..];
        }
    }

    text.push_str(rest);
    flush_text(&mut text, &mut segments);
    while let Some(tag) = open.pop() {
        segments.push(Segment::Close(tag));
    }
    segments
}

fn flush_text(text: &mut String, segments: &mut Vec<Segment>) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text)));
    }
}

fn close_tag(tag: Tag, open: &mut Vec<Tag>, segments: &mut Vec<Segment>) {
    if !open.contains(&tag) {
        return;
    }
    while let Some(top) = open.pop() {
        segments.push(Segment::Close(top));
        if top == tag {
            break;
        }
    }
}

/// The character a leading reference decodes to, and the reference's length
fn take_entity(rest: &str) -> Option<(char, usize)> {
    let caps = ENTITY_RE.captures(rest)?;
    decode_entity(&caps[1]).map(|decoded| (decoded, caps[0].len()))
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(printable);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32).map(printable);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Control characters other than newline and tab become U+FFFD
fn printable(c: char) -> char {
    if c.is_control() && c != '\n' && c != '\t' {
        char::REPLACEMENT_CHARACTER
    } else {
        c
    }
}

/// Decode the character references in a piece of text. Unknown references
/// are kept as written.
pub fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        decoded.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match take_entity(rest) {
            Some((c, len)) => {
                decoded.push(c);
                rest = &rest[len..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn render_html(segments: &[Segment]) -> String {
    let mut html = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => html.push_str(&escape_html(text)),
            Segment::Open(tag) => {
                html.push('<');
                html.push_str(tag.name());
                html.push('>');
            }
            Segment::Close(tag) => {
                html.push_str("</");
                html.push_str(tag.name());
                html.push('>');
            }
            Segment::LineBreak => html.push_str("<br>"),
        }
    }
    html
}

/// Sanitize a markup body for display
pub fn sanitize(input: &str) -> String {
    render_html(&parse(input))
}

/// Escape a plain-text body, keeping its line breaks
pub fn plain_text_to_html(text: &str) -> String {
    text.split('\n')
        .map(|line| escape_html(line.trim_end_matches('\r')))
        .collect::<Vec<_>>()
        .join("<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_tags_pass_through() {
        let body = "<p><strong>Greek Islands</strong></p><p>Get the <b>saganaki</b>!<br/>Opa!</p>";
        assert_eq!(
            sanitize(body),
            "<p><strong>Greek Islands</strong></p><p>Get the <b>saganaki</b>!<br>Opa!</p>"
        );
    }

    #[test]
    fn test_attributes_are_stripped() {
        assert_eq!(
            sanitize("<p style=\"color:red\" onclick=\"steal()\">Hi</p>"),
            "<p>Hi</p>"
        );
    }

    #[test]
    fn test_disallowed_markup_is_escaped() {
        assert_eq!(
            sanitize("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
        assert_eq!(
            sanitize("<a href=\"javascript:evil()\">menu</a>"),
            "&lt;a href=&quot;javascript:evil()&quot;&gt;menu&lt;/a&gt;"
        );
        assert_eq!(
            sanitize("<img src=x onerror=alert(1)>"),
            "&lt;img src=x onerror=alert(1)&gt;"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(sanitize("Price ($ - $$$$) & 3 < 4"), "Price ($ - $$$$) &amp; 3 &lt; 4");
    }

    #[test]
    fn test_entities_are_decoded_once() {
        let segments = parse("Tom &amp; Jerry&#39;s &#x263A; &bogus;");
        assert_eq!(
            segments,
            vec![Segment::Text("Tom & Jerry's \u{263A} &bogus;".to_string())]
        );
        assert_eq!(sanitize("Tom &amp; Jerry"), "Tom &amp; Jerry");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(
            decode_entities("Let&#39;s eat &amp; drink &unknown; & dance"),
            "Let's eat & drink &unknown; & dance"
        );
        assert_eq!(decode_entities(&escape_html("<b>\"Opa\"</b>")), "<b>\"Opa\"</b>");
    }

    #[test]
    fn test_control_references_are_replaced() {
        assert_eq!(
            decode_entities("a&#0;b&#x1B;c&#X7f;d&#10;e&#9;f"),
            "a\u{FFFD}b\u{FFFD}c\u{FFFD}d\ne\tf"
        );
        assert_eq!(decode_entities("&#x85;"), "\u{FFFD}");
    }

    #[test]
    fn test_tags_are_balanced() {
        assert_eq!(sanitize("<p><strong>Cash only</p>"), "<p><strong>Cash only</strong></p>");
        assert_eq!(sanitize("</u>stray<em>open"), "stray<em>open</em>");
    }

    #[test]
    fn test_tag_names_are_case_insensitive() {
        assert_eq!(
            parse("<STRONG>Opa</Strong>"),
            vec![
                Segment::Open(Tag::Strong),
                Segment::Text("Opa".to_string()),
                Segment::Close(Tag::Strong),
            ]
        );
    }

    #[test]
    fn test_plain_text_to_html() {
        assert_eq!(
            plain_text_to_html("Opa!\r\n<b>not bold</b>"),
            "Opa!<br>&lt;b&gt;not bold&lt;/b&gt;"
        );
    }
}
