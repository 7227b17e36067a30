//! Terminal rendering of transcript entries.
//!
//! Entry content is the display markup produced by the transcript: allowed
//! formatting tags, `<br>`, and the sources block with its links.
use console::style;
use lazy_static::lazy_static;
use regex::Regex;
use yiamas::markup::decode_entities;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"<(/?)([a-zA-Z0-9]+)([^>]*)>").unwrap();
    static ref HREF_RE: Regex = Regex::new(r#"href="([^"]*)""#).unwrap();
}

#[derive(Default)]
struct Styles {
    bold: usize,
    italic: usize,
    underline: usize,
}

enum List {
    Bullets,
    Numbered(usize),
}

/// Convert entry markup into styled terminal text
pub fn to_terminal(html: &str) -> String {
    let mut out = String::new();
    let mut styles = Styles::default();
    let mut lists: Vec<List> = Vec::new();
    let mut link: Option<(String, String)> = None;
    let mut last = 0;

    for caps in TOKEN_RE.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut out, &mut link, &styles, &html[last..whole.start()]);
        last = whole.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        match (name.as_str(), closing) {
            ("p", true) | ("li", true) => newline(&mut out),
            ("h4", true) => {
                styles.bold = styles.bold.saturating_sub(1);
                newline(&mut out);
            }
            ("br", _) => out.push('\n'),
            ("strong", false) | ("b", false) | ("h4", false) => styles.bold += 1,
            ("strong", true) | ("b", true) => styles.bold = styles.bold.saturating_sub(1),
            ("em", false) | ("i", false) => styles.italic += 1,
            ("em", true) | ("i", true) => styles.italic = styles.italic.saturating_sub(1),
            ("u", false) => styles.underline += 1,
            ("u", true) => styles.underline = styles.underline.saturating_sub(1),
            ("ul", false) => lists.push(List::Bullets),
            ("ol", false) => lists.push(List::Numbered(0)),
            ("ul", true) | ("ol", true) => {
                lists.pop();
            }
            ("li", false) => {
                newline(&mut out);
                out.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                match lists.last_mut() {
                    Some(List::Numbered(n)) => {
                        *n += 1;
                        out.push_str(&format!("{}. ", n));
                    }
                    _ => out.push_str("• "),
                }
            }
            ("div", false) => {
                newline(&mut out);
                out.push('\n');
            }
            ("a", false) => {
                let href = HREF_RE
                    .captures(&caps[3])
                    .map(|c| decode_entities(&c[1]))
                    .unwrap_or_default();
                link = Some((href, String::new()));
            }
            ("a", true) => {
                if let Some((href, label)) = link.take() {
                    out.push_str(&style(&label).underlined().to_string());
                    if label != href {
                        out.push_str(&style(format!(" ({})", href)).dim().to_string());
                    }
                }
            }
            _ => {}
        }
    }
    push_text(&mut out, &mut link, &styles, &html[last..]);

    out.trim_end().to_string()
}

fn push_text(out: &mut String, link: &mut Option<(String, String)>, styles: &Styles, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let text = decode_entities(raw);
    if let Some((_, label)) = link {
        label.push_str(&text);
        return;
    }

    let mut styled = style(text);
    if styles.bold > 0 {
        styled = styled.bold();
    }
    if styles.italic > 0 {
        styled = styled.italic();
    }
    if styles.underline > 0 {
        styled = styled.underlined();
    }
    out.push_str(&styled.to_string());
}

fn newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
