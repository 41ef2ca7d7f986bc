use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

const RICH_TAGS: &[&str] = &[
    "b", "i", "u", "strong", "em", "ul", "ol", "li", "p", "br", "span", "div",
];

const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "template", "noscript", "title",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6",
];

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("valid tag pattern"));

pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

pub fn sanitize_plain(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let mut out = String::new();
    render(fragment.root_element(), &mut out, Mode::Plain);
    out.trim().to_string()
}

/// Keeps the formatting whitelist with only `style` attributes; everything
/// else is unwrapped to its text.
pub fn sanitize_rich(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let mut out = String::new();
    render(fragment.root_element(), &mut out, Mode::Rich);
    out
}

pub fn to_plain_text(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let mut out = String::new();
    render(fragment.root_element(), &mut out, Mode::Text);

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes `<p>` openers (except those wrapping a list) and every `</p>`.
pub fn strip_paragraph_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("<p>") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 3..];
        if after.starts_with("<ul>") || after.starts_with("<ol>") {
            out.push_str("<p>");
        }
        rest = after;
    }
    out.push_str(rest);

    out.replace("</p>", "")
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    Rich,
    Text,
}

fn render(element: ElementRef<'_>, out: &mut String, mode: Mode) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => match mode {
                Mode::Rich => escape_into(text, out),
                Mode::Plain | Mode::Text => out.push_str(text),
            },
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if DROPPED_WITH_CONTENT.contains(&name) {
                    continue;
                }
                match mode {
                    Mode::Plain => render(child, out, mode),
                    Mode::Rich if RICH_TAGS.contains(&name) => {
                        out.push('<');
                        out.push_str(name);
                        if let Some(style) = child.value().attr("style") {
                            out.push_str(" style=\"");
                            escape_into(style, out);
                            out.push('"');
                        }
                        out.push('>');
                        if name != "br" {
                            render(child, out, mode);
                            out.push_str("</");
                            out.push_str(name);
                            out.push('>');
                        }
                    }
                    Mode::Rich => render(child, out, mode),
                    Mode::Text => {
                        let block = BLOCK_TAGS.contains(&name);
                        if block {
                            out.push('\n');
                        }
                        if name == "li" {
                            out.push_str("• ");
                        }
                        render(child, out, mode);
                        if block {
                            out.push('\n');
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
