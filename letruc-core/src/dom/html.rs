//! HTML Fragments
//!
//! A forgiving fragment parser and a serializer, enough for `innerHTML`
//! round trips. Unknown end tags are ignored and unclosed elements are
//! closed at the end of input, so parsing never fails.

use super::node::{Element, Node, NodeType};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Elements whose text is serialized without escaping.
fn is_raw_text(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Parse `html` into a list of detached nodes.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let root = Node::fragment();
    let mut stack: Vec<Node> = vec![root.clone()];
    let mut rest = html;

    while !rest.is_empty() {
        let Some(current) = stack.last().cloned() else {
            break;
        };

        if let Some(after) = rest.strip_prefix("<!--") {
            let (comment, tail) = after.split_once("-->").unwrap_or((after, ""));
            current.append_child(&Node::comment(comment));
            rest = tail;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = rest.split_once('>').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("</") {
            let (name, tail) = after.split_once('>').unwrap_or((after, ""));
            let name = name.trim().to_ascii_lowercase();
            if let Some(depth) = stack.iter().rposition(|n| tag_of(n).as_deref() == Some(&name)) {
                stack.truncate(depth.max(1));
            }
            rest = tail;
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (tag, attributes, self_closing, tail) = parse_start_tag(&rest[1..]);
            let element = Element::new(&tag);
            for (name, value) in attributes {
                element.set_attribute(&name, &value);
            }
            current.append_child(&element);
            rest = tail;

            if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                let (text, tail) = split_raw_text(rest, &tag);
                if !text.is_empty() {
                    let text = if is_raw_text(&tag) { text.to_string() } else { decode_entities(text) };
                    element.append_child(&Node::text(&text));
                }
                rest = tail;
            } else if !self_closing && !is_void(&tag) {
                stack.push(element.node().clone());
            }
        } else {
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let end = rest[first..].find('<').map_or(rest.len(), |i| i + first);
            current.append_child(&Node::text(&decode_entities(&rest[..end])));
            rest = &rest[end..];
        }
    }
    root.children().into_iter().inspect(Node::remove).collect()
}

fn tag_of(node: &Node) -> Option<String> {
    node.as_element().map(|e| e.tag_name().to_string())
}

/// Split off the content of a raw text element up to its end tag.
fn split_raw_text<'a>(input: &'a str, tag: &str) -> (&'a str, &'a str) {
    let closing = format!("</{tag}");
    let lower = input.to_ascii_lowercase();
    match lower.find(&closing) {
        Some(index) => {
            let after = &input[index..];
            let tail = after.split_once('>').map_or("", |(_, t)| t);
            (&input[..index], tail)
        }
        None => (input, ""),
    }
}

/// Parse the inside of a start tag, after `<`. Returns the lowercase tag,
/// the attributes, whether it ended in `/>`, and the remaining input.
fn parse_start_tag(input: &str) -> (String, Vec<(String, String)>, bool, &str) {
    let name_end = input
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(input.len());
    let tag = input[..name_end].to_ascii_lowercase();
    let mut rest = &input[name_end..];
    let mut attributes = Vec::new();
    let mut self_closing = false;

    loop {
        rest = rest.trim_start();
        if let Some(tail) = rest.strip_prefix("/>") {
            self_closing = true;
            rest = tail;
            break;
        }
        if let Some(tail) = rest.strip_prefix('>') {
            rest = tail;
            break;
        }
        if let Some(tail) = rest.strip_prefix('/') {
            rest = tail;
            continue;
        }
        if rest.is_empty() {
            break;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let value = if let Some(tail) = rest.strip_prefix('=') {
            let tail = tail.trim_start();
            match tail.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &tail[1..];
                    let (value, after) = body.split_once(quote).unwrap_or((body, ""));
                    rest = after;
                    decode_entities(value)
                }
                _ => {
                    let end = tail
                        .find(|c: char| c.is_whitespace() || c == '>')
                        .unwrap_or(tail.len());
                    rest = &tail[end..];
                    decode_entities(&tail[..end])
                }
            }
        } else {
            String::new()
        };
        if !name.is_empty() && !attributes.iter().any(|(n, _): &(String, String)| *n == name) {
            attributes.push((name, value));
        }
    }
    (tag, attributes, self_closing, rest)
}

/// Decode character references. Unknown references are kept verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "copy" => Some('\u{a9}'),
                "hellip" => Some('\u{2026}'),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

fn serialize_into(node: &Node, out: &mut String, raw_parent: bool) {
    match node.node_type() {
        NodeType::Text => {
            let data = node.data().unwrap_or_default();
            if raw_parent {
                out.push_str(&data);
            } else {
                out.push_str(&escape(&data, false));
            }
        }
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(&node.data().unwrap_or_default());
            out.push_str("-->");
        }
        NodeType::Element => {
            let Some(element) = node.as_element() else {
                return;
            };
            let tag = element.tag_name();
            out.push('<');
            out.push_str(tag);
            for (name, value) in element.attributes() {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                out.push_str(&escape(&value, true));
                out.push('"');
            }
            out.push('>');
            if is_void(tag) {
                return;
            }
            let raw = is_raw_text(tag);
            for child in node.children() {
                serialize_into(&child, out, raw);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        _ => {
            for child in node.children() {
                serialize_into(&child, out, false);
            }
        }
    }
}

impl Node {
    /// Serialized children.
    pub fn inner_html(&self) -> String {
        let raw = self.as_element().is_some_and(|e| is_raw_text(e.tag_name()));
        let mut out = String::new();
        for child in self.children() {
            serialize_into(&child, &mut out, raw);
        }
        out
    }

    /// Replace the children with the parsed fragment.
    pub fn set_inner_html(&self, html: &str) {
        self.replace_children(parse_fragment(html));
    }
}

impl Element {
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        serialize_into(self.node(), &mut out, false);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let div = Element::new("div");
        div.set_inner_html(r#"<p class="a b" data-x='1'>Hello <b>world</b></p><br><img src=x.png>"#);

        let children = div.child_elements();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].attribute("class").as_deref(), Some("a b"));
        assert_eq!(children[0].attribute("data-x").as_deref(), Some("1"));
        assert_eq!(children[0].text_content(), "Hello world");
        assert_eq!(children[2].attribute("src").as_deref(), Some("x.png"));
    }

    #[test]
    fn round_trips_markup() {
        let html = r#"<ul><li id="a">One &amp; two</li><!-- marker --><li>3 &lt; 4</li></ul>"#;
        let div = Element::new("div");
        div.set_inner_html(html);
        assert_eq!(div.inner_html(), html);
    }

    #[test]
    fn script_content_is_raw() {
        let div = Element::new("div");
        div.set_inner_html("<script>if (a < b && c) { run(); }</script><p>x</p>");
        let script = div.query_selector("script").unwrap().unwrap();
        assert_eq!(script.text_content(), "if (a < b && c) { run(); }");
        assert_eq!(div.child_elements().len(), 2);
        assert_eq!(
            div.inner_html(),
            "<script>if (a < b && c) { run(); }</script><p>x</p>"
        );
    }

    #[test]
    fn tolerates_broken_markup() {
        let div = Element::new("div");
        div.set_inner_html("<p>open <span>inner</p> tail </div> < 3");
        assert_eq!(div.text_content(), "open inner tail  < 3");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("&lt;a&gt; &#65;&#x42; &nbsp;"), "<a> AB \u{a0}");
        assert_eq!(decode_entities("fish & chips &unknown;"), "fish & chips &unknown;");
    }
}
