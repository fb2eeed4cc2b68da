/// Tags that break the flow of text; both the opening and closing form emit a
/// newline so paragraphs survive tag stripping.
const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "li", "ul", "ol", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
];

/// Containers whose character data is never user-visible text.
const SKIP_TAGS: [&str; 2] = ["script", "style"];

/// Converts a rich-text (HTML) description into plain text.
///
/// Feed descriptions arrive as HTML fragments of wildly varying quality, so
/// this walks the input by hand instead of parsing a DOM: tags are dropped,
/// block-level tags become newlines, script/style bodies are skipped and the
/// common entities are decoded. Whitespace is collapsed at the end, keeping
/// at most one blank line between paragraphs.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            // Unterminated tag: everything after `<` is markup debris.
            rest = "";
            break;
        };
        let tag = &after[..gt];
        let name = tag_name(tag);
        rest = &after[gt + 1..];

        if BLOCK_TAGS.contains(&name) || name == "br" {
            text.push('\n');
        }
        if SKIP_TAGS.contains(&name) && !tag.ends_with('/') {
            let closing = format!("</{name}");
            match find_ascii_ci(rest, &closing) {
                Some(pos) => {
                    let tail = &rest[pos..];
                    rest = match tail.find('>') {
                        Some(end) => &tail[end + 1..],
                        None => "",
                    };
                }
                None => {
                    rest = "";
                }
            }
        }
    }
    text.push_str(rest);

    collapse_whitespace(&decode_entities(&text))
}

fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
}

/// Case-insensitive search for an ASCII needle; returns a byte offset.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let n = needle.as_bytes();
    if n.is_empty() || haystack.len() < n.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(n.len())
        .position(|w| w.eq_ignore_ascii_case(n))
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        // An entity ends at `;` within a short window; anything else is a bare `&`.
        let semi = tail.as_bytes().iter().take(10).position(|&b| b == b';');
        let decoded = semi.and_then(|semi| {
            let decoded = decode_entity(&tail[1..semi]);
            decoded.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Collapse whitespace runs: a run containing newlines becomes at most one
/// blank line, anything else a single space. Leading/trailing runs vanish.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run_has_ws = false;
    let mut run_newlines = 0usize;
    for c in s.chars() {
        if c.is_whitespace() {
            run_has_ws = true;
            if c == '\n' {
                run_newlines += 1;
            }
            continue;
        }
        if run_has_ws && !out.is_empty() {
            if run_newlines > 0 {
                out.push('\n');
                if run_newlines > 1 {
                    out.push('\n');
                }
            } else {
                out.push(' ');
            }
        }
        run_has_ws = false;
        run_newlines = 0;
        out.push(c);
    }
    out
}
