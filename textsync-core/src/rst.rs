//! A small reStructuredText to HTML renderer.
//!
//! Produces the body fragment (`<div class="document">...</div>`) for the
//! subset of markup used by resume-style documents: section titles, paragraphs,
//! bullet and enumerated lists, literal blocks, block quotes, transitions,
//! images, and the common inline roles. Comments and unknown directives are
//! dropped.

use std::sync::OnceLock;

use regex::Regex;

const ADORNMENT: &str = "=-~^\"'`#*+_:.<>";

static LITERAL: OnceLock<Regex> = OnceLock::new();
static LINK: OnceLock<Regex> = OnceLock::new();
static STRONG: OnceLock<Regex> = OnceLock::new();
static EMPHASIS: OnceLock<Regex> = OnceLock::new();
static CITE: OnceLock<Regex> = OnceLock::new();
static ENUMERATOR: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern is valid"))
}

/// Render `source` as an HTML body fragment.
pub fn to_html_body(source: &str) -> String {
    let text = source.replace("\r\n", "\n").replace('\t', "        ");
    let lines: Vec<&str> = text.lines().collect();
    let mut renderer = Renderer::default();
    let body = renderer.blocks(&lines);
    format!("<div class=\"document\">\n{body}</div>\n")
}

#[derive(Default)]
struct Renderer {
    /// Heading styles in the order they were first seen; position is the level.
    styles: Vec<(char, bool)>,
}

impl Renderer {
    fn blocks(&mut self, lines: &[&str]) -> String {
        let mut out = String::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                i += 1;
                continue;
            }

            if let Some(ch) = adornment(line) {
                // Overlined title.
                if i + 2 < lines.len()
                    && !lines[i + 1].trim().is_empty()
                    && adornment(lines[i + 2]) == Some(ch)
                {
                    out.push_str(&self.heading(lines[i + 1].trim(), ch, true));
                    i += 3;
                    continue;
                }
                if line.trim().chars().count() >= 4 {
                    out.push_str("<hr class=\"docutils\" />\n");
                    i += 1;
                    continue;
                }
            }

            if indent(line) == 0 && i + 1 < lines.len() {
                if let Some(ch) = adornment(lines[i + 1]) {
                    if lines[i + 1].chars().count() >= line.trim().chars().count() {
                        out.push_str(&self.heading(line.trim(), ch, false));
                        i += 2;
                        continue;
                    }
                }
            }

            if indent(line) > 0 {
                let end = indented_end(lines, i, 1);
                let inner = dedent(&lines[i..end]);
                let refs: Vec<&str> = inner.iter().map(String::as_str).collect();
                out.push_str("<blockquote>\n");
                out.push_str(&self.blocks(&refs));
                out.push_str("</blockquote>\n");
                i = end;
                continue;
            }

            if line == ".." || line.starts_with(".. ") {
                let end = indented_end(lines, i + 1, 1);
                if let Some(target) = line.strip_prefix(".. image::") {
                    let target = escape(target.trim());
                    out.push_str(&format!("<img alt=\"{target}\" src=\"{target}\" />\n"));
                }
                i = end;
                continue;
            }

            if bullet_width(line).is_some() {
                let (html, end) = self.list(lines, i, "ul", "simple", bullet_width);
                out.push_str(&html);
                i = end;
                continue;
            }

            if enumerator_width(line).is_some() {
                let (html, end) = self.list(lines, i, "ol", "arabic simple", enumerator_width);
                out.push_str(&html);
                i = end;
                continue;
            }

            let mut end = i;
            while end < lines.len() && !lines[end].trim().is_empty() {
                end += 1;
            }
            let paragraph = lines[i..end]
                .iter()
                .map(|l| l.trim())
                .collect::<Vec<_>>()
                .join("\n");
            i = end;

            match paragraph.strip_suffix("::") {
                Some(lead) => {
                    let lead = lead.trim_end();
                    if !lead.is_empty() {
                        out.push_str(&format!("<p>{}:</p>\n", inline(lead)));
                    }
                    while i < lines.len() && lines[i].trim().is_empty() {
                        i += 1;
                    }
                    if i < lines.len() && indent(lines[i]) > 0 {
                        let end = indented_end(lines, i, 1);
                        let literal = dedent(&lines[i..end]).join("\n");
                        out.push_str(&format!(
                            "<pre class=\"literal-block\">\n{}\n</pre>\n",
                            escape(&literal)
                        ));
                        i = end;
                    }
                }
                None => out.push_str(&format!("<p>{}</p>\n", inline(&paragraph))),
            }
        }

        out
    }

    fn heading(&mut self, title: &str, ch: char, overline: bool) -> String {
        let style = (ch, overline);
        let level = match self.styles.iter().position(|s| *s == style) {
            Some(pos) => pos + 1,
            None => {
                self.styles.push(style);
                self.styles.len()
            }
        }
        .min(6);
        format!(
            "<h{level} id=\"{}\">{}</h{level}>\n",
            slug(title),
            inline(title)
        )
    }

    fn list(
        &mut self,
        lines: &[&str],
        start: usize,
        tag: &str,
        class: &str,
        marker: fn(&str) -> Option<usize>,
    ) -> (String, usize) {
        let mut out = format!("<{tag} class=\"{class}\">\n");
        let mut i = start;

        while i < lines.len() {
            let Some(width) = marker(lines[i]) else {
                break;
            };
            let end = indented_end(lines, i + 1, width);
            let mut body = vec![lines[i][width..].to_string()];
            body.extend(dedent_by(&lines[i + 1..end], width));

            if body.len() == 1 {
                out.push_str(&format!("<li>{}</li>\n", inline(body[0].trim())));
            } else {
                let refs: Vec<&str> = body.iter().map(String::as_str).collect();
                out.push_str(&format!("<li>{}</li>\n", self.blocks(&refs)));
            }

            i = end;
            // Items may be separated by blank lines.
            let mut next = i;
            while next < lines.len() && lines[next].trim().is_empty() {
                next += 1;
            }
            if next < lines.len() && marker(lines[next]).is_some() && indent(lines[next]) == 0 {
                i = next;
            } else {
                break;
            }
        }

        out.push_str(&format!("</{tag}>\n"));
        (out, i)
    }
}

/// The adornment character if `line` is a section underline or transition.
fn adornment(line: &str) -> Option<char> {
    let trimmed = line.trim_end();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if !ADORNMENT.contains(first) || trimmed.chars().count() < 2 {
        return None;
    }
    chars.all(|c| c == first).then_some(first)
}

fn bullet_width(line: &str) -> Option<usize> {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some('-' | '*' | '+'), Some(' ')) => Some(2),
        _ => None,
    }
}

fn enumerator_width(line: &str) -> Option<usize> {
    regex(&ENUMERATOR, r"^(?:\d+|#)[.)] ")
        .find(line)
        .map(|m| m.end())
}

/// Leading indentation in bytes. Only ASCII space and tab indent, so the
/// result is always a char boundary.
fn indent(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// End (exclusive) of the block starting at `start` whose lines are blank or
/// indented at least `min`. Trailing blank lines are not included.
fn indented_end(lines: &[&str], start: usize, min: usize) -> usize {
    let mut end = start;
    let mut last = start;
    while end < lines.len() {
        let line = lines[end];
        if line.trim().is_empty() {
            end += 1;
            continue;
        }
        if indent(line) < min {
            break;
        }
        end += 1;
        last = end;
    }
    last
}

fn dedent(lines: &[&str]) -> Vec<String> {
    let min = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent(l))
        .min()
        .unwrap_or(0);
    dedent_by(lines, min)
}

fn dedent_by(lines: &[&str], width: usize) -> Vec<String> {
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l[width.min(indent(l))..].to_string()
            }
        })
        .collect()
}

fn slug(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn inline(text: &str) -> String {
    let literal = regex(&LITERAL, r"(?s)``(.+?)``");
    let mut out = String::new();
    let mut last = 0;

    for caps in literal.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&roles(&escape(&text[last..whole.start()])));
        out.push_str(&format!(
            "<span class=\"docutils literal\">{}</span>",
            escape(inner.as_str())
        ));
        last = whole.end();
    }
    out.push_str(&roles(&escape(&text[last..])));
    out
}

fn roles(escaped: &str) -> String {
    let link = regex(&LINK, r"(?s)`([^`]+?)\s+&lt;([^`]+?)&gt;`__?");
    let strong = regex(&STRONG, r"(?s)\*\*(.+?)\*\*");
    let emphasis = regex(&EMPHASIS, r"(?s)\*([^*]+?)\*");
    let cite = regex(&CITE, r"`([^`]+?)`");

    let text = link.replace_all(
        escaped,
        "<a class=\"reference external\" href=\"$2\">$1</a>",
    );
    let text = strong.replace_all(&text, "<strong>$1</strong>");
    let text = emphasis.replace_all(&text, "<em>$1</em>");
    cite.replace_all(&text, "<cite>$1</cite>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_titles_by_first_seen_style() {
        let html = to_html_body("Resume\n======\n\nWork\n----\n\nMore\n====\n");
        assert!(html.contains("<h1 id=\"resume\">Resume</h1>"));
        assert!(html.contains("<h2 id=\"work\">Work</h2>"));
        assert!(html.contains("<h1 id=\"more\">More</h1>"));
    }

    #[test]
    fn overline_is_a_distinct_style() {
        let html = to_html_body("=====\nTitle\n=====\n\nSub\n===\n");
        assert!(html.contains("<h1 id=\"title\">Title</h1>"));
        assert!(html.contains("<h2 id=\"sub\">Sub</h2>"));
    }

    #[test]
    fn renders_bullet_list() {
        let html = to_html_body("- one\n- two **bold**\n");
        assert!(html.contains("<ul class=\"simple\">"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<li>two <strong>bold</strong></li>"));
    }

    #[test]
    fn renders_enumerated_list() {
        let html = to_html_body("1. first\n2. second\n");
        assert!(html.contains("<ol class=\"arabic simple\">"));
        assert!(html.contains("<li>second</li>"));
    }

    #[test]
    fn renders_literal_block_and_escapes() {
        let html = to_html_body("Example::\n\n    <b>raw</b>\n\nAfter.\n");
        assert!(html.contains("<p>Example:</p>"));
        assert!(html.contains("<pre class=\"literal-block\">\n&lt;b&gt;raw&lt;/b&gt;\n</pre>"));
        assert!(html.contains("<p>After.</p>"));
    }

    #[test]
    fn renders_inline_roles() {
        let html = to_html_body("See `site <https://example.com>`_ and ``a*b*c``.\n");
        assert!(html.contains("<a class=\"reference external\" href=\"https://example.com\">site</a>"));
        assert!(html.contains("<span class=\"docutils literal\">a*b*c</span>"));
    }

    #[test]
    fn drops_comments_and_renders_images() {
        let html = to_html_body(".. a comment\n   spanning lines\n\n.. image:: me.png\n\nText\n");
        assert!(!html.contains("comment"));
        assert!(html.contains("<img alt=\"me.png\" src=\"me.png\" />"));
        assert!(html.contains("<p>Text</p>"));
    }

    #[test]
    fn renders_transition_and_blockquote() {
        let html = to_html_body("Para\n\n----\n\n    quoted\n");
        assert!(html.contains("<hr class=\"docutils\" />"));
        assert!(html.contains("<blockquote>\n<p>quoted</p>\n</blockquote>"));
    }

    #[test]
    fn wide_space_does_not_continue_a_list_item() {
        let html = to_html_body("- item\n\u{3000}continued\n");
        assert!(html.contains("<li>item</li>"));
        assert!(html.contains("continued"));
    }

    #[test]
    fn blockquote_mixing_ascii_and_wide_spaces_is_dedented() {
        let html = to_html_body(" \u{3000}quoted\n  more\n");
        assert!(html.contains("<blockquote>"));
        assert!(html.contains("quoted"));
        assert!(html.contains("more"));
        assert!(!html.contains('\u{3000}'));
    }

    #[test]
    fn no_break_space_line_is_plain_text() {
        let html = to_html_body("\u{a0}\u{a0}indented\n");
        assert!(!html.contains("<blockquote>"));
        assert!(html.contains("indented"));
    }
}
