//! Google style doc strings

use super::{cleandoc, DocstringIR, DocstringItem, DocstringSection, SectionContent, SectionKind};

const INDENT: &str = "    ";

fn section_header(line: &str) -> Option<(SectionKind, String)> {
    if line.starts_with(' ') {
        return None;
    }
    let title = line.trim_end().strip_suffix(':')?;
    SectionKind::from_title(title).map(|kind| (kind, title.to_string()))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parse Google style text into the IR
pub fn parse(text: &str) -> DocstringIR {
    let text = cleandoc(text);
    let lines: Vec<&str> = text.lines().collect();
    let mut ir = DocstringIR::default();

    let mut i = 0;
    let mut summary: Vec<&str> = Vec::new();
    while i < lines.len() && !lines[i].trim().is_empty() && section_header(lines[i]).is_none() {
        summary.push(lines[i].trim());
        i += 1;
    }
    if !summary.is_empty() {
        ir.summary = Some(summary.join("\n"));
    }

    let mut extended: Vec<String> = Vec::new();
    while i < lines.len() {
        let line = lines[i];
        if let Some((kind, title)) = section_header(line) {
            i += 1;
            let start = i;
            while i < lines.len() && (lines[i].trim().is_empty() || indent_of(lines[i]) > 0) {
                i += 1;
            }
            let body = dedent(&lines[start..i]);
            let content = if kind.has_items() {
                SectionContent::Items(parse_items(&body))
            } else {
                SectionContent::Text(body.join("\n").trim().to_string())
            };
            let title = (title != kind.title()).then_some(title);
            ir.sections.push(DocstringSection {
                kind,
                title,
                content,
            });
        } else {
            extended.push(line.to_string());
            i += 1;
        }
    }

    let extended = extended.join("\n").trim().to_string();
    if !extended.is_empty() {
        ir.extended = Some(extended);
    }

    ir
}

fn dedent(lines: &[&str]) -> Vec<String> {
    let margin = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(margin..).unwrap_or("").trim_end().to_string())
        .collect()
}

fn parse_items(body: &[String]) -> Vec<DocstringItem> {
    let mut items: Vec<DocstringItem> = Vec::new();

    for line in body {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) > 0 {
            if let Some(last) = items.last_mut() {
                if !last.description.is_empty() {
                    last.description.push('\n');
                }
                last.description.push_str(line.trim());
                continue;
            }
        }
        items.push(parse_item_header(line.trim()));
    }

    items
}

fn parse_item_header(line: &str) -> DocstringItem {
    let mut depth = 0i32;
    let mut split_at = None;
    for (idx, ch) in line.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ':' if depth == 0 => {
                split_at = Some(idx);
                break;
            }
            _ => {}
        }
    }

    let (head, description) = match split_at {
        Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
        None => (line.trim(), ""),
    };

    let (name, annotation) = match (head.find('('), head.ends_with(')')) {
        (Some(open), true) => (
            head[..open].trim().to_string(),
            Some(head[open + 1..head.len() - 1].trim().to_string()),
        ),
        _ => (head.to_string(), None),
    };

    DocstringItem {
        name: Some(name),
        annotation,
        description: description.to_string(),
        default: None,
    }
}

/// Render the IR as Google style text
pub fn render(ir: &DocstringIR) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(summary) = ir.summary.as_deref().filter(|s| !s.is_empty()) {
        blocks.push(summary.to_string());
    }
    if let Some(extended) = ir.extended.as_deref().filter(|s| !s.is_empty()) {
        blocks.push(extended.to_string());
    }

    for section in &ir.sections {
        let title = section.title.as_deref().unwrap_or(section.kind.title());
        let mut out = format!("{}:", title);
        match &section.content {
            SectionContent::Text(text) => {
                for line in text.lines() {
                    out.push('\n');
                    if !line.is_empty() {
                        out.push_str(INDENT);
                        out.push_str(line);
                    }
                }
            }
            SectionContent::Items(items) => {
                for item in items {
                    out.push('\n');
                    out.push_str(INDENT);
                    out.push_str(item.name.as_deref().unwrap_or(""));
                    if let Some(annotation) = &item.annotation {
                        out.push_str(&format!(" ({})", annotation));
                    }
                    out.push(':');
                    let mut desc_lines = item.description.lines();
                    if let Some(first) = desc_lines.next() {
                        out.push(' ');
                        out.push_str(first);
                    }
                    for line in desc_lines {
                        out.push('\n');
                        out.push_str(INDENT);
                        out.push_str(INDENT);
                        out.push_str(line);
                    }
                }
            }
        }
        blocks.push(out);
    }

    blocks.join("\n\n")
}
