// src/formatter/tables.rs
//! Pipe-delimited text blocks → aligned Markdown tables.
//!
//! A block is a run of at least two consecutive lines that each split into two
//! or more `|` cells. The rendered table gets a header separator after its
//! first row and is wrapped in a code block, since Discord has no native table
//! rendering.

const MIN_COLUMN_WIDTH: usize = 3;
const FENCE: &str = "```";

pub fn format_tables(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let start = i;
        while i < lines.len() && parse_row(lines[i]).is_some() {
            i += 1;
        }
        if i - start >= 2 {
            out.push(render_block(&lines[start..i]));
            continue;
        }
        // not a table: emit untouched (covers a single pipe line too)
        let end = if i == start { i + 1 } else { i };
        out.extend(lines[start..end].iter().map(|l| l.to_string()));
        i = end;
    }

    out.join("\n")
}

fn parse_row(line: &str) -> Option<Vec<String>> {
    let t = line.trim();
    if !t.contains('|') {
        return None;
    }
    let t = t.strip_prefix('|').unwrap_or(t);
    let t = t.strip_suffix('|').unwrap_or(t);
    let cells: Vec<String> = t.split('|').map(|c| c.trim().to_string()).collect();
    if cells.len() < 2 {
        return None;
    }
    Some(cells)
}

fn is_separator(cells: &[String]) -> bool {
    cells.iter().all(|c| {
        let c = c.trim_matches(':');
        !c.is_empty() && c.chars().all(|ch| ch == '-')
    })
}

fn render_block(lines: &[&str]) -> String {
    let rows: Vec<Vec<String>> = lines
        .iter()
        .filter_map(|l| parse_row(l))
        .filter(|cells| !is_separator(cells))
        .collect();
    if rows.is_empty() {
        return lines.join("\n");
    }

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![MIN_COLUMN_WIDTH; columns];
    for row in &rows {
        for (c, cell) in row.iter().enumerate() {
            widths[c] = widths[c].max(cell.chars().count());
        }
    }

    let mut rendered = Vec::with_capacity(rows.len() + 3);
    rendered.push(FENCE.to_string());
    for (r, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..columns)
            .map(|c| {
                let cell = row.get(c).map(String::as_str).unwrap_or("");
                let pad = widths[c] - cell.chars().count();
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        rendered.push(format!("| {} |", cells.join(" | ")));
        if r == 0 {
            let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            rendered.push(format!("| {} |", dashes.join(" | ")));
        }
    }
    rendered.push(FENCE.to_string());
    rendered.join("\n")
}
