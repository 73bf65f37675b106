//! TOON text serialization.
//!
//! The pipeline reduces every response to a flat list of [`Block`]s which
//! this module renders to text. Consecutive scalar blocks are joined by
//! single newlines; any boundary that involves a table gets a blank line.
//! Given the same blocks the output is byte-identical.

/// One renderable section of output.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A run of `key: value` lines.
    Scalars(Vec<(String, String)>),
    Table(TableBlock),
    Vertical(VerticalBlock),
}

/// A pipe-separated table: `# name [annotations]`, a header line, then one
/// line per row. Cells arrive pre-formatted; quoting happens at emit time.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub name: String,
    pub annotations: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Wide-table vertical rendering: one labeled block per row.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalBlock {
    pub name: String,
    pub annotations: Vec<String>,
    /// `(row label, [(column, value)])`
    pub entries: Vec<(String, Vec<(String, String)>)>,
}

/// Render blocks to the final text.
pub fn render(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_scalars = false;
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            if prev_scalars && matches!(block, Block::Scalars(_)) {
                out.push('\n');
            } else {
                out.push_str("\n\n");
            }
        }
        match block {
            Block::Scalars(pairs) => {
                render_scalars(pairs, &mut out);
                prev_scalars = true;
            }
            Block::Table(table) => {
                render_table(table, &mut out);
                prev_scalars = false;
            }
            Block::Vertical(vertical) => {
                render_vertical(vertical, &mut out);
                prev_scalars = false;
            }
        }
    }
    out
}

fn render_scalars(pairs: &[(String, String)], out: &mut String) {
    let mut first = true;
    for (key, value) in pairs {
        if !first {
            out.push('\n');
        }
        first = false;
        out.push_str(key);
        out.push(':');
        let quoted = quote_cell(value);
        if !quoted.is_empty() {
            out.push(' ');
            out.push_str(&quoted);
        }
    }
}

fn render_table(table: &TableBlock, out: &mut String) {
    render_header(&table.name, &table.annotations, out);
    out.push('\n');
    out.push_str(&table.columns.join("|"));
    for row in &table.rows {
        out.push('\n');
        let cells: Vec<String> = row.iter().map(|c| quote_cell(c)).collect();
        out.push_str(&cells.join("|"));
    }
}

fn render_vertical(vertical: &VerticalBlock, out: &mut String) {
    render_header(&vertical.name, &vertical.annotations, out);
    for (label, pairs) in &vertical.entries {
        out.push('\n');
        out.push_str(&quote_cell(label));
        out.push(':');
        for (column, value) in pairs {
            out.push_str("\n  ");
            out.push_str(column);
            out.push(':');
            let quoted = quote_cell(value);
            if !quoted.is_empty() {
                out.push(' ');
                out.push_str(&quoted);
            }
        }
    }
}

fn render_header(name: &str, annotations: &[String], out: &mut String) {
    out.push_str("# ");
    out.push_str(name);
    if !annotations.is_empty() {
        out.push_str(" [");
        out.push_str(&annotations.join(", "));
        out.push(']');
    }
}

/// Strings stay unquoted unless they would break the table geometry:
/// a pipe, a newline, or leading/trailing whitespace forces JSON quoting.
pub fn quote_cell(value: &str) -> String {
    if value.contains('|') || value.contains('\n') || value != value.trim() {
        serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_block() {
        let blocks = vec![Block::Scalars(vec![
            ("kind".into(), "PodList".into()),
            ("apiVersion".into(), "v1".into()),
            ("resourceVersion".into(), "".into()),
        ])];
        assert_eq!(render(&blocks), "kind: PodList\napiVersion: v1\nresourceVersion:");
    }

    #[test]
    fn test_consecutive_scalar_blocks_single_newline() {
        let blocks = vec![
            Block::Scalars(vec![("a".into(), "1".into())]),
            Block::Scalars(vec![("b".into(), "2".into())]),
        ];
        assert_eq!(render(&blocks), "a: 1\nb: 2");
    }

    #[test]
    fn test_table_block_layout() {
        let blocks = vec![Block::Table(TableBlock {
            name: "pods".into(),
            annotations: vec!["namespace=default".into(), "all-zero: [restarts]".into()],
            columns: vec!["metadata.name".into(), "status.phase".into()],
            rows: vec![
                vec!["web-1".into(), "Running".into()],
                vec!["web-2".into(), "Pending".into()],
            ],
        })];
        assert_eq!(
            render(&blocks),
            "# pods [namespace=default, all-zero: [restarts]]\n\
             metadata.name|status.phase\n\
             web-1|Running\n\
             web-2|Pending"
        );
    }

    #[test]
    fn test_section_boundary_blank_line() {
        let blocks = vec![
            Block::Scalars(vec![("kind".into(), "PodList".into())]),
            Block::Table(TableBlock {
                name: "items".into(),
                annotations: vec![],
                columns: vec!["a".into(), "b".into()],
                rows: vec![vec!["1".into(), "2".into()]],
            }),
        ];
        assert_eq!(render(&blocks), "kind: PodList\n\n# items\na|b\n1|2");
    }

    #[test]
    fn test_cell_quoting() {
        assert_eq!(quote_cell("plain"), "plain");
        assert_eq!(quote_cell(""), "");
        assert_eq!(quote_cell("a|b"), "\"a|b\"");
        assert_eq!(quote_cell("two\nlines"), "\"two\\nlines\"");
        assert_eq!(quote_cell(" padded "), "\" padded \"");
        assert_eq!(quote_cell("(1,2,3)"), "(1,2,3)");
    }

    #[test]
    fn test_vertical_block() {
        let blocks = vec![Block::Vertical(VerticalBlock {
            name: "nodes".into(),
            annotations: vec![],
            entries: vec![
                (
                    "node-1".into(),
                    vec![("cpu".into(), "4".into()), ("zone".into(), "us-east-1a".into())],
                ),
                ("node-2".into(), vec![("cpu".into(), "8".into()), ("zone".into(), "".into())]),
            ],
        })];
        assert_eq!(
            render(&blocks),
            "# nodes\nnode-1:\n  cpu: 4\n  zone: us-east-1a\nnode-2:\n  cpu: 8\n  zone:"
        );
    }
}
