//! Pipe-delimited table location and cell access.

/// Which header occurrence to anchor on when a signature appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    First,
    Last,
}

/// Row acceptance policy relative to the header width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWidth {
    /// Row must have exactly as many cells as the header.
    Exact,
    /// Row may carry extra cells but never fewer.
    AtLeast,
}

impl RowWidth {
    fn accepts(&self, cells: usize, header: usize) -> bool {
        match self {
            Self::Exact => cells == header,
            Self::AtLeast => cells >= header,
        }
    }
}

/// A header plus the rows that structurally fit it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipeTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PipeTable {
    /// Locate the table whose header line contains `signature`.
    ///
    /// Rows are read from the line after the header until `stop` returns
    /// true. Rows rejected by `width` are skipped without ending the scan.
    pub fn locate(
        text: &str,
        signature: &str,
        occurrence: Occurrence,
        width: RowWidth,
        stop: impl Fn(&str) -> bool,
    ) -> Option<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let mut header_positions = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.contains(signature))
            .map(|(i, _)| i);
        let header_idx = match occurrence {
            Occurrence::First => header_positions.next(),
            Occurrence::Last => header_positions.last(),
        }?;

        let headers = split_cells(lines[header_idx]);
        let mut rows = Vec::new();
        for line in &lines[header_idx + 1..] {
            if stop(line) {
                break;
            }
            let cells = split_cells(line);
            if width.accepts(cells.len(), headers.len()) {
                rows.push(cells);
            }
        }

        Some(Self { headers, rows })
    }

    /// Index of the header equal to `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the first header containing any needle, tried in needle order.
    pub fn find_column(&self, needles: &[&str]) -> Option<usize> {
        needles
            .iter()
            .find_map(|needle| self.headers.iter().position(|h| h.contains(needle)))
    }

    /// Cell text, if both the column and the row cell exist.
    pub fn cell<'a>(&self, row: &'a [String], col: Option<usize>) -> Option<&'a str> {
        col.and_then(|c| row.get(c)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Split a line on `|`, trimming each cell. Empty cells are kept.
pub fn split_cells(line: &str) -> Vec<String> {
    line.split('|').map(|c| c.trim().to_string()).collect()
}

/// Best-effort float parse; blank and `-` cells carry no value.
pub fn parse_f64(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "-" {
        return None;
    }
    cell.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Best-effort integer parse; blank and `-` cells carry no value.
pub fn parse_i64(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "-" {
        return None;
    }
    cell.parse().ok()
}
