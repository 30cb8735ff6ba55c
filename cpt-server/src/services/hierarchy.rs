//! Hierarchy builder
//!
//! Classifies sheet rows by their item number (STT) and links them into a
//! task tree in a single pass. A row is one of:
//!
//! - a top group (`HẠNG MỤC` marker in the name),
//! - a level-1 group (single uppercase letter or Roman numeral),
//! - a level-2 group (numeric code one level above the leaf level),
//! - a leaf task,
//! - or skipped (separators, summary lines).
//!
//! Two numbering conventions exist across source files. Lettered files put
//! leaves on plain integers (`A`, `1`, `2`, ...) and use one-dot codes for
//! sub-groups; dotted files put leaves on the deepest dotted level
//! (`1`, `1.1`, `1.1.1`). [`Numbering::detect`] samples a file's codes to tell
//! them apart.

use once_cell::sync::Lazy;
use regex::Regex;

const GROUP_MARKER: &str = "HẠNG MỤC";

/// Lines such as unit price or grand total rows carry no task
const SUMMARY_MARKERS: [&str; 3] = ["đơn giá", "thành tiền", "tổng cộng"];

static NUMERIC_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("numeric code pattern"));

static LETTER_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]$").expect("letter pattern"));

static ROMAN_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^M{0,3}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$").expect("roman pattern")
});

/// `HẠNG MỤC 2: Phần móng` -> number `2`, title `Phần móng`
static MARKER_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)HẠNG\s+MỤC\s*([0-9]+|[IVXLCDM]+\b)?\s*[:.\-]?\s*(.*)$")
        .expect("group marker pattern")
});

/// Row classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    TopGroup,
    Level1,
    Level2,
    Leaf,
    Skip,
}

impl RowKind {
    pub fn is_group(self) -> bool {
        matches!(self, RowKind::TopGroup | RowKind::Level1 | RowKind::Level2)
    }
}

/// A classified row with its normalized code and display name
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub kind: RowKind,
    pub code: String,
    pub name: String,
}

impl ClassifiedRow {
    fn skip() -> Self {
        Self {
            kind: RowKind::Skip,
            code: String::new(),
            name: String::new(),
        }
    }
}

/// Item-numbering convention of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numbering {
    /// Plain integers are leaves, one-dot codes are level-2 groups
    Lettered,
    /// Codes with `leaf_depth` dots are leaves, shallower codes are groups
    Dotted { leaf_depth: usize },
}

impl Numbering {
    /// Detect the convention from `(stt, has_figures)` samples
    ///
    /// The leaf level is the deepest numeric code carrying figures (contract
    /// volume, or weekly progress). When no row carries figures, the deepest
    /// numeric code present is used.
    pub fn detect<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut deepest_with_figures: Option<usize> = None;
        let mut deepest: Option<usize> = None;

        for (stt, has_figures) in samples {
            let code = normalize_code(stt);
            let Some(depth) = numeric_depth(&code) else {
                continue;
            };
            deepest = deepest.max(Some(depth));
            if has_figures {
                deepest_with_figures = deepest_with_figures.max(Some(depth));
            }
        }

        match deepest_with_figures.or(deepest).unwrap_or(0) {
            0 => Numbering::Lettered,
            leaf_depth => Numbering::Dotted { leaf_depth },
        }
    }
}

/// Trim an item number and drop a trailing dot (`"1."` -> `"1"`)
pub fn normalize_code(stt: &str) -> String {
    stt.trim().trim_end_matches('.').trim().to_string()
}

/// Number of dots in a purely numeric code; None for anything else
fn numeric_depth(code: &str) -> Option<usize> {
    NUMERIC_CODE
        .is_match(code)
        .then(|| code.matches('.').count())
}

/// Single letters and Roman numerals, in either case
fn is_letter_or_roman(code: &str) -> bool {
    let upper = code.to_uppercase();
    !upper.is_empty() && (LETTER_CODE.is_match(&upper) || ROMAN_CODE.is_match(&upper))
}

fn is_summary_line(name: &str) -> bool {
    let lowered = name.to_lowercase();
    SUMMARY_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Classify one row
///
/// Evaluated in order: blank rows, the group marker, summary lines,
/// letter/Roman codes, numeric codes, then any remaining row with figures.
pub fn classify(stt: &str, name: &str, has_figures: bool, numbering: Numbering) -> ClassifiedRow {
    let code = normalize_code(stt);
    let name = name.trim();

    if code.is_empty() && name.is_empty() {
        return ClassifiedRow::skip();
    }

    if name.to_uppercase().contains(GROUP_MARKER) {
        return top_group(&code, name);
    }

    if code.is_empty() && is_summary_line(name) {
        return ClassifiedRow::skip();
    }

    let kind = if is_letter_or_roman(&code) {
        RowKind::Level1
    } else if let Some(depth) = numeric_depth(&code) {
        numeric_kind(depth, has_figures, numbering)
    } else if has_figures {
        RowKind::Leaf
    } else {
        RowKind::Skip
    };

    // A task needs a name to be matched against reports
    if kind == RowKind::Leaf && name.is_empty() {
        return ClassifiedRow::skip();
    }
    if kind == RowKind::Skip {
        return ClassifiedRow::skip();
    }

    ClassifiedRow {
        kind,
        code,
        name: name.to_string(),
    }
}

fn numeric_kind(depth: usize, has_figures: bool, numbering: Numbering) -> RowKind {
    match numbering {
        Numbering::Lettered => match depth {
            1 => RowKind::Level2,
            _ => RowKind::Leaf,
        },
        Numbering::Dotted { leaf_depth } => {
            if depth >= leaf_depth || has_figures {
                RowKind::Leaf
            } else if depth + 1 == leaf_depth {
                RowKind::Level2
            } else {
                RowKind::Level1
            }
        }
    }
}

fn top_group(code: &str, name: &str) -> ClassifiedRow {
    let (marker_number, title) = match MARKER_TITLE.captures(name) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        ),
        None => (None, String::new()),
    };

    let is_numbering = is_letter_or_roman(code) || numeric_depth(code).is_some();
    let code = if is_numbering || marker_number.is_none() {
        code.to_string()
    } else {
        marker_number.unwrap_or_default()
    };

    ClassifiedRow {
        kind: RowKind::TopGroup,
        code,
        name: if title.is_empty() { name.to_string() } else { title },
    }
}

/// One node of a built tree
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    pub contract_volume: Option<f64>,
    pub is_group: bool,
    /// Index of the parent node in [`TaskTree::nodes`]
    pub parent: Option<usize>,
}

/// Tree produced by [`TreeBuilder`], parents always before children
#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    pub nodes: Vec<TaskNode>,
}

impl TaskTree {
    pub fn leaves(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter().filter(|n| !n.is_group)
    }

    pub fn group_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_group).count()
    }

    /// Ancestor names from the root down to `index` (inclusive)
    pub fn path(&self, index: usize) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            let Some(node) = self.nodes.get(i) else {
                break;
            };
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        names
    }
}

/// Single-pass tree builder holding the currently open group at each depth
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<TaskNode>,
    top: Option<usize>,
    level1: Option<usize>,
    level2: Option<usize>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a classified row; returns its node index, None for skipped rows
    ///
    /// Groups close every deeper open group. Leaves attach to the deepest
    /// open group.
    pub fn push(
        &mut self,
        row: ClassifiedRow,
        unit: Option<String>,
        contract_volume: Option<f64>,
    ) -> Option<usize> {
        let index = self.nodes.len();
        let parent = match row.kind {
            RowKind::Skip => return None,
            RowKind::TopGroup => {
                self.top = Some(index);
                self.level1 = None;
                self.level2 = None;
                None
            }
            RowKind::Level1 => {
                let parent = self.top;
                self.level1 = Some(index);
                self.level2 = None;
                parent
            }
            RowKind::Level2 => {
                let parent = self.level1.or(self.top);
                self.level2 = Some(index);
                parent
            }
            RowKind::Leaf => self.level2.or(self.level1).or(self.top),
        };

        let is_group = row.kind.is_group();
        self.nodes.push(TaskNode {
            code: row.code,
            name: row.name,
            unit: if is_group { None } else { unit },
            contract_volume: if is_group { None } else { contract_volume },
            is_group,
            parent,
        });

        Some(index)
    }

    pub fn finish(self) -> TaskTree {
        TaskTree { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(stt: &str, name: &str, figures: bool, numbering: Numbering) -> RowKind {
        classify(stt, name, figures, numbering).kind
    }

    #[test]
    fn test_marker_takes_precedence() {
        let row = classify("1", "HẠNG MỤC 1: Phần móng", false, Numbering::Lettered);
        assert_eq!(row.kind, RowKind::TopGroup);
        assert_eq!(row.code, "1");
        assert_eq!(row.name, "Phần móng");

        // Lower-case marker text is recognized too
        let row = classify("", "hạng mục 3 - thân nhà", true, Numbering::Lettered);
        assert_eq!(row.kind, RowKind::TopGroup);
        assert_eq!(row.code, "3");
        assert_eq!(row.name, "thân nhà");
    }

    #[test]
    fn test_marker_code_prefers_numbering_stt() {
        let row = classify("II", "HẠNG MỤC 7: Hoàn thiện", false, Numbering::Lettered);
        assert_eq!(row.code, "II");

        let row = classify("*", "HẠNG MỤC 7: Hoàn thiện", false, Numbering::Lettered);
        assert_eq!(row.code, "7");
    }

    #[test]
    fn test_lettered_convention() {
        let n = Numbering::Lettered;
        assert_eq!(kind("A", "Phần ngầm", false, n), RowKind::Level1);
        assert_eq!(kind("IV", "Phần thô", false, n), RowKind::Level1);
        assert_eq!(kind("1.2", "Cọc", false, n), RowKind::Level2);
        assert_eq!(kind("3", "Đào đất", true, n), RowKind::Leaf);
        assert_eq!(kind("3.", "Đào đất", true, n), RowKind::Leaf);
        assert_eq!(kind("1.2.1", "Ép cọc", true, n), RowKind::Leaf);
    }

    #[test]
    fn test_lowercase_letter_and_roman_codes() {
        let n = Numbering::Lettered;
        assert_eq!(kind("ii", "Phần thân", false, n), RowKind::Level1);
        assert_eq!(kind("iv.", "Mái", false, n), RowKind::Level1);
        assert_eq!(kind("b", "Phần móng", false, n), RowKind::Level1);
        assert_eq!(kind("ab", "Ghi chú", false, n), RowKind::Skip);

        let row = classify("x", "HẠNG MỤC 2: Sân", false, n);
        assert_eq!(row.kind, RowKind::TopGroup);
        assert_eq!(row.code, "x");
    }

    #[test]
    fn test_dotted_convention() {
        let n = Numbering::Dotted { leaf_depth: 1 };
        assert_eq!(kind("1", "Phần móng", false, n), RowKind::Level2);
        assert_eq!(kind("1.1", "Đào đất", true, n), RowKind::Leaf);

        let n = Numbering::Dotted { leaf_depth: 2 };
        assert_eq!(kind("1", "Phần móng", false, n), RowKind::Level1);
        assert_eq!(kind("1.1", "Móng M1", false, n), RowKind::Level2);
        assert_eq!(kind("1.1.1", "Bê tông lót", true, n), RowKind::Leaf);
        // A shallow code carrying figures is still a task
        assert_eq!(kind("2", "Dọn mặt bằng", true, n), RowKind::Leaf);
    }

    #[test]
    fn test_skips_blank_and_summary_rows() {
        let n = Numbering::Lettered;
        assert_eq!(kind("", "", true, n), RowKind::Skip);
        assert_eq!(kind("", "Tổng cộng", true, n), RowKind::Skip);
        assert_eq!(kind("", "Thành tiền sau thuế", true, n), RowKind::Skip);
        assert_eq!(kind("ghi chú", "Không có khối lượng", false, n), RowKind::Skip);
        assert_eq!(kind("5", "", true, n), RowKind::Skip);
    }

    #[test]
    fn test_unnumbered_row_with_figures_is_leaf() {
        assert_eq!(
            kind("a", "Hạng mục phụ không số", true, Numbering::Lettered),
            RowKind::TopGroup
        );
        assert_eq!(kind("a", "Vận chuyển", true, Numbering::Lettered), RowKind::Leaf);
    }

    #[test]
    fn test_detect_lettered() {
        let samples = [("A", false), ("1", true), ("1.1", false), ("2", true)];
        assert_eq!(Numbering::detect(samples), Numbering::Lettered);
        assert_eq!(Numbering::detect(std::iter::empty()), Numbering::Lettered);
    }

    #[test]
    fn test_detect_dotted() {
        let samples = [("I", false), ("1", false), ("1.1", true), ("1.2.", true)];
        assert_eq!(Numbering::detect(samples), Numbering::Dotted { leaf_depth: 1 });

        let samples = [("1", false), ("1.1", false), ("1.1.1", false)];
        assert_eq!(Numbering::detect(samples), Numbering::Dotted { leaf_depth: 2 });
    }

    fn build(rows: &[(&str, &str, Option<f64>)]) -> TaskTree {
        let numbering = Numbering::detect(rows.iter().map(|(s, _, v)| (*s, v.is_some())));
        let mut builder = TreeBuilder::new();
        for (stt, name, volume) in rows {
            let row = classify(stt, name, volume.is_some(), numbering);
            builder.push(row, Some("m3".to_string()), *volume);
        }
        builder.finish()
    }

    #[test]
    fn test_builds_three_level_tree() {
        let tree = build(&[
            ("I", "HẠNG MỤC 1: Nhà chính", None),
            ("A", "Phần móng", None),
            ("1.1", "Cọc", None),
            ("1", "Ép cọc", Some(120.0)),
            ("2", "Đập đầu cọc", Some(40.0)),
            ("B", "Phần thân", None),
            ("3", "Cột", Some(12.5)),
            ("HM2", "HẠNG MỤC 2: Nhà phụ", None),
            ("4", "Tường rào", Some(80.0)),
        ]);

        assert_eq!(tree.nodes.len(), 9);
        assert_eq!(tree.group_count(), 5);
        assert_eq!(tree.path(3), vec!["Nhà chính", "Phần móng", "Cọc", "Ép cọc"]);
        assert_eq!(tree.path(6), vec!["Nhà chính", "Phần thân", "Cột"]);
        assert_eq!(tree.path(8), vec!["Nhà phụ", "Tường rào"]);

        // Groups never carry volume or unit
        for node in tree.nodes.iter().filter(|n| n.is_group) {
            assert!(node.contract_volume.is_none());
            assert!(node.unit.is_none());
        }
        assert!(tree.leaves().all(|n| n.contract_volume.is_some()));
    }

    #[test]
    fn test_leaf_parent_chain_ends_at_root_group() {
        let tree = build(&[
            ("A", "Phần ngầm", None),
            ("1", "Đào đất", Some(10.0)),
        ]);
        let leaf = &tree.nodes[1];
        let parent = leaf.parent.unwrap();
        assert!(tree.nodes[parent].is_group);
        assert!(tree.nodes[parent].parent.is_none());
    }

    #[test]
    fn test_dotted_file_tree() {
        let tree = build(&[
            ("1", "Phần móng", None),
            ("1.1", "Đào đất", Some(10.0)),
            ("1.2", "Bê tông lót", Some(2.0)),
            ("2", "Phần thân", None),
            ("2.1", "Cột", Some(4.0)),
        ]);
        assert_eq!(tree.group_count(), 2);
        assert_eq!(tree.path(4), vec!["Phần thân", "Cột"]);
    }

    #[test]
    fn test_leaf_before_any_group_is_root() {
        let tree = build(&[("1", "Dọn dẹp", Some(1.0))]);
        assert_eq!(tree.nodes[0].parent, None);
        assert!(!tree.nodes[0].is_group);
    }
}
