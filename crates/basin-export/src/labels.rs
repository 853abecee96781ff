//! Plain-text label grids.

use basin_pipeline::LabelBuffer;

/// Render labels as text: one line per row, values separated by single
/// spaces, each line ending in `\n`.
///
/// Watershed lines appear as `0` and unassigned pixels as `-1`, so the
/// output can be diffed against hand-written expectations.
#[must_use]
pub fn to_label_text(labels: &LabelBuffer) -> String {
    let mut out = String::new();
    for row in labels.rows() {
        let line: Vec<String> = row.iter().map(ToString::to_string).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}
