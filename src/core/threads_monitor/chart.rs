//! Quantized per-worker timeline charts.
//!
//! A chart has one column per sampling interval and up to `levels` rows. Row 0
//! is the top band; a column is filled on every row whose threshold its ratio
//! reaches, so a column on `levels` rows reads like a small bar. The bottom row
//! is always printed and carries the worker name; it also distinguishes idle,
//! barely active, unmeasured, not yet started and terminated intervals.

use unicode_width::UnicodeWidthStr;

use super::recorder::Interval;

pub const FILLED: char = '┃';
pub const PARTIAL: char = '╻';
pub const ZERO: char = '▁';
pub const NOT_STARTED: char = '.';
pub const TERMINATED: char = '×';
pub const MISSED: char = '?';
pub const BLANK: char = ' ';
pub const AXIS: char = '┤';

/// Ratio a column must reach to be filled on `row`
pub fn threshold(row: usize, levels: usize) -> f64 {
    (levels as f64 - row as f64 - 0.5) / levels as f64
}

/// Glyph of one interval on one row
pub fn glyph(interval: Interval, row: usize, levels: usize) -> char {
    let bottom = row + 1 == levels;
    let thr = threshold(row, levels);

    match interval {
        Interval::Ratio(t) if t >= thr => FILLED,
        _ if !bottom => BLANK,
        Interval::Ratio(t) if t > 0.0 => PARTIAL,
        Interval::Ratio(_) => ZERO,
        Interval::Missed => MISSED,
        Interval::Terminated => TERMINATED,
    }
}

/// Chart bodies, top row first, without labels.
///
/// Rows above the bottom one are skipped when no interval reaches their
/// threshold. Every row starts with `delay` columns for the ticks elapsed
/// before the worker was observed, which keeps all charts on one time axis.
pub fn chart_rows(intervals: &[Interval], levels: usize, delay: usize) -> Vec<String> {
    let max = intervals
        .iter()
        .filter_map(|interval| match interval {
            Interval::Ratio(t) => Some(*t),
            Interval::Missed | Interval::Terminated => None,
        })
        .fold(0.0_f64, f64::max);

    (0..levels)
        .filter(|&row| row + 1 == levels || max >= threshold(row, levels))
        .map(|row| {
            let lead = if row + 1 == levels { NOT_STARTED } else { BLANK };
            std::iter::repeat_n(lead, delay)
                .chain(intervals.iter().map(|&i| glyph(i, row, levels)))
                .collect()
        })
        .collect()
}

/// Full chart of one worker, with the name on the bottom row.
///
/// `width` is the widest name among the charted workers; labels are padded to
/// one column more so that the axes line up.
pub fn render_chart(
    name: &str,
    width: usize,
    intervals: &[Interval],
    levels: usize,
    delay: usize,
) -> String {
    let rows = chart_rows(intervals, levels, delay);
    let last = rows.len().saturating_sub(1);

    let mut chart = String::new();
    for (i, body) in rows.iter().enumerate() {
        let label = if i == last { name } else { "" };
        chart.push_str(&pad(label, width + 1));
        chart.push(AXIS);
        chart.push_str(body);
        chart.push('\n');
    }
    chart
}

/// Widest display width of the given names
pub fn label_width<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names.into_iter().map(UnicodeWidthStr::width).max().unwrap_or(0)
}

fn pad(label: &str, width: usize) -> String {
    let fill = width.saturating_sub(label.width());
    let mut padded = String::with_capacity(label.len() + fill);
    padded.push_str(label);
    padded.extend(std::iter::repeat_n(' ', fill));
    padded
}
