//! Dotted-numeric version comparison.
//!
//! Repository descriptors and package metadata carry versions like `"1.5"`
//! or `"2.0.1"`. These are not semver (two-segment versions are common), so
//! comparison splits on `.` and compares segment by segment: numeric
//! segments numerically, anything else lexically, with missing segments
//! treated as zero. A leading `v` is ignored on either side.
//!
//! The update rule everywhere in this crate is strict: an update is
//! available if and only if the installed version orders *below* the remote
//! version. Equal versions never report an update.

use std::cmp::Ordering;

/// Compare two dotted version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a_segments: Vec<&str> = normalize(a).split('.').collect();
    let b_segments: Vec<&str> = normalize(b).split('.').collect();
    let len = a_segments.len().max(b_segments.len());

    for i in 0..len {
        let sa = a_segments.get(i).copied().unwrap_or("0");
        let sb = b_segments.get(i).copied().unwrap_or("0");
        let ord = compare_segment(sa, sb);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// True when `remote` is strictly newer than `installed`.
pub fn is_newer(remote: &str, installed: &str) -> bool {
    compare(installed, remote) == Ordering::Less
}

fn normalize(v: &str) -> &str {
    v.trim().trim_start_matches('v')
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(na), Ok(nb)) => na.cmp(&nb),
        // Non-numeric segments fall back to a lexical compare. This only
        // matters for odd inputs; repository versions are plain digits.
        _ => a.cmp(b),
    }
}
