//! Budgeted context construction.
//!
//! Priority, highest first:
//! 1. the impact summary (never truncated; too large is `BudgetExceeded`)
//! 2. patches of added/modified files, then removed files, in path order
//! 3. a `path (+a/-d)` list for files whose patch no longer fits
//! 4. the prior context (PR header), only when it fits whole

use crate::domain::analysis::truncate_utf8;
use crate::domain::{
    AnalysisContext, ChangeKind, ChangeSet, ChangedFile, ImpactReport, PipelineError,
    PipelineResult,
};

const DIFF_HEADING: &str = "## Diff\n";
const LIST_HEADING: &str = "Other changed files:\n";
const COMPACTED_MARK: &str = "[removed lines omitted]\n";
const TRUNCATED_MARK: &str = "[truncated]\n";

/// Build a context within `budget` bytes.
pub fn build(
    diff: &ChangeSet,
    impact: &ImpactReport,
    budget: usize,
) -> PipelineResult<AnalysisContext> {
    build_with_prior(diff, impact, budget, None)
}

/// [`build`] plus an optional lowest-priority prior context.
pub fn build_with_prior(
    diff: &ChangeSet,
    impact: &ImpactReport,
    budget: usize,
    prior: Option<&str>,
) -> PipelineResult<AnalysisContext> {
    let impact_summary = impact.render_summary();
    if impact_summary.len() > budget {
        return Err(PipelineError::BudgetExceeded {
            required: impact_summary.len(),
            budget,
        });
    }

    let diff_room = budget - impact_summary.len();
    let diff_summary = render_diff(diff, diff_room);

    let left = diff_room - diff_summary.len();
    let prior_context = prior
        .filter(|p| !p.is_empty() && p.len() <= left)
        .map(str::to_string);

    Ok(AnalysisContext {
        diff_summary,
        impact_summary,
        prior_context,
        budget,
    })
}

fn ordered_files(diff: &ChangeSet) -> Vec<&ChangedFile> {
    let (mut first, removed): (Vec<&ChangedFile>, Vec<&ChangedFile>) = diff
        .files()
        .iter()
        .partition(|f| f.kind != ChangeKind::Removed);
    first.extend(removed);
    first
}

fn header(file: &ChangedFile) -> String {
    format!(
        "### {} [{}] (+{}/-{})\n",
        file.path, file.kind, file.additions, file.deletions
    )
}

fn with_newline(text: &str) -> String {
    let mut out = text.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn full_section(file: &ChangedFile) -> String {
    let mut out = header(file);
    if let Some(patch) = &file.patch {
        out.push_str(&with_newline(patch));
    }
    out
}

/// Drop removed (`-`) lines, keeping `---` file headers.
fn compact_patch(patch: &str) -> String {
    let mut out = String::with_capacity(patch.len());
    for line in patch.lines() {
        if line.starts_with('-') && !line.starts_with("---") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Longest prefix of `text` within `max` bytes ending on a line boundary.
fn cut_at_line(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let window = truncate_utf8(text, max);
    match window.rfind('\n') {
        Some(pos) => &text[..=pos],
        None => "",
    }
}

/// Shrink a patch that does not fit whole into `room` bytes.
fn partial_section(file: &ChangedFile, room: usize) -> Option<String> {
    let patch = file.patch.as_deref()?;
    let head = header(file);
    let compact = compact_patch(patch);

    if head.len() + compact.len() + COMPACTED_MARK.len() <= room {
        return Some(format!("{}{}{}", head, compact, COMPACTED_MARK));
    }

    let body_room = room.checked_sub(head.len() + TRUNCATED_MARK.len())?;
    let cut = cut_at_line(&compact, body_room);
    if cut.is_empty() {
        return None;
    }
    Some(format!("{}{}{}", head, cut, TRUNCATED_MARK))
}

fn render_diff(diff: &ChangeSet, room: usize) -> String {
    let files = ordered_files(diff);
    if files.is_empty() || DIFF_HEADING.len() > room {
        return String::new();
    }

    let mut out = String::from(DIFF_HEADING);
    let mut shown = 0;
    for (i, file) in files.iter().enumerate() {
        let section = full_section(file);
        if out.len() + section.len() <= room {
            out.push_str(&section);
            shown += 1;
            continue;
        }
        // A cut patch leaves room for the trailing "more files" line.
        let after = files.len() - i - 1;
        let reserve = if after > 0 {
            LIST_HEADING.len() + more_line(after).len()
        } else {
            0
        };
        if let Some(partial) = partial_section(file, room.saturating_sub(out.len() + reserve)) {
            out.push_str(&partial);
            shown += 1;
        }
        break;
    }

    list_remaining(&mut out, &files[shown..], room);

    if out.len() == DIFF_HEADING.len() {
        return String::new();
    }
    out
}

fn more_line(count: usize) -> String {
    format!("… and {} more files\n", count)
}

fn list_remaining(out: &mut String, rest: &[&ChangedFile], room: usize) {
    if rest.is_empty() {
        return;
    }

    let mut block = String::from(LIST_HEADING);
    let mut listed = 0;
    for file in rest {
        let entry = format!("- {} (+{}/-{})\n", file.path, file.additions, file.deletions);
        if out.len() + block.len() + entry.len() > room {
            break;
        }
        block.push_str(&entry);
        listed += 1;
    }

    let omitted = rest.len() - listed;
    if omitted > 0 {
        let more = more_line(omitted);
        if out.len() + block.len() + more.len() <= room {
            block.push_str(&more);
        }
    }

    if block.len() > LIST_HEADING.len() && out.len() + block.len() <= room {
        out.push_str(&block);
    }
}
