//! Text rendering for read-only commands

use std::collections::HashSet;

use hierarchies_core::{DepthWindow, Hierarchy, RoleId, Tier};

/// Render the hierarchy list.
pub fn render_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from("Hierarchies:\n");
    let mut empty = true;
    for name in names {
        out.push_str(" • ");
        out.push_str(name);
        out.push('\n');
        empty = false;
    }
    if empty {
        return "This server has no hierarchies.".to_string();
    }
    out
}

/// Render one tier line, indented by depth.
///
/// Roles in `deleted` are marked with a leading `!`.
pub fn render_tier(tier: &Tier, deleted: &HashSet<RoleId>) -> String {
    let indent = "  ".repeat(tier.depth as usize);
    let marker = if deleted.contains(&tier.role_id) { "!" } else { "" };
    format!(
        "{indent}{marker}{} | {} | {}",
        tier.role_id,
        describe_window("Promote", tier.rules.promotion()),
        describe_window("Demote", tier.rules.demotion()),
    )
}

fn describe_window(verb: &str, window: DepthWindow) -> String {
    if window.is_enabled() {
        format!("Can {verb}: {} < depth <= {}", window.min, window.max)
    } else {
        format!("Cannot {verb}")
    }
}

/// Render a hierarchy as messages of at most `max_len` characters.
///
/// Lines are never split. A single line longer than `max_len` is sent alone.
pub fn render_hierarchy(
    name: &str,
    hierarchy: &Hierarchy,
    deleted: &HashSet<RoleId>,
    max_len: usize,
) -> Vec<String> {
    let header = format!("Hierarchy for {name}:\n");
    let lines = hierarchy
        .tiers
        .iter()
        .map(|tier| format!("{}\n", render_tier(tier, deleted)));
    chunk(header, lines, max_len)
}

/// Pack lines into chunks of at most `max_len` characters.
pub fn chunk(first: String, lines: impl IntoIterator<Item = String>, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = first;
    let mut current_len = current.chars().count();

    for line in lines {
        let line_len = line.chars().count();
        if current_len + line_len > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
