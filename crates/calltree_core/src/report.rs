//! Text report of aggregated call trees
//!
//! Layout (one block per thread, rows indented as an ASCII tree):
//!
//! ```text
//! ---------------------------------------------------------------------------------------
//! PRofiler output: sorted by execution order
//! name                            values in ms ->         total     average    count
//! ---------------------------------------------------------------------------------------
//! Thread 55d0c1a2b3c0
//! frame                                                    15.00    15.00000       1
//! + physics                                                 5.00     5.00000       1
//! ---------------------------------------------------------------------------------------
//! ```

use crate::section::{CallTree, SectionId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{self, Write};

pub const RULE: &str =
    "---------------------------------------------------------------------------------------";

const NAME_HEADER: &str = "name                            values in ms -> ";

/// How siblings are ordered in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// First-created first.
    #[default]
    ExecutionOrder,
    /// Largest `avg_time * call_count` first.
    TotalTime,
}

impl SortOrder {
    pub fn label(self) -> &'static str {
        match self {
            SortOrder::ExecutionOrder => "execution order",
            SortOrder::TotalTime => "total time",
        }
    }

    fn compare(self, tree: &CallTree, a: SectionId, b: SectionId) -> Ordering {
        let (a, b) = (tree.section(a), tree.section(b));
        match self {
            SortOrder::ExecutionOrder => a.exec_order_id().cmp(&b.exec_order_id()),
            SortOrder::TotalTime => b.total_time().total_cmp(&a.total_time()),
        }
    }
}

/// Children of `id`, ordered by `order`. Ties keep name order.
pub fn sorted_children(tree: &CallTree, id: SectionId, order: SortOrder) -> Vec<SectionId> {
    let mut children: Vec<SectionId> = tree.section(id).children().collect();
    children.sort_by(|&a, &b| order.compare(tree, a, b));
    children
}

pub(crate) fn write_header<W: Write>(out: &mut W, order: SortOrder) -> io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "PRofiler output: sorted by {}", order.label())?;
    writeln!(
        out,
        "{:<50}  {:>10}  {:>10}  {:>6}",
        NAME_HEADER, "total ", "average ", "count"
    )?;
    writeln!(out, "{RULE}")
}

pub(crate) fn write_footer<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{RULE}")
}

/// Write one row per section below the root, depth first.
pub fn write_tree<W: Write>(tree: &CallTree, order: SortOrder, out: &mut W) -> io::Result<()> {
    write_children(tree, CallTree::ROOT, "", order, out)
}

fn write_children<W: Write>(
    tree: &CallTree,
    id: SectionId,
    prefix: &str,
    order: SortOrder,
    out: &mut W,
) -> io::Result<()> {
    let children = sorted_children(tree, id, order);
    let last = children.len().saturating_sub(1);

    for (i, &child) in children.iter().enumerate() {
        let section = tree.section(child);

        // Swap the trailing "| " for "+ " to mark this row.
        let name = if prefix.len() > 1 {
            format!("{}+ {}", &prefix[..prefix.len() - 2], section.name())
        } else {
            section.name().to_string()
        };
        writeln!(
            out,
            "{:<50}  {:>10.2}  {:>10.5}  {:>6}",
            name,
            section.total_time(),
            section.avg_time(),
            section.call_count()
        )?;

        // No vertical line below the last sibling.
        let mut next_prefix = prefix.to_string();
        if prefix.len() > 1 && i == last {
            next_prefix.truncate(prefix.len() - 2);
            next_prefix.push_str("  ");
        }
        next_prefix.push_str("| ");

        write_children(tree, child, &next_prefix, order, out)?;
    }
    Ok(())
}
