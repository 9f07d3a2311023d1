//! Owned copies of aggregated trees for inspection and export

use crate::context::{ProfileContext, ThreadIdentity};
use crate::section::{CallTree, SectionId};
use serde::Serialize;

/// One thread's aggregated tree.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadProfile {
    #[serde(skip)]
    pub thread: ThreadIdentity,
    pub thread_name: Option<String>,
    /// Top-level sections, in name order.
    pub sections: Vec<SectionStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionStats {
    pub name: String,
    pub avg_time: f64,
    pub call_count: u64,
    pub total_time: f64,
    pub exec_order_id: u64,
    pub children: Vec<SectionStats>,
}

impl ThreadProfile {
    pub(crate) fn capture(context: &ProfileContext) -> Self {
        let tree = context.tree();
        Self {
            thread: context.thread(),
            thread_name: context.thread_name().map(str::to_string),
            sections: capture_children(&tree, CallTree::ROOT),
        }
    }

    /// Section at `path` (names from the top level down).
    pub fn find(&self, path: &[&str]) -> Option<&SectionStats> {
        let (first, rest) = path.split_first()?;
        let top = self.sections.iter().find(|s| s.name == *first)?;
        top.find(rest)
    }
}

impl SectionStats {
    /// Descendant at `path` relative to this section. An empty path is `self`.
    pub fn find(&self, path: &[&str]) -> Option<&SectionStats> {
        path.iter().try_fold(self, |section, name| {
            section.children.iter().find(|child| child.name == *name)
        })
    }
}

fn capture_children(tree: &CallTree, id: SectionId) -> Vec<SectionStats> {
    tree.section(id)
        .children()
        .map(|child| {
            let section = tree.section(child);
            SectionStats {
                name: section.name().to_string(),
                avg_time: section.avg_time(),
                call_count: section.call_count(),
                total_time: section.total_time(),
                exec_order_id: section.exec_order_id(),
                children: capture_children(tree, child),
            }
        })
        .collect()
}
