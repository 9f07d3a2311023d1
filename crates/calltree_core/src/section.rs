//! Call tree of aggregated section timings
//!
//! Sections live in an arena owned by [`CallTree`]. A section owns its
//! children through the arena and refers to its parent by index, so the
//! whole tree is released in one go when the tree is dropped.

use crate::clock::Timestamp;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide creation counter. Only used to recover first-seen ordering.
static NEXT_EXEC_ORDER_ID: AtomicU64 = AtomicU64::new(0);

fn next_exec_order_id() -> u64 {
    NEXT_EXEC_ORDER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Index of a section inside its [`CallTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionId(u32);

impl SectionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Aggregated timing for one named section at one position in the tree.
#[derive(Debug, Clone)]
pub struct ProfileSection {
    name: String,
    parent: Option<SectionId>,
    children: BTreeMap<String, SectionId>,
    avg_time: f64,
    call_count: u64,
    exec_order_id: u64,
    start_time: Timestamp,
}

impl ProfileSection {
    fn new(name: String, parent: Option<SectionId>) -> Self {
        Self {
            name,
            parent,
            children: BTreeMap::new(),
            avg_time: 0.0,
            call_count: 0,
            exec_order_id: next_exec_order_id(),
            start_time: Timestamp::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<SectionId> {
        self.parent
    }

    /// Mean elapsed milliseconds over completed invocations.
    pub fn avg_time(&self) -> f64 {
        self.avg_time
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn exec_order_id(&self) -> u64 {
        self.exec_order_id
    }

    /// Cumulative milliseconds attributed to this section.
    pub fn total_time(&self) -> f64 {
        self.avg_time * self.call_count as f64
    }

    pub fn child(&self, name: &str) -> Option<SectionId> {
        self.children.get(name).copied()
    }

    /// Children in name order.
    pub fn children(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.children.values().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Fold one completed invocation into the running mean.
    ///
    /// Deliberately the plain `(t + a*c) / (c+1)` update; results must match
    /// this exact sequence of float operations.
    pub fn record(&mut self, elapsed_ms: f64) {
        let total = elapsed_ms + self.avg_time * self.call_count as f64;
        self.call_count += 1;
        self.avg_time = total / self.call_count as f64;
    }
}

/// One thread's tree plus the cursor at the innermost open section.
#[derive(Debug, Clone)]
pub struct CallTree {
    sections: Vec<ProfileSection>,
    current: SectionId,
}

impl CallTree {
    pub const ROOT: SectionId = SectionId(0);

    pub fn new() -> Self {
        Self {
            sections: vec![ProfileSection::new(String::new(), None)],
            current: Self::ROOT,
        }
    }

    #[inline]
    pub fn section(&self, id: SectionId) -> &ProfileSection {
        &self.sections[id.index()]
    }

    #[inline]
    fn section_mut(&mut self, id: SectionId) -> &mut ProfileSection {
        &mut self.sections[id.index()]
    }

    pub fn root(&self) -> &ProfileSection {
        self.section(Self::ROOT)
    }

    pub fn current(&self) -> SectionId {
        self.current
    }

    /// Number of sections currently open on this tree.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.section(self.current).parent;
        while let Some(id) = cursor {
            depth += 1;
            cursor = self.section(id).parent;
        }
        depth
    }

    /// Sections in the tree, excluding the root.
    pub fn len(&self) -> usize {
        self.sections.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descend into (creating if needed) the child `name` of the current
    /// section and start its clock.
    pub fn push(&mut self, name: &str, now: Timestamp) -> SectionId {
        assert!(
            self.current.index() < self.sections.len(),
            "call tree cursor {:?} is outside the tree",
            self.current
        );

        let id = match self.section(self.current).child(name) {
            Some(id) => id,
            None => {
                let id = SectionId(self.sections.len() as u32);
                let parent = self.current;
                self.sections
                    .push(ProfileSection::new(name.to_string(), Some(parent)));
                self.section_mut(parent).children.insert(name.to_string(), id);
                id
            }
        };

        self.current = id;
        self.section_mut(id).start_time = now;
        id
    }

    /// Close the current section and move the cursor to its parent.
    ///
    /// Returns `false` without touching anything when the cursor is at the root.
    pub fn pop(&mut self, now: Timestamp) -> bool {
        let section = self.section_mut(self.current);
        let Some(parent) = section.parent else {
            return false;
        };

        let elapsed = now.millis_since(section.start_time);
        section.record(elapsed);
        self.current = parent;
        true
    }

    /// Follow a path of names from the root.
    pub fn find(&self, path: &[&str]) -> Option<SectionId> {
        path.iter()
            .try_fold(Self::ROOT, |id, name| self.section(id).child(name))
    }
}

impl Default for CallTree {
    fn default() -> Self {
        Self::new()
    }
}
