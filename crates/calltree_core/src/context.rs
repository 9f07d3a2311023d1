//! Per-thread profiling state

use crate::section::CallTree;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Opaque token for the thread that owns a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadIdentity(ThreadId);

impl ThreadIdentity {
    pub fn current() -> Self {
        Self(thread::current().id())
    }
}

impl From<ThreadId> for ThreadIdentity {
    fn from(id: ThreadId) -> Self {
        Self(id)
    }
}

/// A thread's private call tree.
///
/// Only the owning thread pushes and pops; the lock is there so reports can
/// read the tree while the owner keeps running.
#[derive(Debug)]
pub struct ProfileContext {
    thread: ThreadIdentity,
    thread_name: Option<String>,
    tree: Mutex<CallTree>,
}

impl ProfileContext {
    pub(crate) fn for_current_thread() -> Self {
        let current = thread::current();
        Self {
            thread: ThreadIdentity(current.id()),
            thread_name: current.name().map(str::to_string),
            tree: Mutex::new(CallTree::new()),
        }
    }

    pub fn thread(&self) -> ThreadIdentity {
        self.thread
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn belongs_to(&self, thread: ThreadIdentity) -> bool {
        self.thread == thread
    }

    /// Lock the tree. A poisoned lock still hands out the tree; the data is
    /// plain counters and stays usable after a panic elsewhere.
    pub fn tree(&self) -> MutexGuard<'_, CallTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
