//! RAII section guard

use crate::clock::Clock;
use crate::profiler::Profiler;

/// Exits its section on drop, so early returns and `?` still close it.
///
/// Guards must drop on the thread that created them, in reverse creation order.
#[must_use = "the section closes as soon as the guard is dropped"]
pub struct SectionGuard<'a, C: Clock> {
    profiler: &'a Profiler<C>,
}

impl<'a, C: Clock> SectionGuard<'a, C> {
    pub(crate) fn new(profiler: &'a Profiler<C>, name: &str) -> Self {
        profiler.enter(name);
        Self { profiler }
    }
}

impl<C: Clock> Drop for SectionGuard<'_, C> {
    fn drop(&mut self) {
        self.profiler.exit();
    }
}

/// Time the rest of the enclosing block as a section.
///
/// ```
/// use calltree_core::{profile_scope, Profiler};
///
/// let profiler = Profiler::new();
/// {
///     profile_scope!(profiler, "load");
///     // ... work ...
/// }
/// assert_eq!(profiler.snapshot()[0].find(&["load"]).unwrap().call_count, 1);
/// ```
#[macro_export]
macro_rules! profile_scope {
    ($profiler:expr, $name:expr) => {
        let _profile_scope_guard = $profiler.scope($name);
    };
}
