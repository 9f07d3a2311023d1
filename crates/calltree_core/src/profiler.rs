//! Process-wide registry of per-thread call trees

use crate::clock::{Clock, MonotonicClock};
use crate::context::{ProfileContext, ThreadIdentity};
use crate::error::ProfilerError;
use crate::report::{self, SortOrder};
use crate::scope::SectionGuard;
use crate::snapshot::ThreadProfile;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Hierarchical section profiler.
///
/// Create one per process and hand references to the code being measured.
/// Every thread that enters a section gets its own context on first use.
pub struct Profiler<C: Clock = MonotonicClock> {
    clock: C,
    contexts: Mutex<Vec<Arc<ProfileContext>>>,
}

impl Profiler<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for Profiler<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Profiler<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn lock_contexts(&self) -> MutexGuard<'_, Vec<Arc<ProfileContext>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The calling thread's context, created on first use.
    pub fn context(&self) -> Arc<ProfileContext> {
        let thread = ThreadIdentity::current();
        let mut contexts = self.lock_contexts();

        if let Some(context) = contexts.iter().find(|c| c.belongs_to(thread)) {
            return Arc::clone(context);
        }

        let context = Arc::new(ProfileContext::for_current_thread());
        tracing::debug!(
            thread = ?thread,
            name = context.thread_name().unwrap_or("<unnamed>"),
            "created profile context"
        );
        contexts.push(Arc::clone(&context));
        context
    }

    /// Begin timing `name` nested under the calling thread's open section.
    pub fn enter(&self, name: &str) {
        let context = self.context();
        let mut tree = context.tree();
        tree.push(name, self.clock.now());
    }

    /// End the innermost open section on the calling thread.
    ///
    /// Does nothing if no section is open.
    pub fn exit(&self) {
        // Taken before any locking so lock waits are not billed to the section.
        let now = self.clock.now();
        let context = self.context();
        let mut tree = context.tree();
        if !tree.pop(now) {
            tracing::trace!(thread = ?context.thread(), "exit with no open section ignored");
        }
    }

    /// Enter `name` and exit it when the returned guard drops.
    pub fn scope(&self, name: &str) -> SectionGuard<'_, C> {
        SectionGuard::new(self, name)
    }

    /// Time a closure as section `name`.
    pub fn time<F, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.scope(name);
        f()
    }

    /// Drop every thread's data.
    ///
    /// Threads with sections still open start again from an empty tree; their
    /// pending exits become no-ops.
    pub fn clear(&self) {
        let mut contexts = self.lock_contexts();
        let discarded = contexts.len();
        contexts.clear();
        tracing::info!(contexts = discarded, "cleared profiler");
    }

    pub fn context_count(&self) -> usize {
        self.lock_contexts().len()
    }

    /// Write the full report. New threads block until it is done.
    pub fn write_report<W: Write>(&self, order: SortOrder, out: &mut W) -> Result<(), ProfilerError> {
        report::write_header(out, order)?;
        {
            let contexts = self.lock_contexts();
            for context in contexts.iter() {
                writeln!(out, "Thread {:x}", Arc::as_ptr(context) as usize)?;
                let tree = context.tree();
                report::write_tree(&tree, order, out)?;
            }
        }
        report::write_footer(out)?;
        Ok(())
    }

    pub fn report(&self, order: SortOrder) -> String {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_report(order, &mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Print the report to stdout.
    pub fn display(&self, order: SortOrder) -> Result<(), ProfilerError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_report(order, &mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Owned copy of every thread's tree, in registration order.
    pub fn snapshot(&self) -> Vec<ThreadProfile> {
        self.lock_contexts()
            .iter()
            .map(|context| ThreadProfile::capture(context))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::section::CallTree;
    use std::thread;
    use std::time::Duration;

    fn manual() -> (Profiler<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (Profiler::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_enter_exit_scenario() {
        let (profiler, clock) = manual();

        profiler.enter("A");
        clock.advance_ms(10);
        profiler.enter("B");
        clock.advance_ms(5);
        profiler.exit();
        profiler.exit();

        let context = profiler.context();
        let tree = context.tree();
        assert_eq!(tree.current(), CallTree::ROOT);

        let a = tree.section(tree.find(&["A"]).unwrap());
        assert_eq!(a.call_count(), 1);
        assert_eq!(a.avg_time(), 15.0);

        let b_id = tree.find(&["A", "B"]).unwrap();
        let b = tree.section(b_id);
        assert_eq!(b.call_count(), 1);
        assert_eq!(b.avg_time(), 5.0);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_scenario_with_real_clock() {
        let profiler = Profiler::new();

        profiler.enter("A");
        thread::sleep(Duration::from_millis(10));
        profiler.enter("B");
        thread::sleep(Duration::from_millis(5));
        profiler.exit();
        profiler.exit();

        let context = profiler.context();
        let tree = context.tree();
        let a = tree.section(tree.find(&["A"]).unwrap());
        let b = tree.section(tree.find(&["A", "B"]).unwrap());
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 1);
        assert!(a.avg_time() >= 15.0 && a.avg_time() < 1000.0, "A took {}", a.avg_time());
        assert!(b.avg_time() >= 5.0 && b.avg_time() <= a.avg_time(), "B took {}", b.avg_time());
    }

    #[test]
    fn test_exit_without_enter_is_noop() {
        let (profiler, clock) = manual();
        clock.advance_ms(3);
        profiler.exit();
        profiler.exit();

        let context = profiler.context();
        let tree = context.tree();
        assert_eq!(tree.current(), CallTree::ROOT);
        assert!(tree.is_empty());
        assert_eq!(tree.root().call_count(), 0);
    }

    #[test]
    fn test_extra_exit_after_balanced_pairs_changes_nothing() {
        let (profiler, clock) = manual();
        profiler.enter("A");
        clock.advance_ms(4);
        profiler.exit();
        clock.advance_ms(100);
        profiler.exit();

        let snapshot = profiler.snapshot();
        let a = snapshot[0].find(&["A"]).unwrap();
        assert_eq!(a.call_count, 1);
        assert_eq!(a.avg_time, 4.0);
    }

    #[test]
    fn test_missing_exit_nests_following_sections() {
        let (profiler, clock) = manual();
        profiler.enter("stuck");
        profiler.enter("next");
        clock.advance_ms(1);
        profiler.exit();

        let snapshot = profiler.snapshot();
        assert!(snapshot[0].find(&["stuck", "next"]).is_some());
        assert!(snapshot[0].find(&["next"]).is_none());
        assert_eq!(profiler.context().tree().depth(), 1);
    }

    #[test]
    fn test_repeated_sections_follow_incremental_average() {
        let (profiler, clock) = manual();
        let samples_us = [1_500u64, 250, 9_999, 3, 42_000];

        let (mut a, mut c) = (0.0f64, 0u64);
        for us in samples_us {
            profiler.enter("loop");
            clock.advance(Duration::from_micros(us));
            profiler.exit();

            let t = Duration::from_micros(us).as_nanos() as f64 / 1_000_000.0;
            let total = t + a * c as f64;
            c += 1;
            a = total / c as f64;
        }

        let snapshot = profiler.snapshot();
        let section = snapshot[0].find(&["loop"]).unwrap();
        assert_eq!(section.call_count, samples_us.len() as u64);
        assert_eq!(section.avg_time.to_bits(), a.to_bits());
    }

    #[test]
    fn test_one_context_per_thread() {
        let (profiler, _clock) = manual();
        profiler.enter("main");
        profiler.exit();
        profiler.enter("main");
        profiler.exit();
        assert_eq!(profiler.context_count(), 1);

        thread::scope(|s| {
            s.spawn(|| {
                profiler.enter("worker");
                profiler.exit();
            });
        });
        assert_eq!(profiler.context_count(), 2);

        let snapshot = profiler.snapshot();
        assert_eq!(snapshot[0].thread, ThreadIdentity::current());
        assert!(snapshot[0].find(&["main"]).is_some());
        assert!(snapshot[0].find(&["worker"]).is_none());
        assert!(snapshot[1].find(&["worker"]).is_some());
        assert!(snapshot[1].find(&["main"]).is_none());
    }

    #[test]
    fn test_concurrent_threads_keep_independent_trees() {
        let profiler = Profiler::new();

        thread::scope(|s| {
            for worker in 0..4 {
                let profiler = &profiler;
                s.spawn(move || {
                    for _ in 0..50 {
                        profiler.enter("work");
                        profiler.enter(&format!("step-{worker}"));
                        profiler.exit();
                        profiler.exit();
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..10 {
                    let _ = profiler.report(SortOrder::TotalTime);
                }
            });
        });

        let snapshot = profiler.snapshot();
        let workers: Vec<_> = snapshot
            .iter()
            .filter(|thread| thread.find(&["work"]).is_some())
            .collect();
        assert_eq!(workers.len(), 4);
        for thread in workers {
            let work = thread.find(&["work"]).unwrap();
            assert_eq!(work.call_count, 50);
            assert_eq!(work.children.len(), 1);
            assert_eq!(work.children[0].call_count, 50);
        }
    }

    #[test]
    fn test_clear_discards_all_contexts() {
        let (profiler, clock) = manual();
        profiler.enter("A");
        clock.advance_ms(2);
        profiler.exit();
        thread::scope(|s| {
            s.spawn(|| profiler.time("B", || clock.advance_ms(1)));
        });
        assert_eq!(profiler.context_count(), 2);

        profiler.clear();
        assert_eq!(profiler.context_count(), 0);
        assert!(profiler.snapshot().is_empty());

        profiler.enter("C");
        profiler.exit();
        let snapshot = profiler.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].find(&["A"]).is_none());
        assert!(snapshot[0].find(&["C"]).is_some());
    }

    #[test]
    fn test_clear_with_open_section_starts_fresh() {
        let (profiler, clock) = manual();
        profiler.enter("open");
        profiler.clear();
        clock.advance_ms(1);
        profiler.exit();

        let context = profiler.context();
        let tree = context.tree();
        assert!(tree.is_empty());
        assert_eq!(tree.current(), CallTree::ROOT);
    }

    #[test]
    fn test_report_lists_both_sections_indented() {
        let (profiler, clock) = manual();
        profiler.enter("A");
        clock.advance_ms(10);
        profiler.enter("B");
        clock.advance_ms(5);
        profiler.exit();
        profiler.exit();

        for order in [SortOrder::ExecutionOrder, SortOrder::TotalTime] {
            let text = profiler.report(order);
            let lines: Vec<&str> = text.lines().collect();

            assert_eq!(lines.len(), 8, "{text}");
            assert_eq!(lines[0], report::RULE);
            assert_eq!(lines[1], format!("PRofiler output: sorted by {}", order.label()));
            assert_eq!(lines[3], report::RULE);
            assert!(lines[4].starts_with("Thread "));
            assert_eq!(lines[5], format!("{:<50}{}", "A", "       15.00    15.00000       1"));
            assert_eq!(lines[6], format!("{:<50}{}", "+ B", "        5.00     5.00000       1"));
            assert_eq!(lines[7], report::RULE);
        }
    }

    #[test]
    fn test_report_with_no_threads() {
        let profiler = Profiler::new();
        assert_eq!(profiler.report(SortOrder::ExecutionOrder).lines().count(), 5);
    }

    #[test]
    fn test_execution_order_follows_first_entry() {
        let (profiler, _clock) = manual();
        for name in ["render", "audio", "input", "audio", "render"] {
            profiler.enter("frame");
            profiler.time(name, || ());
            profiler.exit();
        }

        let text = profiler.report(SortOrder::ExecutionOrder);
        let rows: Vec<&str> = text
            .lines()
            .skip(5)
            .take(4)
            .map(|row| row[..50].trim_end())
            .collect();
        assert_eq!(rows, ["frame", "+ render", "+ audio", "+ input"]);
    }
}
