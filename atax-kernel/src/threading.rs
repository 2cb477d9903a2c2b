//! Fork-join execution over index ranges.
//!
//! Every parallel region in the crate goes through the recursive halving in
//! this module: the range is cut in two, both halves run under `rayon::join`,
//! and the thread budget is split with it. Recursion stops at one thread or
//! when a piece falls under `min_task_len` work units, so leaves are
//! contiguous blocks (static scheduling) and there are at most `nthreads`
//! of them. Each leaf gets a 0-based task index.
//!
//! Without the `parallel` feature the same recursion runs on the caller.

use std::ops::Range;

use crate::{KernelConfig, Result};

/// Splitting parameters for one parallel region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SplitPlan {
    /// Workers available to this subtree.
    pub(crate) nthreads: usize,
    /// Work units per index (`ny` when splitting rows, 1 for flat ranges).
    pub(crate) unit_cost: usize,
    /// Work units below which a piece is not split further.
    pub(crate) min_task_len: usize,
}

impl SplitPlan {
    /// Plan for the pool the caller is currently running on.
    pub(crate) fn new(config: &KernelConfig, unit_cost: usize) -> Self {
        Self {
            nthreads: current_num_threads(),
            unit_cost: unit_cost.max(1),
            min_task_len: config.min_task_len,
        }
    }

    #[inline]
    fn is_leaf(&self, len: usize) -> bool {
        self.nthreads <= 1
            || len <= 1
            || len.saturating_mul(self.unit_cost) <= self.min_task_len
    }

    /// Split the budget and return the offset at which to cut `len` indices.
    #[inline]
    fn halve(self, len: usize) -> (usize, Self, Self) {
        let nt_left = self.nthreads / 2;
        let nt_right = self.nthreads - nt_left;
        // Cut proportionally to the thread split so odd budgets stay balanced.
        let mid = (len * nt_left / self.nthreads).clamp(1, len - 1);
        (
            mid,
            Self {
                nthreads: nt_left,
                ..self
            },
            Self {
                nthreads: nt_right,
                ..self
            },
        )
    }
}

/// Number of workers in the pool the caller runs on.
#[inline]
pub(crate) fn current_num_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

#[inline]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    #[cfg(feature = "parallel")]
    {
        rayon::join(a, b)
    }
    #[cfg(not(feature = "parallel"))]
    {
        (a(), b())
    }
}

/// Run `f` on a dedicated pool of `config.num_threads` workers, or on the
/// ambient pool when no count is configured. Returns after `f` completes.
pub(crate) fn install<R, F>(config: &KernelConfig, f: F) -> Result<R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if let Some(n) = config.num_threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("atax-worker-{i}"))
                .build()
                .map_err(|e| crate::AtaxError::ThreadPool(e.to_string()))?;
            return Ok(pool.install(f));
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = config;
    Ok(f())
}

/// Map each leaf block of `range` to a private value and combine the values
/// pairwise up the join tree.
///
/// `combine(left, right)` always receives the results of adjacent blocks in
/// index order, but which pairs are merged first depends on the split.
pub(crate) fn reduce_blocks<A, F, C>(range: Range<usize>, plan: SplitPlan, leaf: &F, combine: &C) -> A
where
    F: Fn(Range<usize>, usize) -> A + Sync,
    C: Fn(A, A) -> A + Sync,
    A: Send,
{
    reduce_blocks_rec(range, plan, 0, leaf, combine)
}

fn reduce_blocks_rec<A, F, C>(
    range: Range<usize>,
    plan: SplitPlan,
    task: usize,
    leaf: &F,
    combine: &C,
) -> A
where
    F: Fn(Range<usize>, usize) -> A + Sync,
    C: Fn(A, A) -> A + Sync,
    A: Send,
{
    let len = range.end - range.start;
    if plan.is_leaf(len) {
        log::trace!("task {task}: block {range:?}");
        return leaf(range, task);
    }

    let (mid, left_plan, right_plan) = plan.halve(len);
    let mid = range.start + mid;
    let right_task = task + left_plan.nthreads;
    let (l, r) = join(
        || reduce_blocks_rec(range.start..mid, left_plan, task, leaf, combine),
        || reduce_blocks_rec(mid..range.end, right_plan, right_task, leaf, combine),
    );
    combine(l, r)
}

/// Call `f(block, task)` on every leaf block of `range`.
pub(crate) fn for_each_block<F>(range: Range<usize>, plan: SplitPlan, f: &F)
where
    F: Fn(Range<usize>, usize) + Sync,
{
    reduce_blocks(range, plan, f, &|(), ()| ());
}

/// Partition `out` into disjoint leaf blocks and call `f(start, block)` on
/// each, where `start` is the index of `block[0]` within `out`.
pub(crate) fn for_each_block_mut<T, F>(out: &mut [T], plan: SplitPlan, f: &F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    for_each_block_mut_rec(0, out, plan, f);
}

fn for_each_block_mut_rec<T, F>(start: usize, out: &mut [T], plan: SplitPlan, f: &F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    let len = out.len();
    if plan.is_leaf(len) {
        log::trace!("block {start}..{}", start + len);
        f(start, out);
        return;
    }

    let (mid, left_plan, right_plan) = plan.halve(len);
    let (left, right) = out.split_at_mut(mid);
    join(
        || for_each_block_mut_rec(start, left, left_plan, f),
        || for_each_block_mut_rec(start + mid, right, right_plan, f),
    );
}
