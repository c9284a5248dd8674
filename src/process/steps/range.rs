//! `range()`, `limit()` and `tail()`. Positions are only meaningful once every
//! contribution has reached the master, so workers forward what they collect
//! and the master applies the window. Bulk is honoured: a traverser with bulk
//! 3 occupies three positions.

use crate::error::{Result, TraversalError};
use crate::process::step::{Barrier, BarrierContents, BarrierKind, Step};
use crate::process::traverser::{StepId, Traverser, TraverserSet};
use std::collections::VecDeque;

/// Clip a traverser stream to the positions `[low, high)`, starting at `position`
fn window(
    traversers: impl IntoIterator<Item = Traverser>,
    position: &mut u64,
    low: u64,
    high: Option<u64>,
) -> Vec<Traverser> {
    let mut kept = Vec::new();
    for traverser in traversers {
        let bulk = traverser.bulk.max(0) as u64;
        let start = *position;
        let end = start + bulk;
        *position = end;

        let from = start.max(low);
        let to = high.map_or(end, |h| end.min(h));
        if to > from {
            kept.push(traverser.with_bulk((to - from) as i64));
        }
    }
    kept
}

fn merge_traversers(id: &StepId, buffer: &mut VecDeque<Traverser>, contents: BarrierContents) -> Result<()> {
    match contents {
        BarrierContents::Traversers(traversers) => {
            buffer.extend(traversers);
            Ok(())
        }
        BarrierContents::Empty => Ok(()),
        BarrierContents::Data(_) => Err(TraversalError::pipeline(
            id,
            "range steps only merge traversers",
        )),
    }
}

#[derive(Debug)]
pub struct RangeStep {
    id: StepId,
    next: StepId,
    low: u64,
    high: Option<u64>,
    position: u64,
    buffer: VecDeque<Traverser>,
    outputs: VecDeque<Traverser>,
    at_master: bool,
}

impl RangeStep {
    /// Keep positions `[low, high)`; `None` keeps everything from `low` on
    pub fn new(id: StepId, next: StepId, low: u64, high: Option<u64>) -> Self {
        Self {
            id,
            next,
            low,
            high,
            position: 0,
            buffer: VecDeque::new(),
            outputs: VecDeque::new(),
            at_master: false,
        }
    }

    fn apply(&mut self) {
        let pending: Vec<Traverser> = self.buffer.drain(..).collect();
        let next = self.next.clone();
        let kept = window(pending, &mut self.position, self.low, self.high);
        self.outputs
            .extend(kept.into_iter().map(|t| t.advance(next.clone())));
    }
}

impl Step for RangeStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        self.buffer.push_back(traverser);
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.at_master && (!self.outputs.is_empty() || !self.buffer.is_empty())
    }

    fn next(&mut self) -> Option<Traverser> {
        if !self.at_master {
            return None;
        }
        if self.outputs.is_empty() {
            self.apply();
        }
        self.outputs.pop_front()
    }

    fn set_at_master(&mut self, at_master: bool) {
        self.at_master = at_master;
    }

    fn barrier_kind(&self) -> Option<BarrierKind> {
        Some(BarrierKind::Global)
    }

    fn as_barrier(&mut self) -> Option<&mut dyn Barrier> {
        Some(self)
    }

    fn is_range_global(&self) -> bool {
        true
    }
}

impl Barrier for RangeStep {
    fn has_next_barrier(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn next_barrier(&mut self) -> Result<BarrierContents> {
        let traversers: TraverserSet = self.buffer.drain(..).collect();
        Ok(BarrierContents::Traversers(traversers))
    }

    fn add_barrier(&mut self, contents: BarrierContents) -> Result<()> {
        merge_traversers(&self.id, &mut self.buffer, contents)
    }
}

#[derive(Debug)]
pub struct TailStep {
    id: StepId,
    next: StepId,
    count: u64,
    buffer: VecDeque<Traverser>,
    outputs: VecDeque<Traverser>,
    at_master: bool,
}

impl TailStep {
    pub fn new(id: StepId, next: StepId, count: u64) -> Self {
        Self {
            id,
            next,
            count,
            buffer: VecDeque::new(),
            outputs: VecDeque::new(),
            at_master: false,
        }
    }

    fn apply(&mut self) {
        let pending: Vec<Traverser> = self.buffer.drain(..).collect();
        let total: u64 = pending.iter().map(|t| t.bulk.max(0) as u64).sum();
        let low = total.saturating_sub(self.count);
        let next = self.next.clone();
        let mut position = 0;
        let kept = window(pending, &mut position, low, None);
        self.outputs
            .extend(kept.into_iter().map(|t| t.advance(next.clone())));
    }
}

impl Step for TailStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        self.buffer.push_back(traverser);
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.at_master && (!self.outputs.is_empty() || !self.buffer.is_empty())
    }

    fn next(&mut self) -> Option<Traverser> {
        if !self.at_master {
            return None;
        }
        if self.outputs.is_empty() {
            self.apply();
        }
        self.outputs.pop_front()
    }

    fn set_at_master(&mut self, at_master: bool) {
        self.at_master = at_master;
    }

    fn barrier_kind(&self) -> Option<BarrierKind> {
        Some(BarrierKind::Global)
    }

    fn as_barrier(&mut self) -> Option<&mut dyn Barrier> {
        Some(self)
    }

    fn is_tail_global(&self) -> bool {
        true
    }
}

impl Barrier for TailStep {
    fn has_next_barrier(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn next_barrier(&mut self) -> Result<BarrierContents> {
        let traversers: TraverserSet = self.buffer.drain(..).collect();
        Ok(BarrierContents::Traversers(traversers))
    }

    fn add_barrier(&mut self, contents: BarrierContents) -> Result<()> {
        merge_traversers(&self.id, &mut self.buffer, contents)
    }
}
