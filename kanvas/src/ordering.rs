//! Neighbor-relative ordering.
//!
//! The client never picks a final rank. A drop is described as "place the
//! item after `preceding` and before `following`", and the authority answers
//! with the stored rank. The same neighbor rule ([`rank_between`]) provides
//! the provisional rank used while the request is in flight.

use std::cmp::Ordering;

use kanvas_proto::board::{Board, Column, TaskSummary};
use kanvas_proto::ids::{ColumnId, Rank, TaskId};

/// A sibling with a rank and a tie-breaking identifier.
pub trait Ranked {
    /// Identifier type.
    type Id: Copy + Ord;

    /// Identifier used to break rank ties.
    fn id(&self) -> Self::Id;

    /// Rank among siblings.
    fn rank(&self) -> Rank;
}

impl Ranked for Column {
    type Id = ColumnId;

    fn id(&self) -> ColumnId {
        self.column_id
    }

    fn rank(&self) -> Rank {
        self.order_index
    }
}

impl Ranked for TaskSummary {
    type Id = TaskId;

    fn id(&self) -> TaskId {
        self.task_id
    }

    fn rank(&self) -> Rank {
        self.order_index
    }
}

/// Rank order, ties broken by ascending identifier.
pub fn by_rank<T: Ranked>(a: &T, b: &T) -> Ordering {
    a.rank().total_cmp(&b.rank()).then_with(|| a.id().cmp(&b.id()))
}

/// Sorts siblings into iteration order.
pub fn sort_by_rank<T: Ranked>(items: &mut [T]) {
    items.sort_by(by_rank);
}

/// Puts a board's columns, and each column's tasks, into iteration order.
pub fn sort_board(board: &mut Board) {
    sort_by_rank(&mut board.columns);
    for column in &mut board.columns {
        sort_by_rank(&mut column.tasks);
    }
}

/// Identifiers of `items` in their current order.
#[must_use]
pub fn ids<T: Ranked>(items: &[T]) -> Vec<T::Id> {
    items.iter().map(Ranked::id).collect()
}

/// Request produced for a single drop.
///
/// `preceding` and `following` are the item's new adjacent siblings, as the
/// viewer sees them, and place it locally. The anchors are the nearest
/// siblings the authority already knows and go into the move request; they
/// differ only when an unconfirmed create sits next to the drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan<Id> {
    /// Item being moved.
    pub item: Id,
    /// Sibling that ends up immediately before the item.
    pub preceding: Option<Id>,
    /// Sibling that ends up immediately after the item.
    pub following: Option<Id>,
    /// Nearest known sibling before the item.
    pub anchor_before: Option<Id>,
    /// Nearest known sibling after the item.
    pub anchor_after: Option<Id>,
    /// Index the item lands on in the destination list.
    pub to_index: usize,
}

impl<Id: Copy> MovePlan<Id> {
    /// Builds the plan for `item` landing at `to` in `order`, which already
    /// excludes the item.
    fn around(item: Id, order: &[Id], to: usize, known: impl Fn(Id) -> bool) -> Self {
        let (before, after) = order.split_at(to);
        Self {
            item,
            preceding: before.last().copied(),
            following: after.first().copied(),
            anchor_before: before.iter().rev().copied().find(|id| known(*id)),
            anchor_after: after.iter().copied().find(|id| known(*id)),
            to_index: to,
        }
    }
}

/// Plans a move within one container.
///
/// `siblings` is the rank-sorted list including the dragged item. Returns
/// `None` when the drop would not change the order, or `from` is out of
/// range. `to` past the end means "last". Anchors skip siblings for which
/// `known` is false.
#[must_use]
pub fn plan_reorder<Id: Copy>(
    siblings: &[Id],
    from: usize,
    to: usize,
    known: impl Fn(Id) -> bool,
) -> Option<MovePlan<Id>> {
    let item = *siblings.get(from)?;
    let to = to.min(siblings.len() - 1);
    if from == to {
        return None;
    }
    let mut order = siblings.to_vec();
    order.remove(from);
    Some(MovePlan::around(item, &order, to, known))
}

/// Plans a move from one container into another.
///
/// `destination` must not contain the item. `to` past the end means
/// "append". Returns `None` if `from` is out of range.
#[must_use]
pub fn plan_transfer<Id: Copy>(
    source: &[Id],
    destination: &[Id],
    from: usize,
    to: usize,
    known: impl Fn(Id) -> bool,
) -> Option<MovePlan<Id>> {
    let item = *source.get(from)?;
    let to = to.min(destination.len());
    Some(MovePlan::around(item, destination, to, known))
}

/// Rank for an item placed between two neighbors.
///
/// Midpoint when both exist; `step` beyond the single neighbor at an edge;
/// `step` itself for an empty container.
#[must_use]
pub fn rank_between(preceding: Option<Rank>, following: Option<Rank>, step: f64) -> Rank {
    match (preceding, following) {
        (None, None) => Rank::new(step),
        (Some(p), None) => Rank::new(p.value() + step),
        (None, Some(f)) => Rank::new(f.value() - step),
        (Some(p), Some(f)) => Rank::new(p.value().midpoint(f.value())),
    }
}

/// Rank for an item appended after every sibling.
#[must_use]
pub fn rank_after_last<T: Ranked>(siblings: &[T], step: f64) -> Rank {
    let last = siblings.iter().map(Ranked::rank).max_by(Rank::total_cmp);
    rank_between(last, None, step)
}
