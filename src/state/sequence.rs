use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::MovieCategory;

/// A piece of published state that asynchronous completions write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Movies,
    Detail,
    Reviews,
    Similar,
    Favorites,
    Membership,
}

impl Slot {
    const COUNT: usize = 6;

    fn index(self) -> usize {
        self as usize
    }
}

/// The kinds of fetch a caller can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
    Search,
    Detail,
    Reviews,
    Similar,
}

impl FetchKind {
    /// All list kinds publish into the same movie list.
    pub fn slot(self) -> Slot {
        match self {
            FetchKind::Popular
            | FetchKind::TopRated
            | FetchKind::NowPlaying
            | FetchKind::Upcoming
            | FetchKind::Search => Slot::Movies,
            FetchKind::Detail => Slot::Detail,
            FetchKind::Reviews => Slot::Reviews,
            FetchKind::Similar => Slot::Similar,
        }
    }
}

impl From<MovieCategory> for FetchKind {
    fn from(category: MovieCategory) -> Self {
        match category {
            MovieCategory::Popular => FetchKind::Popular,
            MovieCategory::TopRated => FetchKind::TopRated,
            MovieCategory::NowPlaying => FetchKind::NowPlaying,
            MovieCategory::Upcoming => FetchKind::Upcoming,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    slot: Slot,
    seq: u64,
}

impl Ticket {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Monotonic request numbering per slot.
///
/// A completion is applied only if its number is higher than every number
/// already applied to the same slot.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: AtomicU64,
    issued: [AtomicU64; Slot::COUNT],
    applied: [AtomicU64; Slot::COUNT],
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, slot: Slot) -> Ticket {
        let seq = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.issued[slot.index()].fetch_max(seq, Ordering::SeqCst);
        Ticket { slot, seq }
    }

    /// Claims the slot for this ticket. False means a newer result already landed.
    pub fn try_apply(&self, ticket: Ticket) -> bool {
        self.applied[ticket.slot.index()].fetch_max(ticket.seq, Ordering::SeqCst) < ticket.seq
    }

    /// Turn every in-flight request for the slot into a no-op.
    pub fn invalidate(&self, slot: Slot) {
        let issued = self.issued[slot.index()].load(Ordering::SeqCst);
        self.applied[slot.index()].fetch_max(issued, Ordering::SeqCst);
    }

    pub fn is_pending(&self, slot: Slot) -> bool {
        self.issued[slot.index()].load(Ordering::SeqCst)
            > self.applied[slot.index()].load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        [
            Slot::Movies,
            Slot::Detail,
            Slot::Reviews,
            Slot::Similar,
            Slot::Favorites,
            Slot::Membership,
        ]
        .into_iter()
        .any(|slot| self.is_pending(slot))
    }
}
