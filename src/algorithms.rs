//! High-level search algorithms over any index representation.
//!
//! The algorithms are written once against the [`SequenceIndex`] trait and
//! work with [`crate::GBWT`], [`crate::DynamicGBWT`], and
//! [`crate::CachedGBWT`].

use crate::ENDMARKER;
use crate::support::{self, Pos};

use std::ops::Range;

//-----------------------------------------------------------------------------

/// The state of a backward search: a node and a range of offsets in its record.
///
/// The range corresponds to the sequences that contain the searched pattern
/// ending at the node. An empty range means that there are no matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchState {
    /// The last node of the pattern.
    pub node: usize,
    /// Range of offsets in the record of the node.
    pub range: Range<usize>,
}

impl SearchState {
    /// Creates a new search state.
    pub fn new(node: usize, range: Range<usize>) -> Self {
        SearchState { node, range }
    }

    /// Creates an empty search state.
    pub fn empty_state() -> Self {
        SearchState { node: ENDMARKER, range: 0..0 }
    }

    /// Returns the number of matches.
    #[inline]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns `true` if there are no matches.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::empty_state()
    }
}

//-----------------------------------------------------------------------------

/// The state of a bidirectional search in a bidirectional index.
///
/// The forward state corresponds to the pattern and the backward state to the
/// reverse pattern. Both ranges always have the same length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidirectionalState {
    /// Search state for the pattern.
    pub forward: SearchState,
    /// Search state for the reverse pattern.
    pub backward: SearchState,
}

impl BidirectionalState {
    /// Creates a new bidirectional search state.
    pub fn new(forward: SearchState, backward: SearchState) -> Self {
        debug_assert_eq!(forward.len(), backward.len(), "The forward and backward ranges must have the same length");
        BidirectionalState { forward, backward }
    }

    /// Creates an empty search state.
    pub fn empty_state() -> Self {
        BidirectionalState {
            forward: SearchState::empty_state(),
            backward: SearchState::empty_state(),
        }
    }

    /// Returns the number of matches.
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if there are no matches.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns the state for the reverse pattern.
    pub fn flip(&self) -> Self {
        BidirectionalState {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
        }
    }
}

//-----------------------------------------------------------------------------

/// The query interface shared by all index representations.
///
/// The required methods form the record-level capability set; the search
/// algorithms are provided on top of them. Unsuccessful queries return
/// [`None`] or empty states; invalid arguments do not cause errors.
pub trait SequenceIndex {
    /// Returns the number of sequences in the index.
    fn sequences(&self) -> usize;

    /// Returns the size of the alphabet, including the endmarker.
    fn alphabet_size(&self) -> usize;

    /// Returns `true` if the index contains the given node with a non-empty
    /// record.
    fn contains(&self, node: usize) -> bool;

    /// Returns the length of the record of the given node.
    fn count(&self, node: usize) -> usize;

    /// Returns the successor node at the given position.
    fn successor_at(&self, pos: Pos) -> Option<usize>;

    /// Follows the sequence at the given position one step forward.
    fn lf(&self, pos: Pos) -> Option<Pos>;

    /// Returns the offset in the record of node `to` corresponding to the
    /// given position, or [`None`] if there is no edge to `to`.
    fn lf_to(&self, pos: Pos, to: usize) -> Option<usize>;

    /// Maps the search state to the record of node `to`.
    fn follow(&self, state: &SearchState, to: usize) -> Option<SearchState>;

    /// As [`SequenceIndex::follow`], but also returns the number of matches
    /// that precede the new range in the record of the reverse node.
    fn bd_follow(&self, state: &SearchState, to: usize) -> Option<(SearchState, usize)>;

    /// Returns the sampled sequence identifier at the given position, or
    /// [`None`] if the position is not sampled.
    fn try_locate(&self, pos: Pos) -> Option<usize>;

    /// Returns the first position of the given sequence.
    fn start(&self, sequence: usize) -> Option<Pos>;

    //-------------------------------------------------------------------------

    /// Finds the sequences that contain the pattern as a subpath.
    ///
    /// Returns an empty state if the pattern is empty or there are no
    /// matches.
    fn find(&self, pattern: &[usize]) -> SearchState {
        let (&first, rest) = match pattern.split_first() {
            Some(split) => split,
            None => return SearchState::empty_state(),
        };
        if !self.contains(first) {
            return SearchState::empty_state();
        }
        let state = SearchState::new(first, 0..self.count(first));
        self.extend(state, rest)
    }

    /// Extends the search state with the given pattern.
    fn extend(&self, state: SearchState, pattern: &[usize]) -> SearchState {
        let mut state = state;
        for &node in pattern {
            if state.is_empty() {
                return SearchState::empty_state();
            }
            state = match self.follow(&state, node) {
                Some(next) => next,
                None => return SearchState::empty_state(),
            };
        }
        state
    }

    /// Finds the sequences that start with the pattern.
    fn prefix(&self, pattern: &[usize]) -> SearchState {
        let state = SearchState::new(ENDMARKER, 0..self.sequences());
        self.extend(state, pattern)
    }

    /// Returns the identifier of the sequence that covers the given position.
    ///
    /// Walks forward until it finds a sampled position. With sample interval
    /// `d`, this takes at most `d` steps. Returns [`None`] if the position is
    /// invalid or the index has no samples.
    fn locate(&self, pos: Pos) -> Option<usize> {
        if !self.contains(pos.node) {
            return None;
        }
        let mut pos = pos;
        loop {
            if let Some(id) = self.try_locate(pos) {
                return Some(id);
            }
            pos = self.lf(pos)?;
            if pos.node == ENDMARKER {
                return None;
            }
        }
    }

    /// Returns the identifiers of all sequences in the search state, in
    /// sorted order without duplicates.
    fn locate_all(&self, state: &SearchState) -> Vec<usize> {
        let mut result: Vec<usize> = Vec::with_capacity(state.len());
        for offset in state.range.clone() {
            if let Some(id) = self.locate(Pos::new(state.node, offset)) {
                result.push(id);
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    /// Extracts the given sequence as a list of nodes.
    ///
    /// Returns an empty vector if there is no such sequence.
    fn extract(&self, sequence: usize) -> Vec<usize> {
        let mut result: Vec<usize> = Vec::new();
        if sequence >= self.sequences() {
            return result;
        }
        let mut pos = match self.start(sequence) {
            Some(pos) => pos,
            None => return result,
        };
        while pos.node != ENDMARKER {
            result.push(pos.node);
            pos = match self.lf(pos) {
                Some(next) => next,
                None => break,
            };
        }
        result
    }

    //-------------------------------------------------------------------------

    // Bidirectional search. Only meaningful in a bidirectional index, where
    // each path is stored in both orientations.

    /// Finds the sequences that contain the pattern, with support for
    /// extending the pattern in both directions.
    fn bd_find(&self, pattern: &[usize]) -> BidirectionalState {
        let (&first, rest) = match pattern.split_first() {
            Some(split) => split,
            None => return BidirectionalState::empty_state(),
        };
        if !self.contains(first) {
            return BidirectionalState::empty_state();
        }
        let count = self.count(first);
        let mut state = BidirectionalState::new(
            SearchState::new(first, 0..count),
            SearchState::new(support::flip_node(first), 0..count),
        );
        for &node in rest {
            state = match self.extend_forward(&state, node) {
                Some(next) => next,
                None => return BidirectionalState::empty_state(),
            };
        }
        state
    }

    /// Extends the pattern with the given node at the end.
    fn extend_forward(&self, state: &BidirectionalState, node: usize) -> Option<BidirectionalState> {
        let (forward, reverse_offset) = self.bd_follow(&state.forward, node)?;
        let start = state.backward.range.start + reverse_offset;
        let backward = SearchState::new(state.backward.node, start..start + forward.len());
        Some(BidirectionalState { forward, backward })
    }

    /// Extends the pattern with the given node at the beginning.
    fn extend_backward(&self, state: &BidirectionalState, node: usize) -> Option<BidirectionalState> {
        let (backward, reverse_offset) = self.bd_follow(&state.backward, support::flip_node(node))?;
        let start = state.forward.range.start + reverse_offset;
        let forward = SearchState::new(state.forward.node, start..start + backward.len());
        Some(BidirectionalState { forward, backward })
    }
}

//-----------------------------------------------------------------------------
