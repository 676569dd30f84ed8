//! The dynamic index: the same queries as the static index, plus the
//! insertion of new paths.

use crate::{ENDMARKER, GBWTError};
use crate::algorithms::{SearchState, SequenceIndex};
use crate::bwt::{DASamples, RecordArray};
use crate::gbwt::GBWT;
use crate::headers::GBWTHeader;
use crate::metadata::Metadata;
use crate::record::DynamicRecord;
use crate::support::{self, Pos};


//-----------------------------------------------------------------------------

/// A mutable index used during construction.
///
/// The dynamic index stores one [`DynamicRecord`] per node as growable
/// vectors. Paths are inserted one at a time, and the index remains fully
/// queryable between insertions. Once all paths have been inserted, the index
/// is finalised into a [`GBWT`] with [`DynamicGBWT::into_gbwt`].
///
/// Insertion is single-writer: the index cannot be updated from multiple
/// threads. Parallel construction builds multiple partial indexes and merges
/// the finalised results.
///
/// # Examples
///
/// ```
/// use gbwt::{DynamicGBWT, SequenceIndex};
///
/// let mut index = DynamicGBWT::with_sample_interval(2);
/// index.insert(&[2, 4, 6, 8]).unwrap();
///
/// assert_eq!(index.sequences(), 1);
/// assert_eq!(index.extract(0), vec![2, 4, 6, 8]);
/// assert_eq!(index.find(&[4, 6]).len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DynamicGBWT {
    records: Vec<DynamicRecord>,
    sequences: usize,
    size: usize,
    sample_interval: usize,
    // Set by the first insertion.
    bidirectional: Option<bool>,
    metadata: Option<Metadata>,
}

// A sequence being inserted into the index.
struct Sequence {
    id: usize,
    path: Vec<usize>,
    // Number of path nodes already inserted; the endmarker does not count.
    depth: usize,
    // The node whose record receives the next symbol.
    curr: usize,
    // The offset of the new symbol in the record of `curr`.
    offset: usize,
}

impl Sequence {
    // The symbol to insert: the next node on the path.
    fn next_node(&self) -> usize {
        if self.depth < self.path.len() { self.path[self.depth] } else { ENDMARKER }
    }
}

//-----------------------------------------------------------------------------

/// Statistics.
impl DynamicGBWT {
    /// Default distance between sampled positions along a sequence.
    pub const SAMPLE_INTERVAL: usize = 1024;

    /// Creates an empty index with the default sample interval.
    pub fn new() -> Self {
        Self::with_sample_interval(Self::SAMPLE_INTERVAL)
    }

    /// Creates an empty index with the given sample interval.
    ///
    /// Interval `0` disables the samples, and `locate()` queries will fail.
    pub fn with_sample_interval(sample_interval: usize) -> Self {
        DynamicGBWT {
            records: vec![DynamicRecord::default()],
            sequences: 0,
            size: 0,
            sample_interval,
            bidirectional: None,
            metadata: None,
        }
    }

    /// Returns the number of sequences in the index.
    #[inline]
    pub fn sequences(&self) -> usize {
        self.sequences
    }

    /// Returns the total length of the sequences, including the endmarkers.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequences == 0
    }

    /// Returns the size of the alphabet, including the endmarker.
    #[inline]
    pub fn alphabet_size(&self) -> usize {
        self.records.len()
    }

    /// Returns the distance between sampled positions along a sequence.
    #[inline]
    pub fn sample_interval(&self) -> usize {
        self.sample_interval
    }

    /// Returns `true` if the index is bidirectional.
    #[inline]
    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional == Some(true)
    }

    /// Returns the total number of samples in the index.
    pub fn sample_count(&self) -> usize {
        self.records.iter().map(|record| record.samples()).sum()
    }

    /// Returns the record of the given node, or [`None`] if there is no such
    /// record.
    pub fn record(&self, node: usize) -> Option<&DynamicRecord> {
        self.records.get(node)
    }

    /// Returns the metadata of the index, if any.
    #[inline]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Sets the metadata of the index.
    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }
}

//-----------------------------------------------------------------------------

/// Insertion.
impl DynamicGBWT {
    /// Inserts a path into the index as a new sequence.
    ///
    /// An empty path is ignored. The sequence identifier of the path is
    /// [`DynamicGBWT::sequences`] before the insertion.
    ///
    /// # Errors
    ///
    /// [`GBWTError::BadInput`] if the path visits the endmarker or the index
    /// is bidirectional. The index is unchanged on error.
    pub fn insert(&mut self, path: &[usize]) -> Result<(), GBWTError> {
        if path.is_empty() {
            return Ok(());
        }
        if path.iter().any(|&node| node == ENDMARKER) {
            return Err(GBWTError::BadInput(String::from("the path visits the endmarker")));
        }
        if self.bidirectional == Some(true) {
            return Err(GBWTError::BadInput(String::from(
                "unidirectional insertion into a bidirectional index"
            )));
        }
        self.bidirectional = Some(false);
        self.insert_batch(vec![path.to_vec()])
    }

    /// Inserts a path into the index in both orientations.
    ///
    /// An empty path is ignored. The forward sequence gets identifier
    /// `2 * k` and the reverse sequence `2 * k + 1`, where `k` is the number
    /// of previously inserted paths.
    ///
    /// # Errors
    ///
    /// [`GBWTError::BadInput`] if a node on the path cannot be reversed or
    /// the index is unidirectional. The index is unchanged on error.
    pub fn insert_bidirectional(&mut self, path: &[usize]) -> Result<(), GBWTError> {
        if path.is_empty() {
            return Ok(());
        }
        if path.iter().any(|&node| node < 2) {
            return Err(GBWTError::BadInput(String::from(
                "the path visits a node without a reverse orientation"
            )));
        }
        if self.bidirectional == Some(false) {
            return Err(GBWTError::BadInput(String::from(
                "bidirectional insertion into a unidirectional index"
            )));
        }
        self.bidirectional = Some(true);
        self.insert_batch(vec![path.to_vec(), support::reverse_path(path)])
    }

    /// Builds an index from the given paths.
    ///
    /// Empty paths are skipped without taking a sequence identifier.
    pub fn from_paths(
        paths: &[Vec<usize>],
        sample_interval: usize,
        bidirectional: bool,
    ) -> Result<Self, GBWTError> {
        let mut result = Self::with_sample_interval(sample_interval);
        for path in paths {
            if bidirectional {
                result.insert_bidirectional(path)?;
            } else {
                result.insert(path)?;
            }
        }
        Ok(result)
    }

    // Inserts a batch of sequences with the classic BWT extension: all
    // sequences advance one step per iteration in sorted order. The next
    // insertion position only becomes final once every insertion of the
    // iteration has updated the records and the incoming counts.
    fn insert_batch(&mut self, paths: Vec<Vec<usize>>) -> Result<(), GBWTError> {
        debug_assert!(paths.iter().all(|path| !path.is_empty()), "Batches must not contain empty paths");

        let max_node = paths.iter().flat_map(|path| path.iter()).copied().max().unwrap_or(0);
        if max_node + 1 > self.records.len() {
            self.records.resize_with(max_node + 1, DynamicRecord::default);
        }

        let start_id = self.sequences;
        let mut active: Vec<Sequence> = paths.into_iter().enumerate().map(|(i, path)| Sequence {
            id: start_id + i,
            path,
            depth: 0,
            curr: ENDMARKER,
            offset: start_id + i,
        }).collect();
        self.sequences += active.len();
        self.size += active.iter().map(|seq| seq.path.len() + 1).sum::<usize>();

        while !active.is_empty() {
            active.sort_unstable_by_key(|seq| (seq.curr, seq.offset));

            // Insert the symbols of this iteration. A sample marks the
            // position if its depth matches the interval or the sequence
            // ends here.
            for seq in active.iter() {
                let next = seq.next_node();
                let record = &mut self.records[seq.curr];
                let outrank = match record.edge_to_linear(next) {
                    Some(outrank) => outrank,
                    None => record.add_outgoing(next),
                };
                record.insert_at(seq.offset, outrank);
                if self.sample_interval > 0
                    && (seq.depth % self.sample_interval == 0 || next == ENDMARKER)
                {
                    record.add_sample(seq.offset, seq.id);
                }
                self.records[next].increment(seq.curr);
            }

            // Determine the next positions. This must happen after all
            // insertions of the iteration, because the positions depend on
            // the updated bodies and incoming counts.
            let mut remaining: Vec<Sequence> = Vec::with_capacity(active.len());
            for mut seq in active {
                let next = seq.next_node();
                if next == ENDMARKER {
                    continue;
                }
                let outrank = self.records[seq.curr].edge_to_linear(next).ok_or_else(|| {
                    GBWTError::Internal(String::from("missing outgoing edge during insertion"))
                })?;
                let rank = self.records[seq.curr].rank_at(seq.offset, outrank);
                seq.offset = self.records[next].count_before(seq.curr) + rank;
                seq.curr = next;
                seq.depth += 1;
                remaining.push(seq);
            }
            active = remaining;
        }

        for record in self.records.iter_mut() {
            record.recode();
        }
        self.rebuild_offsets();
        Ok(())
    }

    // Rebuilds the cumulative offsets of all outgoing edges from the
    // incoming counts.
    fn rebuild_offsets(&mut self) {
        for node in 0..self.records.len() {
            let updates: Vec<(usize, usize)> = {
                let record = &self.records[node];
                let mut cumulative = 0;
                let mut result: Vec<(usize, usize)> = Vec::with_capacity(record.indegree());
                for inrank in 0..record.indegree() {
                    result.push((record.predecessor(inrank), cumulative));
                    cumulative += record.count(inrank);
                }
                result
            };
            for (predecessor, offset) in updates {
                if let Some(outrank) = self.records[predecessor].edge_to_linear(node) {
                    self.records[predecessor].set_offset(outrank, offset);
                } else {
                    debug_assert!(false, "An incoming edge without the outgoing counterpart");
                }
            }
        }
    }

    /// Finalises the index into a static [`GBWT`].
    pub fn into_gbwt(mut self) -> Result<GBWT, GBWTError> {
        for record in self.records.iter_mut() {
            record.recode();
            record.remove_unused_edges();
        }
        let bwt = RecordArray::from_records(&self.records)?;
        let samples = if self.sample_interval > 0 {
            DASamples::from_records(&self.records)?
        } else {
            None
        };

        let mut header = GBWTHeader::new();
        header.sequences = self.sequences;
        header.alphabet_size = self.records.len();
        header.sample_interval = self.sample_interval;
        if self.is_bidirectional() {
            header.set(GBWTHeader::FLAG_BIDIRECTIONAL);
        }

        GBWT::from_parts(header, None, bwt, samples, self.metadata)
    }
}

//-----------------------------------------------------------------------------

impl SequenceIndex for DynamicGBWT {
    fn sequences(&self) -> usize {
        self.sequences
    }

    fn alphabet_size(&self) -> usize {
        self.records.len()
    }

    fn contains(&self, node: usize) -> bool {
        node < self.records.len() && !self.records[node].is_empty()
    }

    fn count(&self, node: usize) -> usize {
        self.records.get(node).map(|record| record.size()).unwrap_or(0)
    }

    fn successor_at(&self, pos: Pos) -> Option<usize> {
        self.records.get(pos.node)?.successor_at(pos.offset)
    }

    fn lf(&self, pos: Pos) -> Option<Pos> {
        self.records.get(pos.node)?.lf(pos.offset)
    }

    fn lf_to(&self, pos: Pos, to: usize) -> Option<usize> {
        self.records.get(pos.node)?.lf_to(pos.offset, to)
    }

    fn follow(&self, state: &SearchState, to: usize) -> Option<SearchState> {
        let range = self.records.get(state.node)?.follow(state.range.clone(), to)?;
        Some(SearchState::new(to, range))
    }

    fn bd_follow(&self, state: &SearchState, to: usize) -> Option<(SearchState, usize)> {
        let (range, reverse_offset) =
            self.records.get(state.node)?.bd_follow(state.range.clone(), to)?;
        Some((SearchState::new(to, range), reverse_offset))
    }

    fn try_locate(&self, pos: Pos) -> Option<usize> {
        self.records.get(pos.node)?.try_sample(pos.offset)
    }

    fn start(&self, sequence: usize) -> Option<Pos> {
        self.records.first()?.lf(sequence)
    }
}

//-----------------------------------------------------------------------------
