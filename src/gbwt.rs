//! The static index: compressed, immutable, and built for queries.

use crate::{ENDMARKER, GBWTError};
use crate::algorithms::{SearchState, SequenceIndex};
use crate::bwt::{DASamples, RecordArray};
use crate::headers::GBWTHeader;
use crate::metadata::Metadata;
use crate::record::{DecompressedRecord, Record};
use crate::support::Pos;

use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, Vector};
use simple_sds::serialize::Serialize;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::io;


//-----------------------------------------------------------------------------

/// The compressed, immutable index.
///
/// A static index is built by finalising a [`crate::DynamicGBWT`] or by
/// merging two static indexes. It supports the full query interface of
/// [`SequenceIndex`] and is safe to share between any number of reader
/// threads.
///
/// # Examples
///
/// ```
/// use gbwt::{DynamicGBWT, SequenceIndex};
///
/// let mut dynamic = DynamicGBWT::with_sample_interval(4);
/// dynamic.insert(&[2, 4, 6]).unwrap();
/// dynamic.insert(&[2, 4, 8]).unwrap();
/// let index = dynamic.into_gbwt().unwrap();
///
/// assert_eq!(index.sequences(), 2);
/// assert_eq!(index.find(&[2, 4]).len(), 2);
/// assert_eq!(index.find(&[4, 6]).len(), 1);
/// assert_eq!(index.extract(1), vec![2, 4, 8]);
/// ```
#[derive(Clone, Debug)]
pub struct GBWT {
    header: GBWTHeader,
    remap: Option<IntVector>,
    bwt: RecordArray,
    samples: Option<DASamples>,
    metadata: Option<Metadata>,
    // The endmarker is visited by every query that starts or extracts a
    // sequence, so we keep it decompressed.
    endmarker: DecompressedRecord,
    // Number of nodes with a non-empty record.
    node_count: usize,
}

//-----------------------------------------------------------------------------

/// Statistics.
impl GBWT {
    /// Returns the number of sequences in the index.
    #[inline]
    pub fn sequences(&self) -> usize {
        self.header.sequences
    }

    /// Returns `true` if the index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequences() == 0
    }

    /// Returns the size of the alphabet, including the endmarker.
    #[inline]
    pub fn alphabet_size(&self) -> usize {
        self.header.alphabet_size
    }

    /// Returns the number of nodes with a non-empty record.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns the number of records in the index.
    #[inline]
    pub fn records(&self) -> usize {
        self.bwt.len()
    }

    /// Returns the distance between sampled positions along a sequence, or
    /// `0` if the index has no samples.
    #[inline]
    pub fn sample_interval(&self) -> usize {
        self.header.sample_interval
    }

    /// Returns `true` if the index is bidirectional: each path is stored in
    /// both orientations.
    #[inline]
    pub fn is_bidirectional(&self) -> bool {
        self.header.is_set(GBWTHeader::FLAG_BIDIRECTIONAL)
    }

    /// Returns `true` if the index stores sampled sequence identifiers.
    #[inline]
    pub fn has_samples(&self) -> bool {
        self.samples.is_some()
    }

    /// Returns the metadata of the index, if any.
    #[inline]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

//-----------------------------------------------------------------------------

/// Records.
impl GBWT {
    // Maps an external node identifier to a record identifier.
    fn node_to_record(&self, node: usize) -> Option<usize> {
        match &self.remap {
            None => {
                if node < self.header.alphabet_size { Some(node) } else { None }
            }
            Some(remap) => {
                let mut low = 0;
                let mut high = remap.len();
                while low < high {
                    let mid = low + (high - low) / 2;
                    let value = remap.get(mid) as usize;
                    if value == node {
                        return Some(mid);
                    } else if value < node {
                        low = mid + 1;
                    } else {
                        high = mid;
                    }
                }
                None
            }
        }
    }

    /// Returns the record of the given node, or [`None`] if the record is
    /// empty or does not exist.
    pub fn record(&self, node: usize) -> Option<Record<'_>> {
        let id = self.node_to_record(node)?;
        Record::new(node, self.bwt.bytes(id)?)
    }

    // Samples of the record of the given node, with offsets local to the
    // record. Used by the merge engine.
    pub(crate) fn record_samples(&self, node: usize) -> Vec<crate::record::Sample> {
        match (&self.samples, self.node_to_record(node)) {
            (Some(samples), Some(id)) => samples.record_samples(id),
            _ => Vec::new(),
        }
    }
}

//-----------------------------------------------------------------------------

impl SequenceIndex for GBWT {
    fn sequences(&self) -> usize {
        self.header.sequences
    }

    fn alphabet_size(&self) -> usize {
        self.header.alphabet_size
    }

    fn contains(&self, node: usize) -> bool {
        match self.node_to_record(node) {
            Some(id) => !self.bwt.is_empty_record(id),
            None => false,
        }
    }

    fn count(&self, node: usize) -> usize {
        if node == ENDMARKER {
            return self.endmarker.size();
        }
        self.record(node).map(|record| record.size()).unwrap_or(0)
    }

    fn successor_at(&self, pos: Pos) -> Option<usize> {
        if pos.node == ENDMARKER {
            return self.endmarker.successor_at(pos.offset);
        }
        self.record(pos.node)?.successor_at(pos.offset)
    }

    fn lf(&self, pos: Pos) -> Option<Pos> {
        if pos.node == ENDMARKER {
            return self.endmarker.lf(pos.offset);
        }
        self.record(pos.node)?.lf(pos.offset)
    }

    fn lf_to(&self, pos: Pos, to: usize) -> Option<usize> {
        self.record(pos.node)?.lf_to(pos.offset, to)
    }

    fn follow(&self, state: &SearchState, to: usize) -> Option<SearchState> {
        let range = self.record(state.node)?.follow(state.range.clone(), to)?;
        Some(SearchState::new(to, range))
    }

    fn bd_follow(&self, state: &SearchState, to: usize) -> Option<(SearchState, usize)> {
        let (range, reverse_offset) = self.record(state.node)?.bd_follow(state.range.clone(), to)?;
        Some((SearchState::new(to, range), reverse_offset))
    }

    fn try_locate(&self, pos: Pos) -> Option<usize> {
        let samples = self.samples.as_ref()?;
        let id = self.node_to_record(pos.node)?;
        samples.try_locate(id, pos.offset)
    }

    fn start(&self, sequence: usize) -> Option<Pos> {
        self.endmarker.lf(sequence)
    }
}

//-----------------------------------------------------------------------------

/// Construction and serialization.
impl GBWT {
    pub(crate) fn from_parts(
        header: GBWTHeader,
        remap: Option<IntVector>,
        bwt: RecordArray,
        samples: Option<DASamples>,
        metadata: Option<Metadata>,
    ) -> Result<Self, GBWTError> {
        let mut header = header;
        if remap.is_some() { header.set(GBWTHeader::FLAG_REMAP); } else { header.unset(GBWTHeader::FLAG_REMAP); }
        if samples.is_some() { header.set(GBWTHeader::FLAG_DA_SAMPLES); } else { header.unset(GBWTHeader::FLAG_DA_SAMPLES); }
        if metadata.is_some() { header.set(GBWTHeader::FLAG_METADATA); } else { header.unset(GBWTHeader::FLAG_METADATA); }
        Self::finish(header, remap, bwt, samples, metadata)
    }

    // Validates the components and builds the final structure.
    fn finish(
        header: GBWTHeader,
        remap: Option<IntVector>,
        bwt: RecordArray,
        samples: Option<DASamples>,
        metadata: Option<Metadata>,
    ) -> Result<Self, GBWTError> {
        if let Some(remap) = &remap {
            if remap.len() != bwt.len() {
                return Err(GBWTError::Truncated(String::from("alphabet remap does not match the records")));
            }
            if remap.len() == 0 || remap.get(0) != ENDMARKER as u64 {
                return Err(GBWTError::UnsupportedVersion(String::from("the alphabet remap must contain the endmarker")));
            }
            for i in 1..remap.len() {
                if remap.get(i - 1) >= remap.get(i) {
                    return Err(GBWTError::UnsupportedVersion(String::from("the alphabet remap must be increasing")));
                }
            }
            if remap.get(remap.len() - 1) as usize >= header.alphabet_size {
                return Err(GBWTError::UnsupportedVersion(String::from("the alphabet remap exceeds the alphabet")));
            }
        } else if bwt.len() != header.alphabet_size {
            return Err(GBWTError::Truncated(String::from("record count does not match the alphabet size")));
        }

        let sizes = bwt.validate()?;
        if let Some(first) = sizes.first() {
            if *first != header.sequences {
                return Err(GBWTError::CorruptRecord {
                    record: ENDMARKER,
                    reason: String::from("endmarker size does not match the sequence count"),
                });
            }
        } else if header.sequences > 0 {
            return Err(GBWTError::Truncated(String::from("no records in a non-empty index")));
        }
        let node_count = sizes.iter().filter(|&&size| size > 0).count();

        for id in 0..bwt.len() {
            if let Some(record) = bwt.record(id) {
                for outrank in 0..record.outdegree() {
                    if record.successor(outrank) >= header.alphabet_size {
                        return Err(GBWTError::CorruptRecord {
                            record: id,
                            reason: String::from("successor node outside the alphabet"),
                        });
                    }
                }
            }
        }

        if let Some(samples) = &samples {
            if samples.records() != bwt.len() {
                return Err(GBWTError::Truncated(String::from("sample records do not match the index")));
            }
        }

        let endmarker = match bwt.record(ENDMARKER) {
            Some(record) => DecompressedRecord::from(&record),
            None => DecompressedRecord::default(),
        };

        Ok(GBWT { header, remap, bwt, samples, metadata, endmarker, node_count })
    }

    pub(crate) fn load_impl<T: io::Read>(reader: &mut T) -> Result<Self, GBWTError> {
        let header = GBWTHeader::load(reader)?;
        let remap = if header.is_set(GBWTHeader::FLAG_REMAP) {
            Some(IntVector::load(reader)?)
        } else {
            None
        };
        let bwt = RecordArray::load_with_errors(reader)?;
        let samples = if header.is_set(GBWTHeader::FLAG_DA_SAMPLES) {
            Some(DASamples::load_with_errors(reader)?)
        } else {
            None
        };
        let metadata = if header.is_set(GBWTHeader::FLAG_METADATA) {
            Some(Metadata::load_with_errors(reader)?)
        } else {
            None
        };
        Self::finish(header, remap, bwt, samples, metadata)
    }

    /// Loads an index from the given file.
    ///
    /// # Errors
    ///
    /// * [`GBWTError::Io`] if the file cannot be read.
    /// * [`GBWTError::BadMagic`] if the file is not a GBWT index.
    /// * [`GBWTError::UnsupportedVersion`] for unknown versions or flags.
    /// * [`GBWTError::Truncated`] if the file ends too early.
    /// * [`GBWTError::CorruptRecord`] if a record cannot be decoded.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self, GBWTError> {
        let file = File::open(filename)?;
        let mut reader = BufReader::new(file);
        Self::load_impl(&mut reader)
    }

    /// Writes the index to the given file.
    pub fn save<P: AsRef<Path>>(&self, filename: P) -> Result<(), GBWTError> {
        let file = File::create(filename)?;
        let mut writer = BufWriter::new(file);
        self.serialize(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl Serialize for GBWT {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.header.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        if let Some(remap) = &self.remap {
            remap.serialize(writer)?;
        }
        self.bwt.serialize(writer)?;
        if let Some(samples) = &self.samples {
            samples.serialize(writer)?;
        }
        if let Some(metadata) = &self.metadata {
            metadata.serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        Self::load_impl(reader).map_err(GBWTError::into_io)
    }

    fn size_in_elements(&self) -> usize {
        let mut result = GBWTHeader::size_in_elements();
        if let Some(remap) = &self.remap {
            result += remap.size_in_elements();
        }
        result += self.bwt.size_in_elements();
        if let Some(samples) = &self.samples {
            result += samples.size_in_elements();
        }
        if let Some(metadata) = &self.metadata {
            result += metadata.size_in_elements();
        }
        result
    }
}

//-----------------------------------------------------------------------------

/// A read-through record cache over a static index.
///
/// Decoding a record header on every step of an LF chain is wasteful when
/// queries keep returning to the same nodes. The cached index stores recently
/// used records and exposes the same query interface. The cache is reset when
/// it grows past its capacity.
///
/// The wrapper is not thread-safe. In multi-threaded workloads, each thread
/// should have its own wrapper over the shared parent index.
pub struct CachedGBWT<'a> {
    parent: &'a GBWT,
    cache: RefCell<HashMap<usize, Record<'a>>>,
}

impl<'a> CachedGBWT<'a> {
    /// Maximum number of cached records.
    pub const CACHE_SIZE: usize = 256;

    /// Creates a new cached index over the given parent.
    pub fn new(parent: &'a GBWT) -> Self {
        CachedGBWT {
            parent,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the underlying index.
    pub fn parent(&self) -> &'a GBWT {
        self.parent
    }

    /// Returns the number of records currently in the cache.
    pub fn cached_records(&self) -> usize {
        self.cache.borrow().len()
    }

    fn with_record<T, F: FnOnce(&Record<'a>) -> T>(&self, node: usize, f: F) -> Option<T> {
        let mut cache = self.cache.borrow_mut();
        if !cache.contains_key(&node) {
            let record = self.parent.record(node)?;
            if cache.len() >= Self::CACHE_SIZE {
                cache.clear();
            }
            cache.insert(node, record);
        }
        cache.get(&node).map(f)
    }
}

impl<'a> SequenceIndex for CachedGBWT<'a> {
    fn sequences(&self) -> usize {
        self.parent.sequences()
    }

    fn alphabet_size(&self) -> usize {
        self.parent.alphabet_size()
    }

    fn contains(&self, node: usize) -> bool {
        self.parent.contains(node)
    }

    fn count(&self, node: usize) -> usize {
        if node == ENDMARKER {
            return self.parent.endmarker.size();
        }
        self.with_record(node, |record| record.size()).unwrap_or(0)
    }

    fn successor_at(&self, pos: Pos) -> Option<usize> {
        if pos.node == ENDMARKER {
            return self.parent.endmarker.successor_at(pos.offset);
        }
        self.with_record(pos.node, |record| record.successor_at(pos.offset))?
    }

    fn lf(&self, pos: Pos) -> Option<Pos> {
        if pos.node == ENDMARKER {
            return self.parent.endmarker.lf(pos.offset);
        }
        self.with_record(pos.node, |record| record.lf(pos.offset))?
    }

    fn lf_to(&self, pos: Pos, to: usize) -> Option<usize> {
        self.with_record(pos.node, |record| record.lf_to(pos.offset, to))?
    }

    fn follow(&self, state: &SearchState, to: usize) -> Option<SearchState> {
        let range = self.with_record(state.node, |record| record.follow(state.range.clone(), to))??;
        Some(SearchState::new(to, range))
    }

    fn bd_follow(&self, state: &SearchState, to: usize) -> Option<(SearchState, usize)> {
        let (range, reverse_offset) =
            self.with_record(state.node, |record| record.bd_follow(state.range.clone(), to))??;
        Some((SearchState::new(to, range), reverse_offset))
    }

    fn try_locate(&self, pos: Pos) -> Option<usize> {
        self.parent.try_locate(pos)
    }

    fn start(&self, sequence: usize) -> Option<Pos> {
        self.parent.start(sequence)
    }
}

//-----------------------------------------------------------------------------
