//! Merging two static indexes with bounded memory.
//!
//! The merge streams the sequences of the second index through the first one
//! and records where each BWT position of the second index lands. The
//! positions are bucketed by destination record through sorted,
//! zstd-compressed temporary files, and the destination records are then
//! rewritten one at a time. Neither input is materialised in uncompressed
//! form, so the memory usage stays within the configured buffers.
//!
//! Sequence identifiers from the second index are shifted by the number of
//! sequences in the first index. The result is equivalent to inserting the
//! paths of the second index into the first one.

use crate::{ENDMARKER, GBWTError};
use crate::algorithms::SequenceIndex;
use crate::bwt::{DASamples, RecordArray};
use crate::gbwt::{CachedGBWT, GBWT};
use crate::headers::GBWTHeader;
use crate::record::{Run, Sample};
use crate::support::{self, Pos};

use simple_sds::serialize;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Instant;


//-----------------------------------------------------------------------------

const MEGABYTE: usize = 1024 * 1024;

/// Parameters for the merge pipeline.
///
/// The defaults match common hardware; the limits keep misconfigured values
/// from exhausting memory or file descriptors.
#[derive(Clone, Debug)]
pub struct MergeParameters {
    /// Size of each producer buffer in megabytes.
    pub pos_buffer_size: usize,
    /// Size of the bucketing buffer in megabytes.
    pub thread_buffer_size: usize,
    /// Capacity of the queue between the producers and the bucketing thread.
    pub merge_buffers: usize,
    /// Number of sequences a producer claims at a time.
    pub chunk_size: usize,
    /// Number of producer and consumer threads.
    pub merge_jobs: usize,
    /// Print progress information to stderr.
    pub progress: bool,
}

impl MergeParameters {
    /// Default for `pos_buffer_size`.
    pub const POS_BUFFER_SIZE: usize = 64;
    /// Default for `thread_buffer_size`.
    pub const THREAD_BUFFER_SIZE: usize = 256;
    /// Default for `merge_buffers`.
    pub const MERGE_BUFFERS: usize = 6;
    /// Default for `chunk_size`.
    pub const CHUNK_SIZE: usize = 1;
    /// Default for `merge_jobs`.
    pub const MERGE_JOBS: usize = 4;

    /// Maximum buffer size in megabytes.
    pub const MAX_BUFFER_SIZE: usize = 16384;
    /// Maximum for `merge_buffers`.
    pub const MAX_MERGE_BUFFERS: usize = 16;
    /// Maximum for `merge_jobs`.
    pub const MAX_MERGE_JOBS: usize = 16;

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), GBWTError> {
        if self.pos_buffer_size == 0 || self.pos_buffer_size > Self::MAX_BUFFER_SIZE {
            return Err(GBWTError::BadInput(format!(
                "pos_buffer_size must be 1 to {} megabytes", Self::MAX_BUFFER_SIZE
            )));
        }
        if self.thread_buffer_size == 0 || self.thread_buffer_size > Self::MAX_BUFFER_SIZE {
            return Err(GBWTError::BadInput(format!(
                "thread_buffer_size must be 1 to {} megabytes", Self::MAX_BUFFER_SIZE
            )));
        }
        if self.merge_buffers == 0 || self.merge_buffers > Self::MAX_MERGE_BUFFERS {
            return Err(GBWTError::BadInput(format!(
                "merge_buffers must be 1 to {}", Self::MAX_MERGE_BUFFERS
            )));
        }
        if self.chunk_size == 0 {
            return Err(GBWTError::BadInput(String::from("chunk_size must be greater than 0")));
        }
        if self.merge_jobs == 0 || self.merge_jobs > Self::MAX_MERGE_JOBS {
            return Err(GBWTError::BadInput(format!(
                "merge_jobs must be 1 to {}", Self::MAX_MERGE_JOBS
            )));
        }
        Ok(())
    }

    // Producer buffer size in insertions.
    fn pos_buffer_insertions(&self) -> usize {
        (self.pos_buffer_size * MEGABYTE / std::mem::size_of::<Insertion>()).max(1)
    }

    // Bucketing buffer size in insertions.
    fn thread_buffer_insertions(&self) -> usize {
        (self.thread_buffer_size * MEGABYTE / std::mem::size_of::<Insertion>()).max(1)
    }
}

impl Default for MergeParameters {
    fn default() -> Self {
        MergeParameters {
            pos_buffer_size: Self::POS_BUFFER_SIZE,
            thread_buffer_size: Self::THREAD_BUFFER_SIZE,
            merge_buffers: Self::MERGE_BUFFERS,
            chunk_size: Self::CHUNK_SIZE,
            merge_jobs: Self::MERGE_JOBS,
            progress: false,
        }
    }
}

//-----------------------------------------------------------------------------

// One BWT position of the second index, expressed as an insertion into the
// first index. The derived order is the order in which the insertions must
// be applied: destination record, then the number of preceding positions
// from the first index, then the offset in the record of the second index.
// The last component makes the tie-break explicit: two insertions at the
// same position are applied in the BWT order of the second index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Insertion {
    // Destination node.
    node: usize,
    // Number of positions from the first index that precede this one in the
    // merged record.
    offset: usize,
    // Offset of the position in the record of the second index.
    source_offset: usize,
    // The symbol: the successor node of the position.
    value: usize,
}

impl Insertion {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&(self.node as u64).to_le_bytes())?;
        writer.write_all(&(self.offset as u64).to_le_bytes())?;
        writer.write_all(&(self.source_offset as u64).to_le_bytes())?;
        writer.write_all(&(self.value as u64).to_le_bytes())?;
        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Insertion {
            node: u64::from_le_bytes(buf[0..8].try_into().unwrap()) as usize,
            offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()) as usize,
            source_offset: u64::from_le_bytes(buf[16..24].try_into().unwrap()) as usize,
            value: u64::from_le_bytes(buf[24..32].try_into().unwrap()) as usize,
        })
    }
}

//-----------------------------------------------------------------------------

// A zstd-compressed temporary file holding a sorted run of insertions.
// The file is removed when the value is dropped.
struct TempFile {
    path: PathBuf,
    insertions: usize,
}

impl TempFile {
    fn create() -> io::Result<Self> {
        let path = serialize::temp_file_name("gbwt-merge");
        Ok(TempFile { path, insertions: 0 })
    }

    fn writer(&self) -> io::Result<BufWriter<zstd::Encoder<'static, File>>> {
        let file = File::create(&self.path)?;
        let encoder = zstd::Encoder::new(file, 3)?;
        Ok(BufWriter::new(encoder))
    }

    fn reader(&self) -> io::Result<zstd::Decoder<'static, BufReader<File>>> {
        let file = File::open(&self.path)?;
        zstd::Decoder::new(file)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

// Sorts the buffer and writes it to a new temporary file.
fn spill(buffer: &mut Vec<Insertion>) -> Result<TempFile, GBWTError> {
    buffer.sort_unstable();
    let mut temp = TempFile::create()?;
    temp.insertions = buffer.len();
    let mut writer = temp.writer()?;
    for insertion in buffer.iter() {
        insertion.serialize(&mut writer)?;
    }
    writer.into_inner()
        .map_err(|err| GBWTError::from(err.into_error()))?
        .finish()?;
    buffer.clear();
    Ok(temp)
}

// The output of the producer phase: sorted runs of insertions, either
// spilled to disk or still in memory.
struct InsertionRuns {
    files: Vec<TempFile>,
    tail: Vec<Insertion>,
}

impl InsertionRuns {
    fn total(&self) -> usize {
        self.files.iter().map(|file| file.insertions).sum::<usize>() + self.tail.len()
    }
}

//-----------------------------------------------------------------------------

// A multiway merge over the sorted runs, yielding insertions in increasing
// order.
struct InsertionStream {
    // Keeps the temporary files alive while the readers are open.
    _files: Vec<TempFile>,
    readers: Vec<zstd::Decoder<'static, BufReader<File>>>,
    buffers: Vec<VecDeque<Insertion>>,
    remaining: Vec<usize>,
    tail: std::vec::IntoIter<Insertion>,
    heap: BinaryHeap<Reverse<(Insertion, usize)>>,
}

impl InsertionStream {
    const BUFFER_SIZE: usize = 1024;

    fn new(runs: InsertionRuns) -> Result<Self, GBWTError> {
        let mut readers = Vec::with_capacity(runs.files.len());
        let mut buffers: Vec<VecDeque<Insertion>> = Vec::with_capacity(runs.files.len());
        let mut remaining: Vec<usize> = Vec::with_capacity(runs.files.len());
        for file in runs.files.iter() {
            readers.push(file.reader()?);
            buffers.push(VecDeque::new());
            remaining.push(file.insertions);
        }
        let mut result = InsertionStream {
            _files: runs.files,
            readers,
            buffers,
            remaining,
            tail: runs.tail.into_iter(),
            heap: BinaryHeap::new(),
        };
        for source in 0..result.readers.len() {
            result.fill_buffer(source)?;
            if let Some(insertion) = result.buffers[source].pop_front() {
                result.heap.push(Reverse((insertion, source)));
            }
        }
        let tail_source = result.readers.len();
        if let Some(insertion) = result.tail.next() {
            result.heap.push(Reverse((insertion, tail_source)));
        }
        Ok(result)
    }

    fn fill_buffer(&mut self, source: usize) -> Result<(), GBWTError> {
        let count = self.remaining[source].min(Self::BUFFER_SIZE);
        for _ in 0..count {
            let insertion = Insertion::deserialize(&mut self.readers[source])?;
            self.buffers[source].push_back(insertion);
        }
        self.remaining[source] -= count;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Insertion>, GBWTError> {
        let Reverse((insertion, source)) = match self.heap.pop() {
            Some(head) => head,
            None => return Ok(None),
        };
        if source < self.readers.len() {
            if self.buffers[source].is_empty() && self.remaining[source] > 0 {
                self.fill_buffer(source)?;
            }
            if let Some(next) = self.buffers[source].pop_front() {
                self.heap.push(Reverse((next, source)));
            }
        } else if let Some(next) = self.tail.next() {
            self.heap.push(Reverse((next, source)));
        }
        Ok(Some(insertion))
    }
}

//-----------------------------------------------------------------------------

// For each node, the starting offsets of the predecessor contributions in
// the record of the node. This recovers the incoming adjacency of a static
// index from the outgoing cumulative offsets in a single scan.
struct Borders {
    incoming: Vec<Vec<Pos>>,
    sizes: Vec<usize>,
}

impl Borders {
    fn new(index: &GBWT, alphabet_size: usize) -> Self {
        let mut incoming: Vec<Vec<Pos>> = vec![Vec::new(); alphabet_size];
        let mut sizes: Vec<usize> = vec![0; alphabet_size];
        for node in 0..index.alphabet_size() {
            if let Some(record) = index.record(node) {
                sizes[node] = record.size();
                for outrank in 0..record.outdegree() {
                    let successor = record.successor(outrank);
                    incoming[successor].push(Pos::new(node, record.offset(outrank)));
                }
            }
        }
        Borders { incoming, sizes }
    }

    // Number of positions in the record of `node` whose predecessor is
    // smaller than `from`.
    fn border(&self, node: usize, from: usize) -> usize {
        let list = &self.incoming[node];
        match list.binary_search_by_key(&from, |pos| pos.node) {
            Ok(inrank) => list[inrank].offset,
            Err(inrank) => {
                if inrank < list.len() {
                    list[inrank].offset
                } else {
                    self.sizes[node]
                }
            }
        }
    }
}

//-----------------------------------------------------------------------------

/// Merges two static indexes.
///
/// Sequence identifiers from `b` are shifted by `a.sequences()`. The result
/// answers every query as if the paths of `b` had been inserted into `a`.
/// Samples are carried over when both inputs have them; metadata is merged
/// when both inputs have it.
///
/// # Errors
///
/// * [`GBWTError::BadInput`] if the parameters are invalid or only one of
///   the inputs is bidirectional.
/// * [`GBWTError::Io`] / [`GBWTError::OutOfSpace`] if a temporary file
///   cannot be written.
///
/// No output is produced on error, and the temporary files are removed.
///
/// # Examples
///
/// ```
/// use gbwt::{DynamicGBWT, MergeParameters, SequenceIndex};
/// use gbwt::merge::merge;
///
/// let a = DynamicGBWT::from_paths(&[vec![2, 4, 6]], 4, false).unwrap().into_gbwt().unwrap();
/// let b = DynamicGBWT::from_paths(&[vec![2, 4, 8]], 4, false).unwrap().into_gbwt().unwrap();
///
/// let merged = merge(&a, &b, &MergeParameters::default()).unwrap();
/// assert_eq!(merged.sequences(), 2);
/// assert_eq!(merged.find(&[2, 4]).len(), 2);
/// assert_eq!(merged.extract(1), vec![2, 4, 8]);
/// ```
pub fn merge(a: &GBWT, b: &GBWT, params: &MergeParameters) -> Result<GBWT, GBWTError> {
    let cancel = AtomicBool::new(false);
    merge_cancellable(a, b, params, &cancel)
}

/// As [`merge`], but checks the cancellation flag at sequence and record
/// boundaries. Setting the flag makes the merge stop with
/// [`GBWTError::Cancelled`] and discard all partial output.
pub fn merge_cancellable(
    a: &GBWT,
    b: &GBWT,
    params: &MergeParameters,
    cancel: &AtomicBool,
) -> Result<GBWT, GBWTError> {
    params.validate()?;
    if a.is_bidirectional() != b.is_bidirectional() {
        return Err(GBWTError::BadInput(String::from(
            "cannot merge a bidirectional index with a unidirectional one"
        )));
    }

    let start_time = Instant::now();
    if params.progress {
        eprintln!(
            "Merging {} sequences into an index with {} sequences using {} job(s)",
            b.sequences(), a.sequences(), params.merge_jobs
        );
    }

    let alphabet_size = a.alphabet_size().max(b.alphabet_size());
    let a_borders = Borders::new(a, alphabet_size);
    let b_borders = Borders::new(b, alphabet_size);

    // Producer and bucket passes.
    let runs = produce(a, b, &a_borders, params, cancel)?;
    if params.progress {
        eprintln!(
            "Produced {} insertions in {} file(s) in {:.2} seconds",
            runs.total(), runs.files.len(), start_time.elapsed().as_secs_f64()
        );
    }

    // Samples survive only if every sequence of the output can be located.
    let samples_survive = (a.is_empty() || a.has_samples()) && (b.is_empty() || b.has_samples());
    let sample_interval = if samples_survive {
        a.sample_interval().max(b.sample_interval())
    } else {
        0
    };

    // Consumer pass.
    let (bwt, samples) = consume(
        a, b, &a_borders, &b_borders, alphabet_size, runs, samples_survive, params, cancel
    )?;

    let mut header = GBWTHeader::new();
    header.sequences = a.sequences() + b.sequences();
    header.alphabet_size = alphabet_size;
    header.sample_interval = sample_interval;
    if a.is_bidirectional() {
        header.set(GBWTHeader::FLAG_BIDIRECTIONAL);
    }

    let metadata = match (a.metadata(), b.metadata()) {
        (Some(first), Some(second)) => {
            let mut merged = first.clone();
            merged.merge(second, false, false);
            Some(merged)
        }
        _ => None,
    };

    let result = GBWT::from_parts(header, None, bwt, samples, metadata)?;
    if params.progress {
        eprintln!(
            "Merged {} sequences over {} nodes in {:.2} seconds",
            result.sequences(), result.node_count(), start_time.elapsed().as_secs_f64()
        );
    }
    Ok(result)
}

//-----------------------------------------------------------------------------

// The producer pass: walk each sequence of the second index, track the
// insertion position in the first index with LF steps, and push full
// position buffers into the bucket queue. The bucketing thread accumulates,
// sorts, and spills them.
fn produce(
    a: &GBWT,
    b: &GBWT,
    a_borders: &Borders,
    params: &MergeParameters,
    cancel: &AtomicBool,
) -> Result<InsertionRuns, GBWTError> {
    let pos_limit = params.pos_buffer_insertions();
    let bucket_limit = params.thread_buffer_insertions();
    let chunk_size = params.chunk_size;
    let next_chunk = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let error: Mutex<Option<GBWTError>> = Mutex::new(None);

    let joined = thread::scope(|scope| {
        let (sender, receiver) = mpsc::sync_channel::<Vec<Insertion>>(params.merge_buffers);

        let bucketer = scope.spawn(move || -> Result<InsertionRuns, GBWTError> {
            let mut runs = InsertionRuns { files: Vec::new(), tail: Vec::new() };
            let mut buffer: Vec<Insertion> = Vec::new();
            while let Ok(mut chunk) = receiver.recv() {
                buffer.append(&mut chunk);
                if buffer.len() >= bucket_limit {
                    runs.files.push(spill(&mut buffer)?);
                }
            }
            buffer.sort_unstable();
            runs.tail = buffer;
            Ok(runs)
        });

        for _ in 0..params.merge_jobs {
            let sender = sender.clone();
            let next_chunk = &next_chunk;
            let failed = &failed;
            let error = &error;
            scope.spawn(move || {
                let a_cache = CachedGBWT::new(a);
                let b_cache = CachedGBWT::new(b);
                let mut buffer: Vec<Insertion> = Vec::new();
                loop {
                    if cancel.load(Ordering::Relaxed) || failed.load(Ordering::Relaxed) {
                        return;
                    }
                    let chunk = next_chunk.fetch_add(1, Ordering::Relaxed);
                    let start = chunk * chunk_size;
                    if start >= b.sequences() {
                        break;
                    }
                    let limit = (start + chunk_size).min(b.sequences());
                    for sequence in start..limit {
                        let walked = walk_sequence(
                            &a_cache, &b_cache, a_borders, sequence, &mut buffer, pos_limit, &sender
                        );
                        if let Err(err) = walked {
                            if !failed.swap(true, Ordering::Relaxed) {
                                if let Ok(mut guard) = error.lock() {
                                    *guard = Some(err);
                                }
                            }
                            return;
                        }
                    }
                }
                if !buffer.is_empty() {
                    let _ = sender.send(std::mem::take(&mut buffer));
                }
            });
        }
        drop(sender);
        bucketer.join()
    });

    let runs = match joined {
        Ok(result) => result?,
        Err(_) => return Err(GBWTError::Internal(String::from("a producer thread panicked"))),
    };
    if cancel.load(Ordering::Relaxed) {
        return Err(GBWTError::Cancelled);
    }
    if failed.load(Ordering::Relaxed) {
        let stored = error.lock().ok().and_then(|mut guard| guard.take());
        return Err(stored.unwrap_or_else(|| GBWTError::Internal(String::from("producer failure"))));
    }
    Ok(runs)
}

// Emits the insertions for one sequence of the second index. The insertion
// position in the first index follows the same LF recurrence as the
// position in the second index; when the first index does not have the
// required edge, the border table gives the position directly.
fn walk_sequence(
    a: &CachedGBWT,
    b: &CachedGBWT,
    a_borders: &Borders,
    sequence: usize,
    buffer: &mut Vec<Insertion>,
    pos_limit: usize,
    sender: &mpsc::SyncSender<Vec<Insertion>>,
) -> Result<(), GBWTError> {
    let corrupt = || GBWTError::Internal(String::from("the source index is inconsistent"));

    let first = b.start(sequence).ok_or_else(corrupt)?;
    push_insertion(
        buffer,
        Insertion {
            node: ENDMARKER,
            offset: a.sequences(),
            source_offset: sequence,
            value: first.node,
        },
        pos_limit, sender,
    )?;

    let mut a_ins = lf_general(a, a_borders, Pos::new(ENDMARKER, a.sequences()), first.node);
    let mut b_pos = first;
    loop {
        let value = b.successor_at(b_pos).ok_or_else(corrupt)?;
        push_insertion(
            buffer,
            Insertion { node: b_pos.node, offset: a_ins, source_offset: b_pos.offset, value },
            pos_limit, sender,
        )?;
        if value == ENDMARKER {
            return Ok(());
        }
        a_ins = lf_general(a, a_borders, Pos::new(b_pos.node, a_ins), value);
        b_pos = b.lf(b_pos).ok_or_else(corrupt)?;
    }
}

fn push_insertion(
    buffer: &mut Vec<Insertion>,
    insertion: Insertion,
    pos_limit: usize,
    sender: &mpsc::SyncSender<Vec<Insertion>>,
) -> Result<(), GBWTError> {
    buffer.push(insertion);
    if buffer.len() >= pos_limit {
        // A closed queue means that the bucketing thread has failed; its
        // error takes precedence over this one.
        sender.send(std::mem::take(buffer)).map_err(|_| GBWTError::Cancelled)?;
    }
    Ok(())
}

// An LF step in the first index that also works when the record or the edge
// does not exist there.
fn lf_general(a: &CachedGBWT, borders: &Borders, pos: Pos, to: usize) -> usize {
    match a.lf_to(pos, to) {
        Some(offset) => offset,
        None => borders.border(to, pos.node),
    }
}

//-----------------------------------------------------------------------------

// The consumer pass: rebuild every record of the merged index. The main
// thread groups the sorted insertion stream by destination and the workers
// rewrite the records.
#[allow(clippy::too_many_arguments)]
fn consume(
    a: &GBWT,
    b: &GBWT,
    a_borders: &Borders,
    b_borders: &Borders,
    alphabet_size: usize,
    runs: InsertionRuns,
    samples_survive: bool,
    params: &MergeParameters,
    cancel: &AtomicBool,
) -> Result<(RecordArray, Option<DASamples>), GBWTError> {
    let mut stream = InsertionStream::new(runs)?;
    let failed = AtomicBool::new(false);
    let error: Mutex<Option<GBWTError>> = Mutex::new(None);
    let collected: Mutex<Vec<(usize, Vec<u8>, usize, Vec<Sample>)>> =
        Mutex::new(Vec::with_capacity(alphabet_size));
    let sequence_offset = a.sequences();

    thread::scope(|scope| -> Result<(), GBWTError> {
        let (sender, receiver) = mpsc::sync_channel::<(usize, Vec<Insertion>)>(params.merge_jobs * 2);
        let receiver = Arc::new(Mutex::new(receiver));

        for _ in 0..params.merge_jobs {
            let receiver = Arc::clone(&receiver);
            let collected = &collected;
            let failed = &failed;
            let error = &error;
            scope.spawn(move || {
                loop {
                    let work = match receiver.lock() {
                        Ok(guard) => guard.recv(),
                        Err(_) => return,
                    };
                    let (node, insertions) = match work {
                        Ok(work) => work,
                        Err(_) => return,
                    };
                    if failed.load(Ordering::Relaxed) {
                        // Keep draining the queue so that the driver never
                        // blocks on a full channel.
                        continue;
                    }
                    match rebuild_record(
                        a, b, a_borders, b_borders, node, &insertions, samples_survive, sequence_offset
                    ) {
                        Ok(result) => {
                            if let Ok(mut guard) = collected.lock() {
                                guard.push((node, result.0, result.1, result.2));
                            }
                        }
                        Err(err) => {
                            if !failed.swap(true, Ordering::Relaxed) {
                                if let Ok(mut guard) = error.lock() {
                                    *guard = Some(err);
                                }
                            }
                        }
                    }
                }
            });
        }

        let mut next = stream.next()?;
        for node in 0..alphabet_size {
            if cancel.load(Ordering::Relaxed) {
                return Err(GBWTError::Cancelled);
            }
            if failed.load(Ordering::Relaxed) {
                break;
            }
            let mut insertions: Vec<Insertion> = Vec::new();
            while let Some(insertion) = next {
                if insertion.node != node {
                    break;
                }
                insertions.push(insertion);
                next = stream.next()?;
            }
            sender.send((node, insertions))
                .map_err(|_| GBWTError::Internal(String::from("the consumer queue closed early")))?;
        }
        Ok(())
    })?;

    if failed.load(Ordering::Relaxed) {
        let stored = error.lock().ok().and_then(|mut guard| guard.take());
        return Err(stored.unwrap_or_else(|| GBWTError::Internal(String::from("consumer failure"))));
    }

    let mut results = collected.into_inner()
        .map_err(|_| GBWTError::Internal(String::from("the consumer results are poisoned")))?;
    if results.len() != alphabet_size {
        return Err(GBWTError::Internal(String::from("a consumer thread did not finish")));
    }
    results.sort_unstable_by_key(|result| result.0);

    let mut encoded: Vec<Vec<u8>> = Vec::with_capacity(alphabet_size);
    let mut sizes: Vec<usize> = Vec::with_capacity(alphabet_size);
    let mut samples: Vec<Vec<Sample>> = Vec::with_capacity(alphabet_size);
    for (_, bytes, size, record_samples) in results {
        encoded.push(bytes);
        sizes.push(size);
        samples.push(record_samples);
    }

    let bwt = RecordArray::from_encoded(&encoded)?;
    let da_samples = if samples_survive {
        DASamples::from_parts(&sizes, &samples)?
    } else {
        None
    };
    Ok((bwt, da_samples))
}

// Rebuilds one record of the merged index: the successor set becomes the
// union of both inputs, the cumulative offsets are the sums of the border
// positions, and the insertions interleave with the body of the first
// index. Samples from the first index shift by the number of insertions
// before them; samples from the second index land at the final positions of
// their insertions.
#[allow(clippy::too_many_arguments)]
fn rebuild_record(
    a: &GBWT,
    b: &GBWT,
    a_borders: &Borders,
    b_borders: &Borders,
    node: usize,
    insertions: &[Insertion],
    samples_survive: bool,
    sequence_offset: usize,
) -> Result<(Vec<u8>, usize, Vec<Sample>), GBWTError> {
    fn emit(runs: &mut Vec<Run>, value: usize) {
        match runs.last_mut() {
            Some(run) if run.value == value => run.len += 1,
            _ => runs.push(Run::new(value, 1)),
        }
    }

    let a_record = a.record(node);
    let a_edges: Vec<usize> = match &a_record {
        Some(record) => (0..record.outdegree()).map(|outrank| record.successor(outrank)).collect(),
        None => Vec::new(),
    };

    let mut successors: Vec<usize> = a_edges.clone();
    successors.extend(insertions.iter().map(|insertion| insertion.value));
    successors.sort_unstable();
    successors.dedup();

    let mut bytes: Vec<u8> = Vec::new();
    if successors.is_empty() {
        support::write_byte_code(&mut bytes, 0);
        return Ok((bytes, 0, Vec::new()));
    }

    support::write_byte_code(&mut bytes, successors.len());
    let mut prev = 0;
    for &successor in successors.iter() {
        let offset = a_borders.border(successor, node) + b_borders.border(successor, node);
        support::write_byte_code(&mut bytes, successor - prev);
        support::write_byte_code(&mut bytes, offset);
        prev = successor;
    }

    let outrank_of = |value: usize| -> Result<usize, GBWTError> {
        successors.binary_search(&value)
            .map_err(|_| GBWTError::Internal(String::from("unknown successor during merge")))
    };

    let a_runs: Vec<(usize, usize)> = match &a_record {
        Some(record) => record.run_iter().collect(),
        None => Vec::new(),
    };
    let a_samples = if samples_survive { a.record_samples(node) } else { Vec::new() };
    let b_samples = if samples_survive { b.record_samples(node) } else { Vec::new() };
    let mut a_sample_iter = a_samples.iter().peekable();
    let mut b_sample_iter = b_samples.iter().peekable();
    let mut samples: Vec<Sample> = Vec::new();

    let mut runs: Vec<Run> = Vec::new();
    let mut ins_iter = insertions.iter().peekable();
    let mut out_pos = 0;
    let mut a_consumed = 0;
    let mut a_run_index = 0;
    let mut a_run_used = 0;
    loop {
        let next_insertion = match ins_iter.peek() {
            Some(&&insertion) if insertion.offset <= a_consumed => ins_iter.next(),
            _ => None,
        };
        if let Some(insertion) = next_insertion {
            emit(&mut runs, outrank_of(insertion.value)?);
            if let Some(sample) = b_sample_iter.peek() {
                if sample.offset == insertion.source_offset {
                    samples.push(Sample::new(out_pos, sample.id + sequence_offset));
                    b_sample_iter.next();
                }
            }
            out_pos += 1;
        } else if a_run_index < a_runs.len() {
            let (value, len) = a_runs[a_run_index];
            emit(&mut runs, outrank_of(a_edges[value])?);
            if let Some(sample) = a_sample_iter.peek() {
                if sample.offset == a_consumed {
                    samples.push(Sample::new(out_pos, sample.id));
                    a_sample_iter.next();
                }
            }
            a_consumed += 1;
            out_pos += 1;
            a_run_used += 1;
            if a_run_used == len {
                a_run_index += 1;
                a_run_used = 0;
            }
        } else {
            break;
        }
    }
    debug_assert!(ins_iter.peek().is_none(), "Unapplied insertions remain");

    for run in runs.iter() {
        support::write_run(&mut bytes, successors.len(), run.value, run.len);
    }
    Ok((bytes, out_pos, samples))
}

//-----------------------------------------------------------------------------
