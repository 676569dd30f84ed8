//! The container layer of the index: concatenated compressed records and
//! document array samples.

use crate::GBWTError;
use crate::record::{self, DynamicRecord, Record, Sample};
use crate::support;

use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Pack, PredSucc, Rank, Select, Vector};
use simple_sds::raw_vector::{AccessRaw, RawVector};
use simple_sds::serialize::Serialize;
use simple_sds::sparse_vector::{SparseBuilder, SparseVector};

use std::io;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// All compressed records of the index, concatenated into a flat byte buffer.
///
/// A sparse bitvector marks the starting offset of each record; the limit of
/// the last record is the length of the buffer.
#[derive(Clone, Debug)]
pub struct RecordArray {
    records: usize,
    index: SparseVector,
    data: Vec<u8>,
}

impl RecordArray {
    /// Builds the array from finalised dynamic records.
    ///
    /// The records must be recoded and free of unused edges.
    pub(crate) fn from_records(records: &[DynamicRecord]) -> Result<Self, GBWTError> {
        let mut data: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::with_capacity(records.len());
        for record in records {
            offsets.push(data.len());
            record.write_bwt(&mut data);
        }
        Self::finish(data, offsets)
    }

    /// Builds the array from pre-encoded records.
    pub(crate) fn from_encoded(encoded: &[Vec<u8>]) -> Result<Self, GBWTError> {
        let mut data: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::with_capacity(encoded.len());
        for bytes in encoded {
            offsets.push(data.len());
            data.extend_from_slice(bytes);
        }
        Self::finish(data, offsets)
    }

    fn finish(data: Vec<u8>, offsets: Vec<usize>) -> Result<Self, GBWTError> {
        let records = offsets.len();
        let mut builder = SparseBuilder::new(data.len().max(1), records)
            .map_err(|err| GBWTError::Internal(format!("record index: {}", err)))?;
        for offset in offsets {
            builder.set(offset);
        }
        let index = SparseVector::try_from(builder)
            .map_err(|err| GBWTError::Internal(format!("record index: {}", err)))?;
        Ok(RecordArray { records, index, data })
    }

    /// Returns the number of records in the array.
    #[inline]
    pub fn len(&self) -> usize {
        self.records
    }

    /// Returns `true` if the array contains no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Returns the size of the encoded data in bytes.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the starting offset of the given record.
    pub fn start(&self, record: usize) -> Option<usize> {
        if record >= self.records {
            return None;
        }
        self.index.select_iter(record).next().map(|(_, offset)| offset)
    }

    /// Returns the offset one past the end of the given record.
    pub fn limit(&self, record: usize) -> Option<usize> {
        if record >= self.records {
            return None;
        }
        if record + 1 < self.records {
            self.start(record + 1)
        } else {
            Some(self.data.len())
        }
    }

    /// Returns the encoded bytes of the given record.
    pub(crate) fn bytes(&self, record: usize) -> Option<&[u8]> {
        let start = self.start(record)?;
        let limit = self.limit(record)?;
        if start <= limit && limit <= self.data.len() {
            Some(&self.data[start..limit])
        } else {
            None
        }
    }

    /// Returns `true` if the given record is empty or does not exist.
    ///
    /// This only peeks at the header, which makes it cheaper than decoding
    /// the record.
    pub fn is_empty_record(&self, record: usize) -> bool {
        match self.bytes(record) {
            Some(bytes) => bytes.first() == Some(&0),
            None => true,
        }
    }

    /// Returns the given record, or [`None`] if the record is empty or does
    /// not exist.
    pub fn record(&self, id: usize) -> Option<Record<'_>> {
        Record::new(id, self.bytes(id)?)
    }

    // Decodes every record and returns their lengths. Fails on the first
    // malformed record.
    pub(crate) fn validate(&self) -> Result<Vec<usize>, GBWTError> {
        let mut sizes: Vec<usize> = Vec::with_capacity(self.records);
        for id in 0..self.records {
            let bytes = self.bytes(id).ok_or_else(|| GBWTError::CorruptRecord {
                record: id,
                reason: String::from("invalid start offsets"),
            })?;
            let size = record::validate_record(bytes)
                .map_err(|reason| GBWTError::CorruptRecord { record: id, reason })?;
            sizes.push(size);
        }
        Ok(sizes)
    }

    pub(crate) fn load_with_errors<T: io::Read>(reader: &mut T) -> Result<Self, GBWTError> {
        let data = support::load_bytes(reader)?;
        let index = SparseVector::load(reader)?;
        let records = index.count_ones();
        Ok(RecordArray { records, index, data })
    }
}

impl Serialize for RecordArray {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        support::serialize_bytes(&self.data, writer)?;
        self.index.serialize(writer)?;
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        Self::load_with_errors(reader).map_err(GBWTError::into_io)
    }

    fn size_in_elements(&self) -> usize {
        support::bytes_in_elements(self.data.len()) + self.index.size_in_elements()
    }
}

//-----------------------------------------------------------------------------

/// Sampled sequence identifiers for `locate()` queries.
///
/// Conceptually the structure stores, for some records, a sorted list of
/// (offset, sequence id) pairs. The sampled records are marked in a plain
/// bitvector, their concatenated offset ranges in one sparse bitvector, the
/// sampled offsets in another, and the sequence identifiers in a packed
/// integer vector.
#[derive(Clone, Debug)]
pub struct DASamples {
    // Does record i have samples?
    sampled_records: BitVector,
    // Map from the ranks of sampled records to their ranges in the
    // concatenation of all sampled records.
    bwt_ranges: SparseVector,
    // Sampled offsets in the concatenation.
    sampled_offsets: SparseVector,
    // Sequence identifiers in the same order.
    array: IntVector,
}

impl DASamples {
    /// Builds the samples from finalised dynamic records.
    ///
    /// Returns [`None`] if no record has samples.
    pub(crate) fn from_records(records: &[DynamicRecord]) -> Result<Option<Self>, GBWTError> {
        let sizes: Vec<usize> = records.iter().map(|record| record.size()).collect();
        let samples: Vec<Vec<Sample>> = records.iter().map(|record| record.sample_slice().to_vec()).collect();
        Self::from_parts(&sizes, &samples)
    }

    /// Builds the samples from record lengths and per-record sample lists.
    ///
    /// Returns [`None`] if all sample lists are empty.
    pub(crate) fn from_parts(sizes: &[usize], samples: &[Vec<Sample>]) -> Result<Option<Self>, GBWTError> {
        debug_assert_eq!(sizes.len(), samples.len(), "Record and sample counts do not match");
        let total_samples: usize = samples.iter().map(|list| list.len()).sum();
        if total_samples == 0 {
            return Ok(None);
        }

        let mut raw = RawVector::with_len(samples.len(), false);
        let mut range_total = 0;
        let mut sampled_count = 0;
        for (id, list) in samples.iter().enumerate() {
            if !list.is_empty() {
                raw.set_bit(id, true);
                range_total += sizes[id];
                sampled_count += 1;
            }
        }

        let mut ranges = SparseBuilder::new(range_total, sampled_count)
            .map_err(|err| GBWTError::Internal(format!("sample ranges: {}", err)))?;
        let mut offsets = SparseBuilder::new(range_total, total_samples)
            .map_err(|err| GBWTError::Internal(format!("sample offsets: {}", err)))?;
        let mut ids: Vec<u64> = Vec::with_capacity(total_samples);
        let mut base = 0;
        for (id, list) in samples.iter().enumerate() {
            if list.is_empty() {
                continue;
            }
            ranges.set(base);
            for sample in list {
                debug_assert!(sample.offset < sizes[id], "Sample offset is out of range");
                offsets.set(base + sample.offset);
                ids.push(sample.id as u64);
            }
            base += sizes[id];
        }

        let mut sampled_records = BitVector::from(raw);
        sampled_records.enable_rank();
        let bwt_ranges = SparseVector::try_from(ranges)
            .map_err(|err| GBWTError::Internal(format!("sample ranges: {}", err)))?;
        let sampled_offsets = SparseVector::try_from(offsets)
            .map_err(|err| GBWTError::Internal(format!("sample offsets: {}", err)))?;
        let mut array = IntVector::from(ids);
        array.pack();
        Ok(Some(DASamples {
            sampled_records,
            bwt_ranges,
            sampled_offsets,
            array,
        }))
    }

    /// Returns the number of records covered by the structure.
    #[inline]
    pub fn records(&self) -> usize {
        self.sampled_records.len()
    }

    /// Returns the total number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns `true` if there are no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the given record has samples.
    pub fn is_sampled(&self, record: usize) -> bool {
        record < self.records() && self.sampled_records.get(record)
    }

    // Returns the range of the record in the concatenation of sampled
    // records. Assumes that the record is sampled.
    fn sampled_range(&self, record: usize) -> Option<(usize, usize)> {
        let rank = self.sampled_records.rank(record);
        let base = self.bwt_ranges.select_iter(rank).next()?.1;
        let limit = if rank + 1 < self.bwt_ranges.count_ones() {
            self.bwt_ranges.select_iter(rank + 1).next()?.1
        } else {
            self.bwt_ranges.len()
        };
        Some((base, limit))
    }

    /// Returns the sampled sequence identifier at the given position, or
    /// [`None`] if the position has no sample.
    pub fn try_locate(&self, record: usize, offset: usize) -> Option<usize> {
        if !self.is_sampled(record) {
            return None;
        }
        let (base, _) = self.sampled_range(record)?;
        let pos = base + offset;
        let mut iter = self.sampled_offsets.successor(pos);
        match iter.next() {
            Some((rank, found)) if found == pos => Some(self.array.get(rank) as usize),
            _ => None,
        }
    }

    /// Returns the first sample in the record at or after the given offset.
    pub fn next_sample(&self, record: usize, offset: usize) -> Option<Sample> {
        if !self.is_sampled(record) {
            return None;
        }
        let (base, limit) = self.sampled_range(record)?;
        let mut iter = self.sampled_offsets.successor(base + offset);
        match iter.next() {
            Some((rank, found)) if found < limit => {
                Some(Sample::new(found - base, self.array.get(rank) as usize))
            }
            _ => None,
        }
    }

    // Returns all samples of the given record.
    pub(crate) fn record_samples(&self, record: usize) -> Vec<Sample> {
        let mut result: Vec<Sample> = Vec::new();
        if !self.is_sampled(record) {
            return result;
        }
        let (base, limit) = match self.sampled_range(record) {
            Some(range) => range,
            None => return result,
        };
        let mut iter = self.sampled_offsets.successor(base);
        while let Some((rank, pos)) = iter.next() {
            if pos >= limit {
                break;
            }
            result.push(Sample::new(pos - base, self.array.get(rank) as usize));
        }
        result
    }

    pub(crate) fn load_with_errors<T: io::Read>(reader: &mut T) -> Result<Self, GBWTError> {
        let mut sampled_records = BitVector::load(reader)?;
        sampled_records.enable_rank();
        let bwt_ranges = SparseVector::load(reader)?;
        let sampled_offsets = SparseVector::load(reader)?;
        let array = IntVector::load(reader)?;
        if sampled_offsets.count_ones() != array.len() {
            return Err(GBWTError::Truncated(String::from("sample counts do not match")));
        }
        if bwt_ranges.len() != sampled_offsets.len() {
            return Err(GBWTError::Truncated(String::from("sample ranges do not match the offsets")));
        }
        Ok(DASamples { sampled_records, bwt_ranges, sampled_offsets, array })
    }
}

impl Serialize for DASamples {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.sampled_records.serialize(writer)?;
        self.bwt_ranges.serialize(writer)?;
        self.sampled_offsets.serialize(writer)?;
        self.array.serialize(writer)?;
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        Self::load_with_errors(reader).map_err(GBWTError::into_io)
    }

    fn size_in_elements(&self) -> usize {
        self.sampled_records.size_in_elements()
            + self.bwt_ranges.size_in_elements()
            + self.sampled_offsets.size_in_elements()
            + self.array.size_in_elements()
    }
}

//-----------------------------------------------------------------------------
