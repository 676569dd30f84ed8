use super::*;

use crate::record::{DynamicRecord, Sample};

use simple_sds::serialize::Serialize;

//-----------------------------------------------------------------------------

// Three records: a normal one, an empty one, and one with a single edge.
fn example_records() -> Vec<DynamicRecord> {
    let mut first = DynamicRecord::default();
    first.add_outgoing(1);
    first.add_outgoing(2);
    for (offset, value) in [0, 1, 1, 0].iter().enumerate() {
        first.insert_at(offset, *value);
    }

    let second = DynamicRecord::default();

    let mut third = DynamicRecord::default();
    third.add_outgoing(1);
    third.insert_at(0, 0);
    third.insert_at(1, 0);

    vec![first, second, third]
}

//-----------------------------------------------------------------------------

#[test]
fn record_array() {
    let records = example_records();
    let array = RecordArray::from_records(&records).unwrap();

    assert_eq!(array.len(), 3, "Wrong number of records");
    assert!(!array.is_empty());
    assert_eq!(array.start(0), Some(0), "Wrong start for the first record");
    for id in 0..array.len() {
        let start = array.start(id).unwrap();
        let limit = array.limit(id).unwrap();
        assert!(start < limit, "Record {} is missing", id);
        if id + 1 < array.len() {
            assert_eq!(array.start(id + 1), Some(limit), "Records {} and {} are not adjacent", id, id + 1);
        } else {
            assert_eq!(limit, array.data_len(), "The last record does not end at the data");
        }
    }
    assert_eq!(array.start(3), None, "Got a start past the end");
    assert_eq!(array.limit(3), None, "Got a limit past the end");

    assert!(!array.is_empty_record(0));
    assert!(array.is_empty_record(1), "The empty record was not detected");
    assert!(!array.is_empty_record(2));
    assert!(array.is_empty_record(3), "A missing record is not empty");

    let sizes = array.validate().unwrap();
    assert_eq!(sizes, vec![4, 0, 2], "Wrong record sizes");

    let record = array.record(0).unwrap();
    assert_eq!(record.size(), 4);
    assert_eq!(record.outdegree(), 2);
    assert!(array.record(1).is_none(), "Got an empty record");
    assert_eq!(array.record(2).unwrap().successor(0), 1);
}

#[test]
fn record_array_serialize() {
    let array = RecordArray::from_records(&example_records()).unwrap();
    let mut bytes: Vec<u8> = Vec::new();
    array.serialize(&mut bytes).unwrap();
    assert_eq!(bytes.len(), array.size_in_bytes(), "Wrong serialized size");

    let mut cursor = bytes.as_slice();
    let loaded = RecordArray::load(&mut cursor).unwrap();
    assert_eq!(loaded.len(), array.len(), "Serialization changed the record count");
    for id in 0..array.len() {
        assert_eq!(loaded.bytes(id), array.bytes(id), "Serialization changed record {}", id);
    }
}

#[test]
fn record_array_rejects_garbage() {
    let encoded: Vec<Vec<u8>> = vec![vec![0], vec![3, 1]];
    let array = RecordArray::from_encoded(&encoded).unwrap();
    assert!(array.validate().is_err(), "Accepted a malformed record");
}

//-----------------------------------------------------------------------------

fn example_samples() -> (Vec<usize>, Vec<Vec<Sample>>) {
    let sizes = vec![3, 1, 5, 2];
    let samples = vec![
        vec![Sample::new(0, 10)],
        Vec::new(),
        vec![Sample::new(1, 11), Sample::new(4, 12)],
        Vec::new(),
    ];
    (sizes, samples)
}

#[test]
fn da_samples() {
    let (sizes, samples) = example_samples();
    let samples = DASamples::from_parts(&sizes, &samples).unwrap().unwrap();

    assert_eq!(samples.records(), 4, "Wrong number of records");
    assert_eq!(samples.len(), 3, "Wrong number of samples");
    assert!(samples.is_sampled(0));
    assert!(!samples.is_sampled(1));
    assert!(samples.is_sampled(2));
    assert!(!samples.is_sampled(3));
    assert!(!samples.is_sampled(4), "A missing record is sampled");

    assert_eq!(samples.try_locate(0, 0), Some(10));
    assert_eq!(samples.try_locate(0, 1), None);
    assert_eq!(samples.try_locate(2, 1), Some(11));
    assert_eq!(samples.try_locate(2, 4), Some(12));
    assert_eq!(samples.try_locate(2, 0), None);
    assert_eq!(samples.try_locate(1, 0), None);
    assert_eq!(samples.try_locate(3, 0), None);

    assert_eq!(samples.next_sample(2, 0), Some(Sample::new(1, 11)));
    assert_eq!(samples.next_sample(2, 2), Some(Sample::new(4, 12)));
    assert_eq!(samples.next_sample(0, 1), None, "Found a sample past the record");

    assert_eq!(samples.record_samples(2), vec![Sample::new(1, 11), Sample::new(4, 12)]);
    assert!(samples.record_samples(1).is_empty());
}

#[test]
fn da_samples_empty() {
    let sizes = vec![2, 3];
    let samples: Vec<Vec<Sample>> = vec![Vec::new(), Vec::new()];
    assert!(DASamples::from_parts(&sizes, &samples).unwrap().is_none(), "Built samples from nothing");
}

#[test]
fn da_samples_serialize() {
    let (sizes, samples) = example_samples();
    let samples = DASamples::from_parts(&sizes, &samples).unwrap().unwrap();
    let mut bytes: Vec<u8> = Vec::new();
    samples.serialize(&mut bytes).unwrap();
    assert_eq!(bytes.len(), samples.size_in_bytes(), "Wrong serialized size");

    let mut cursor = bytes.as_slice();
    let loaded = DASamples::load(&mut cursor).unwrap();
    assert_eq!(loaded.records(), samples.records());
    assert_eq!(loaded.len(), samples.len());
    for record in 0..samples.records() {
        assert_eq!(loaded.record_samples(record), samples.record_samples(record), "Serialization changed record {}", record);
    }
}

//-----------------------------------------------------------------------------
