use super::*;

use crate::support;

//-----------------------------------------------------------------------------

// A record with outgoing edges to nodes 2 and 7 and body 0, 0, 1, 0, 1, 1
// (over outranks). The cumulative offsets are 3 for node 2 and 1 for node 7.
fn example_record() -> DynamicRecord {
    let mut record = DynamicRecord::default();
    record.add_outgoing(2);
    record.add_outgoing(7);
    for (offset, value) in [0, 0, 1, 0, 1, 1].iter().enumerate() {
        record.insert_at(offset, *value);
    }
    record.set_offset(0, 3);
    record.set_offset(1, 1);
    record
}

fn example_bytes() -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::new();
    example_record().write_bwt(&mut buffer);
    buffer
}

//-----------------------------------------------------------------------------

#[test]
fn dynamic_record_basics() {
    let record = example_record();
    assert_eq!(record.size(), 6, "Wrong size");
    assert!(!record.is_empty(), "The record is empty");
    assert_eq!(record.outdegree(), 2, "Wrong outdegree");
    assert_eq!(record.runs(), 4, "Wrong number of runs");
    assert_eq!(record.successor(0), 2);
    assert_eq!(record.successor(1), 7);
    assert_eq!(record.edge_to(2), Some(0));
    assert_eq!(record.edge_to(7), Some(1));
    assert_eq!(record.edge_to(4), None);
}

#[test]
fn dynamic_record_queries() {
    let record = example_record();
    let expected = [
        Pos::new(2, 3), Pos::new(2, 4), Pos::new(7, 1),
        Pos::new(2, 5), Pos::new(7, 2), Pos::new(7, 3),
    ];
    for (i, pos) in expected.iter().enumerate() {
        assert_eq!(record.lf(i), Some(*pos), "Wrong LF at offset {}", i);
        assert_eq!(record.successor_at(i), Some(pos.node), "Wrong successor at offset {}", i);
    }
    assert_eq!(record.lf(6), None, "Got an LF past the end");
    assert_eq!(record.successor_at(6), None, "Got a successor past the end");

    assert_eq!(record.lf_to(0, 2), Some(3));
    assert_eq!(record.lf_to(3, 2), Some(5));
    assert_eq!(record.lf_to(6, 2), Some(6));
    assert_eq!(record.lf_to(2, 4), None);
    assert_eq!(record.follow(0..6, 2), Some(3..6));
    assert_eq!(record.follow(0..6, 7), Some(1..4));
    assert_eq!(record.follow(2..3, 2), None, "Followed an edge with no occurrences in the range");
    assert_eq!(record.follow(0..0, 2), None, "Followed an empty range");
}

#[test]
fn dynamic_record_bd_follow() {
    let record = example_record();
    // flip(7) = 6 is not smaller than flip(2) = 3.
    assert_eq!(record.bd_follow(0..6, 2), Some((3..6, 0)));
    // All three occurrences of node 2 count for the reverse offset.
    assert_eq!(record.bd_follow(0..6, 7), Some((1..4, 3)));
    assert_eq!(record.bd_follow(2..5, 7), Some((1..3, 1)));
}

#[test]
fn dynamic_record_incoming() {
    let mut record = DynamicRecord::default();
    record.increment(4);
    record.increment(2);
    record.increment(4);
    assert_eq!(record.indegree(), 2, "Wrong indegree");
    assert_eq!(record.predecessor(0), 2, "The incoming edges are not sorted");
    assert_eq!(record.count(0), 1);
    assert_eq!(record.count(1), 2);
    assert_eq!(record.count_before(2), 0);
    assert_eq!(record.count_before(4), 1);
    assert_eq!(record.count_before(10), 3);
}

#[test]
fn run_insertion() {
    let mut record = DynamicRecord::default();
    record.add_outgoing(3);
    record.add_outgoing(5);

    // Build 0, 0, 0 and then split it in the middle.
    record.insert_at(0, 0);
    record.insert_at(1, 0);
    record.insert_at(2, 0);
    assert_eq!(record.runs(), 1, "Appending did not extend the run");
    record.insert_at(1, 1);
    assert_eq!(record.runs(), 3, "Inserting did not split the run");
    let symbols: Vec<usize> = (0..record.size()).map(|i| record.successor_at(i).unwrap()).collect();
    assert_eq!(symbols, vec![3, 5, 3, 3], "Wrong symbols after splitting");

    // Inserting at a run boundary extends the neighbour.
    record.insert_at(2, 1);
    let symbols: Vec<usize> = (0..record.size()).map(|i| record.successor_at(i).unwrap()).collect();
    assert_eq!(symbols, vec![3, 5, 5, 3, 3], "Wrong symbols after a boundary insertion");
    assert_eq!(record.runs(), 3, "A boundary insertion created a new run");
}

#[test]
fn sample_updates() {
    let mut record = DynamicRecord::default();
    record.add_outgoing(3);
    record.insert_at(0, 0);
    record.insert_at(1, 0);
    record.add_sample(0, 10);
    record.add_sample(1, 11);

    assert_eq!(record.try_sample(0), Some(10));
    assert_eq!(record.try_sample(1), Some(11));

    // An insertion in the middle shifts the later sample.
    record.insert_at(1, 0);
    assert_eq!(record.try_sample(0), Some(10), "The earlier sample moved");
    assert_eq!(record.try_sample(1), None, "The shifted offset still has a sample");
    assert_eq!(record.try_sample(2), Some(11), "The later sample did not shift");
    assert_eq!(record.next_sample(1), Some(Sample::new(2, 11)));
    assert_eq!(record.next_sample(3), None);
}

#[test]
fn recode_translates_the_body() {
    // The same record with the edges added in the wrong order.
    let mut record = DynamicRecord::default();
    record.add_outgoing(7);
    record.add_outgoing(2);
    for (offset, value) in [1, 1, 0, 1, 0, 0].iter().enumerate() {
        record.insert_at(offset, *value);
    }
    record.recode();
    record.set_offset(0, 3);
    record.set_offset(1, 1);
    assert_eq!(record, example_record(), "Recoding did not sort and translate");
    // Recoding a sorted record is a no-op.
    let copy = record.clone();
    record.recode();
    assert_eq!(record, copy, "Recoding a sorted record changed it");
}

#[test]
fn unused_edges() {
    let mut record = DynamicRecord::default();
    record.add_outgoing(2);
    record.add_outgoing(4);
    record.add_outgoing(7);
    for (offset, value) in [0, 2, 2].iter().enumerate() {
        record.insert_at(offset, *value);
    }
    record.remove_unused_edges();
    assert_eq!(record.outdegree(), 2, "The unused edge was not removed");
    assert_eq!(record.successor(0), 2);
    assert_eq!(record.successor(1), 7);
    assert_eq!(record.successor_at(1), Some(7), "The body was not rewritten");
}

//-----------------------------------------------------------------------------

#[test]
fn compressed_record() {
    let bytes = example_bytes();
    assert_eq!(validate_record(&bytes), Ok(6), "The encoding is not valid");

    let record = Record::new(5, &bytes).unwrap();
    let dynamic = example_record();
    assert_eq!(record.id(), 5);
    assert_eq!(record.outdegree(), dynamic.outdegree(), "Wrong outdegree");
    assert_eq!(record.size(), dynamic.size(), "Wrong size");
    assert_eq!(record.runs(), dynamic.runs(), "Wrong number of runs");
    for outrank in 0..record.outdegree() {
        assert_eq!(record.successor(outrank), dynamic.successor(outrank), "Wrong successor {}", outrank);
        assert_eq!(record.offset(outrank), dynamic.offset(outrank), "Wrong offset {}", outrank);
    }
    for i in 0..=record.size() {
        assert_eq!(record.lf(i), dynamic.lf(i), "Different LF at offset {}", i);
        assert_eq!(record.successor_at(i), dynamic.successor_at(i), "Different successor at offset {}", i);
        assert_eq!(record.lf_to(i, 2), dynamic.lf_to(i, 2), "Different LF to node 2 at offset {}", i);
        assert_eq!(record.lf_to(i, 7), dynamic.lf_to(i, 7), "Different LF to node 7 at offset {}", i);
    }
    assert_eq!(record.follow(0..6, 7), dynamic.follow(0..6, 7));
    assert_eq!(record.bd_follow(0..6, 7), dynamic.bd_follow(0..6, 7));
    assert_eq!(record.edge_to(4), None);
}

#[test]
fn decompressed_record() {
    let bytes = example_bytes();
    let record = Record::new(5, &bytes).unwrap();
    let decompressed = DecompressedRecord::from(&record);
    assert_eq!(decompressed.size(), record.size(), "Wrong size");
    assert_eq!(decompressed.outdegree(), record.outdegree(), "Wrong outdegree");
    for i in 0..=record.size() {
        assert_eq!(decompressed.lf(i), record.lf(i), "Different LF at offset {}", i);
        assert_eq!(decompressed.successor_at(i), record.successor_at(i), "Different successor at offset {}", i);
    }
}

#[test]
fn empty_record_encoding() {
    let mut buffer: Vec<u8> = Vec::new();
    DynamicRecord::default().write_bwt(&mut buffer);
    assert_eq!(buffer, vec![0], "Wrong encoding for an empty record");
    assert_eq!(validate_record(&buffer), Ok(0), "An empty record is not valid");
    assert!(Record::new(0, &buffer).is_none(), "Parsed an empty record");
}

#[test]
fn malformed_records() {
    // Truncated header.
    let bytes = example_bytes();
    assert!(validate_record(&bytes[0..2]).is_err(), "Accepted a truncated header");

    // Truncated body.
    assert!(validate_record(&bytes[0..bytes.len() - 1]).is_err(), "Accepted a truncated body");

    // Trailing bytes after an empty record.
    assert!(validate_record(&[0, 17]).is_err(), "Accepted trailing bytes");

    // Outrank past the outdegree.
    let mut buffer: Vec<u8> = Vec::new();
    support::write_byte_code(&mut buffer, 2); // outdegree
    support::write_byte_code(&mut buffer, 2); // successor 2
    support::write_byte_code(&mut buffer, 0);
    support::write_byte_code(&mut buffer, 3); // successor 5
    support::write_byte_code(&mut buffer, 0);
    support::write_byte_code(&mut buffer, 5); // invalid outrank
    support::write_byte_code(&mut buffer, 0);
    assert!(validate_record(&buffer).is_err(), "Accepted an invalid outrank");

    // Duplicate successor nodes.
    let mut buffer: Vec<u8> = Vec::new();
    support::write_byte_code(&mut buffer, 2);
    support::write_byte_code(&mut buffer, 2);
    support::write_byte_code(&mut buffer, 0);
    support::write_byte_code(&mut buffer, 0); // delta 0: duplicate
    support::write_byte_code(&mut buffer, 0);
    support::write_byte_code(&mut buffer, 0);
    support::write_byte_code(&mut buffer, 0);
    assert!(validate_record(&buffer).is_err(), "Accepted duplicate successors");

    // Edges but no runs.
    let mut buffer: Vec<u8> = Vec::new();
    support::write_byte_code(&mut buffer, 1);
    support::write_byte_code(&mut buffer, 2);
    support::write_byte_code(&mut buffer, 0);
    assert!(validate_record(&buffer).is_err(), "Accepted a record with edges but no runs");
}

//-----------------------------------------------------------------------------
