// Shared test utilities.

use crate::{DynamicGBWT, GBWT, SequenceIndex};
use crate::support;

use simple_sds::serialize::Serialize;

//-----------------------------------------------------------------------------

pub(crate) fn build_dynamic(paths: &[Vec<usize>], sample_interval: usize, bidirectional: bool) -> DynamicGBWT {
    let index = DynamicGBWT::from_paths(paths, sample_interval, bidirectional);
    assert!(index.is_ok(), "Failed to build a dynamic index: {}", index.unwrap_err());
    index.unwrap()
}

pub(crate) fn build_gbwt(paths: &[Vec<usize>], sample_interval: usize, bidirectional: bool) -> GBWT {
    let index = build_dynamic(paths, sample_interval, bidirectional).into_gbwt();
    assert!(index.is_ok(), "Failed to finalise the index: {}", index.unwrap_err());
    index.unwrap()
}

// The sequences actually stored in the index for the given input paths.
pub(crate) fn stored_sequences(paths: &[Vec<usize>], bidirectional: bool) -> Vec<Vec<usize>> {
    let mut result: Vec<Vec<usize>> = Vec::new();
    for path in paths {
        if path.is_empty() {
            continue;
        }
        result.push(path.clone());
        if bidirectional {
            result.push(support::reverse_path(path));
        }
    }
    result
}

// Checks that extraction returns the stored sequences.
pub(crate) fn check_extract<I: SequenceIndex>(index: &I, truth: &[Vec<usize>]) {
    assert_eq!(index.sequences(), truth.len(), "Wrong number of sequences");
    for (id, path) in truth.iter().enumerate() {
        assert_eq!(&index.extract(id), path, "Wrong sequence {}", id);
    }
    assert!(index.extract(truth.len()).is_empty(), "Got a sequence past the end");
}

// Number of occurrences of the pattern in the stored sequences, counted
// with multiplicity.
pub(crate) fn naive_count(truth: &[Vec<usize>], pattern: &[usize]) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    let mut result = 0;
    for path in truth {
        if path.len() < pattern.len() {
            continue;
        }
        for start in 0..=(path.len() - pattern.len()) {
            if &path[start..start + pattern.len()] == pattern {
                result += 1;
            }
        }
    }
    result
}

// Checks find() against a naive scan for every window of every stored
// sequence up to the given length, plus some patterns that should not match.
pub(crate) fn check_find<I: SequenceIndex>(index: &I, truth: &[Vec<usize>], max_len: usize) {
    for path in truth {
        for len in 1..=max_len.min(path.len()) {
            for start in 0..=(path.len() - len) {
                let pattern = &path[start..start + len];
                let expected = naive_count(truth, pattern);
                let state = index.find(pattern);
                assert_eq!(state.len(), expected, "Wrong number of matches for {:?}", pattern);
            }
        }
    }
    assert!(index.find(&[]).is_empty(), "An empty pattern matched");
    let absent = truth.iter().flat_map(|path| path.iter()).copied().max().unwrap_or(0) + 2;
    assert!(index.find(&[absent]).is_empty(), "A node outside the alphabet matched");
}

// Checks that locate() finds the correct sequence for every position, by
// comparing against the positions visited by extraction.
pub(crate) fn check_locate<I: SequenceIndex>(index: &I, truth: &[Vec<usize>]) {
    for id in 0..truth.len() {
        let mut pos = index.start(id);
        while let Some(position) = pos {
            if position.node == crate::ENDMARKER {
                break;
            }
            assert_eq!(
                index.locate(position), Some(id),
                "Wrong sequence for position ({}, {})", position.node, position.offset
            );
            pos = index.lf(position);
        }
    }
}

// Checks that two indexes answer the same queries.
pub(crate) fn check_equivalent<A: SequenceIndex, B: SequenceIndex>(first: &A, second: &B, max_len: usize) {
    assert_eq!(first.sequences(), second.sequences(), "Different sequence counts");
    let mut truth: Vec<Vec<usize>> = Vec::new();
    for id in 0..first.sequences() {
        let path = first.extract(id);
        assert_eq!(path, second.extract(id), "Different sequence {}", id);
        truth.push(path);
    }
    check_find(second, &truth, max_len);
    check_locate(second, &truth);
}

pub(crate) fn serialized(index: &GBWT) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::new();
    let result = index.serialize(&mut bytes);
    assert!(result.is_ok(), "Failed to serialize the index: {}", result.unwrap_err());
    bytes
}

//-----------------------------------------------------------------------------
