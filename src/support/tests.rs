use super::*;

use simple_sds::serialize::Serialize;

//-----------------------------------------------------------------------------

#[test]
fn node_encoding() {
    assert_eq!(encode_node(17, Orientation::Forward), 34);
    assert_eq!(encode_node(17, Orientation::Reverse), 35);
    for node in [2, 3, 34, 35, 1000] {
        assert_eq!(encode_node(node_id(node), node_orientation(node)), node, "Wrong roundtrip for node {}", node);
        assert_eq!(flip_node(flip_node(node)), node, "Flip is not an involution for node {}", node);
        assert_ne!(node_orientation(node), node_orientation(flip_node(node)), "Flip did not change the orientation of node {}", node);
    }
    assert_eq!(Orientation::Forward.flip(), Orientation::Reverse);
    assert_eq!(Orientation::Reverse.flip(), Orientation::Forward);
}

#[test]
fn path_encoding() {
    assert_eq!(encode_path(3, Orientation::Forward), 6);
    assert_eq!(encode_path(3, Orientation::Reverse), 7);
    assert_eq!(path_id(7), 3);
    assert_eq!(path_orientation(7), Orientation::Reverse);
    assert_eq!(flip_path(6), 7);
}

#[test]
fn path_reversal() {
    let path = vec![2, 4, 7];
    assert_eq!(reverse_path(&path), vec![6, 5, 3]);
    assert_eq!(reverse_path(&reverse_path(&path)), path);
    assert!(reverse_path(&[]).is_empty());
}

//-----------------------------------------------------------------------------

#[test]
fn byte_code() {
    let values = [0, 1, 42, 127, 128, 255, 256, 16383, 16384, 1 << 40, usize::MAX];
    let mut buffer: Vec<u8> = Vec::new();
    for value in values {
        write_byte_code(&mut buffer, value);
    }

    let mut cursor = ByteCursor::new(&buffer);
    for value in values {
        assert_eq!(cursor.read(), Some(value), "Wrong value");
    }
    assert!(cursor.is_done(), "Trailing bytes after the values");
    assert_eq!(cursor.read(), None, "Read past the end");
}

#[test]
fn byte_code_truncated() {
    let mut buffer: Vec<u8> = Vec::new();
    write_byte_code(&mut buffer, 100000);
    buffer.pop();
    let mut cursor = ByteCursor::new(&buffer);
    assert_eq!(cursor.read(), None, "Read a truncated value");
}

#[test]
fn byte_code_overflow() {
    // A value with more than 64 data bits.
    let buffer = vec![0xFF; 10];
    let mut cursor = ByteCursor::new(&buffer);
    assert_eq!(cursor.read(), None, "Read an overflowing value");
}

#[test]
fn run_encoding() {
    let runs = [(0, 1), (2, 5), (1, 1), (0, 300)];
    let mut buffer: Vec<u8> = Vec::new();
    for (value, len) in runs {
        write_run(&mut buffer, 3, value, len);
    }
    let mut cursor = ByteCursor::new(&buffer);
    for (value, len) in runs {
        assert_eq!(cursor.read_run(3), Some((value, len)), "Wrong run");
    }
    assert!(cursor.is_done(), "Trailing bytes after the runs");

    // With a unary alphabet, only the lengths are stored.
    let mut buffer: Vec<u8> = Vec::new();
    write_run(&mut buffer, 1, 0, 12);
    write_run(&mut buffer, 1, 0, 1);
    let mut cursor = ByteCursor::new(&buffer);
    assert_eq!(cursor.read_run(1), Some((0, 12)));
    assert_eq!(cursor.read_run(1), Some((0, 1)));
    assert!(cursor.is_done());

    // An empty alphabet cannot have runs.
    let mut cursor = ByteCursor::new(&[0, 0]);
    assert_eq!(cursor.read_run(0), None, "Read a run over an empty alphabet");
}

//-----------------------------------------------------------------------------

#[test]
fn empty_dictionary() {
    let empty = Dictionary::default();
    assert_eq!(empty.len(), 0, "Empty dictionary contains keys");
    assert!(empty.is_empty(), "Empty dictionary is not empty");
    assert_eq!(empty.find("key"), None, "Empty dictionary contains a key");
    assert_eq!(empty.key(0), None, "Empty dictionary returned a key");
}

#[test]
fn dictionary_keys() {
    let keys = ["first", "second", "third", "fourth", "fifth"];
    let dict = Dictionary::new(&keys);

    assert_eq!(dict.len(), keys.len(), "Wrong number of keys");
    assert!(!dict.is_empty(), "The dictionary is empty");
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(dict.key(i), Some(*key), "Wrong key {}", i);
        assert_eq!(dict.find(key), Some(i), "Wrong identifier for key {}", key);
    }
    assert_eq!(dict.find("key"), None, "Found a missing key");
    assert!(!dict.has_duplicates(), "False duplicates");
}

#[test]
fn dictionary_append() {
    let keys = ["first", "second", "third", "fourth", "fifth"];
    let all = Dictionary::new(&keys);
    let mut first = Dictionary::new(&keys[0..3]);
    let second = Dictionary::new(&keys[3..5]);

    let mut empty = Dictionary::default();
    empty.append(&first);
    assert_eq!(empty, first, "Appending to an empty dictionary does not work");

    first.append(&second);
    assert_eq!(first, all, "Appending to a non-empty dictionary does not work");
}

#[test]
fn dictionary_merging() {
    let first = Dictionary::new(&["first", "second", "third"]);
    let second = Dictionary::new(&["fifth", "first", "fourth"]);
    let merged = Dictionary::merged(&first, &second);

    assert_eq!(merged.len(), 5, "Wrong number of keys after merging");
    for key in ["first", "second", "third", "fourth", "fifth"] {
        assert!(merged.find(key).is_some(), "The merged dictionary does not contain {}", key);
    }
    // Keys of the first dictionary keep their identifiers.
    for i in 0..first.len() {
        assert_eq!(merged.key(i), first.key(i), "Key {} changed in the merge", i);
    }
}

#[test]
fn dictionary_duplicates() {
    let dict = Dictionary::new(&["alpha", "beta", "alpha"]);
    assert!(dict.has_duplicates(), "Duplicates were not detected");
}

#[test]
fn dictionary_remove() {
    let mut dict = Dictionary::new(&["first", "second", "third"]);
    dict.remove(1);
    assert_eq!(dict.len(), 2, "Wrong number of keys after removal");
    assert_eq!(dict.find("second"), None, "The removed key is still present");
    assert_eq!(dict.key(1), Some("third"), "Later keys did not shift");
    dict.remove(10);
    assert_eq!(dict.len(), 2, "Removing a missing key changed the dictionary");
}

#[test]
fn dictionary_serialize() {
    let dict = Dictionary::new(&["first", "second", "third", "fourth", "fifth"]);
    let mut bytes: Vec<u8> = Vec::new();
    dict.serialize(&mut bytes).unwrap();
    assert_eq!(bytes.len(), dict.size_in_bytes(), "Wrong serialized size");

    let mut cursor = bytes.as_slice();
    let loaded = Dictionary::load(&mut cursor).unwrap();
    assert_eq!(loaded, dict, "Serialization changed the dictionary");
}

//-----------------------------------------------------------------------------
