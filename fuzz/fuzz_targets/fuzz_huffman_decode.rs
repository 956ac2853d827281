#![no_main]
use huffpack::huffman::{decode_bytes, encode_bytes};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Coded input from the fuzzer: must not panic
    if let Ok(tree) = huffpack::huffman::HuffmanTree::read_from(&mut &data[..]) {
        if tree.total() <= 1 << 20 {
            let _ = decode_bytes(data);
        }
    }

    // Raw input: must round trip
    if !data.is_empty() {
        let coded = encode_bytes(data).unwrap();
        assert_eq!(decode_bytes(&coded).unwrap(), data);
    }
});
