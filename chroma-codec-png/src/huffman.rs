// Chroma
// Copyright (c) 2024 The Project Chroma Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `huffman` module converts code streams into a fixed-Huffman deflate block.
//!
//! Only the fixed literal/length and distance alphabets of RFC 1951 §3.2.6 are used, so there
//! is no table construction pass. Huffman codes are pushed most-significant bit first while
//! the block header and all extra-bits fields are pushed least-significant bit first; see
//! [`BitSink`] for why the distinction matters.
//!
//! Code streams from concurrent shards become bitstream fragments with no header and no
//! end-of-block marker. [`assemble_block`] joins the fragments with bit continuity into a
//! single deflate block carrying one header and one end-of-block code.

use chroma_core::io::BitSink;

use crate::lz::{Token, MAX_DISTANCE, MAX_MATCH, MIN_MATCH};

/// Base match length and extra-bit width for each length code 257..=285.
const LENGTH_CODES: [(usize, u32); 29] = [
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (7, 0),
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 1),
    (13, 1),
    (15, 1),
    (17, 1),
    (19, 2),
    (23, 2),
    (27, 2),
    (31, 2),
    (35, 3),
    (43, 3),
    (51, 3),
    (59, 3),
    (67, 4),
    (83, 4),
    (99, 4),
    (115, 4),
    (131, 5),
    (163, 5),
    (195, 5),
    (227, 5),
    (258, 0),
];

/// Base distance and extra-bit width for each distance code 0..=29.
const DISTANCE_CODES: [(usize, u32); 30] = [
    (1, 0),
    (2, 0),
    (3, 0),
    (4, 0),
    (5, 1),
    (7, 1),
    (9, 2),
    (13, 2),
    (17, 3),
    (25, 3),
    (33, 4),
    (49, 4),
    (65, 5),
    (97, 5),
    (129, 6),
    (193, 6),
    (257, 7),
    (385, 7),
    (513, 8),
    (769, 8),
    (1025, 9),
    (1537, 9),
    (2049, 10),
    (3073, 10),
    (4097, 11),
    (6145, 11),
    (8193, 12),
    (12_289, 12),
    (16_385, 13),
    (24_577, 13),
];

/// Pushes the fixed-Huffman code for a literal/length symbol 0..=287.
#[inline]
fn push_symbol(sink: &mut BitSink, sym: u32) {
    if sym < 144 {
        sink.push_bits_msb(0x30 + sym, 8);
    }
    else if sym < 256 {
        sink.push_bits_msb(0x190 + sym - 144, 9);
    }
    else if sym < 280 {
        sink.push_bits_msb(sym - 256, 7);
    }
    else {
        sink.push_bits_msb(0xc0 + sym - 280, 8);
    }
}

/// Pushes a match length: the length code MSB-first, then its extra bits LSB-first.
fn push_length(sink: &mut BitSink, len: usize) {
    assert!(len >= MIN_MATCH && len <= MAX_MATCH, "match length {} outside 3..=258", len);

    let idx = LENGTH_CODES.partition_point(|&(base, _)| base <= len) - 1;
    let (base, extra) = LENGTH_CODES[idx];

    push_symbol(sink, 257 + idx as u32);
    if extra > 0 {
        sink.push_bits_lsb((len - base) as u32, extra);
    }
}

/// Pushes a match distance: the 5-bit distance code MSB-first, then its extra bits LSB-first.
fn push_distance(sink: &mut BitSink, dist: usize) {
    assert!(dist >= 1 && dist <= MAX_DISTANCE, "match distance {} outside 1..=32768", dist);

    let idx = DISTANCE_CODES.partition_point(|&(base, _)| base <= dist) - 1;
    let (base, extra) = DISTANCE_CODES[idx];

    sink.push_bits_msb(idx as u32, 5);
    if extra > 0 {
        sink.push_bits_lsb((dist - base) as u32, extra);
    }
}

/// Emits one code stream as a headerless bitstream fragment without an end-of-block marker.
pub fn emit_fragment(tokens: &[Token]) -> BitSink {
    let mut sink = BitSink::with_capacity(tokens.len());

    for token in tokens {
        if token.is_end() {
            break;
        }

        if token.is_reference() {
            push_length(&mut sink, token.length());
            push_distance(&mut sink, token.distance());
        }
        else {
            push_symbol(&mut sink, u32::from(token.literal_value()));
        }
    }

    sink
}

/// Concatenates fragments into one complete deflate block: the three-bit header (BFINAL = 1,
/// BTYPE = 01), each fragment in order with bit continuity preserved, and a single end-of-block
/// code, flushed to whole bytes.
pub fn assemble_block(fragments: &[BitSink]) -> Vec<u8> {
    let n_bytes: u64 = fragments.iter().map(|f| f.num_bits() / 8 + 1).sum();
    let mut sink = BitSink::with_capacity(n_bytes as usize + 2);

    // BFINAL = 1: this is the only block in the stream.
    sink.push_bits_lsb(1, 1);
    // BTYPE = 01: fixed Huffman codes.
    sink.push_bits_lsb(0b01, 2);

    for fragment in fragments {
        sink.append_fragment(fragment);
    }

    // End-of-block: literal/length symbol 256.
    push_symbol(&mut sink, 256);

    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lz::Token;

    use chroma_core::io::BitSink;

    fn bits_of(sink: BitSink) -> Vec<u8> {
        sink.finish()
    }

    #[test]
    fn verify_literal_codes() {
        // Literal 0 is the 8-bit code 0011_0000; MSB-first emission reverses it into the byte.
        let mut sink = BitSink::new();
        push_symbol(&mut sink, 0);
        assert_eq!(bits_of(sink), &[0b0000_1100]);

        // Literal 143 is 1011_1111.
        let mut sink = BitSink::new();
        push_symbol(&mut sink, 143);
        assert_eq!(bits_of(sink), &[0b1111_1101]);

        // Literal 144 is the 9-bit code 1_1001_0000.
        let mut sink = BitSink::new();
        push_symbol(&mut sink, 144);
        let bytes = bits_of(sink);
        assert_eq!(bytes.len(), 2);
        assert_eq!(bytes[0], 0b0001_0011);
        assert_eq!(bytes[1], 0b0000_0000);

        // Literal 255 is 1_1111_1111.
        let mut sink = BitSink::new();
        push_symbol(&mut sink, 255);
        assert_eq!(bits_of(sink), &[0xff, 0x01]);
    }

    #[test]
    fn verify_end_of_block_code() {
        // Symbol 256 is seven zero bits.
        let mut sink = BitSink::new();
        push_symbol(&mut sink, 256);
        assert_eq!(sink.num_bits(), 7);
        assert_eq!(bits_of(sink), &[0x00]);
    }

    #[test]
    fn verify_length_code_boundaries() {
        // (length, expected code, expected extra width, expected extra value)
        let cases = [
            (3, 257, 0, 0),
            (10, 264, 0, 0),
            (11, 265, 1, 0),
            (12, 265, 1, 1),
            (13, 266, 1, 0),
            (18, 268, 1, 1),
            (19, 269, 2, 0),
            (114, 279, 4, 15),
            (115, 280, 4, 0),
            (130, 280, 4, 15),
            (131, 281, 5, 0),
            (257, 284, 5, 30),
            (258, 285, 0, 0),
        ];

        for (len, code, extra_w, extra_v) in cases {
            let mut sink = BitSink::new();
            push_length(&mut sink, len);

            let mut expect = BitSink::new();
            push_symbol(&mut expect, code);
            if extra_w > 0 {
                expect.push_bits_lsb(extra_v, extra_w);
            }

            assert_eq!(bits_of(sink), bits_of(expect), "len={}", len);
        }
    }

    #[test]
    fn verify_distance_code_boundaries() {
        let cases = [
            (1, 0, 0, 0),
            (4, 3, 0, 0),
            (5, 4, 1, 0),
            (6, 4, 1, 1),
            (7, 5, 1, 0),
            (8, 5, 1, 1),
            (9, 6, 2, 0),
            (12, 6, 2, 3),
            (24_576, 28, 13, 8191),
            (24_577, 29, 13, 0),
            (32_768, 29, 13, 8191),
        ];

        for (dist, code, extra_w, extra_v) in cases {
            let mut sink = BitSink::new();
            push_distance(&mut sink, dist);

            let mut expect = BitSink::new();
            expect.push_bits_msb(code, 5);
            if extra_w > 0 {
                expect.push_bits_lsb(extra_v, extra_w);
            }

            assert_eq!(bits_of(sink), bits_of(expect), "dist={}", dist);
        }
    }

    #[test]
    fn verify_assemble_single_literal() {
        // One literal zero: header 1 + 01, code 0011_0000, EOB 0000000, padded to two bytes.
        let tokens = [Token::literal(0), Token::END];
        let block = assemble_block(&[emit_fragment(&tokens)]);

        // Stream bits: 1, 1, 0 (header LSB-first), then 0011_0000 MSB-first, then seven EOB
        // zeros, padded out to whole bytes.
        assert_eq!(block, &[0b0110_0011, 0b0000_0000, 0b0000_0000]);
    }

    #[test]
    fn verify_assemble_inflates() {
        let tokens = [
            Token::literal(b'h'),
            Token::literal(b'e'),
            Token::literal(b'l'),
            Token::literal(b'l'),
            Token::literal(b'o'),
            Token::reference(5, 5),
            Token::END,
        ];
        let block = assemble_block(&[emit_fragment(&tokens)]);

        let out = miniz_oxide::inflate::decompress_to_vec(&block).expect("inflate");
        assert_eq!(out, b"hellohello");
    }

    #[test]
    fn verify_fragment_concatenation_inflates() {
        // Splitting a stream into fragments at token boundaries must inflate to the same bytes
        // as the unsplit stream, regardless of the bit phase at each seam.
        let mut tokens = Vec::new();
        for i in 0..64u32 {
            tokens.push(Token::literal((i * 37 % 251) as u8));
            // 9-bit literals to force odd bit phases.
            tokens.push(Token::literal(200 + (i % 50) as u8));
        }
        tokens.push(Token::END);

        let whole = assemble_block(&[emit_fragment(&tokens)]);
        let reference = miniz_oxide::inflate::decompress_to_vec(&whole).expect("inflate");

        for split in [1, 3, 50, 127] {
            let mut head = tokens[..split].to_vec();
            head.push(Token::END);
            let tail = tokens[split..].to_vec();

            let block = assemble_block(&[emit_fragment(&head), emit_fragment(&tail)]);
            let out = miniz_oxide::inflate::decompress_to_vec(&block).expect("inflate");
            assert_eq!(out, reference, "split={}", split);
        }
    }
}
