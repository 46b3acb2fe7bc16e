//! Huffman tree construction, serialization, and symbol decoding.
//!
//! Trees are built from a frequency table with a min-priority queue. Equal
//! weights are ordered by creation sequence: leaves are numbered first in
//! ascending symbol order, then each merged node takes the next number. The
//! first node popped becomes the `0` child. This makes the tree, and thus
//! the encoded stream, a pure function of the frequency table.
//!
//! The serialized form is a presence bit followed by a preorder walk:
//! `0` for an internal node, `1` plus a fixed-width symbol for a leaf.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use techarc_core::{BitReader, BitWriter, Result, TechArcError};

/// Longest code the encoder will emit.
pub const MAX_CODE_LENGTH: u8 = 64;

/// A prefix code: `(bits, length)`, bits right-aligned.
pub type Code = (u64, u8);

fn corrupt(reader: &BitReader<'_>, message: impl Into<String>) -> TechArcError {
    TechArcError::corrupted(reader.position(), message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Leaf(u16),
    Internal { zero: usize, one: usize },
}

/// A Huffman tree over symbols `0..alphabet_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl HuffmanTree {
    /// Build a tree from per-symbol frequencies (`freqs[symbol]`).
    ///
    /// Symbols with zero frequency get no code. An all-zero table yields
    /// an empty tree.
    pub fn build(freqs: &[u64]) -> Self {
        let mut nodes = Vec::new();
        let mut heap = BinaryHeap::new();
        let mut sequence = 0u64;

        for (symbol, &weight) in freqs.iter().enumerate() {
            if weight > 0 {
                nodes.push(Node::Leaf(symbol as u16));
                heap.push(Reverse((weight, sequence, nodes.len() - 1)));
                sequence += 1;
            }
        }

        while heap.len() > 1 {
            let (Some(Reverse((w0, _, zero))), Some(Reverse((w1, _, one)))) =
                (heap.pop(), heap.pop())
            else {
                break;
            };
            nodes.push(Node::Internal { zero, one });
            heap.push(Reverse((w0 + w1, sequence, nodes.len() - 1)));
            sequence += 1;
        }

        let root = heap.pop().map(|Reverse((_, _, index))| index);
        Self { nodes, root }
    }

    /// Build a tree from the byte frequencies of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut freqs = [0u64; 256];
        for &byte in data {
            freqs[byte as usize] += 1;
        }
        Self::build(&freqs)
    }

    /// True if the tree has no symbols.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of distinct symbols in the tree.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// Compute the code for every symbol below `alphabet_size`.
    ///
    /// A single-leaf tree assigns the 1-bit code `0`.
    pub fn code_table(&self, alphabet_size: usize) -> Result<Vec<Option<Code>>> {
        let mut table = vec![None; alphabet_size];
        let Some(root) = self.root else {
            return Ok(table);
        };

        let mut stack = vec![(root, 0u64, 0u8)];
        while let Some((index, bits, len)) = stack.pop() {
            match self.nodes[index] {
                Node::Leaf(symbol) => {
                    let slot = table.get_mut(symbol as usize).ok_or_else(|| {
                        TechArcError::invalid_argument(format!(
                            "symbol {symbol} outside alphabet of {alphabet_size}"
                        ))
                    })?;
                    *slot = Some(if len == 0 { (0, 1) } else { (bits, len) });
                }
                Node::Internal { zero, one } => {
                    if len >= MAX_CODE_LENGTH {
                        return Err(TechArcError::invalid_argument(format!(
                            "Huffman code longer than {MAX_CODE_LENGTH} bits"
                        )));
                    }
                    stack.push((one, (bits << 1) | 1, len + 1));
                    stack.push((zero, bits << 1, len + 1));
                }
            }
        }

        Ok(table)
    }

    /// Write the presence bit and the preorder tree.
    pub fn serialize(&self, writer: &mut BitWriter, symbol_bits: u8) -> Result<()> {
        let Some(root) = self.root else {
            writer.write_bit(false);
            return Ok(());
        };
        writer.write_bit(true);

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            match self.nodes[index] {
                Node::Leaf(symbol) => {
                    writer.write_bit(true);
                    writer.write_bits(u64::from(symbol), symbol_bits)?;
                }
                Node::Internal { zero, one } => {
                    writer.write_bit(false);
                    stack.push(one);
                    stack.push(zero);
                }
            }
        }
        Ok(())
    }

    /// Read a tree written by [`HuffmanTree::serialize`].
    ///
    /// Leaves must name distinct symbols below `alphabet_size` and the tree
    /// may not be deeper than [`MAX_CODE_LENGTH`].
    pub fn deserialize(
        reader: &mut BitReader<'_>,
        symbol_bits: u8,
        alphabet_size: usize,
    ) -> Result<Self> {
        if !reader
            .read_bit()
            .map_err(|_| corrupt(reader, "missing tree marker"))?
        {
            return Ok(Self {
                nodes: Vec::new(),
                root: None,
            });
        }

        let mut nodes: Vec<Node> = Vec::new();
        let mut seen = vec![false; alphabet_size];
        // Internal nodes still waiting for children, with the `0` child once known.
        let mut pending: Vec<(usize, Option<usize>)> = Vec::new();
        let mut root = None;

        while root.is_none() {
            let is_leaf = reader
                .read_bit()
                .map_err(|_| corrupt(reader, "truncated Huffman tree"))?;

            let mut finished = if is_leaf {
                let symbol = reader
                    .read_bits(symbol_bits)
                    .map_err(|_| corrupt(reader, "truncated Huffman leaf"))?
                    as usize;
                if symbol >= alphabet_size || seen[symbol] {
                    return Err(corrupt(reader, format!("invalid leaf symbol {symbol}")));
                }
                seen[symbol] = true;
                nodes.push(Node::Leaf(symbol as u16));
                Some(nodes.len() - 1)
            } else {
                if pending.len() >= usize::from(MAX_CODE_LENGTH) || nodes.len() >= 2 * alphabet_size
                {
                    return Err(corrupt(reader, "Huffman tree too deep"));
                }
                nodes.push(Node::Internal { zero: 0, one: 0 });
                pending.push((nodes.len() - 1, None));
                None
            };

            while let Some(child) = finished.take() {
                match pending.last_mut() {
                    None => root = Some(child),
                    Some((_, slot @ None)) => *slot = Some(child),
                    Some((parent, Some(zero))) => {
                        let (parent, zero) = (*parent, *zero);
                        nodes[parent] = Node::Internal { zero, one: child };
                        pending.pop();
                        finished = Some(parent);
                    }
                }
            }
        }

        Ok(Self { nodes, root })
    }

    /// Decode one symbol by walking the tree.
    #[inline]
    pub fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let Some(mut index) = self.root else {
            return Err(TechArcError::corrupted(
                reader.position(),
                "decode with an empty Huffman tree",
            ));
        };

        if let Node::Leaf(symbol) = self.nodes[index] {
            return if reader.read_bit()? {
                Err(TechArcError::corrupted(
                    reader.position(),
                    "single-symbol stream contains a 1 bit",
                ))
            } else {
                Ok(symbol)
            };
        }

        loop {
            match self.nodes[index] {
                Node::Leaf(symbol) => return Ok(symbol),
                Node::Internal { zero, one } => {
                    index = if reader.read_bit()? { one } else { zero };
                }
            }
        }
    }
}
