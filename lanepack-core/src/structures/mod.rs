mod bit_math;
mod lane_transform;
mod paths;
mod reference;
pub mod simd;
mod word_io;
mod word_packer;

pub use bit_math::{MASKS8, MASKS16, MASKS32, MASKS64, low_mask, replicated_mask, sub_mask};
pub use lane_transform::{LaneSplit, PAIR_COUNT, collapse, expand, widen_to_pairs};
pub use paths::{
    BitPacker, BitPacker32, BitPacker64, DispatchTable, Kernel, PackWord, PackedWords, Route,
    default_packer32, default_packer64, pack32, pack64, unpack_interleaved_pairs32,
    unpack_interleaved_pairs64, unpack32, unpack64, validate_bits,
};
pub use reference::ReferenceCodec;
pub use word_io::{WordIo, read_block, read_words, write_words};
pub use word_packer::{
    LaneSink, Packer32x4, Packer64x2, PairSink, SliceSink, Word, WordPacker,
};
