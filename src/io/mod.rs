mod cursor;
mod endian;
mod source;

pub use cursor::{decode_text, ByteCursor, TextEncoding};
pub use endian::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, ByteOrder,
};
pub use source::read_file;
