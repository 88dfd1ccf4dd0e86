//! Typed field access over raw data blocks
//!
//! Class and instance blocks are plain bytes. Mixin authors address
//! their fields by offset inside their own block; values are stored
//! little-endian. Out-of-range accesses panic like slice indexing does.

macro_rules! le_accessors {
    ($($get:ident, $set:ident, $ty:ty);* $(;)?) => {
        $(
            /// Read a little-endian field at `offset`
            fn $get(&self, offset: usize) -> $ty {
                let bytes = self.bytes();
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[offset..offset + std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(buf)
            }

            /// Write a little-endian field at `offset`
            fn $set(&mut self, offset: usize, value: $ty) {
                let end = offset + std::mem::size_of::<$ty>();
                self.bytes_mut()[offset..end].copy_from_slice(&value.to_le_bytes());
            }
        )*
    };
}

/// Field accessors for a byte-addressed block
pub trait ByteBlock {
    /// Underlying bytes
    fn bytes(&self) -> &[u8];

    /// Underlying bytes, mutable
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Read a boolean stored as one byte
    fn read_bool(&self, offset: usize) -> bool {
        self.bytes()[offset] != 0
    }

    /// Write a boolean as one byte
    fn write_bool(&mut self, offset: usize, value: bool) {
        self.bytes_mut()[offset] = value as u8;
    }

    le_accessors! {
        read_u32, write_u32, u32;
        read_i32, write_i32, i32;
        read_u64, write_u64, u64;
        read_i64, write_i64, i64;
        read_f64, write_f64, f64;
    }
}

impl ByteBlock for [u8] {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl ByteBlock for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trip() {
        let mut block = vec![0u8; 24];

        block.write_bool(0, true);
        block.write_u32(4, 0xdead_beef);
        block.write_f64(8, 1.5);
        block.write_i64(16, -9);

        assert!(block.read_bool(0));
        assert_eq!(block.read_u32(4), 0xdead_beef);
        assert_eq!(block.read_f64(8), 1.5);
        assert_eq!(block.read_i64(16), -9);
    }

    #[test]
    fn test_slice_view() {
        let mut block = vec![0u8; 8];
        block[4..].write_i32(0, 42);

        assert_eq!(block.read_i32(4), 42);
        assert_eq!(&block[..4], &[0, 0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        let block = vec![0u8; 2];
        block.read_u32(0);
    }
}
