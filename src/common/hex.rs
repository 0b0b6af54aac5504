//! Hex dump formatter for trace logging

use std::fmt;

/// Bytes per output row
const ROW_WIDTH: usize = 16;

/// `Display` adapter that renders a byte slice as a hex dump
///
/// ```
/// use retry_relay::common::HexDump;
///
/// let dump = HexDump::new(Some(&[0x00, 0x02, 0xab, 0xcd]));
/// assert_eq!(dump.to_string(), "[Data Length: 4]\n0x00 0x02 0xab 0xcd ");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a> {
    data: Option<&'a [u8]>,
}

impl<'a> HexDump<'a> {
    /// Wrap a (possibly absent) byte slice
    pub fn new(data: Option<&'a [u8]>) -> Self {
        Self { data }
    }
}

impl<'a> From<&'a [u8]> for HexDump<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(Some(data))
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(data) = self.data else {
            return write!(f, "(null)");
        };

        writeln!(f, "[Data Length: {}]", data.len())?;
        for (i, byte) in data.iter().enumerate() {
            if i > 0 && i % ROW_WIDTH == 0 {
                writeln!(f)?;
            }
            write!(f, "0x{:02x} ", byte)?;
        }
        Ok(())
    }
}
