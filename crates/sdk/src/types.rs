//! Script VM value and identifier types

use std::fmt;

/// A script VM cell.
///
/// Every value exchanged with scripts is a 32-bit cell; floats are passed
/// by bit pattern.
pub type Cell = i32;

/// Identifier of a loaded script (plugin) inside the script VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptId(pub u32);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}

/// Opaque handle into the script VM's callback (forward) table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForwardRef(pub i32);

impl ForwardRef {
    /// Raw forward index as known by the VM
    pub fn index(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ForwardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forward#{}", self.0)
    }
}

/// Convert a float into a cell by bit pattern
#[inline]
pub fn float_to_cell(value: f32) -> Cell {
    value.to_bits() as Cell
}

/// Convert a cell back into the float it carries
#[inline]
pub fn cell_to_float(cell: Cell) -> f32 {
    f32::from_bits(cell as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_cell_bits() {
        let cell = float_to_cell(-2.5);
        assert_eq!(cell_to_float(cell), -2.5);
        assert_eq!(float_to_cell(1.0), 0x3F80_0000);
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(ScriptId(3).to_string(), "script#3");
        assert_eq!(ForwardRef(12).to_string(), "forward#12");
    }
}
