/// 48-bit device address, stored in the little-endian order it travels in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// Marks an unused session record.
    pub const NULL: Self = Self([0; 6]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(raw))
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl core::fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice() {
        assert_eq!(BdAddr::from_slice(&[1, 2, 3]), None);
        let addr = BdAddr::from_slice(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(addr.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert!(!addr.is_null());
        assert!(BdAddr::default().is_null());
    }

    #[test]
    fn test_debug_is_msb_first() {
        let addr = BdAddr([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(format!("{:?}", addr), "11:22:33:44:55:66");
    }
}
