use crate::bd_addr::BdAddr;
use crate::config::LOCAL_NAME_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NameError {
    TooLong,
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Writes `base` followed by the two low address bytes as four hex digits,
/// so boards sharing a firmware image stay distinguishable. Returns the
/// number of bytes written.
pub fn compose_local_name(base: &str, local: &BdAddr, out: &mut [u8]) -> Result<usize, NameError> {
    let base = base.as_bytes();
    let len = base.len() + 4;
    if len > LOCAL_NAME_MAX || len > out.len() {
        return Err(NameError::TooLong);
    }
    out[..base.len()].copy_from_slice(base);
    let a = local.as_bytes();
    for (i, byte) in [a[1], a[0]].iter().enumerate() {
        out[base.len() + i * 2] = HEX[(byte >> 4) as usize];
        out[base.len() + i * 2 + 1] = HEX[(byte & 0x0F) as usize];
    }
    Ok(len)
}

pub fn has_prefix(name: &[u8], prefix: &str) -> bool {
    name.starts_with(prefix.as_bytes())
}
