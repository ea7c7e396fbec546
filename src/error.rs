/// Conditions with no safe degraded mode. The static memory layout or the
/// board configuration is inconsistent once one of these is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fatal {
    /// The default pool layout did not fit in the arena at boot.
    PoolMemAllocFail,
    /// A chunk the crate allocated itself was refused on free.
    InvalidPoolFree,
    /// The configured local name plus its address suffix overflows.
    LocalNameTooLong,
}

/// Terminal handler. Logs and hands over to the board's panic handler.
#[cold]
pub fn fatal(code: Fatal) -> ! {
    error!("fatal: {:?}", code);
    panic!("fatal error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "fatal error")]
    fn test_fatal_panics() {
        fatal(Fatal::InvalidPoolFree);
    }
}
