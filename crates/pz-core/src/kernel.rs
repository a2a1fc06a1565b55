use std::sync::OnceLock;

/// Instruction-set level a pixel routine may use.
///
/// Every level produces bit-identical results; only throughput differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kernel {
    /// Portable scalar code.
    Scalar,
    /// x86_64 SSE2 (baseline on every x86_64 CPU).
    Sse2,
    /// SSE2 + SSSE3 (`pmaddubsw`).
    Ssse3,
    /// SSSE3 + SSE4.1 (streaming aligned loads).
    Sse41,
}

impl Kernel {
    /// Best level supported by the running CPU. Detected once per process.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<Kernel> = OnceLock::new();
        *DETECTED.get_or_init(detect_uncached)
    }

    /// Clamps `self` to what the running CPU actually supports.
    ///
    /// Lets callers request a level without risking illegal instructions.
    pub fn supported(self) -> Self {
        self.min(Self::detect())
    }

    pub fn has_ssse3(self) -> bool {
        self >= Self::Ssse3
    }

    pub fn has_sse41(self) -> bool {
        self >= Self::Sse41
    }
}

#[cfg(target_arch = "x86_64")]
fn detect_uncached() -> Kernel {
    if is_x86_feature_detected!("sse4.1") && is_x86_feature_detected!("ssse3") {
        Kernel::Sse41
    } else if is_x86_feature_detected!("ssse3") {
        Kernel::Ssse3
    } else {
        Kernel::Sse2
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_uncached() -> Kernel {
    Kernel::Scalar
}
