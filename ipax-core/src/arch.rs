use goblin::mach::cputype::{
    CpuSubType, CpuType, CPU_TYPE_ARM, CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64,
};
use std::fmt;

/// One architecture entry of a fat header: which CPU it targets and where its
/// image lives inside the container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchitectureSlice {
    pub cpu_type: CpuType,
    pub cpu_subtype: CpuSubType,
    /// Byte offset of the embedded image from the start of the container.
    pub offset: u64,
    /// Declared length of the embedded image.
    pub size: u64,
}

impl ArchitectureSlice {
    pub fn family_name(&self) -> &'static str {
        family_name(self.cpu_type)
    }

    /// The canonical selection key for this slice.
    pub fn display_string(&self) -> String {
        display_string(self.family_name(), self.cpu_type, self.cpu_subtype)
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl fmt::Display for ArchitectureSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Human-readable family for a Mach-O CPU type.
pub fn family_name(cpu_type: CpuType) -> &'static str {
    match cpu_type {
        CPU_TYPE_X86 => "Intel x86",
        CPU_TYPE_X86_64 => "Intel x86_64",
        CPU_TYPE_ARM => "ARM",
        CPU_TYPE_ARM64 => "ARM64",
        _ => "Unknown",
    }
}

/// Codes are rendered as signed 32-bit decimals, so subtypes carrying capability
/// bits (e.g. arm64e's `0x80000002`) come out negative.
pub fn display_string(name: &str, cpu_type: CpuType, cpu_subtype: CpuSubType) -> String {
    format!(
        "{name} (CPU Type: {}, SubType: {})",
        cpu_type as i32, cpu_subtype as i32
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        assert_eq!(family_name(0x0000_0007), "Intel x86");
        assert_eq!(family_name(0x0100_0007), "Intel x86_64");
        assert_eq!(family_name(0x0000_000C), "ARM");
        assert_eq!(family_name(0x0100_000C), "ARM64");
        assert_eq!(family_name(0x0000_0012), "Unknown");
        assert_eq!(family_name(0), "Unknown");
    }

    #[test]
    fn test_display_string_format() {
        let slice = ArchitectureSlice {
            cpu_type: 0x0100_0007,
            cpu_subtype: 3,
            offset: 4096,
            size: 8192,
        };
        assert_eq!(
            slice.display_string(),
            "Intel x86_64 (CPU Type: 16777223, SubType: 3)"
        );
        assert_eq!(slice.to_string(), slice.display_string());
        assert_eq!(slice.end(), 12288);
    }

    #[test]
    fn test_high_bit_subtype_is_signed() {
        assert_eq!(
            display_string(family_name(0x0100_000C), 0x0100_000C, 0x8000_0002),
            "ARM64 (CPU Type: 16777228, SubType: -2147483646)"
        );
    }

    #[test]
    fn test_unknown_family_keeps_codes() {
        assert_eq!(
            display_string(family_name(18), 18, 100),
            "Unknown (CPU Type: 18, SubType: 100)"
        );
    }
}
