//! Validator and strip flags

use bitflags::bitflags;

bitflags! {
    /// Flags controlling [`crate::Validator::validate`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValidatorFlags: u32 {
        /// Return a finalized copy of the container (signed digest)
        /// instead of the input unchanged
        const IN_PLACE_EDIT = 1 << 0;
    }
}

impl ValidatorFlags {
    /// No flags
    pub const DEFAULT: ValidatorFlags = ValidatorFlags::empty();
}

bitflags! {
    /// Flags for stripping data from a container
    ///
    /// Used with [`crate::strip_parts`] to remove specific parts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StripFlags: u32 {
        /// Remove the debug program and debug name parts
        const DEBUG_INFO = 1 << 0;

        /// Remove the reflection summary part
        const REFLECTION_DATA = 1 << 1;

        /// Remove private data
        const PRIVATE_DATA = 1 << 2;

        /// Remove the root signature
        const ROOT_SIGNATURE = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_mask() {
        assert_eq!(ValidatorFlags::all().bits(), 1);
        assert_eq!(ValidatorFlags::from_bits(2), None);
        assert!(ValidatorFlags::DEFAULT.is_empty());
    }

    #[test]
    fn test_strip_flags() {
        let flags = StripFlags::DEBUG_INFO | StripFlags::PRIVATE_DATA;
        assert!(flags.contains(StripFlags::DEBUG_INFO));
        assert!(!flags.contains(StripFlags::ROOT_SIGNATURE));
    }
}
