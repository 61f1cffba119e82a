use thiserror::Error;

/// Error conditions defined by the on-ledger program.
///
/// The ledger surfaces these as numeric codes starting at 6000; every code
/// maps to a named variant here so callers always see the condition by
/// name, never an opaque number. The same conditions are also raised
/// locally by client-side validation before any network call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("file name is too long (max 50 bytes)")]
    FileNameTooLong,
    #[error("invalid file size")]
    InvalidFileSize,
    #[error("invalid chunk count")]
    InvalidChunkCount,
    #[error("storage location string is too long (max 100 bytes)")]
    StorageLocationTooLong,
    #[error("storage location cannot be empty")]
    StorageLocationEmpty,
    #[error("invalid file status for this operation")]
    InvalidFileStatus,
    #[error("no storage location registered")]
    NoStorageLocation,
    #[error("file must be active to share")]
    FileNotActive,
    #[error("expiration time must be in the future")]
    InvalidExpirationTime,
}

impl ProgramError {
    /// Map a raw ledger error code to its named condition.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            6000 => Some(Self::FileNameTooLong),
            6001 => Some(Self::InvalidFileSize),
            6002 => Some(Self::InvalidChunkCount),
            6003 => Some(Self::StorageLocationTooLong),
            6004 => Some(Self::StorageLocationEmpty),
            6005 => Some(Self::InvalidFileStatus),
            6006 => Some(Self::NoStorageLocation),
            6007 => Some(Self::FileNotActive),
            6008 => Some(Self::InvalidExpirationTime),
            _ => None,
        }
    }

    /// The raw code the ledger reports for this condition.
    pub fn code(&self) -> u32 {
        match self {
            Self::FileNameTooLong => 6000,
            Self::InvalidFileSize => 6001,
            Self::InvalidChunkCount => 6002,
            Self::StorageLocationTooLong => 6003,
            Self::StorageLocationEmpty => 6004,
            Self::InvalidFileStatus => 6005,
            Self::NoStorageLocation => 6006,
            Self::FileNotActive => 6007,
            Self::InvalidExpirationTime => 6008,
        }
    }

    /// The condition name as the program declares it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileNameTooLong => "FileNameTooLong",
            Self::InvalidFileSize => "InvalidFileSize",
            Self::InvalidChunkCount => "InvalidChunkCount",
            Self::StorageLocationTooLong => "StorageLocationTooLong",
            Self::StorageLocationEmpty => "StorageLocationEmpty",
            Self::InvalidFileStatus => "InvalidFileStatus",
            Self::NoStorageLocation => "NoStorageLocation",
            Self::FileNotActive => "FileNotActive",
            Self::InvalidExpirationTime => "InvalidExpirationTime",
        }
    }

    /// Look up a condition by its declared name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FileNameTooLong" => Some(Self::FileNameTooLong),
            "InvalidFileSize" => Some(Self::InvalidFileSize),
            "InvalidChunkCount" => Some(Self::InvalidChunkCount),
            "StorageLocationTooLong" => Some(Self::StorageLocationTooLong),
            "StorageLocationEmpty" => Some(Self::StorageLocationEmpty),
            "InvalidFileStatus" => Some(Self::InvalidFileStatus),
            "NoStorageLocation" => Some(Self::NoStorageLocation),
            "FileNotActive" => Some(Self::FileNotActive),
            "InvalidExpirationTime" => Some(Self::InvalidExpirationTime),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping_roundtrip() {
        for code in 6000..=6008 {
            let err = ProgramError::from_code(code).expect("known code");
            assert_eq!(err.code(), code);
            assert_eq!(ProgramError::from_name(err.name()), Some(err));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(ProgramError::from_code(6009), None);
        assert_eq!(ProgramError::from_code(0), None);
    }
}
