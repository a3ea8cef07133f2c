use crate::ParseError;

/// The six object kinds representable in a packfile entry header.
///
/// Values 1–4 are the non-delta git object types; 6 and 7 are the two
/// delta encodings. 0 and 5 never appear in a valid stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
    OffsetDelta,
    IdentityDelta,
}

impl ObjectKind {
    /// Decode the 3-bit type field read from an entry header's first byte.
    pub fn from_type_bits(bits: u8) -> Result<Self, ParseError> {
        match bits {
            1 => Ok(Self::Commit),
            2 => Ok(Self::Tree),
            3 => Ok(Self::Blob),
            4 => Ok(Self::Tag),
            6 => Ok(Self::OffsetDelta),
            7 => Ok(Self::IdentityDelta),
            other => Err(ParseError::InvalidObjectKind(other)),
        }
    }

    /// Whether this kind is one of the two delta encodings.
    pub const fn is_delta(self) -> bool {
        matches!(self, Self::OffsetDelta | Self::IdentityDelta)
    }

    /// The ASCII type name used in the canonical `"<type> <size>\0"` object
    /// header that seeds a non-delta object's identity hash. Only defined
    /// for the four non-delta kinds.
    pub const fn type_name(self) -> Option<&'static str> {
        match self {
            Self::Commit => Some("commit"),
            Self::Tree => Some("tree"),
            Self::Blob => Some("blob"),
            Self::Tag => Some("tag"),
            Self::OffsetDelta | Self::IdentityDelta => None,
        }
    }
}
