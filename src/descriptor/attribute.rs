use std::{fmt, str::FromStr};

use strum::{Display, EnumString};

use crate::{Error, Result};

/// How a descriptor modifies the entries it is merged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum OverrideMarker {
    /// A plain entry, no override
    #[default]
    None,
    /// `+`, adds the attribute kind
    Add,
    /// `-`, removes the attribute kind and every kind it outranks
    Remove,
    /// `!`, forces the attribute kind regardless of other entries
    Force,
}

impl OverrideMarker {
    /// Returns the marker prefix used in the line format
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            OverrideMarker::None => "",
            OverrideMarker::Add => "+",
            OverrideMarker::Remove => "-",
            OverrideMarker::Force => "!",
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            '+' => Some(OverrideMarker::Add),
            '-' => Some(OverrideMarker::Remove),
            '!' => Some(OverrideMarker::Force),
            _ => None,
        }
    }
}

/// The security attribute a descriptor applies.
///
/// Variants are ordered by priority: when both kinds apply to the same signature, Critical
/// wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
pub enum AttributeKind {
    /// `SC`, SecurityCritical
    #[strum(serialize = "SC")]
    Critical,
    /// `SSC`, SecuritySafeCritical
    #[strum(serialize = "SSC")]
    SafeCritical,
}

impl AttributeKind {
    /// Returns `true` if `self` takes precedence over `other`
    #[must_use]
    pub fn outranks(&self, other: AttributeKind) -> bool {
        *self < other
    }
}

/// The kind of member a descriptor targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
pub enum TargetKind {
    /// `T`, a type full name
    #[strum(serialize = "T")]
    Type,
    /// `M`, a canonical method signature
    #[strum(serialize = "M")]
    Method,
}

/// An instruction to attach a security attribute to a type or method.
///
/// The line format is `<marker><kind>-<target>: <signature>`, for example
/// `SC-M: System.Void System.IO.File::Delete(System.String)` or `!SSC-T: System.Console`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityAttributeDescriptor {
    /// Override marker
    pub marker: OverrideMarker,
    /// Attribute to attach
    pub kind: AttributeKind,
    /// Kind of member
    pub target: TargetKind,
    /// Type full name or canonical method signature
    pub signature: String,
}

impl SecurityAttributeDescriptor {
    /// Creates a plain descriptor
    #[must_use]
    pub fn new(kind: AttributeKind, target: TargetKind, signature: &str) -> Self {
        SecurityAttributeDescriptor {
            marker: OverrideMarker::None,
            kind,
            target,
            signature: signature.to_string(),
        }
    }

    /// Creates a Critical method descriptor
    #[must_use]
    pub fn critical_method(signature: &str) -> Self {
        Self::new(AttributeKind::Critical, TargetKind::Method, signature)
    }

    /// Creates a SafeCritical method descriptor
    #[must_use]
    pub fn safe_critical_method(signature: &str) -> Self {
        Self::new(AttributeKind::SafeCritical, TargetKind::Method, signature)
    }

    /// Creates a Critical type descriptor
    #[must_use]
    pub fn critical_type(full_name: &str) -> Self {
        Self::new(AttributeKind::Critical, TargetKind::Type, full_name)
    }

    /// Returns a copy carrying `marker`
    #[must_use]
    pub fn with_marker(mut self, marker: OverrideMarker) -> Self {
        self.marker = marker;
        self
    }

    /// Returns `true` if the descriptor carries an override marker
    #[must_use]
    pub fn is_override(&self) -> bool {
        self.marker != OverrideMarker::None
    }

    /// Parses one non-comment line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDescriptor`] tagged with `line` if the text does not follow
    /// the line format.
    pub fn parse_line(text: &str, line: usize) -> Result<Self> {
        let malformed = |message: &str| Error::MalformedDescriptor {
            line,
            content: text.to_string(),
            message: message.to_string(),
        };

        let trimmed = text.trim();
        let (header, signature) = trimmed
            .split_once(':')
            .ok_or_else(|| malformed("missing ':' after the descriptor header"))?;

        let signature = signature.trim();
        if signature.is_empty() {
            return Err(malformed("empty signature"));
        }

        let mut header = header.trim();
        let marker = match header.chars().next().and_then(OverrideMarker::from_prefix) {
            Some(marker) => {
                header = &header[1..];
                marker
            }
            None => OverrideMarker::None,
        };

        let (kind, target) = header
            .split_once('-')
            .ok_or_else(|| malformed("expected '<kind>-<target>'"))?;
        let kind = AttributeKind::from_str(kind)
            .map_err(|_| malformed(&format!("unknown attribute kind '{kind}'")))?;
        let target = TargetKind::from_str(target)
            .map_err(|_| malformed(&format!("unknown target kind '{target}'")))?;

        Ok(SecurityAttributeDescriptor {
            marker,
            kind,
            target,
            signature: signature.to_string(),
        })
    }
}

impl FromStr for SecurityAttributeDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_line(s, 1)
    }
}

impl fmt::Display for SecurityAttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-{}: {}",
            self.marker.prefix(),
            self.kind,
            self.target,
            self.signature
        )
    }
}
