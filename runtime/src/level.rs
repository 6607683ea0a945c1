/*!
Severity levels - the ordinal contract shared with foreign callers

Foreign code passes raw integers for levels with no version negotiation, so
the discriminants below are part of the ABI and must never be renumbered:

| ordinal | level   |
|---------|---------|
| 0       | Finest  |
| 1       | Fine    |
| 2       | Info    |
| 3       | Warning |
| 4       | Fatal   |

Ordering is ascending severity. A line is forwarded when its level is
greater than or equal to the active threshold.
*/

use crate::error::{InteropError, InteropResult};
use std::fmt;
use std::str::FromStr;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Finest = 0,
    #[default]
    Fine = 1,
    Info = 2,
    Warning = 3,
    Fatal = 4,
}

impl Severity {
    /// Every level in ordinal order
    pub const ALL: [Severity; 5] = [
        Severity::Finest,
        Severity::Fine,
        Severity::Info,
        Severity::Warning,
        Severity::Fatal,
    ];

    /// Look up a level by its ABI ordinal
    pub const fn from_ordinal(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Severity::Finest),
            1 => Some(Severity::Fine),
            2 => Some(Severity::Info),
            3 => Some(Severity::Warning),
            4 => Some(Severity::Fatal),
            _ => None,
        }
    }

    pub const fn ordinal(self) -> i32 {
        self as i32
    }

    /// Fixed-width tag used in formatted lines (8 columns, brackets included)
    pub const fn tag(self) -> &'static str {
        match self {
            Severity::Finest => "[FINEST]",
            Severity::Fine => "[FINE  ]",
            Severity::Info => "[INFO  ]",
            Severity::Warning => "[WARN  ]",
            Severity::Fatal => "[FATAL ]",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Severity::Finest => "finest",
            Severity::Fine => "fine",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        }
    }
}

impl TryFrom<i32> for Severity {
    type Error = InteropError;

    fn try_from(raw: i32) -> InteropResult<Self> {
        Severity::from_ordinal(raw).ok_or(InteropError::InvalidSeverity(raw))
    }
}

impl FromStr for Severity {
    type Err = InteropError;

    /// Accepts a level name (any case, `warn` included) or its ordinal
    fn from_str(s: &str) -> InteropResult<Self> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<i32>() {
            return Severity::try_from(raw);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "finest" => Ok(Severity::Finest),
            "fine" => Ok(Severity::Fine),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(InteropError::UnknownSeverity(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_are_stable() {
        assert_eq!(Severity::Finest as u8, 0);
        assert_eq!(Severity::Fine as u8, 1);
        assert_eq!(Severity::Info as u8, 2);
        assert_eq!(Severity::Warning as u8, 3);
        assert_eq!(Severity::Fatal as u8, 4);
    }

    #[test]
    fn test_ordering_is_ascending_severity() {
        for pair in Severity::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert_eq!(Severity::try_from(3), Ok(Severity::Warning));
        assert_eq!(
            Severity::try_from(5),
            Err(InteropError::InvalidSeverity(5))
        );
        assert_eq!(
            Severity::try_from(-1),
            Err(InteropError::InvalidSeverity(-1))
        );
    }

    #[test]
    fn test_tags_are_fixed_width() {
        for level in Severity::ALL {
            assert_eq!(level.tag().len(), 8, "{level} tag");
        }
    }

    #[test]
    fn test_parse_names_and_ordinals() {
        assert_eq!("FATAL".parse::<Severity>(), Ok(Severity::Fatal));
        assert_eq!(" warn ".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("0".parse::<Severity>(), Ok(Severity::Finest));
        assert_eq!(
            "7".parse::<Severity>(),
            Err(InteropError::InvalidSeverity(7))
        );
        assert!(matches!(
            "debug".parse::<Severity>(),
            Err(InteropError::UnknownSeverity(_))
        ));
    }
}
