use std::fmt;
use std::num::NonZeroUsize;

/// How a session consumes the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Everything from the oldest offset up to the snapshot end.
    Cat,
    /// Only messages written after the session starts, until cancelled.
    Follow,
    /// The last `count` messages; with `follow`, then everything new.
    Tail { count: NonZeroUsize, follow: bool },
}

impl Mode {
    /// Map the command-line flags to a mode. A tail count of zero means
    /// "no tail".
    pub fn from_flags(follow: bool, tail: usize) -> Self {
        match (NonZeroUsize::new(tail), follow) {
            (Some(count), follow) => Mode::Tail { count, follow },
            (None, true) => Mode::Follow,
            (None, false) => Mode::Cat,
        }
    }

    pub fn follows(self) -> bool {
        matches!(self, Mode::Follow | Mode::Tail { follow: true, .. })
    }

    pub fn tail_count(self) -> Option<NonZeroUsize> {
        match self {
            Mode::Tail { count, .. } => Some(count),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Cat => f.write_str("cat"),
            Mode::Follow => f.write_str("follow"),
            Mode::Tail { count, follow: false } => write!(f, "tail({count})"),
            Mode::Tail { count, follow: true } => write!(f, "tail({count})+follow"),
        }
    }
}
