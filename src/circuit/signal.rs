use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Serialize};

/// Value carried by a wire or presented on a gate pin
///
/// Four values are modeled:
///   * Undefined, for races, bus contention and forbidden latch states
///   * Low and High, the two stable logic levels
///   * HighZ, a floating output (tri-state buffer disabled)
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default, Serialize, Deserialize)]
pub enum Signal {
    /// Unresolved value: neither low nor high
    Undefined,
    /// Logic low
    #[default]
    Low,
    /// Logic high
    High,
    /// Floating output
    HighZ,
}

impl Signal {
    /// Returns true for the two stable levels, Low and High
    pub fn is_stable(&self) -> bool {
        matches!(self, Signal::Low | Signal::High)
    }

    /// Returns true if the signal is Undefined
    pub fn is_undefined(&self) -> bool {
        *self == Signal::Undefined
    }

    /// Returns true if the signal is floating
    pub fn is_high_impedance(&self) -> bool {
        *self == Signal::HighZ
    }

    /// Returns true if the signal is High
    pub fn is_high(&self) -> bool {
        *self == Signal::High
    }

    /// Returns true if the signal is Low
    pub fn is_low(&self) -> bool {
        *self == Signal::Low
    }

    /// Convert a stable signal to a boolean; None for Undefined and HighZ
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Signal::Low => Some(false),
            Signal::High => Some(true),
            Signal::Undefined | Signal::HighZ => None,
        }
    }

    /// Replace a floating value by Low, as seen through a weak pull-down
    pub(crate) fn pulled_down(self) -> Signal {
        if self.is_high_impedance() {
            Signal::Low
        } else {
            self
        }
    }

    /// Parse the display representation of a signal
    pub fn from_char(c: char) -> Option<Signal> {
        match c {
            '0' => Some(Signal::Low),
            '1' => Some(Signal::High),
            '?' | 'x' | 'X' => Some(Signal::Undefined),
            'z' | 'Z' => Some(Signal::HighZ),
            _ => None,
        }
    }
}

impl From<bool> for Signal {
    fn from(b: bool) -> Signal {
        if b {
            Signal::High
        } else {
            Signal::Low
        }
    }
}

impl Not for Signal {
    type Output = Signal;

    /// Logical inversion; Undefined stays Undefined and a floating input reads as Low
    fn not(self) -> Signal {
        match self {
            Signal::Low | Signal::HighZ => Signal::High,
            Signal::High => Signal::Low,
            Signal::Undefined => Signal::Undefined,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Signal::Undefined => "?",
            Signal::Low => "0",
            Signal::High => "1",
            Signal::HighZ => "Z",
        };
        write!(f, "{c}")
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
