//! Domain types shared across the device stack.
//!
//! Fingers are identified by the hyphenated nick strings the command
//! channel speaks (`left-little`, `right-thumb`, ...); capability sets
//! are a fixed-size bitset so contracts can check them exhaustively.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Finger identified by a print or a simulated scan event.
///
/// The wire representation is the hyphenated nick returned by
/// [`Finger::nick`]; parsing is strict and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Finger {
    /// Finger not (yet) attributed.
    Unknown,
    LeftThumb,
    LeftIndex,
    LeftMiddle,
    LeftRing,
    LeftLittle,
    RightThumb,
    RightIndex,
    RightMiddle,
    RightRing,
    RightLittle,
}

impl Finger {
    /// The ten attributable fingers, left thumb through right little.
    ///
    /// `Unknown` is excluded: it is a placeholder on fresh templates,
    /// not a value a scan event may carry.
    pub const NAMED: [Finger; 10] = [
        Finger::LeftThumb,
        Finger::LeftIndex,
        Finger::LeftMiddle,
        Finger::LeftRing,
        Finger::LeftLittle,
        Finger::RightThumb,
        Finger::RightIndex,
        Finger::RightMiddle,
        Finger::RightRing,
        Finger::RightLittle,
    ];

    /// Wire nick of this finger.
    ///
    /// # Examples
    ///
    /// ```
    /// use dactyl_core::Finger;
    ///
    /// assert_eq!(Finger::LeftLittle.nick(), "left-little");
    /// assert_eq!(Finger::Unknown.nick(), "unknown");
    /// ```
    pub fn nick(self) -> &'static str {
        match self {
            Finger::Unknown => "unknown",
            Finger::LeftThumb => "left-thumb",
            Finger::LeftIndex => "left-index",
            Finger::LeftMiddle => "left-middle",
            Finger::LeftRing => "left-ring",
            Finger::LeftLittle => "left-little",
            Finger::RightThumb => "right-thumb",
            Finger::RightIndex => "right-index",
            Finger::RightMiddle => "right-middle",
            Finger::RightRing => "right-ring",
            Finger::RightLittle => "right-little",
        }
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nick())
    }
}

impl FromStr for Finger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Finger::Unknown),
            "left-thumb" => Ok(Finger::LeftThumb),
            "left-index" => Ok(Finger::LeftIndex),
            "left-middle" => Ok(Finger::LeftMiddle),
            "left-ring" => Ok(Finger::LeftRing),
            "left-little" => Ok(Finger::LeftLittle),
            "right-thumb" => Ok(Finger::RightThumb),
            "right-index" => Ok(Finger::RightIndex),
            "right-middle" => Ok(Finger::RightMiddle),
            "right-ring" => Ok(Finger::RightRing),
            "right-little" => Ok(Finger::RightLittle),
            other => Err(Error::protocol(format!("unknown finger '{other}'"))),
        }
    }
}

/// Whether a finger interaction is currently expected or present.
///
/// The device resets this to `None` after every completed operation,
/// on success, failure, and cancellation paths alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerStatus {
    /// No interaction expected.
    None,
    /// An operation is waiting for a finger to be placed.
    Needed,
    /// A scan is being evaluated.
    Present,
}

impl fmt::Display for FingerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            FingerStatus::None => "none",
            FingerStatus::Needed => "needed",
            FingerStatus::Present => "present",
        };
        f.write_str(status)
    }
}

/// Physical interaction style of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Swipe,
    Press,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Swipe => f.write_str("swipe"),
            ScanType::Press => f.write_str("press"),
        }
    }
}

/// Recoverable cause reported when a scan could not be used.
///
/// Carried by [`Error::Retry`](crate::Error::Retry) and by enrollment
/// progress callbacks for stages that must be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryCause {
    /// Unspecified transient failure.
    General,
    /// Swipe was too short to capture.
    TooShort,
    /// Finger moved too quickly.
    TooFast,
    /// Finger not centered on the sensor.
    CenterFinger,
    /// Finger must be lifted and placed again.
    RemoveFinger,
}

impl RetryCause {
    /// Wire nick of this cause.
    pub fn nick(self) -> &'static str {
        match self {
            RetryCause::General => "general",
            RetryCause::TooShort => "too-short",
            RetryCause::TooFast => "too-fast",
            RetryCause::CenterFinger => "center-finger",
            RetryCause::RemoveFinger => "remove-finger",
        }
    }
}

impl fmt::Display for RetryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nick())
    }
}

impl FromStr for RetryCause {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(RetryCause::General),
            "too-short" => Ok(RetryCause::TooShort),
            "too-fast" => Ok(RetryCause::TooFast),
            "center-finger" => Ok(RetryCause::CenterFinger),
            "remove-finger" => Ok(RetryCause::RemoveFinger),
            other => Err(Error::protocol(format!("unknown retry cause '{other}'"))),
        }
    }
}

/// Fixed-size capability bitset of a device.
///
/// Component contracts check capabilities through
/// [`DeviceCaps::contains`]; there are no ad hoc booleans.
///
/// # Examples
///
/// ```
/// use dactyl_core::DeviceCaps;
///
/// let caps = DeviceCaps::VERIFY | DeviceCaps::STORAGE | DeviceCaps::STORAGE_LIST;
/// assert!(caps.contains(DeviceCaps::STORAGE));
/// assert!(!caps.contains(DeviceCaps::IDENTIFY));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCaps(u16);

impl DeviceCaps {
    pub const CAPTURE: Self = Self(1);
    pub const IDENTIFY: Self = Self(1 << 1);
    pub const VERIFY: Self = Self(1 << 2);
    pub const DUPLICATES_CHECK: Self = Self(1 << 3);
    pub const STORAGE: Self = Self(1 << 4);
    pub const STORAGE_LIST: Self = Self(1 << 5);
    pub const STORAGE_DELETE: Self = Self(1 << 6);
    pub const STORAGE_CLEAR: Self = Self(1 << 7);

    /// Capability set with nothing in it.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether every capability in `caps` is present in `self`.
    pub const fn contains(self, caps: Self) -> bool {
        self.0 & caps.0 == caps.0
    }

    /// This set with `caps` added.
    #[must_use]
    pub const fn with(self, caps: Self) -> Self {
        Self(self.0 | caps.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DeviceCaps {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for DeviceCaps {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.with(rhs);
    }
}

impl fmt::Debug for DeviceCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(DeviceCaps, &str); 8] = [
            (DeviceCaps::CAPTURE, "CAPTURE"),
            (DeviceCaps::IDENTIFY, "IDENTIFY"),
            (DeviceCaps::VERIFY, "VERIFY"),
            (DeviceCaps::DUPLICATES_CHECK, "DUPLICATES_CHECK"),
            (DeviceCaps::STORAGE, "STORAGE"),
            (DeviceCaps::STORAGE_LIST, "STORAGE_LIST"),
            (DeviceCaps::STORAGE_DELETE, "STORAGE_DELETE"),
            (DeviceCaps::STORAGE_CLEAR, "STORAGE_CLEAR"),
        ];

        let mut set = f.debug_set();
        for (cap, name) in NAMES {
            if self.contains(cap) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}
