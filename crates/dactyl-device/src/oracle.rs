//! Matching decision procedure.
//!
//! The decision source is the consumed scan event: its binary outcome
//! says whether anything matches at all, and its finger/username
//! attribution picks the gallery entry. Matching is never
//! similarity-scored, so ties cannot occur and at most one entry is
//! ever reported.

use dactyl_core::Print;

use crate::events::ScanEvent;

/// Decide which gallery entry, if any, the scan matched.
///
/// Returns the index of the first entry carrying the event's
/// finger/username attribution, or `None` when the event is a
/// non-match or no entry is attributed to it.
///
/// # Examples
///
/// ```
/// use dactyl_core::{Finger, Print};
/// use dactyl_device::{ScanEvent, match_gallery};
///
/// let stored = Print::builder("virtual_device_storage")
///     .finger(Finger::LeftLittle)
///     .username("testuser")
///     .template(vec![1, 2, 3])
///     .build()
///     .unwrap();
///
/// let event = ScanEvent {
///     finger: Finger::LeftLittle,
///     username: "testuser".into(),
///     matched: true,
/// };
/// assert_eq!(match_gallery(&event, std::slice::from_ref(&stored)), Some(0));
/// ```
pub fn match_gallery(event: &ScanEvent, gallery: &[Print]) -> Option<usize> {
    if !event.matched {
        return None;
    }

    gallery
        .iter()
        .position(|print| print.finger() == event.finger && print.username() == event.username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dactyl_core::Finger;

    fn print(finger: Finger, username: &str, payload: u8) -> Print {
        Print::builder("virtual_device_storage")
            .finger(finger)
            .username(username)
            .template(vec![payload])
            .build()
            .unwrap()
    }

    fn event(finger: Finger, username: &str, matched: bool) -> ScanEvent {
        ScanEvent {
            finger,
            username: username.into(),
            matched,
        }
    }

    #[test]
    fn test_match_selects_attributed_entry() {
        let gallery = vec![
            print(Finger::LeftThumb, "alice", 1),
            print(Finger::RightThumb, "alice", 2),
            print(Finger::RightThumb, "bob", 3),
        ];

        let index = match_gallery(&event(Finger::RightThumb, "bob", true), &gallery);
        assert_eq!(index, Some(2));
    }

    #[test]
    fn test_non_match_event_reports_nothing() {
        let gallery = vec![print(Finger::LeftThumb, "alice", 1)];
        assert_eq!(
            match_gallery(&event(Finger::LeftThumb, "alice", false), &gallery),
            None
        );
    }

    #[test]
    fn test_unattributed_event_reports_nothing() {
        let gallery = vec![print(Finger::LeftThumb, "alice", 1)];
        assert_eq!(
            match_gallery(&event(Finger::LeftRing, "alice", true), &gallery),
            None
        );
        assert_eq!(
            match_gallery(&event(Finger::LeftThumb, "mallory", true), &gallery),
            None
        );
    }

    #[test]
    fn test_at_most_one_entry_reported() {
        // Two entries with the same attribution: only the first wins.
        let gallery = vec![
            print(Finger::LeftIndex, "alice", 1),
            print(Finger::LeftIndex, "alice", 2),
        ];
        assert_eq!(
            match_gallery(&event(Finger::LeftIndex, "alice", true), &gallery),
            Some(0)
        );
    }

    #[test]
    fn test_empty_gallery() {
        assert_eq!(match_gallery(&event(Finger::LeftThumb, "alice", true), &[]), None);
    }
}
