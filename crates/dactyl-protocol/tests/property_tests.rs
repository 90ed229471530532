//! Property-based tests for the command grammar and the serialized
//! print format.

use proptest::prelude::*;

use dactyl_core::{Finger, Print, RetryCause};
use dactyl_protocol::{MatchOutcome, SimCommand};

fn finger_strategy() -> impl Strategy<Value = Finger> {
    prop::sample::select(Finger::NAMED.to_vec())
}

fn retry_cause_strategy() -> impl Strategy<Value = RetryCause> {
    prop::sample::select(vec![
        RetryCause::General,
        RetryCause::TooShort,
        RetryCause::TooFast,
        RetryCause::CenterFinger,
        RetryCause::RemoveFinger,
    ])
}

fn username_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,23}"
}

proptest! {
    /// Every ADD command survives a display/parse round trip.
    #[test]
    fn add_command_round_trip(
        finger in finger_strategy(),
        username in username_strategy(),
        matched in any::<bool>(),
    ) {
        let command = SimCommand::Add {
            finger,
            username,
            outcome: if matched { MatchOutcome::Match } else { MatchOutcome::NoMatch },
        };
        let line = command.to_string();
        prop_assert_eq!(SimCommand::parse(&line).unwrap(), command);
    }

    /// Every RETRY command survives a display/parse round trip.
    #[test]
    fn retry_command_round_trip(cause in retry_cause_strategy()) {
        let command = SimCommand::Retry { cause };
        let line = command.to_string();
        prop_assert_eq!(SimCommand::parse(&line).unwrap(), command);
    }

    /// Parsing arbitrary input never panics; it either yields a
    /// command or a clean error.
    #[test]
    fn parse_never_panics(line in "\\PC{0,64}") {
        let _ = SimCommand::parse(&line);
    }

    /// Prints round-trip through serialize/deserialize with equality
    /// preserved for any payload.
    #[test]
    fn print_round_trip(
        finger in finger_strategy(),
        username in username_strategy(),
        payload in prop::collection::vec(any::<u8>(), 1..256),
    ) {
        let print = Print::builder("virtual_device")
            .finger(finger)
            .username(username)
            .template(payload)
            .build()
            .unwrap();

        let copy = Print::deserialize(&print.serialize().unwrap()).unwrap();
        prop_assert!(print.equal(&copy));
        prop_assert_eq!(copy.finger(), print.finger());
        prop_assert_eq!(copy.username(), print.username());
    }

    /// Deserializing arbitrary bytes never panics.
    #[test]
    fn deserialize_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = Print::deserialize(&bytes);
    }
}
