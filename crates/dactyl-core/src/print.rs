//! Biometric template values.
//!
//! A [`Print`] is an opaque, serializable template with identity
//! metadata. Two prints are the same print exactly when their template
//! payloads are bit-identical; the metadata (finger, username,
//! description, timestamps) never participates in equality, and
//! equality survives any number of serialize/deserialize cycles.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::constants::{PRINT_FORMAT_VERSION, PRINT_MAGIC};
use crate::error::{Error, Result};
use crate::types::Finger;

/// An enrolled or freshly created biometric template.
///
/// Created either empty via [`Print::new`] (to be handed to an enroll
/// operation) or fully populated via [`Print::builder`] /
/// [`Print::deserialize`]. Once a print has been used as an operation
/// input it must be treated as immutable.
///
/// # Examples
///
/// ```
/// use dactyl_core::{Finger, Print};
///
/// let mut template = Print::new("virtual_device");
/// template.set_finger(Finger::LeftLittle);
/// template.set_username("testuser");
///
/// assert_eq!(template.finger(), Finger::LeftLittle);
/// assert!(!template.has_template());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Print {
    driver: String,
    finger: Finger,
    username: String,
    description: String,
    device_stored: bool,
    enrolled_at: DateTime<Utc>,
    template: Vec<u8>,
}

impl Print {
    /// Create an empty template bound to a driver's template format.
    ///
    /// The result carries no payload until an enrollment fills it in.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            finger: Finger::Unknown,
            username: String::new(),
            description: String::new(),
            device_stored: false,
            enrolled_at: Utc::now(),
            template: Vec::new(),
        }
    }

    /// Create a builder for a fully populated print.
    pub fn builder(driver: impl Into<String>) -> PrintBuilder {
        PrintBuilder::new(driver)
    }

    /// Set the finger this template is attributed to.
    ///
    /// Only meaningful before the print is first used as an operation
    /// input.
    pub fn set_finger(&mut self, finger: Finger) {
        self.finger = finger;
    }

    /// Set the username this template is attributed to.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Set the free-text description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Driver identifier this print is bound to.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn finger(&self) -> Finger {
        self.finger
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the enrolling device kept this print in on-device
    /// storage.
    pub fn is_device_stored(&self) -> bool {
        self.device_stored
    }

    /// When the template payload was captured.
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    /// Opaque template payload.
    pub fn template(&self) -> &[u8] {
        &self.template
    }

    /// Whether this print carries a captured payload.
    pub fn has_template(&self) -> bool {
        !self.template.is_empty()
    }

    /// Content equality: template payloads are bit-identical.
    ///
    /// Reflexive, symmetric, and transitive; compared in constant
    /// time. Metadata is ignored, so a print and its
    /// serialize/deserialize round trip compare equal.
    ///
    /// # Examples
    ///
    /// ```
    /// use dactyl_core::Print;
    ///
    /// let print = Print::builder("virtual_device")
    ///     .template(vec![0xD0, 0xC7])
    ///     .build()
    ///     .unwrap();
    /// let copy = Print::deserialize(&print.serialize().unwrap()).unwrap();
    /// assert!(print.equal(&copy));
    /// ```
    pub fn equal(&self, other: &Print) -> bool {
        self.template.ct_eq(&other.template).into()
    }

    /// Serialize to the opaque wire format.
    ///
    /// The format is a `DCTP` magic, one version byte, and a JSON
    /// body. Consumers must treat it as opaque bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(self)
            .map_err(|e| Error::malformed(format!("could not encode print: {e}")))?;

        let mut out = Vec::with_capacity(PRINT_MAGIC.len() + 1 + body.len());
        out.extend_from_slice(PRINT_MAGIC);
        out.push(PRINT_FORMAT_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Deserialize from bytes produced by [`Print::serialize`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MalformedData`] on truncated input, wrong
    /// magic, unknown format version, or a corrupt body.
    pub fn deserialize(bytes: &[u8]) -> Result<Print> {
        let header = PRINT_MAGIC.len() + 1;
        if bytes.len() < header {
            return Err(Error::malformed(format!(
                "truncated print data: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[..PRINT_MAGIC.len()] != PRINT_MAGIC {
            return Err(Error::malformed("bad print magic"));
        }
        let version = bytes[PRINT_MAGIC.len()];
        if version != PRINT_FORMAT_VERSION {
            return Err(Error::malformed(format!(
                "unsupported print format version {version}"
            )));
        }

        serde_json::from_slice(&bytes[header..])
            .map_err(|e| Error::malformed(format!("corrupt print body: {e}")))
    }
}

impl PartialEq for Print {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for Print {}

impl fmt::Display for Print {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "print {} for user '{}' on {}",
            self.finger, self.username, self.driver
        )
    }
}

/// Builder for fully populated prints.
///
/// Used by the enrollment path to assemble the completed print handed
/// to the completion sink.
///
/// # Examples
///
/// ```
/// use dactyl_core::{Finger, Print};
///
/// let print = Print::builder("virtual_device")
///     .finger(Finger::RightThumb)
///     .username("testuser")
///     .description("Fingerprint finger 'right-thumb' for user 'testuser'")
///     .template(vec![1, 2, 3])
///     .build()
///     .unwrap();
///
/// assert!(print.has_template());
/// ```
#[derive(Debug, Clone)]
pub struct PrintBuilder {
    driver: String,
    finger: Finger,
    username: String,
    description: String,
    device_stored: bool,
    enrolled_at: Option<DateTime<Utc>>,
    template: Vec<u8>,
}

impl PrintBuilder {
    fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            finger: Finger::Unknown,
            username: String::new(),
            description: String::new(),
            device_stored: false,
            enrolled_at: None,
            template: Vec::new(),
        }
    }

    pub fn finger(mut self, finger: Finger) -> Self {
        self.finger = finger;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn device_stored(mut self, stored: bool) -> Self {
        self.device_stored = stored;
        self
    }

    /// Timestamp override, for replaying captures in tests.
    pub fn enrolled_at(mut self, at: DateTime<Utc>) -> Self {
        self.enrolled_at = Some(at);
        self
    }

    pub fn template(mut self, template: Vec<u8>) -> Self {
        self.template = template;
        self
    }

    /// Build the print.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MalformedData`] if no template payload was
    /// provided; a populated print must carry one.
    pub fn build(self) -> Result<Print> {
        if self.template.is_empty() {
            return Err(Error::malformed("print built without a template payload"));
        }

        Ok(Print {
            driver: self.driver,
            finger: self.finger,
            username: self.username,
            description: self.description,
            device_stored: self.device_stored,
            enrolled_at: self.enrolled_at.unwrap_or_else(Utc::now),
            template: self.template,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_print(finger: Finger, payload: &[u8]) -> Print {
        Print::builder("virtual_device")
            .finger(finger)
            .username("testuser")
            .description("test print")
            .template(payload.to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_equality() {
        let print = sample_print(Finger::LeftLittle, &[0xAB, 0xCD, 0xEF]);
        let bytes = print.serialize().unwrap();
        let copy = Print::deserialize(&bytes).unwrap();

        assert!(print.equal(&copy));
        assert_eq!(copy.finger(), Finger::LeftLittle);
        assert_eq!(copy.username(), "testuser");
        assert_eq!(copy.enrolled_at(), print.enrolled_at());
    }

    #[test]
    fn test_repeated_round_trips_stay_equal() {
        let print = sample_print(Finger::RightIndex, &[7; 32]);

        let mut current = print.clone();
        for _ in 0..4 {
            current = Print::deserialize(&current.serialize().unwrap()).unwrap();
        }
        assert!(print.equal(&current));
    }

    #[test]
    fn test_equality_ignores_metadata() {
        let a = sample_print(Finger::LeftThumb, &[1, 2, 3]);
        let mut b = sample_print(Finger::RightRing, &[1, 2, 3]);
        b.set_username("someone-else");
        b.set_description("different description");

        assert!(a.equal(&b));
        assert!(b.equal(&a));
    }

    #[test]
    fn test_different_payloads_are_not_equal() {
        let a = sample_print(Finger::LeftThumb, &[1, 2, 3]);
        let b = sample_print(Finger::LeftThumb, &[1, 2, 4]);
        let c = sample_print(Finger::LeftThumb, &[1, 2]);

        assert!(!a.equal(&b));
        assert!(!a.equal(&c));
    }

    #[test]
    fn test_equality_is_reflexive_for_fresh_templates() {
        let fresh = Print::new("virtual_device");
        assert!(fresh.equal(&fresh));
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"DCT".as_slice())]
    #[case(b"NOPE\x01{}".as_slice())]
    #[case(b"DCTP\x7f{}".as_slice())]
    #[case(b"DCTP\x01not json".as_slice())]
    fn test_deserialize_rejects_corrupt_input(#[case] bytes: &[u8]) {
        let result = Print::deserialize(bytes);
        assert!(matches!(result, Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_deserialize_rejects_truncated_body() {
        let print = sample_print(Finger::LeftRing, &[9, 9, 9]);
        let bytes = print.serialize().unwrap();

        let truncated = &bytes[..bytes.len() - 4];
        assert!(matches!(
            Print::deserialize(truncated),
            Err(Error::MalformedData(_))
        ));
    }

    #[test]
    fn test_builder_requires_payload() {
        let result = Print::builder("virtual_device").username("testuser").build();
        assert!(matches!(result, Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_fresh_template_is_mutable() {
        let mut template = Print::new("virtual_device");
        template.set_finger(Finger::RightLittle);
        template.set_username("testuser");
        template.set_description("Enroll test template");

        assert_eq!(template.finger(), Finger::RightLittle);
        assert_eq!(template.username(), "testuser");
        assert_eq!(template.description(), "Enroll test template");
        assert!(!template.is_device_stored());
    }
}
