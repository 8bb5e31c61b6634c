//! SASL mechanism selection and initial responses
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{element::Element, error::Error, ns};

/// A SASL mechanism this client can run
#[derive(Clone, PartialEq, Eq)]
pub enum Mechanism {
    /// RFC 4616, username and password in the clear (inside TLS)
    Plain {
        /// authentication identity
        username: String,
        /// password
        password: String,
    },
    /// RFC 4422 appendix A, identity taken from the client certificate
    External,
}

impl std::fmt::Debug for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain { username, .. } => f
                .debug_struct("Plain")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::External => f.write_str("External"),
        }
    }
}

impl Mechanism {
    /// Pick a mechanism from those the server `offered`.
    ///
    /// PLAIN wins when we have a password, otherwise EXTERNAL is used when a
    /// client certificate was presented during the TLS handshake.
    pub fn select(
        offered: &[String],
        username: Option<&str>,
        password: Option<&str>,
        has_client_cert: bool,
    ) -> Result<Self, Error> {
        let offers = |name: &str| offered.iter().any(|m| m.eq_ignore_ascii_case(name));

        if let (Some(password), true) = (password, offers("PLAIN")) {
            let username = username.ok_or_else(|| {
                Error::Authentication("PLAIN requires a jid with a local part".into())
            })?;
            return Ok(Self::Plain {
                username: username.to_owned(),
                password: password.to_owned(),
            });
        }
        if has_client_cert && offers("EXTERNAL") {
            return Ok(Self::External);
        }
        Err(Error::Authentication(format!(
            "no usable SASL mechanism (offered: {}, password: {}, client cert: {has_client_cert})",
            offered.join(","),
            password.is_some(),
        )))
    }

    /// mechanism name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "PLAIN",
            Self::External => "EXTERNAL",
        }
    }

    /// base64 initial response; an empty response is sent as `=`
    pub fn initial_response(&self) -> String {
        match self {
            Self::Plain { username, password } => {
                let mut raw = Vec::with_capacity(username.len() + password.len() + 2);
                raw.push(0);
                raw.extend_from_slice(username.as_bytes());
                raw.push(0);
                raw.extend_from_slice(password.as_bytes());
                STANDARD.encode(raw)
            }
            Self::External => "=".to_owned(),
        }
    }

    /// the `<auth/>` element starting the exchange
    pub fn auth_element(&self) -> Element {
        Element::with_ns("auth", ns::SASL)
            .with_attr("mechanism", self.name())
            .with_text(self.initial_response())
    }
}

/// mechanism names listed in a `<stream:features/>` element
pub fn offered_mechanisms(features: &Element) -> Vec<String> {
    features
        .get_child("mechanisms", ns::SASL)
        .map(|mechanisms| {
            mechanisms
                .children_named("mechanism", ns::SASL)
                .map(|m| m.text().trim().to_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// describe a `<failure/>` reply
pub fn failure_reason(failure: &Element) -> String {
    let condition = failure
        .children()
        .find(|child| child.local_name() != "text")
        .map(|child| child.local_name().to_owned())
        .unwrap_or_else(|| "unknown".to_owned());
    match failure.get_child("text", ns::SASL) {
        Some(text) => format!("{condition}: {}", text.text()),
        None => condition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_preferred_with_password() {
        let mech = Mechanism::select(
            &offered(&["EXTERNAL", "PLAIN"]),
            Some("alice"),
            Some("secret"),
            true,
        )
        .unwrap();
        assert_eq!(mech.name(), "PLAIN");
        assert_eq!(mech.initial_response(), STANDARD.encode(b"\0alice\0secret"));
    }

    #[test]
    fn external_with_client_cert() {
        let mech =
            Mechanism::select(&offered(&["EXTERNAL", "PLAIN"]), Some("alice"), None, true).unwrap();
        assert_eq!(mech, Mechanism::External);
        assert_eq!(
            mech.auth_element().to_string(),
            r#"<auth xmlns="urn:ietf:params:xml:ns:xmpp-sasl" mechanism="EXTERNAL">=</auth>"#
        );
    }

    #[test]
    fn nothing_usable() {
        let err = Mechanism::select(&offered(&["SCRAM-SHA-1"]), Some("alice"), None, false)
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn debug_hides_password() {
        let mech = Mechanism::Plain {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{mech:?}").contains("hunter2"));
    }

    #[test]
    fn parse_features_and_failure() {
        let features: Element = "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
            <mechanism>PLAIN</mechanism><mechanism>EXTERNAL</mechanism></mechanisms></stream:features>"
            .parse()
            .unwrap();
        assert_eq!(offered_mechanisms(&features), offered(&["PLAIN", "EXTERNAL"]));

        let failure: Element = "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
            <not-authorized/><text>bad password</text></failure>"
            .parse()
            .unwrap();
        assert_eq!(failure_reason(&failure), "not-authorized: bad password");
    }
}
