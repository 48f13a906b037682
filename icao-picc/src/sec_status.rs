//! The security status of the chip: which authentication mechanisms have been completed.


use std::collections::BTreeMap;

use crate::oid::Oid;


/// The scope within which a mechanism is valid.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SecContext {
    /// Valid for the whole card.
    Global,

    /// Valid for the currently selected application.
    Application,
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MechanismKind {
    TerminalAuthentication,
    ChipAuthentication,
}


/// Record of a completed Chip Authentication.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChipAuthenticationMechanism {
    ca_oid: Oid,
    key_reference: u32,
    ephemeral_public_key: Vec<u8>,
}
impl ChipAuthenticationMechanism {
    pub fn new(ca_oid: Oid, key_reference: u32, ephemeral_public_key: Vec<u8>) -> Self {
        Self {
            ca_oid,
            key_reference,
            ephemeral_public_key,
        }
    }

    pub fn ca_oid(&self) -> &Oid { &self.ca_oid }
    pub fn key_reference(&self) -> u32 { self.key_reference }

    /// The terminal's ephemeral public key as sent in General Authenticate.
    pub fn ephemeral_public_key(&self) -> &[u8] { &self.ephemeral_public_key }
}


/// A completed authentication mechanism.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum SecMechanism {
    /// Terminal Authentication; the terminal committed to its ephemeral key for Chip
    /// Authentication.
    TerminalAuthentication {
        /// The compressed ephemeral public key the terminal committed to.
        compressed_ephemeral_public_key: Vec<u8>,
    },
    ChipAuthentication(ChipAuthenticationMechanism),
}
impl SecMechanism {
    pub fn kind(&self) -> MechanismKind {
        match self {
            Self::TerminalAuthentication { .. } => MechanismKind::TerminalAuthentication,
            Self::ChipAuthentication(_) => MechanismKind::ChipAuthentication,
        }
    }
}


/// The registry of completed mechanisms.
pub trait SecurityStatus {
    /// Records a mechanism, replacing any previous mechanism of the same kind in the same context.
    fn publish(&mut self, context: SecContext, mechanism: SecMechanism);

    /// Returns the mechanism of the given kind in the given context, if one has been recorded.
    fn find_mechanism(&self, context: SecContext, kind: MechanismKind) -> Option<&SecMechanism>;
}


/// In-memory security status.
#[derive(Clone, Debug, Default)]
pub struct SecStatus {
    mechanisms: BTreeMap<(SecContext, MechanismKind), SecMechanism>,
}
impl SecStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every mechanism recorded in the given context.
    pub fn reset(&mut self, context: SecContext) {
        self.mechanisms.retain(|(c, _), _| *c != context);
    }
}
impl SecurityStatus for SecStatus {
    fn publish(&mut self, context: SecContext, mechanism: SecMechanism) {
        self.mechanisms.insert((context, mechanism.kind()), mechanism);
    }

    fn find_mechanism(&self, context: SecContext, kind: MechanismKind) -> Option<&SecMechanism> {
        self.mechanisms.get(&(context, kind))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn ta(key: &[u8]) -> SecMechanism {
        SecMechanism::TerminalAuthentication {
            compressed_ephemeral_public_key: key.to_vec(),
        }
    }

    #[test]
    fn test_publish_replaces() {
        let mut status = SecStatus::new();
        assert!(status.find_mechanism(SecContext::Application, MechanismKind::TerminalAuthentication).is_none());

        status.publish(SecContext::Application, ta(&[1]));
        status.publish(SecContext::Application, ta(&[2]));
        assert_eq!(
            status.find_mechanism(SecContext::Application, MechanismKind::TerminalAuthentication),
            Some(&ta(&[2])),
        );
        assert!(status.find_mechanism(SecContext::Global, MechanismKind::TerminalAuthentication).is_none());
        assert!(status.find_mechanism(SecContext::Application, MechanismKind::ChipAuthentication).is_none());
    }

    #[test]
    fn test_reset() {
        let mut status = SecStatus::new();
        status.publish(SecContext::Global, ta(&[1]));
        status.publish(SecContext::Application, ta(&[2]));
        status.reset(SecContext::Application);
        assert!(status.find_mechanism(SecContext::Application, MechanismKind::TerminalAuthentication).is_none());
        assert_eq!(status.find_mechanism(SecContext::Global, MechanismKind::TerminalAuthentication), Some(&ta(&[1])));
    }
}
