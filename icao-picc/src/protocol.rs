//! The outcome of processing a command: a response and the effects the surrounding card has to
//! apply.


use tracing::debug;

use crate::iso7816::apdu::ResponseApdu;
use crate::iso7816::status::StatusWord;
use crate::sec_status::{SecContext, SecMechanism, SecStatus, SecurityStatus};
use crate::secure_messaging::SmDataProvider;


/// A change a protocol requests of the card once a command has been processed.
#[derive(Clone, Debug)]
pub enum ProtocolEffect {
    /// Record a completed authentication mechanism.
    UpdateSecStatus {
        context: SecContext,
        mechanism: SecMechanism,
    },

    /// Replace the Secure Messaging channel with one using the given keys.
    InstallSecureMessaging(SmDataProvider),

    /// The protocol has finished (successfully or not) and should be removed from the stack of
    /// active protocols.
    ProtocolCompleted,
}


/// The receiver of protocol effects.
pub trait ProtocolHost {
    fn update_sec_status(&mut self, context: SecContext, mechanism: SecMechanism);
    fn install_secure_messaging(&mut self, provider: SmDataProvider);
    fn protocol_completed(&mut self);
}


/// The response to a command along with its effects, in the order they are to be applied.
#[derive(Clone, Debug)]
pub struct ProcessingResult {
    pub response: ResponseApdu,
    pub effects: Vec<ProtocolEffect>,
}
impl ProcessingResult {
    pub fn new(response: ResponseApdu, effects: Vec<ProtocolEffect>) -> Self {
        Self {
            response,
            effects,
        }
    }

    /// A response consisting only of a status word, without effects.
    pub fn status_only(status: StatusWord) -> Self {
        Self::new(ResponseApdu::status_only(status), Vec::new())
    }

    pub fn is_success(&self) -> bool {
        self.response.status.is_success()
    }

    /// Whether the protocol requested its removal.
    pub fn completes_protocol(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, ProtocolEffect::ProtocolCompleted))
    }

    /// The Secure Messaging channel to install, if any.
    pub fn secure_messaging(&self) -> Option<&SmDataProvider> {
        self.effects.iter()
            .find_map(|e| match e {
                ProtocolEffect::InstallSecureMessaging(provider) => Some(provider),
                _ => None,
            })
    }

    /// Applies the effects to the host and returns the response.
    pub fn apply<H: ProtocolHost + ?Sized>(self, host: &mut H) -> ResponseApdu {
        for effect in self.effects {
            match effect {
                ProtocolEffect::UpdateSecStatus { context, mechanism } => {
                    host.update_sec_status(context, mechanism);
                },
                ProtocolEffect::InstallSecureMessaging(provider) => {
                    host.install_secure_messaging(provider);
                },
                ProtocolEffect::ProtocolCompleted => {
                    host.protocol_completed();
                },
            }
        }
        self.response
    }
}


/// The mutable state of a card beyond its objects: security status, Secure Messaging and whether
/// the running protocol has completed.
#[derive(Debug, Default)]
pub struct CardState {
    pub sec_status: SecStatus,
    pub secure_messaging: Option<SmDataProvider>,
    pub completed: bool,
}
impl CardState {
    pub fn new(sec_status: SecStatus) -> Self {
        Self {
            sec_status,
            secure_messaging: None,
            completed: false,
        }
    }
}
impl ProtocolHost for CardState {
    fn update_sec_status(&mut self, context: SecContext, mechanism: SecMechanism) {
        debug!("recording {:?} mechanism in {:?} context", mechanism.kind(), context);
        self.sec_status.publish(context, mechanism);
    }

    fn install_secure_messaging(&mut self, provider: SmDataProvider) {
        debug!("installing {} secure messaging", provider.cipher_suite());
        self.secure_messaging = Some(provider);
    }

    fn protocol_completed(&mut self) {
        self.completed = true;
    }
}
