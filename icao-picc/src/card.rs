//! Card objects: the keys and other objects personalized onto the chip.


use std::fmt;

use crate::crypt::StaticKeyPair;
use crate::oid::Oid;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    /// Another object already uses this key reference.
    DuplicateKeyReference { key_reference: u32 },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKeyReference { key_reference } => write!(f, "key reference {} is already in use", key_reference),
        }
    }
}
impl std::error::Error for Error {
}


/// A key stored on the chip, together with the protocols it may be used with.
#[derive(Clone, Debug)]
pub struct KeyObject {
    key_pair: StaticKeyPair,
    key_reference: Option<u32>,
    oids: Vec<Oid>,
    privileged_only: bool,
}
impl KeyObject {
    pub fn new(key_pair: StaticKeyPair, key_reference: Option<u32>, oids: Vec<Oid>, privileged_only: bool) -> Self {
        Self {
            key_pair,
            key_reference,
            oids,
            privileged_only,
        }
    }

    pub fn key_pair(&self) -> &StaticKeyPair { &self.key_pair }
    pub fn key_reference(&self) -> Option<u32> { self.key_reference }
    pub fn oids(&self) -> &[Oid] { &self.oids }

    /// Whether this key may only be advertised to and used by privileged terminals.
    pub fn privileged_only(&self) -> bool { self.privileged_only }

    /// Whether the given object identifier is one of this key's identifiers.
    pub fn matches_oid(&self, oid: &Oid) -> bool {
        self.oids.iter().any(|o| o == oid)
    }

    /// The identifiers of this key that specialize the given generic object identifier.
    pub fn oids_with_prefix<'a>(&'a self, generic: &'a Oid) -> impl Iterator<Item = &'a Oid> + 'a {
        self.oids.iter().filter(move |o| o.specializes(generic))
    }
}


/// An object on the card.
#[derive(Clone, Debug)]
pub enum CardObject {
    Key(KeyObject),

    /// Any object that is not a key (e.g. a file or a PIN).
    Other {
        key_reference: Option<u32>,
        description: String,
    },
}
impl CardObject {
    pub fn key_reference(&self) -> Option<u32> {
        match self {
            Self::Key(key) => key.key_reference(),
            Self::Other { key_reference, .. } => *key_reference,
        }
    }

    pub fn as_key(&self) -> Option<&KeyObject> {
        match self {
            Self::Key(key) => Some(key),
            Self::Other { .. } => None,
        }
    }
}


/// Read access to the objects on a card.
pub trait CardObjectStore {
    /// Returns the object with the given key reference, if there is one.
    fn lookup(&self, key_reference: u32) -> Option<&CardObject>;

    /// Enumerates all objects in tree order.
    fn objects(&self) -> Box<dyn Iterator<Item = &CardObject> + '_>;
}


/// An in-memory card file system root.
#[derive(Clone, Debug, Default)]
pub struct MasterFile {
    objects: Vec<CardObject>,
}
impl MasterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object. Key references must be unique.
    pub fn add(&mut self, object: CardObject) -> Result<(), Error> {
        if let Some(key_reference) = object.key_reference() {
            if self.lookup(key_reference).is_some() {
                return Err(Error::DuplicateKeyReference { key_reference });
            }
        }
        self.objects.push(object);
        Ok(())
    }

    pub fn with(mut self, object: CardObject) -> Result<Self, Error> {
        self.add(object)?;
        Ok(self)
    }

    pub fn len(&self) -> usize { self.objects.len() }
    pub fn is_empty(&self) -> bool { self.objects.is_empty() }
}
impl CardObjectStore for MasterFile {
    fn lookup(&self, key_reference: u32) -> Option<&CardObject> {
        self.objects.iter()
            .find(|o| o.key_reference() == Some(key_reference))
    }

    fn objects(&self) -> Box<dyn Iterator<Item = &CardObject> + '_> {
        Box::new(self.objects.iter())
    }
}
