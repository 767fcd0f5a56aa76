// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Contains the messages used for OPAQUE

use derive_where::derive_where;

use crate::ciphersuite::CipherSuite;
use crate::envelope::Envelope;
use crate::errors::utils::check_slice_size;
use crate::errors::ProtocolError;
use crate::group::Group;
use crate::hash::output_size;
use crate::key_exchange::NONCE_LEN;
use crate::keypair::PublicKey;
use crate::oprf::{BlindedElement, EvaluationElement, GroupElem};

/// The message sent by the client to the server to initiate registration.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct RegistrationRequest<CS: CipherSuite> {
    /// Blinded password information
    pub(crate) blinded_element: BlindedElement<CS>,
}

/// The answer sent by the server to the client upon reception of the
/// registration attempt.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct RegistrationResponse<CS: CipherSuite> {
    /// The server's OPRF output
    pub(crate) evaluation_element: EvaluationElement<CS>,
    /// The server's static public key
    pub(crate) server_public_key: PublicKey<CS::Group>,
}

/// The final registration message: the record the server stores. Contains
/// the client's public key, the masking key, and the sealed envelope.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct RegistrationUpload<CS: CipherSuite> {
    /// The client's derived public key
    pub(crate) client_public_key: PublicKey<CS::Group>,
    /// The key used to mask the credential response
    pub(crate) masking_key: Vec<u8>,
    /// The envelope over the client's cleartext credentials
    pub(crate) envelope: Envelope<CS>,
}

/// The OPRF part of KE1.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct CredentialRequest<CS: CipherSuite> {
    pub(crate) blinded_element: BlindedElement<CS>,
}

/// The OPRF-and-credentials part of KE2: the evaluated element and the
/// masked server public key and envelope.
#[derive_where(Clone, Debug, Eq, PartialEq; GroupElem<CS>)]
pub struct CredentialResponse<CS: CipherSuite> {
    pub(crate) evaluation_element: EvaluationElement<CS>,
    pub(crate) masking_nonce: [u8; NONCE_LEN],
    pub(crate) masked_response: Vec<u8>,
}

/// The length of the one-time-pad-masked `server_public_key || envelope`
/// block in a credential response.
pub(crate) fn masked_response_len<CS: CipherSuite>() -> usize {
    <CS::Group as Group>::ELEM_LEN + Envelope::<CS>::len()
}

impl<CS: CipherSuite> RegistrationRequest<CS> {
    pub(crate) fn len() -> usize {
        <CS::Group as Group>::ELEM_LEN
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.blinded_element.serialize()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_slice_size(bytes, Self::len())?;
        Ok(Self {
            blinded_element: BlindedElement::deserialize(bytes)?,
        })
    }
}

impl<CS: CipherSuite> RegistrationResponse<CS> {
    pub(crate) fn len() -> usize {
        2 * <CS::Group as Group>::ELEM_LEN
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.evaluation_element.serialize();
        out.extend_from_slice(&self.server_public_key.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        let elem_len = <CS::Group as Group>::ELEM_LEN;
        Ok(Self {
            evaluation_element: EvaluationElement::deserialize(&checked[..elem_len])?,
            server_public_key: PublicKey::deserialize(&checked[elem_len..])?,
        })
    }
}

impl<CS: CipherSuite> RegistrationUpload<CS> {
    pub(crate) fn len() -> usize {
        <CS::Group as Group>::ELEM_LEN + output_size::<CS::Hash>() + Envelope::<CS>::len()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.client_public_key.serialize();
        out.extend_from_slice(&self.masking_key);
        out.extend_from_slice(&self.envelope.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        let elem_len = <CS::Group as Group>::ELEM_LEN;
        let nh = output_size::<CS::Hash>();
        Ok(Self {
            client_public_key: PublicKey::deserialize(&checked[..elem_len])?,
            masking_key: checked[elem_len..elem_len + nh].to_vec(),
            envelope: Envelope::deserialize(&checked[elem_len + nh..])?,
        })
    }
}

impl<CS: CipherSuite> CredentialRequest<CS> {
    pub(crate) fn len() -> usize {
        <CS::Group as Group>::ELEM_LEN
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.blinded_element.serialize()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_slice_size(bytes, Self::len())?;
        Ok(Self {
            blinded_element: BlindedElement::deserialize(bytes)?,
        })
    }
}

impl<CS: CipherSuite> CredentialResponse<CS> {
    pub(crate) fn len() -> usize {
        <CS::Group as Group>::ELEM_LEN + NONCE_LEN + masked_response_len::<CS>()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.evaluation_element.serialize();
        out.extend_from_slice(&self.masking_nonce);
        out.extend_from_slice(&self.masked_response);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let checked = check_slice_size(bytes, Self::len())?;
        let elem_len = <CS::Group as Group>::ELEM_LEN;
        let mut masking_nonce = [0; NONCE_LEN];
        masking_nonce.copy_from_slice(&checked[elem_len..elem_len + NONCE_LEN]);
        Ok(Self {
            evaluation_element: EvaluationElement::deserialize(&checked[..elem_len])?,
            masking_nonce,
            masked_response: checked[elem_len + NONCE_LEN..].to_vec(),
        })
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;
    use crate::key_exchange::{Ke1, Ke2, Ke3};

    macro_rules! impl_serde_via_bytes {
        ($name:ident) => {
            impl<CS: CipherSuite> serde::Serialize for $name<CS> {
                fn serialize<S: serde::Serializer>(
                    &self,
                    serializer: S,
                ) -> Result<S::Ok, S::Error> {
                    serde::Serialize::serialize(&$name::serialize(self), serializer)
                }
            }

            impl<'de, CS: CipherSuite> serde::Deserialize<'de> for $name<CS> {
                fn deserialize<D: serde::Deserializer<'de>>(
                    deserializer: D,
                ) -> Result<Self, D::Error> {
                    let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
                    $name::deserialize(&bytes).map_err(serde::de::Error::custom)
                }
            }
        };
    }

    impl_serde_via_bytes!(RegistrationRequest);
    impl_serde_via_bytes!(RegistrationResponse);
    impl_serde_via_bytes!(RegistrationUpload);
    impl_serde_via_bytes!(CredentialRequest);
    impl_serde_via_bytes!(CredentialResponse);
    impl_serde_via_bytes!(Ke1);
    impl_serde_via_bytes!(Ke2);
    impl_serde_via_bytes!(Ke3);

    use crate::opaque::{
        ClientLogin, ClientRegistration, ServerLogin, ServerRegistration, ServerSetup,
    };

    impl_serde_via_bytes!(ClientLogin);
    impl_serde_via_bytes!(ClientRegistration);
    impl_serde_via_bytes!(ServerLogin);
    impl_serde_via_bytes!(ServerRegistration);
    impl_serde_via_bytes!(ServerSetup);
}
