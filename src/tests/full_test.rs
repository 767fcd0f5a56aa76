// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! End-to-end protocol tests, run across every OPAQUE-capable suite.

use num_bigint::BigUint;
use rand::rngs::OsRng;

use crate::ciphersuite::{CipherSuite, P256Sha256, P384Sha384, P521Sha512, Ristretto255Sha512};
use crate::errors::ProtocolError;
use crate::group::Group;
use crate::hash::output_size;
use crate::key_exchange::{Ke1, Ke2, Ke3, NONCE_LEN};
use crate::opaque::{
    ClientLogin, ClientLoginFinishParameters, ClientRegistration,
    ClientRegistrationFinishParameters, Identifiers, ServerLogin, ServerLoginParameters,
    ServerRegistration, ServerSetup,
};

const PASSWORD: &[u8] = b"CorrectHorseBatteryStaple";
const CREDENTIAL_ID: &[u8] = &[0x31, 0x32, 0x33, 0x34];
const CONTEXT: &[u8] = b"OPAQUE-POC";

struct Registered<CS: CipherSuite> {
    server_setup: ServerSetup<CS>,
    record: ServerRegistration<CS>,
    export_key: Vec<u8>,
}

/// Runs a registration flow, passing every message through its wire
/// encoding.
fn register<CS: CipherSuite>(password: &[u8], ids: Identifiers<'_>) -> Registered<CS> {
    let mut rng = OsRng;
    let server_setup = ServerSetup::<CS>::new(&mut rng);

    let client_start = ClientRegistration::<CS>::start(&mut rng, password).unwrap();
    let request_bytes = client_start.message.serialize();

    let response = ServerRegistration::start(
        &server_setup,
        crate::messages::RegistrationRequest::deserialize(&request_bytes).unwrap(),
        CREDENTIAL_ID,
    )
    .unwrap();
    let response_bytes = response.message.serialize();

    let client_finish = client_start
        .state
        .finish(
            &mut rng,
            crate::messages::RegistrationResponse::deserialize(&response_bytes).unwrap(),
            ClientRegistrationFinishParameters {
                identifiers: ids,
                ksf: None,
            },
        )
        .unwrap();
    let upload_bytes = client_finish.message.serialize();

    let record = ServerRegistration::finish(
        crate::messages::RegistrationUpload::deserialize(&upload_bytes).unwrap(),
    );

    Registered {
        server_setup,
        record,
        export_key: client_finish.export_key,
    }
}

/// Runs a login flow against a registration, again through the wire
/// encodings, and returns (client result, server result).
fn login<CS: CipherSuite>(
    registered: &Registered<CS>,
    password: &[u8],
    ids: Identifiers<'_>,
    context: Option<&[u8]>,
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), ProtocolError> {
    let mut rng = OsRng;

    let client_start = ClientLogin::<CS>::start(&mut rng, password)?;
    let ke1_bytes = client_start.message.serialize();

    let server_start = ServerLogin::start(
        &mut rng,
        &registered.server_setup,
        Some(&registered.record),
        Ke1::deserialize(&ke1_bytes)?,
        CREDENTIAL_ID,
        ServerLoginParameters {
            context,
            identifiers: ids,
        },
    )?;
    let ke2_bytes = server_start.message.serialize();

    let client_finish = client_start.state.finish(
        Ke2::deserialize(&ke2_bytes)?,
        ClientLoginFinishParameters {
            context,
            identifiers: ids,
            ksf: None,
        },
    )?;
    let ke3_bytes = client_finish.message.serialize();

    let server_finish = server_start.state.finish(Ke3::deserialize(&ke3_bytes)?)?;

    Ok((
        client_finish.session_key,
        server_finish.session_key,
        client_finish.export_key,
    ))
}

fn run_round_trip<CS: CipherSuite>() {
    let registered = register::<CS>(PASSWORD, Identifiers::default());
    let (client_session, server_session, export_key) =
        login(&registered, PASSWORD, Identifiers::default(), Some(CONTEXT)).unwrap();

    assert_eq!(client_session, server_session);
    assert_eq!(export_key, registered.export_key);

    // A second login agrees on keys but must not reuse the session key.
    let (second_client, second_server, second_export) =
        login(&registered, PASSWORD, Identifiers::default(), Some(CONTEXT)).unwrap();
    assert_eq!(second_client, second_server);
    assert_eq!(second_export, registered.export_key);
    assert_ne!(client_session, second_client);
}

fn run_wire_sizes<CS: CipherSuite>() {
    let npk = <CS::Group as Group>::ELEM_LEN;
    let nh = output_size::<CS::Hash>();

    let mut rng = OsRng;
    let server_setup = ServerSetup::<CS>::new(&mut rng);

    let client_start = ClientRegistration::<CS>::start(&mut rng, PASSWORD).unwrap();
    assert_eq!(client_start.message.serialize().len(), npk);

    let response =
        ServerRegistration::start(&server_setup, client_start.message, CREDENTIAL_ID).unwrap();
    assert_eq!(response.message.serialize().len(), 2 * npk);

    let finish = client_start
        .state
        .finish(
            &mut rng,
            response.message,
            ClientRegistrationFinishParameters::default(),
        )
        .unwrap();
    // Record: client public key, masking key, envelope (nonce + tag).
    assert_eq!(
        finish.message.serialize().len(),
        npk + nh + (NONCE_LEN + nh)
    );
    assert_eq!(finish.export_key.len(), nh);
    let record = ServerRegistration::finish(finish.message);

    let login_start = ClientLogin::<CS>::start(&mut rng, PASSWORD).unwrap();
    assert_eq!(login_start.message.serialize().len(), npk + NONCE_LEN + npk);

    let server_start = ServerLogin::start(
        &mut rng,
        &server_setup,
        Some(&record),
        login_start.message,
        CREDENTIAL_ID,
        ServerLoginParameters::default(),
    )
    .unwrap();
    // KE2: credential response (element, masking nonce, masked
    // server-pk-plus-envelope), server nonce, key share, MAC.
    let masked_len = npk + NONCE_LEN + nh;
    assert_eq!(
        server_start.message.serialize().len(),
        (npk + NONCE_LEN + masked_len) + NONCE_LEN + npk + nh
    );

    let login_finish = login_start
        .state
        .finish(server_start.message, ClientLoginFinishParameters::default())
        .unwrap();
    assert_eq!(login_finish.message.serialize().len(), nh);
    assert_eq!(login_finish.session_key.len(), nh);
}

fn run_wrong_password<CS: CipherSuite>() {
    let registered = register::<CS>(PASSWORD, Identifiers::default());
    assert_eq!(
        login(
            &registered,
            b"wrong-password",
            Identifiers::default(),
            Some(CONTEXT)
        )
        .unwrap_err(),
        ProtocolError::AuthenticationFailed
    );
}

fn run_tampered_envelope<CS: CipherSuite>() {
    let registered = register::<CS>(PASSWORD, Identifiers::default());

    // Flip a bit in the stored record's envelope tag.
    let mut record_bytes = registered.record.serialize();
    *record_bytes.last_mut().unwrap() ^= 1;
    let tampered = Registered {
        server_setup: registered.server_setup,
        record: ServerRegistration::deserialize(&record_bytes).unwrap(),
        export_key: registered.export_key,
    };

    assert_eq!(
        login(&tampered, PASSWORD, Identifiers::default(), None).unwrap_err(),
        ProtocolError::AuthenticationFailed
    );
}

fn run_identity_binding<CS: CipherSuite>() {
    let ids = Identifiers {
        client: Some(b"alice"),
        server: Some(b"server.example.com"),
    };
    let registered = register::<CS>(PASSWORD, ids);

    // Matching identities succeed.
    login(&registered, PASSWORD, ids, None).unwrap();

    // Dropping them on login fails the envelope check.
    assert_eq!(
        login(&registered, PASSWORD, Identifiers::default(), None).unwrap_err(),
        ProtocolError::AuthenticationFailed
    );
}

fn run_context_binding<CS: CipherSuite>() {
    let registered = register::<CS>(PASSWORD, Identifiers::default());

    let mut rng = OsRng;
    let client_start = ClientLogin::<CS>::start(&mut rng, PASSWORD).unwrap();
    let server_start = ServerLogin::start(
        &mut rng,
        &registered.server_setup,
        Some(&registered.record),
        client_start.message,
        CREDENTIAL_ID,
        ServerLoginParameters {
            context: Some(CONTEXT),
            identifiers: Identifiers::default(),
        },
    )
    .unwrap();

    // The client computes the preamble over a different context, so the
    // server MAC cannot verify.
    assert_eq!(
        client_start
            .state
            .finish(
                server_start.message,
                ClientLoginFinishParameters {
                    context: Some(b"other context"),
                    identifiers: Identifiers::default(),
                    ksf: None,
                }
            )
            .unwrap_err(),
        ProtocolError::AuthenticationFailed
    );
}

fn run_tampered_ke3<CS: CipherSuite>() {
    let registered = register::<CS>(PASSWORD, Identifiers::default());
    let mut rng = OsRng;

    let client_start = ClientLogin::<CS>::start(&mut rng, PASSWORD).unwrap();
    let server_start = ServerLogin::start(
        &mut rng,
        &registered.server_setup,
        Some(&registered.record),
        client_start.message,
        CREDENTIAL_ID,
        ServerLoginParameters::default(),
    )
    .unwrap();
    let client_finish = client_start
        .state
        .finish(server_start.message, ClientLoginFinishParameters::default())
        .unwrap();

    let mut ke3_bytes = client_finish.message.serialize();
    ke3_bytes[0] ^= 1;
    assert_eq!(
        server_start
            .state
            .finish(Ke3::deserialize(&ke3_bytes).unwrap())
            .unwrap_err(),
        ProtocolError::AuthenticationFailed
    );
}

/// The user-enumeration defense: an unknown credential identifier yields
/// a KE2 that is stable for fixed randomness (same identifier, same OPRF
/// seed, even across a serialize/deserialize "restart" of the server
/// setup) and differs between identifiers.
fn run_enumeration_defense<CS: CipherSuite>() {
    let mut rng = OsRng;
    let server_setup = ServerSetup::<CS>::new(&mut rng);
    let restarted = ServerSetup::<CS>::deserialize(&server_setup.serialize()).unwrap();

    let ke1 = ClientLogin::<CS>::start_with(
        PASSWORD,
        BigUint::from(7u32),
        [1; NONCE_LEN],
        BigUint::from(9u32),
    )
    .unwrap()
    .message;

    let fake_ke2 = |setup: &ServerSetup<CS>, cred_id: &[u8]| {
        ServerLogin::start_with(
            setup,
            None,
            ke1.clone(),
            cred_id,
            ServerLoginParameters::default(),
            [2; NONCE_LEN],
            [3; NONCE_LEN],
            BigUint::from(11u32),
        )
        .unwrap()
        .message
        .serialize()
    };

    let first = fake_ke2(&server_setup, b"unknown-alice");
    let replay = fake_ke2(&restarted, b"unknown-alice");
    assert_eq!(first, replay);

    let other = fake_ke2(&server_setup, b"unknown-bob");
    assert_ne!(first, other);
}

fn run_state_serialization<CS: CipherSuite>() {
    let mut rng = OsRng;
    let server_setup = ServerSetup::<CS>::new(&mut rng);

    let client_start = ClientRegistration::<CS>::start(&mut rng, PASSWORD).unwrap();
    let reg_state =
        ClientRegistration::<CS>::deserialize(&client_start.state.serialize()).unwrap();
    let response =
        ServerRegistration::start(&server_setup, client_start.message, CREDENTIAL_ID).unwrap();
    let finish = reg_state
        .finish(
            &mut rng,
            response.message,
            ClientRegistrationFinishParameters::default(),
        )
        .unwrap();
    let record = ServerRegistration::finish(finish.message);

    let login_start = ClientLogin::<CS>::start(&mut rng, PASSWORD).unwrap();
    let login_state = ClientLogin::<CS>::deserialize(&login_start.state.serialize()).unwrap();
    let server_start = ServerLogin::start(
        &mut rng,
        &server_setup,
        Some(&record),
        login_start.message,
        CREDENTIAL_ID,
        ServerLoginParameters::default(),
    )
    .unwrap();
    let server_state = ServerLogin::<CS>::deserialize(&server_start.state.serialize()).unwrap();

    let client_finish = login_state
        .finish(server_start.message, ClientLoginFinishParameters::default())
        .unwrap();
    let server_finish = server_state.finish(client_finish.message).unwrap();
    assert_eq!(client_finish.session_key, server_finish.session_key);
    assert_eq!(client_finish.export_key, finish.export_key);
}

fn run_garbage_messages<CS: CipherSuite>() {
    // An all-zero KE1 carries an invalid group element.
    assert!(Ke1::<CS>::deserialize(&vec![0; Ke1::<CS>::len()]).is_err());
    // Truncated input.
    assert_eq!(
        Ke1::<CS>::deserialize(&[0; 3]).unwrap_err(),
        ProtocolError::InvalidLength
    );
}

macro_rules! suite_tests {
    ($name:ident, $suite:ty) => {
        mod $name {
            use super::*;

            #[test]
            fn round_trip() {
                run_round_trip::<$suite>();
            }

            #[test]
            fn wire_sizes() {
                run_wire_sizes::<$suite>();
            }

            #[test]
            fn wrong_password() {
                run_wrong_password::<$suite>();
            }

            #[test]
            fn tampered_envelope() {
                run_tampered_envelope::<$suite>();
            }

            #[test]
            fn identity_binding() {
                run_identity_binding::<$suite>();
            }

            #[test]
            fn context_binding() {
                run_context_binding::<$suite>();
            }

            #[test]
            fn tampered_ke3() {
                run_tampered_ke3::<$suite>();
            }

            #[test]
            fn enumeration_defense() {
                run_enumeration_defense::<$suite>();
            }

            #[test]
            fn state_serialization() {
                run_state_serialization::<$suite>();
            }

            #[test]
            fn garbage_messages() {
                run_garbage_messages::<$suite>();
            }
        }
    };
}

suite_tests!(p256, P256Sha256);
suite_tests!(p384, P384Sha384);
suite_tests!(p521, P521Sha512);
suite_tests!(ristretto255, Ristretto255Sha512);

#[cfg(feature = "argon2")]
mod argon2_ksf {
    use argon2::{Algorithm, Argon2, Params, Version};

    use super::*;
    use crate::group::NistP256;

    struct P256Argon2;

    impl CipherSuite for P256Argon2 {
        const ID: &'static str = "P256-SHA256";
        type Group = NistP256;
        type Hash = sha2::Sha256;
        type Ksf = Argon2<'static>;
    }

    fn light_ksf() -> Argon2<'static> {
        Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(8 * 1024, 1, 1, None).unwrap(),
        )
    }

    fn heavy_ksf() -> Argon2<'static> {
        Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(8 * 1024, 3, 1, None).unwrap(),
        )
    }

    #[test]
    fn matching_parameters_round_trip() {
        let mut rng = OsRng;
        let server_setup = ServerSetup::<P256Argon2>::new(&mut rng);
        let ksf = light_ksf();

        let client_start = ClientRegistration::<P256Argon2>::start(&mut rng, PASSWORD).unwrap();
        let response =
            ServerRegistration::start(&server_setup, client_start.message, CREDENTIAL_ID).unwrap();
        let finish = client_start
            .state
            .finish(
                &mut rng,
                response.message,
                ClientRegistrationFinishParameters {
                    identifiers: Identifiers::default(),
                    ksf: Some(&ksf),
                },
            )
            .unwrap();
        let record = ServerRegistration::finish(finish.message);

        let login_start = ClientLogin::<P256Argon2>::start(&mut rng, PASSWORD).unwrap();
        let server_start = ServerLogin::start(
            &mut rng,
            &server_setup,
            Some(&record),
            login_start.message,
            CREDENTIAL_ID,
            ServerLoginParameters::default(),
        )
        .unwrap();
        let client_finish = login_start
            .state
            .finish(
                server_start.message,
                ClientLoginFinishParameters {
                    context: None,
                    identifiers: Identifiers::default(),
                    ksf: Some(&light_ksf()),
                },
            )
            .unwrap();
        let server_finish = server_start.state.finish(client_finish.message).unwrap();
        assert_eq!(client_finish.session_key, server_finish.session_key);
    }

    /// Mismatched Argon2id parameters between registration and login are
    /// indistinguishable from a wrong password.
    #[test]
    fn mismatched_parameters_fail_like_wrong_password() {
        let mut rng = OsRng;
        let server_setup = ServerSetup::<P256Argon2>::new(&mut rng);
        let ksf = light_ksf();

        let client_start = ClientRegistration::<P256Argon2>::start(&mut rng, PASSWORD).unwrap();
        let response =
            ServerRegistration::start(&server_setup, client_start.message, CREDENTIAL_ID).unwrap();
        let finish = client_start
            .state
            .finish(
                &mut rng,
                response.message,
                ClientRegistrationFinishParameters {
                    identifiers: Identifiers::default(),
                    ksf: Some(&ksf),
                },
            )
            .unwrap();
        let record = ServerRegistration::finish(finish.message);

        let login_start = ClientLogin::<P256Argon2>::start(&mut rng, PASSWORD).unwrap();
        let server_start = ServerLogin::start(
            &mut rng,
            &server_setup,
            Some(&record),
            login_start.message,
            CREDENTIAL_ID,
            ServerLoginParameters::default(),
        )
        .unwrap();
        assert_eq!(
            login_start
                .state
                .finish(
                    server_start.message,
                    ClientLoginFinishParameters {
                        context: None,
                        identifiers: Identifiers::default(),
                        ksf: Some(&heavy_ksf()),
                    }
                )
                .unwrap_err(),
            ProtocolError::AuthenticationFailed
        );
    }
}
