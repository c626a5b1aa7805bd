//! End-to-end conversations driven over the in-process rendezvous channel.

use std::thread;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use sasl::anonymous::{AnonymousClient, AnonymousServer};
use sasl::channel::{duplex, Incoming};
use sasl::driver::{converse_as_client, converse_as_server};
use sasl::external::ExternalServer;
use sasl::mechanism::ClientMechanism;
use sasl::plain::{PlainClient, PlainServer};
use sasl::scram::{ScramClient, ScramServer, StoredUser};
use sasl::verifier::PlainVerifierKind;

fn run_pair<C, S>(mut client: C, mut server: S) -> (sasl::Result<()>, sasl::Result<()>)
where
    C: ClientMechanism + 'static,
    S: sasl::mechanism::ServerMechanism + 'static,
{
    let ((client_out, client_in), (server_out, server_in)) = duplex();
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();

    let server_thread = thread::spawn(move || {
        let initial_response = server_in.recv(&server_cancel).unwrap_or_default();
        converse_as_server(&mut server, &initial_response, &server_in, &server_out, &server_cancel)
    });

    let client_result = converse_as_client(&mut client, &client_in, &client_out, &cancel);
    let server_result = server_thread.join().expect("server thread panicked");

    (client_result, server_result)
}

#[test]
fn anonymous_happy_path() {
    let client = AnonymousClient::new("jack@mcjack");
    let server = AnonymousServer::new(|trace| {
        if trace.contains('@') {
            Ok(())
        } else {
            Err("must provide an email address".into())
        }
    });
    let (client_result, server_result) = run_pair(client, server);
    assert!(client_result.is_ok());
    assert!(server_result.is_ok());
}

#[test]
fn anonymous_failure_is_reported_on_both_sides() {
    let client = AnonymousClient::new("jack");
    let server = AnonymousServer::new(|trace| {
        if trace.contains('@') {
            Ok(())
        } else {
            Err("must provide an email address".into())
        }
    });
    let (client_result, server_result) = run_pair(client, server);
    assert!(server_result.is_err());
    let message = server_result.unwrap_err().chain_message();
    assert!(message.contains("sasl mechanism ANONYMOUS"));
    // The rejection happens in the server's start (before it has produced a
    // challenge to send back) and ANONYMOUS carries no failure frame, so the
    // server's end of the channel closes with nothing ever sent. The client
    // observes that as a cancelled receive rather than a clean completion.
    assert!(client_result.is_err());
}

#[test]
fn plain_happy_path() {
    let client = PlainClient::new("", "jack", "mcjack");
    let verifier = PlainVerifierKind::combined(|_authzid, user, pass| {
        if user == "jack" && pass == "mcjack" {
            Ok(())
        } else {
            Err("bad credentials".into())
        }
    });
    let server = PlainServer::new(verifier);
    let (client_result, server_result) = run_pair(client, server);
    assert!(client_result.is_ok());
    assert!(server_result.is_ok());
}

#[test]
fn plain_impersonation_is_rejected() {
    let client = PlainClient::new("joe", "jack", "mcjack");
    let verifier = PlainVerifierKind::split(
        |user, pass| {
            if user == "jack" && pass == "mcjack" {
                Ok(())
            } else {
                Err("bad credentials".into())
            }
        },
        |authzid| {
            if authzid == "jane" {
                Ok(())
            } else {
                Err(format!("cannot impersonate '{authzid}'").into())
            }
        },
    );
    let server = PlainServer::new(verifier);
    let (client_result, server_result) = run_pair(client, server);
    let message = server_result.unwrap_err().chain_message();
    assert!(message.contains("cannot impersonate"));
    // Same as the ANONYMOUS case: the rejection happens in start, before any
    // challenge is sent, so the client sees the channel close rather than
    // a success.
    assert!(client_result.is_err());
}

#[test]
fn external_happy_path() {
    let client = sasl::external::ExternalClient::new("jack");
    let server = ExternalServer::new(|authzid| {
        if authzid == "jack" {
            Ok(())
        } else {
            Err("unknown identity".into())
        }
    });
    let (client_result, server_result) = run_pair(client, server);
    assert!(client_result.is_ok());
    assert!(server_result.is_ok());
}

#[test]
fn scram_happy_path() {
    let salt = b"blah".to_vec();
    let iterations = 100;
    let stored = StoredUser::derive("password", salt, iterations).unwrap();

    let client = ScramClient::new("jack", "password").with_rng(StdRng::seed_from_u64(1));
    let server = ScramServer::new(move |username| {
        if username == "jack" {
            Ok(stored.clone())
        } else {
            Err("no such user".into())
        }
    })
    .with_rng(StdRng::seed_from_u64(2));

    let (client_result, server_result) = run_pair(client, server);
    assert!(client_result.is_ok(), "{:?}", client_result);
    assert!(server_result.is_ok(), "{:?}", server_result);
}

#[test]
fn scram_wrong_password_is_rejected() {
    let salt = b"blah".to_vec();
    let iterations = 100;
    let stored = StoredUser::derive("password", salt, iterations).unwrap();

    let client = ScramClient::new("jack", "wrong").with_rng(StdRng::seed_from_u64(3));
    let server = ScramServer::new(move |username| {
        if username == "jack" {
            Ok(stored.clone())
        } else {
            Err("no such user".into())
        }
    })
    .with_rng(StdRng::seed_from_u64(4));

    let (client_result, server_result) = run_pair(client, server);
    assert!(client_result.is_err());
    assert!(server_result.is_err());
    let message = server_result.unwrap_err().chain_message();
    assert!(message.contains("client key mismatch"));
}
