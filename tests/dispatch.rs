//! Submission dispatcher tests against a scripted chain.

use std::time::Duration;

use tx_correlator::chain::{DispatchError, ErrorMetadata, ModuleError, TxStatus};
use tx_correlator::dispatch::{DispatchFailure, Dispatcher, SubmissionOutcome, SubmissionUnit};
use tx_correlator::session::CancelToken;

mod common;
use common::{block_hash, extrinsic_hash, MockChain, MockSigner, MockTx};

fn included(height: u64, index: u32) -> MockTx {
    MockTx::included(block_hash(height), extrinsic_hash(height, index))
}

fn reason(outcome: &SubmissionOutcome) -> &str {
    match outcome {
        SubmissionOutcome::Rejected { reason } => reason.as_str(),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_units_are_sent_with_their_own_nonces_round_robin() {
    let chain = MockChain::new(6_000);
    let alice = MockSigner::new(0xa);
    let bob = MockSigner::new(0xb);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let units = vec![
        SubmissionUnit::new(included(1, 0), 7, 0),
        SubmissionUnit::new(included(1, 1), 3, 1),
        SubmissionUnit::new(included(1, 2), 8, 2),
    ];
    let outcomes = dispatcher.dispatch_all(&units, &[alice.clone(), bob.clone()]).await;

    assert!(outcomes.iter().all(SubmissionOutcome::is_included));
    assert_eq!(outcomes[1].tx_hash(), Some(extrinsic_hash(1, 1)));

    let mut sent = chain.sent();
    sent.sort();
    assert_eq!(sent, vec![(alice.0.clone(), 7), (alice.0.clone(), 8), (bob.0.clone(), 3)]);
}

#[tokio::test]
async fn test_module_dispatch_error_is_decoded() {
    let mut chain = MockChain::new(6_000);
    chain.register_module_error(
        42,
        [3, 0, 0, 0],
        ErrorMetadata {
            section: "identityManagement".into(),
            name: "IdentityAlreadyExists".into(),
            docs: vec!["The identity is already linked".into()],
        },
    );
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let tx = MockTx::failing(
        block_hash(4),
        extrinsic_hash(4, 1),
        DispatchError::Module(ModuleError {
            index: 42,
            error: [3, 0, 0, 0],
        }),
    );
    let outcomes = dispatcher
        .dispatch_all(&[SubmissionUnit::new(tx, 0, 0)], &[MockSigner::new(0xa)])
        .await;

    match &outcomes[0] {
        SubmissionOutcome::DispatchFailed { failure, tx_hash, .. } => {
            assert_eq!(
                failure,
                &DispatchFailure::Module {
                    module: "identityManagement".into(),
                    name: "IdentityAlreadyExists".into(),
                    docs: vec!["The identity is already linked".into()],
                }
            );
            assert_eq!(*tx_hash, extrinsic_hash(4, 1));
        }
        other => panic!("expected dispatch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_module_error_stays_raw() {
    let chain = MockChain::new(6_000);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let tx = MockTx::failing(
        block_hash(4),
        extrinsic_hash(4, 1),
        DispatchError::Module(ModuleError {
            index: 9,
            error: [1, 0, 0, 0],
        }),
    );
    let outcomes = dispatcher
        .dispatch_all(&[SubmissionUnit::new(tx, 0, 0)], &[MockSigner::new(0xa)])
        .await;

    match &outcomes[0] {
        SubmissionOutcome::DispatchFailed {
            failure: DispatchFailure::Raw(raw),
            ..
        } => assert!(raw.contains("index: 9")),
        other => panic!("expected raw dispatch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_unit_does_not_affect_siblings() {
    let chain = MockChain::new(6_000);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let units = vec![
        SubmissionUnit::new(included(2, 0), 0, 0),
        SubmissionUnit::new(MockTx::invalid("bad proof"), 0, 1),
        SubmissionUnit::new(included(2, 1), 0, 2),
    ];
    let signers = vec![MockSigner::new(0xa), MockSigner::new(0xb), MockSigner::new(0xc)];
    let outcomes = dispatcher.dispatch_all(&units, &signers).await;

    assert!(outcomes[0].is_included());
    assert!(reason(&outcomes[1]).contains("Invalid: bad proof"));
    assert!(outcomes[2].is_included());
}

#[tokio::test]
async fn test_dropped_and_usurped_are_rejections() {
    let chain = MockChain::new(6_000);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let units = vec![
        SubmissionUnit::new(MockTx::scripted(vec![TxStatus::Ready, TxStatus::Dropped("pool full".into())]), 0, 0),
        SubmissionUnit::new(MockTx::scripted(vec![TxStatus::Usurped(extrinsic_hash(9, 9))]), 0, 1),
        SubmissionUnit::new(MockTx::scripted(vec![TxStatus::Ready, TxStatus::Broadcast]), 0, 2),
    ];
    let signers = vec![MockSigner::new(0xa), MockSigner::new(0xb), MockSigner::new(0xc)];
    let outcomes = dispatcher.dispatch_all(&units, &signers).await;

    assert!(reason(&outcomes[0]).contains("Dropped"));
    assert!(reason(&outcomes[1]).contains("Usurped"));
    assert!(reason(&outcomes[2]).contains("ended before inclusion"));
}

#[tokio::test]
async fn test_finalized_counts_as_included() {
    let chain = MockChain::new(6_000);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let tx = MockTx::scripted(vec![TxStatus::Finalized {
        block_hash: block_hash(3),
        tx_hash: extrinsic_hash(3, 0),
    }]);
    let outcomes = dispatcher
        .dispatch_all(&[SubmissionUnit::new(tx, 0, 0)], &[MockSigner::new(0xa)])
        .await;

    assert!(outcomes[0].is_included());
}

#[tokio::test]
async fn test_duplicate_nonce_is_rejected_unsent() {
    let chain = MockChain::new(6_000);
    let alice = MockSigner::new(0xa);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let units = vec![
        SubmissionUnit::new(included(1, 0), 4, 0),
        SubmissionUnit::new(included(1, 1), 4, 0),
    ];
    let outcomes = dispatcher.dispatch_all(&units, &[alice.clone()]).await;

    assert!(outcomes[0].is_included());
    assert!(reason(&outcomes[1]).contains("nonce 4 already used"));
    assert_eq!(chain.sent(), vec![(alice.0.clone(), 4)]);
}

#[tokio::test]
async fn test_fee_estimation_failure_rejects_before_sending() {
    let chain = MockChain::new(6_000);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let mut tx = included(1, 0);
    tx.fee_error = true;
    let outcomes = dispatcher
        .dispatch_all(&[SubmissionUnit::new(tx, 0, 0)], &[MockSigner::new(0xa)])
        .await;

    assert!(reason(&outcomes[0]).contains("fee estimation failed"));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_no_signers_rejects_every_unit() {
    let chain = MockChain::new(6_000);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let units = vec![
        SubmissionUnit::new(included(1, 0), 0, 0),
        SubmissionUnit::new(included(1, 1), 1, 0),
    ];
    let outcomes = dispatcher.dispatch_all(&units, &[]).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| reason(o).contains("no signer")));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_cancel_releases_pending_units() {
    let chain = MockChain::new(6_000);
    let cancel = CancelToken::new();
    let dispatcher = Dispatcher::new(&chain, cancel.clone());

    let mut tx = MockTx::scripted(vec![TxStatus::Ready]);
    tx.stalls = true;

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcomes = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.dispatch_all(&[SubmissionUnit::new(tx, 0, 0)], &[MockSigner::new(0xa)]),
    )
    .await
    .expect("cancel should release the unit");

    assert!(reason(&outcomes[0]).contains("cancelled"));
}

#[tokio::test]
async fn test_send_until_in_block_uses_next_index() {
    let mut chain = MockChain::new(6_000);
    let alice = MockSigner::new(0xa);
    chain.set_next_index(alice.0.clone(), 42);
    let dispatcher = Dispatcher::new(&chain, CancelToken::new());

    let outcome = dispatcher
        .send_until_in_block(&alice, &included(5, 0))
        .await
        .unwrap();

    assert!(outcome.is_included());
    assert_eq!(chain.sent(), vec![(alice.0.clone(), 42)]);
}
