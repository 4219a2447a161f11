//! Client sessions against the mock ledger
//!
//! Covers bootstrap, the spawn/update/delete lifecycle of a value instance,
//! counter coordination, the submission outcomes (replay, rejection,
//! timeouts, transport failure) and verification of served proofs.

use assert_matches::assert_matches;
use skiplight_client::{Ledger, ResponseKind};
use skiplight_core::{ClientConfig, InstanceId, LedgerError};
use skiplight_darc::DARC_CONTRACT;
use skiplight_testkit::{
    init_test_tracing, owner_darc, KeyTestFixture, LedgerFixture, FIXTURE_BLOCK_INTERVAL_MS,
    FIXTURE_SERVERS, UPDATE_COMMAND, VALUE_ARGUMENT, VALUE_CONTRACT,
};
use skiplight_tx::{Argument, ClientTransaction, CounterCoordinator, Instruction};

fn spawn_value(fx: &LedgerFixture, value: &[u8]) -> Instruction {
    Instruction::spawn(
        InstanceId::from(fx.ledger.genesis_darc().base_id()),
        VALUE_CONTRACT,
        vec![Argument::new(VALUE_ARGUMENT, value.to_vec())],
    )
}

// Spawns a value signed by the owner and returns its instance id.
async fn spawn_owned_value(fx: &LedgerFixture, value: &[u8]) -> InstanceId {
    let mut tx = ClientTransaction::new(vec![spawn_value(fx, value)]).unwrap();
    fx.ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 5)
        .await
        .unwrap();
    tx.instructions()[0].derive_id("")
}

#[tokio::test]
async fn test_bootstrap_loads_config_and_genesis_darc() {
    init_test_tracing();
    let fx = LedgerFixture::new("bootstrap").await.unwrap();

    let chain_config = fx.ledger.chain_config();
    assert_eq!(chain_config.block_interval_ms, FIXTURE_BLOCK_INTERVAL_MS);
    assert_eq!(chain_config.roster.len(), FIXTURE_SERVERS);
    assert_eq!(chain_config.roster, fx.ledger.genesis_block().roster);
    assert_eq!(
        fx.ledger.genesis_darc(),
        owner_darc(&fx.owner.identity()).unwrap()
    );

    let second = Ledger::bootstrap(fx.mock.clone(), fx.ledger.chain_id(), ClientConfig::default())
        .await
        .unwrap();
    assert_eq!(second.genesis_block(), fx.ledger.genesis_block());
    assert_eq!(second.refresh_config().await.unwrap(), chain_config);
}

#[tokio::test]
async fn test_bootstrap_unknown_chain_fails() {
    let fx = LedgerFixture::new("unknown-chain").await.unwrap();
    let bogus = skiplight_core::BlockId::new([7u8; 32]);
    let result = Ledger::bootstrap(fx.mock.clone(), bogus, ClientConfig::default()).await;
    assert_matches!(result, Err(LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config() {
    let fx = LedgerFixture::new("bad-config").await.unwrap();
    let config = ClientConfig {
        max_delegation_depth: 0,
        max_instructions: 0,
        ..ClientConfig::default()
    };
    let result = Ledger::bootstrap(fx.mock.clone(), fx.ledger.chain_id(), config).await;
    assert_matches!(result, Err(LedgerError::Config { .. }));
}

#[tokio::test]
async fn test_spawned_value_is_provable() {
    init_test_tracing();
    let fx = LedgerFixture::new("spawn").await.unwrap();
    let id = spawn_owned_value(&fx, &[0u8]).await;

    let proof = fx.ledger.get_proof(id).await.unwrap();
    fx.ledger.verify_proof(&proof).unwrap();
    assert!(proof.exists(id.as_bytes()).unwrap());

    let instance = fx.ledger.get_instance(id, VALUE_CONTRACT).await.unwrap();
    assert_eq!(instance.data, vec![0u8]);
    assert_eq!(instance.version, 0);
    assert_eq!(instance.darc_id, fx.ledger.genesis_darc().base_id());
    assert_eq!(fx.mock.counter(&fx.owner.identity()), 1);
    assert_eq!(fx.mock.block_count(), 2);
}

#[tokio::test]
async fn test_value_update_then_delete() {
    let fx = LedgerFixture::new("lifecycle").await.unwrap();
    let id = spawn_owned_value(&fx, b"first").await;

    let update = Instruction::invoke(
        id,
        VALUE_CONTRACT,
        UPDATE_COMMAND,
        vec![Argument::new(VALUE_ARGUMENT, b"second".to_vec())],
    );
    let mut tx = ClientTransaction::new(vec![update]).unwrap();
    fx.ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 5)
        .await
        .unwrap();
    let instance = fx.ledger.get_instance(id, VALUE_CONTRACT).await.unwrap();
    assert_eq!(instance.data, b"second".to_vec());
    assert_eq!(instance.version, 1);

    let mut tx = ClientTransaction::new(vec![Instruction::delete(id, VALUE_CONTRACT)]).unwrap();
    fx.ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 5)
        .await
        .unwrap();
    assert_matches!(
        fx.ledger.get_instance(id, VALUE_CONTRACT).await,
        Err(LedgerError::NotFound { .. })
    );
    assert_eq!(fx.mock.counter(&fx.owner.identity()), 3);
}

#[tokio::test]
async fn test_counters_fetched_once_per_transaction() {
    let fx = LedgerFixture::new("counters").await.unwrap();
    let alice = fx.owner.identity();
    let bob = KeyTestFixture::from_label("counters/bob").identity();
    let before = fx.mock.request_count(ResponseKind::GetSignerCounters);

    let allocated = CounterCoordinator::new(&fx.ledger)
        .allocate(&[vec![alice], vec![alice], vec![bob]])
        .await
        .unwrap();
    assert_eq!(allocated, vec![vec![1], vec![2], vec![1]]);
    assert_eq!(
        fx.mock.request_count(ResponseKind::GetSignerCounters),
        before + 1
    );
}

#[tokio::test]
async fn test_one_signer_across_instructions() {
    let fx = LedgerFixture::new("multi").await.unwrap();
    let mut tx =
        ClientTransaction::new(vec![spawn_value(&fx, b"a"), spawn_value(&fx, b"b")]).unwrap();
    let owner = fx.owner.as_signer();
    fx.ledger
        .sign_and_submit(&mut tx, &[vec![owner], vec![owner]], 5)
        .await
        .unwrap();

    assert_eq!(tx.instructions()[0].signer_counters, vec![1]);
    assert_eq!(tx.instructions()[1].signer_counters, vec![2]);
    for (instruction, value) in tx.instructions().iter().zip([b"a", b"b"]) {
        let instance = fx
            .ledger
            .get_instance(instruction.derive_id(""), VALUE_CONTRACT)
            .await
            .unwrap();
        assert_eq!(instance.data, value.to_vec());
    }
    assert_eq!(
        fx.ledger
            .get_signer_counters(&[fx.owner.identity()], 1)
            .await
            .unwrap(),
        vec![3]
    );
}

#[tokio::test]
async fn test_resubmission_is_replay() {
    let fx = LedgerFixture::new("replay").await.unwrap();
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"once")]).unwrap();
    fx.ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 5)
        .await
        .unwrap();

    assert_matches!(
        fx.ledger.submit_and_await(&tx, 5).await,
        Err(LedgerError::ReplayRejected { .. })
    );
    assert_eq!(fx.mock.block_count(), 2);
}

#[tokio::test]
async fn test_unauthorized_signer_rejected() {
    let fx = LedgerFixture::new("stranger").await.unwrap();
    let stranger = KeyTestFixture::from_label("stranger/key");
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"x")]).unwrap();

    let result = fx
        .ledger
        .sign_and_submit(&mut tx, &[vec![stranger.as_signer()]], 5)
        .await;
    assert_matches!(result, Err(LedgerError::TransactionRejected { .. }));
    assert_eq!(fx.mock.counter(&stranger.identity()), 0);
}

#[tokio::test]
async fn test_forced_rejection_surfaces_message() {
    let fx = LedgerFixture::new("reject").await.unwrap();
    fx.mock.reject_next("block full");
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"x")]).unwrap();

    let err = fx
        .ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 5)
        .await
        .unwrap_err();
    assert_matches!(err, LedgerError::TransactionRejected { .. });
    assert!(err.to_string().contains("block full"));
}

#[tokio::test]
async fn test_too_many_instructions_refused_locally() {
    let config = ClientConfig {
        max_instructions: 1,
        ..ClientConfig::default()
    };
    let fx = LedgerFixture::with_config("limit", config).await.unwrap();
    let mut tx =
        ClientTransaction::new(vec![spawn_value(&fx, b"a"), spawn_value(&fx, b"b")]).unwrap();
    let owner = fx.owner.as_signer();

    let result = fx
        .ledger
        .sign_and_submit(&mut tx, &[vec![owner], vec![owner]], 5)
        .await;
    assert_matches!(result, Err(LedgerError::Argument { .. }));
    assert_eq!(fx.mock.request_count(ResponseKind::AddTx), 0);
}

#[tokio::test]
async fn test_offline_node_is_network_error() {
    let fx = LedgerFixture::new("offline").await.unwrap();
    fx.mock.set_offline(true);

    assert_matches!(
        fx.ledger.get_proof(InstanceId::CONFIG).await,
        Err(LedgerError::Network { .. })
    );
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"x")]).unwrap();
    let result = fx
        .ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 5)
        .await;
    assert_matches!(result, Err(LedgerError::Network { .. }));
}

#[tokio::test]
async fn test_silent_node_times_out_locally() {
    let config = ClientConfig {
        wait_grace_ms: 0,
        ..ClientConfig::default()
    };
    let fx = LedgerFixture::with_config("stall", config).await.unwrap();
    fx.mock.set_stall(true);
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"x")]).unwrap();

    let result = fx
        .ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 1)
        .await;
    assert_matches!(result, Err(LedgerError::InclusionTimeout { .. }));
}

#[tokio::test]
async fn test_withheld_transaction_times_out() {
    let fx = LedgerFixture::new("withhold").await.unwrap();
    fx.mock.set_withhold(true);
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"x")]).unwrap();

    let result = fx
        .ledger
        .sign_and_submit(&mut tx, &[vec![fx.owner.as_signer()]], 2)
        .await;
    assert_matches!(result, Err(LedgerError::InclusionTimeout { .. }));
    assert_matches!(
        fx.ledger
            .get_instance(tx.instructions()[0].derive_id(""), VALUE_CONTRACT)
            .await,
        Err(LedgerError::NotFound { .. })
    );
}

#[tokio::test]
async fn test_default_wait_comes_from_config() {
    let config = ClientConfig {
        default_wait_blocks: 3,
        ..ClientConfig::default()
    };
    let fx = LedgerFixture::with_config("default-wait", config).await.unwrap();
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"first")]).unwrap();
    fx.ledger
        .sign_and_submit_default(&mut tx, &[vec![fx.owner.as_signer()]])
        .await
        .unwrap();
    assert_eq!(
        fx.ledger
            .get_instance(tx.instructions()[0].derive_id(""), VALUE_CONTRACT)
            .await
            .unwrap()
            .data,
        b"first".to_vec()
    );

    fx.mock.set_withhold(true);
    let mut tx = ClientTransaction::new(vec![spawn_value(&fx, b"second")]).unwrap();
    let coordinator = CounterCoordinator::new(&fx.ledger);
    coordinator
        .assign(&mut tx, &[vec![fx.owner.identity()]])
        .await
        .unwrap();
    tx.sign_with(&[vec![fx.owner.as_signer()]]).unwrap();
    let result = fx.ledger.submit_and_await_default(&tx).await;
    assert_matches!(result, Err(LedgerError::InclusionTimeout { wait_blocks: 3 }));
}

#[tokio::test]
async fn test_tampered_proof_rejected() {
    let fx = LedgerFixture::new("tamper").await.unwrap();
    let id = spawn_owned_value(&fx, b"honest").await;
    let honest = fx.ledger.get_proof(id).await.unwrap();
    fx.mock.set_tamper_proofs(true);

    assert_matches!(
        fx.ledger.get_instance(id, VALUE_CONTRACT).await,
        Err(LedgerError::ProtocolViolation { .. })
    );
    // The unverified accessor still hands the proof over.
    let served = fx.ledger.get_proof(id).await.unwrap();
    assert_ne!(served.value(), honest.value());
}

#[tokio::test]
async fn test_wrong_contract_kind() {
    let fx = LedgerFixture::new("kinds").await.unwrap();
    let darc_instance = InstanceId::from(fx.ledger.genesis_darc().base_id());

    assert_matches!(
        fx.ledger.get_instance(darc_instance, VALUE_CONTRACT).await,
        Err(LedgerError::ContractMismatch { .. })
    );
    let instance = fx
        .ledger
        .get_instance(darc_instance, DARC_CONTRACT)
        .await
        .unwrap();
    assert_eq!(instance.contract_kind, DARC_CONTRACT);
}

#[tokio::test]
async fn test_absent_instance_not_found() {
    let fx = LedgerFixture::new("absent").await.unwrap();
    assert_matches!(
        fx.ledger
            .get_instance(InstanceId::new([0xAB; 32]), VALUE_CONTRACT)
            .await,
        Err(LedgerError::NotFound { .. })
    );
}
