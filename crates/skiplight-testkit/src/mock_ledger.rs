//! In-memory ledger node
//!
//! [`MockLedger`] answers every request kind a [`Connection`] carries. It keeps
//! global state in a [`MemoryTrie`], appends one signed block per accepted
//! transaction, and enforces what a real node would: direct-key signatures
//! over the transaction hash, consecutive signer counters, and Darc rules
//! (including delegation) for every instruction.
//!
//! Two contracts are understood: `value`, a single byte-string slot, and
//! `darc`, which stores Darcs under their base id. Failure modes can be
//! switched on to exercise the client: offline transport, a node that never
//! answers, a node that reports no inclusion, a forced rejection and
//! tampered proofs.

use crate::chain::SignedChain;
use crate::trie::MemoryTrie;
use async_trait::async_trait;
use parking_lot::Mutex;
use skiplight_client::{
    AddTxRequest, AddTxResponse, ChainConfig, Connection, CreateGenesisBlock,
    CreateGenesisBlockResponse, GetBlockResponse, GetProofResponse, GetSignerCountersResponse,
    LedgerRequest, LedgerResponse, RejectReason, ResponseKind, TxOutcome, CONFIG_CONTRACT,
    DARC_ARGUMENT, EVOLVE_COMMAND,
};
use skiplight_core::{BlockId, DarcId, Ed25519SigningKey, InstanceId, LedgerError, Result};
use skiplight_darc::{Darc, DarcProvider, DelegationResolver, Identity, DARC_CONTRACT};
use skiplight_proof::{DataHeader, StateBody};
use skiplight_tx::{ClientTransaction, Instruction, InstructionKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Contract holding one byte string
pub const VALUE_CONTRACT: &str = "value";

/// Argument carrying the byte string of the value contract
pub const VALUE_ARGUMENT: &str = "value";

/// Value-contract command replacing the byte string
pub const UPDATE_COMMAND: &str = "update";

/// Delegation hops the node follows when checking rules
pub const NODE_DELEGATION_DEPTH: usize = 16;

const TRIE_NONCE: &[u8] = b"skiplight-testkit";

#[derive(Debug, Clone, Default)]
struct Behavior {
    offline: bool,
    stall: bool,
    withhold: bool,
    tamper_proofs: bool,
    reject_next: Option<String>,
}

#[derive(Debug)]
struct ChainState {
    chain: SignedChain,
    trie: MemoryTrie,
    counters: HashMap<Identity, u64>,
    block_interval_ms: u64,
}

#[derive(Debug)]
struct Inner {
    server_keys: Vec<Ed25519SigningKey>,
    state: Option<ChainState>,
    behavior: Behavior,
    requests: HashMap<ResponseKind, usize>,
}

impl Inner {
    fn state(&self, chain_id: &BlockId) -> Result<&ChainState> {
        match &self.state {
            Some(state) if state.chain.chain_id() == *chain_id => Ok(state),
            _ => Err(LedgerError::not_found(format!("chain {chain_id}"))),
        }
    }

    fn state_mut(&mut self, chain_id: &BlockId) -> Result<&mut ChainState> {
        match &mut self.state {
            Some(state) if state.chain.chain_id() == *chain_id => Ok(state),
            _ => Err(LedgerError::not_found(format!("chain {chain_id}"))),
        }
    }
}

/// Single-chain in-memory ledger node; clones share state
#[derive(Debug, Clone)]
pub struct MockLedger {
    inner: Arc<Mutex<Inner>>,
}

impl MockLedger {
    /// Node whose chain will be signed by `server_keys`
    pub fn new(server_keys: Vec<Ed25519SigningKey>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                server_keys,
                state: None,
                behavior: Behavior::default(),
                requests: HashMap::new(),
            })),
        }
    }

    /// Fail every request with a network error
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().behavior.offline = offline;
    }

    /// Never answer transaction submissions
    pub fn set_stall(&self, stall: bool) {
        self.inner.lock().behavior.stall = stall;
    }

    /// Answer submissions with "not included" and drop them
    pub fn set_withhold(&self, withhold: bool) {
        self.inner.lock().behavior.withhold = withhold;
    }

    /// Serve proofs whose leaf value has one byte flipped
    pub fn set_tamper_proofs(&self, tamper: bool) {
        self.inner.lock().behavior.tamper_proofs = tamper;
    }

    /// Reject the next submission with `message`
    pub fn reject_next(&self, message: impl Into<String>) {
        self.inner.lock().behavior.reject_next = Some(message.into());
    }

    /// Hand the chain to new servers from the next block on
    pub fn rotate_roster(&self, keys: Vec<Ed25519SigningKey>) -> Result<()> {
        let mut inner = self.inner.lock();
        let state = inner
            .state
            .as_mut()
            .ok_or_else(|| LedgerError::not_found("no chain created yet"))?;
        state.chain.rotate_roster(keys)
    }

    /// Requests received of one kind
    pub fn request_count(&self, kind: ResponseKind) -> usize {
        self.inner.lock().requests.get(&kind).copied().unwrap_or(0)
    }

    /// Number of blocks, genesis included
    pub fn block_count(&self) -> usize {
        self.inner
            .lock()
            .state
            .as_ref()
            .map_or(0, |state| state.chain.blocks().len())
    }

    /// Last accepted counter of `identity`
    pub fn counter(&self, identity: &Identity) -> u64 {
        self.inner
            .lock()
            .state
            .as_ref()
            .and_then(|state| state.counters.get(identity).copied())
            .unwrap_or(0)
    }

    fn create_genesis(&self, request: CreateGenesisBlock) -> Result<LedgerResponse> {
        let mut inner = self.inner.lock();
        if inner.state.is_some() {
            return Err(LedgerError::argument("chain already created"));
        }
        if request.genesis_darc.version() != 0 {
            return Err(LedgerError::argument("genesis darc must be version 0"));
        }

        let darc_id = request.genesis_darc.base_id();
        let chain_config = ChainConfig {
            roster: request.roster.clone(),
            block_interval_ms: request.block_interval_ms,
            max_block_size: request.max_block_size,
        };
        let mut trie = MemoryTrie::new(TRIE_NONCE);
        let config_body = StateBody {
            contract_kind: CONFIG_CONTRACT.to_string(),
            value: chain_config.to_bytes()?,
            version: 0,
            darc_id,
        };
        trie.insert(InstanceId::CONFIG.as_bytes().to_vec(), config_body.to_bytes()?);
        let darc_body = StateBody {
            contract_kind: DARC_CONTRACT.to_string(),
            value: request.genesis_darc.to_bytes()?,
            version: 0,
            darc_id,
        };
        trie.insert(InstanceId::from(darc_id).as_bytes().to_vec(), darc_body.to_bytes()?);

        let header = DataHeader {
            trie_root: trie.root_hash(),
            client_tx_hash: [0u8; 32],
            timestamp: 0,
        };
        let chain = SignedChain::with_roster(request.roster, inner.server_keys.clone(), &header)?;
        let genesis = chain.genesis_block().clone();
        debug!(chain = %genesis.hash, "mock chain created");

        inner.state = Some(ChainState {
            chain,
            trie,
            counters: HashMap::new(),
            block_interval_ms: request.block_interval_ms,
        });
        Ok(LedgerResponse::CreateGenesisBlock(
            CreateGenesisBlockResponse { genesis },
        ))
    }

    async fn add_tx(&self, request: AddTxRequest, behavior: Behavior) -> Result<LedgerResponse> {
        if behavior.stall {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }

        let (trie, counters) = {
            let mut inner = self.inner.lock();
            if let Some(message) = inner.behavior.reject_next.take() {
                return Ok(rejected(RejectReason::Invalid, message));
            }
            let state = inner.state(&request.chain_id)?;
            (state.trie.clone(), state.counters.clone())
        };

        let outcome = match apply(&request.transaction, trie, counters).await {
            Err(rejection) => {
                warn!(?rejection, "mock ledger rejected transaction");
                return Ok(match rejection {
                    Rejection::Replay(message) => rejected(RejectReason::Replay, message),
                    Rejection::Invalid(message) => rejected(RejectReason::Invalid, message),
                });
            }
            Ok(_) if behavior.withhold => TxOutcome::TimedOut,
            Ok((trie, counters)) => {
                let mut inner = self.inner.lock();
                let state = inner.state_mut(&request.chain_id)?;
                let index = state.chain.latest().index + 1;
                let header = DataHeader {
                    trie_root: trie.root_hash(),
                    client_tx_hash: request.transaction.hash(),
                    timestamp: index * state.block_interval_ms,
                };
                state.chain.append(&header)?;
                state.trie = trie;
                state.counters = counters;
                debug!(block = index, "mock ledger appended block");
                TxOutcome::Accepted
            }
        };
        Ok(LedgerResponse::AddTx(AddTxResponse { outcome }))
    }
}

#[async_trait]
impl Connection for MockLedger {
    async fn send(&self, request: LedgerRequest, expected: ResponseKind) -> Result<LedgerResponse> {
        let behavior = {
            let mut inner = self.inner.lock();
            *inner.requests.entry(expected).or_default() += 1;
            inner.behavior.clone()
        };
        if behavior.offline {
            return Err(LedgerError::network("mock ledger is offline"));
        }

        match request {
            LedgerRequest::CreateGenesisBlock(request) => self.create_genesis(request),
            LedgerRequest::AddTx(request) => self.add_tx(request, behavior).await,
            LedgerRequest::GetBlock(request) => {
                let inner = self.inner.lock();
                let block = inner
                    .state
                    .as_ref()
                    .and_then(|state| state.chain.block(&request.id))
                    .cloned()
                    .ok_or_else(|| LedgerError::not_found(format!("block {}", request.id)))?;
                Ok(LedgerResponse::GetBlock(GetBlockResponse { block }))
            }
            LedgerRequest::GetProof(request) => {
                let inner = self.inner.lock();
                let state = inner.state(&request.chain_id)?;
                let mut inclusion = state.trie.prove(request.key.as_bytes());
                if behavior.tamper_proofs {
                    if let Some(byte) = inclusion.leaf.as_mut().and_then(|leaf| leaf.value.last_mut()) {
                        *byte ^= 0x01;
                    }
                }
                let proof = state.chain.proof(inclusion);
                Ok(LedgerResponse::GetProof(GetProofResponse { proof }))
            }
            LedgerRequest::GetSignerCounters(request) => {
                let inner = self.inner.lock();
                let state = inner.state(&request.chain_id)?;
                let counters = request
                    .identities
                    .iter()
                    .map(|identity| state.counters.get(identity).copied().unwrap_or(0))
                    .collect();
                Ok(LedgerResponse::GetSignerCounters(
                    GetSignerCountersResponse { counters },
                ))
            }
        }
    }
}

fn rejected(reason: RejectReason, message: String) -> LedgerResponse {
    LedgerResponse::AddTx(AddTxResponse {
        outcome: TxOutcome::Rejected { reason, message },
    })
}

#[derive(Debug)]
enum Rejection {
    Replay(String),
    Invalid(String),
}

fn invalid(error: LedgerError) -> Rejection {
    Rejection::Invalid(error.to_string())
}

struct TrieDarcs<'a> {
    trie: &'a MemoryTrie,
}

#[async_trait]
impl DarcProvider for TrieDarcs<'_> {
    async fn fetch_darc(&self, base_id: &DarcId) -> Result<Darc> {
        read_darc(self.trie, &InstanceId::from(*base_id))
    }
}

fn read_body(trie: &MemoryTrie, id: &InstanceId) -> Result<StateBody> {
    let bytes = trie
        .get(id.as_bytes())
        .ok_or_else(|| LedgerError::not_found(format!("instance {id}")))?;
    StateBody::from_bytes(bytes)
}

fn read_darc(trie: &MemoryTrie, id: &InstanceId) -> Result<Darc> {
    let body = read_body(trie, id)?;
    if body.contract_kind != DARC_CONTRACT {
        return Err(LedgerError::contract_mismatch(DARC_CONTRACT, body.contract_kind));
    }
    Darc::from_bytes(&body.value)
}

fn governing_darc(trie: &MemoryTrie, instruction: &Instruction) -> Result<Darc> {
    match &instruction.kind {
        InstructionKind::Spawn { .. } => read_darc(trie, &instruction.instance_id),
        InstructionKind::Invoke { .. } | InstructionKind::Delete { .. } => {
            let body = read_body(trie, &instruction.instance_id)?;
            read_darc(trie, &InstanceId::from(body.darc_id))
        }
    }
}

fn required_argument<'i>(instruction: &'i Instruction, name: &str) -> Result<&'i [u8]> {
    instruction
        .argument(name)
        .ok_or_else(|| LedgerError::argument(format!("missing argument '{name}'")))
}

async fn apply(
    tx: &ClientTransaction,
    mut trie: MemoryTrie,
    mut counters: HashMap<Identity, u64>,
) -> std::result::Result<(MemoryTrie, HashMap<Identity, u64>), Rejection> {
    tx.verify_signatures().map_err(invalid)?;

    for (index, instruction) in tx.instructions().iter().enumerate() {
        if instruction.signer_identities.is_empty() {
            return Err(Rejection::Invalid(format!("instruction {index} is unsigned")));
        }
        for (identity, counter) in instruction
            .signer_identities
            .iter()
            .zip(&instruction.signer_counters)
        {
            let last = counters.get(identity).copied().unwrap_or(0);
            if *counter != last + 1 {
                return Err(Rejection::Replay(format!(
                    "counter {counter} for {identity}, expected {}",
                    last + 1
                )));
            }
            counters.insert(*identity, *counter);
        }

        let governing = governing_darc(&trie, instruction).map_err(invalid)?;
        let action = instruction.kind.action();
        let authorized = {
            let provider = TrieDarcs { trie: &trie };
            DelegationResolver::new(&provider, NODE_DELEGATION_DEPTH)
                .is_authorized(&governing, &action, &instruction.signer_identities)
                .await
                .map_err(invalid)?
        };
        if !authorized {
            return Err(Rejection::Invalid(format!(
                "instruction {index}: signers may not '{action}' under darc {}",
                governing.base_id()
            )));
        }

        execute(&mut trie, instruction, &governing).map_err(invalid)?;
    }
    Ok((trie, counters))
}

fn execute(trie: &mut MemoryTrie, instruction: &Instruction, governing: &Darc) -> Result<()> {
    let target = instruction.instance_id;
    match &instruction.kind {
        InstructionKind::Spawn { contract_kind } if contract_kind == VALUE_CONTRACT => {
            let id = instruction.derive_id("");
            if trie.get(id.as_bytes()).is_some() {
                return Err(LedgerError::argument(format!("instance {id} exists")));
            }
            let body = StateBody {
                contract_kind: VALUE_CONTRACT.to_string(),
                value: required_argument(instruction, VALUE_ARGUMENT)?.to_vec(),
                version: 0,
                darc_id: governing.base_id(),
            };
            trie.insert(id.as_bytes().to_vec(), body.to_bytes()?);
        }
        InstructionKind::Spawn { contract_kind } if contract_kind == DARC_CONTRACT => {
            let darc = Darc::from_bytes(required_argument(instruction, DARC_ARGUMENT)?)?;
            if darc.version() != 0 {
                return Err(LedgerError::argument("spawned darc must be version 0"));
            }
            let id = InstanceId::from(darc.base_id());
            if trie.get(id.as_bytes()).is_some() {
                return Err(LedgerError::argument(format!("darc {id} exists")));
            }
            let body = StateBody {
                contract_kind: DARC_CONTRACT.to_string(),
                value: darc.to_bytes()?,
                version: 0,
                darc_id: darc.base_id(),
            };
            trie.insert(id.as_bytes().to_vec(), body.to_bytes()?);
        }
        InstructionKind::Invoke {
            contract_kind,
            command,
        } if contract_kind == VALUE_CONTRACT && command == UPDATE_COMMAND => {
            let mut body = read_body(trie, &target)?;
            if body.contract_kind != VALUE_CONTRACT {
                return Err(LedgerError::contract_mismatch(VALUE_CONTRACT, body.contract_kind));
            }
            body.value = required_argument(instruction, VALUE_ARGUMENT)?.to_vec();
            body.version += 1;
            trie.insert(target.as_bytes().to_vec(), body.to_bytes()?);
        }
        InstructionKind::Invoke {
            contract_kind,
            command,
        } if contract_kind == DARC_CONTRACT && command == EVOLVE_COMMAND => {
            let current = read_darc(trie, &target)?;
            let next = Darc::from_bytes(required_argument(instruction, DARC_ARGUMENT)?)?;
            current.check_successor(&next)?;
            let body = StateBody {
                contract_kind: DARC_CONTRACT.to_string(),
                value: next.to_bytes()?,
                version: next.version(),
                darc_id: next.base_id(),
            };
            trie.insert(target.as_bytes().to_vec(), body.to_bytes()?);
        }
        InstructionKind::Delete { contract_kind } if contract_kind == VALUE_CONTRACT => {
            let body = read_body(trie, &target)?;
            if body.contract_kind != VALUE_CONTRACT {
                return Err(LedgerError::contract_mismatch(VALUE_CONTRACT, body.contract_kind));
            }
            trie.remove(target.as_bytes());
        }
        other => {
            return Err(LedgerError::argument(format!(
                "unsupported instruction '{}'",
                other.action()
            )));
        }
    }
    Ok(())
}
