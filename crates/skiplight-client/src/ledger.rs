//! Ledger session
//!
//! A [`Ledger`] is bound to one chain. Bootstrapping fetches the genesis
//! block, checks it against the chain id, and then loads the chain
//! configuration and the genesis Darc through proofs verified against the
//! genesis roster. Both are cached and only change on an explicit refresh.
//!
//! Queries are unverified unless their name says otherwise: `get_proof`
//! returns whatever the node served, `get_instance` verifies before decoding.

use crate::chain_config::{ChainConfig, CONFIG_CONTRACT};
use crate::connection::{send_checked, Connection};
use crate::messages::{
    AddTxRequest, CreateGenesisBlock, GetBlock, GetProof, GetSignerCounters, LedgerRequest,
    RejectReason, TxOutcome,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use skiplight_core::{BlockId, ClientConfig, DarcId, InstanceId, LedgerError, Result};
use skiplight_darc::{
    Darc, DarcProvider, DelegationResolver, Identity, Signer, DARC_CONTRACT, EVOLVE_ACTION,
};
use skiplight_proof::{Instance, Proof, SkipBlock};
use skiplight_tx::{
    Argument, ClientTransaction, CounterCoordinator, CounterSource, Instruction, SignerGroup,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Argument carrying an encoded Darc in darc-contract instructions
pub const DARC_ARGUMENT: &str = "darc";

/// Darc-contract command that installs a new version
pub const EVOLVE_COMMAND: &str = "evolve";

/// Client session bound to one chain
pub struct Ledger<C: Connection> {
    connection: C,
    genesis: SkipBlock,
    config: ClientConfig,
    chain_config: RwLock<ChainConfig>,
    genesis_darc: RwLock<Darc>,
}

impl<C: Connection> std::fmt::Debug for Ledger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("chain_id", &self.genesis.hash)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Ledger<C> {
    /// Create a new chain, then bootstrap a session on it
    pub async fn create_genesis(
        connection: C,
        request: CreateGenesisBlock,
        config: ClientConfig,
    ) -> Result<Self> {
        let response = send_checked(&connection, LedgerRequest::CreateGenesisBlock(request))
            .await?
            .into_create_genesis()?;
        let chain_id = response.genesis.hash;
        info!(chain = %chain_id, "genesis block created");
        Self::bootstrap(connection, chain_id, config).await
    }

    /// Open a session on an existing chain
    pub async fn bootstrap(connection: C, chain_id: BlockId, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let genesis = send_checked(&connection, LedgerRequest::GetBlock(GetBlock { id: chain_id }))
            .await?
            .into_get_block()?
            .block;
        genesis.verify_hash()?;
        if genesis.hash != chain_id || !genesis.is_genesis() {
            return Err(LedgerError::protocol(format!(
                "node served block {} as genesis of chain {chain_id}",
                genesis.hash
            )));
        }

        let config_instance =
            verified_instance(&connection, &genesis, InstanceId::CONFIG, CONFIG_CONTRACT).await?;
        let chain_config = ChainConfig::from_bytes(&config_instance.data)?;
        let genesis_darc =
            verified_darc(&connection, &genesis, &config_instance.darc_id).await?;

        info!(
            chain = %chain_id,
            servers = chain_config.roster.len(),
            block_interval_ms = chain_config.block_interval_ms,
            genesis_darc = %genesis_darc.base_id(),
            "ledger session bootstrapped"
        );

        Ok(Self {
            connection,
            genesis,
            config,
            chain_config: RwLock::new(chain_config),
            genesis_darc: RwLock::new(genesis_darc),
        })
    }

    /// Id of the chain this session is bound to
    pub fn chain_id(&self) -> BlockId {
        self.genesis.hash
    }

    /// Verified genesis block
    pub fn genesis_block(&self) -> &SkipBlock {
        &self.genesis
    }

    /// Local client settings
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying connection
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Cached chain configuration
    pub fn chain_config(&self) -> ChainConfig {
        self.chain_config.read().clone()
    }

    /// Cached genesis Darc
    pub fn genesis_darc(&self) -> Darc {
        self.genesis_darc.read().clone()
    }

    /// Delegation resolver reading Darcs through this session
    pub fn resolver(&self) -> DelegationResolver<'_, Self> {
        DelegationResolver::new(self, self.config.max_delegation_depth)
    }

    /// Reload the chain configuration from a verified proof
    pub async fn refresh_config(&self) -> Result<ChainConfig> {
        let instance = self.get_instance(InstanceId::CONFIG, CONFIG_CONTRACT).await?;
        let chain_config = ChainConfig::from_bytes(&instance.data)?;
        *self.chain_config.write() = chain_config.clone();
        debug!(block_interval_ms = chain_config.block_interval_ms, "chain config refreshed");
        Ok(chain_config)
    }

    /// Reload the genesis Darc from a verified proof
    pub async fn refresh_genesis_darc(&self) -> Result<Darc> {
        let instance = self.get_instance(InstanceId::CONFIG, CONFIG_CONTRACT).await?;
        let darc = self.fetch_darc(&instance.darc_id).await?;
        *self.genesis_darc.write() = darc.clone();
        debug!(version = darc.version(), "genesis darc refreshed");
        Ok(darc)
    }

    /// Proof for `id` exactly as served; not verified
    pub async fn get_proof(&self, id: InstanceId) -> Result<Proof> {
        let request = LedgerRequest::GetProof(GetProof {
            chain_id: self.chain_id(),
            key: id,
        });
        Ok(send_checked(&self.connection, request)
            .await?
            .into_get_proof()?
            .proof)
    }

    /// Verify a proof against this chain's genesis and genesis roster
    pub fn verify_proof(&self, proof: &Proof) -> Result<()> {
        proof.verify_with_roster(&self.genesis.hash, &self.genesis.roster)
    }

    /// Fetch, verify and decode the instance at `id`
    pub async fn get_instance(&self, id: InstanceId, contract_kind: &str) -> Result<Instance> {
        verified_instance(&self.connection, &self.genesis, id, contract_kind).await
    }

    /// Last accepted counters plus `addend`, in identity order
    pub async fn get_signer_counters(
        &self,
        identities: &[Identity],
        addend: u64,
    ) -> Result<Vec<u64>> {
        let request = LedgerRequest::GetSignerCounters(GetSignerCounters {
            identities: identities.to_vec(),
            chain_id: self.chain_id(),
        });
        let counters = send_checked(&self.connection, request)
            .await?
            .into_signer_counters()?
            .counters;
        if counters.len() != identities.len() {
            return Err(LedgerError::protocol(format!(
                "asked for {} signer counters, received {}",
                identities.len(),
                counters.len()
            )));
        }
        Ok(counters
            .into_iter()
            .map(|counter| counter.saturating_add(addend))
            .collect())
    }

    /// Submit a signed transaction once and wait for its verdict
    ///
    /// The node is asked to wait `wait_blocks` blocks; the client gives up
    /// locally after `(wait_blocks + 1)` block intervals plus the configured
    /// grace. The transaction is never resubmitted.
    pub async fn submit_and_await(&self, tx: &ClientTransaction, wait_blocks: u32) -> Result<()> {
        if tx.len() > self.config.max_instructions {
            return Err(LedgerError::argument(format!(
                "transaction has {} instructions, limit is {}",
                tx.len(),
                self.config.max_instructions
            )));
        }
        let deadline = self
            .chain_config
            .read()
            .inclusion_deadline(wait_blocks, Duration::from_millis(self.config.wait_grace_ms));

        let request = LedgerRequest::AddTx(AddTxRequest {
            transaction: tx.clone(),
            chain_id: self.chain_id(),
            wait_blocks,
        });
        info!(
            instructions = tx.len(),
            wait_blocks,
            deadline_ms = deadline.as_millis() as u64,
            "submitting transaction"
        );

        let submission = send_checked(&self.connection, request);
        let response = match tokio::time::timeout(deadline, submission).await {
            Ok(response) => response?.into_add_tx()?,
            Err(_) => {
                warn!(wait_blocks, "no inclusion verdict before local deadline");
                return Err(LedgerError::inclusion_timeout(wait_blocks));
            }
        };

        match response.outcome {
            TxOutcome::Accepted => {
                info!("transaction included");
                Ok(())
            }
            TxOutcome::Rejected {
                reason: RejectReason::Replay,
                message,
            } => {
                warn!(%message, "transaction rejected as replay");
                Err(LedgerError::replay(message))
            }
            TxOutcome::Rejected {
                reason: RejectReason::Invalid,
                message,
            } => {
                warn!(%message, "transaction rejected");
                Err(LedgerError::rejected(message))
            }
            TxOutcome::TimedOut => {
                warn!(wait_blocks, "transaction not included in time");
                Err(LedgerError::inclusion_timeout(wait_blocks))
            }
        }
    }

    /// [`Self::submit_and_await`] with the configured `default_wait_blocks`
    pub async fn submit_and_await_default(&self, tx: &ClientTransaction) -> Result<()> {
        self.submit_and_await(tx, self.config.default_wait_blocks).await
    }

    /// Assign counters, sign and submit
    ///
    /// `signers[i]` signs instruction `i`.
    pub async fn sign_and_submit(
        &self,
        tx: &mut ClientTransaction,
        signers: &[SignerGroup<'_>],
        wait_blocks: u32,
    ) -> Result<()> {
        let groups: Vec<Vec<Identity>> = signers
            .iter()
            .map(|group| group.iter().map(|signer| signer.identity()).collect())
            .collect();
        CounterCoordinator::new(self).assign(tx, &groups).await?;
        tx.sign_with(signers)?;
        self.submit_and_await(tx, wait_blocks).await
    }

    /// [`Self::sign_and_submit`] waiting the configured `default_wait_blocks`
    pub async fn sign_and_submit_default(
        &self,
        tx: &mut ClientTransaction,
        signers: &[SignerGroup<'_>],
    ) -> Result<()> {
        self.sign_and_submit(tx, signers, self.config.default_wait_blocks)
            .await
    }

    /// Spawn `darc` under the genesis Darc; returns its base id
    pub async fn spawn_darc(
        &self,
        darc: &Darc,
        signers: &[&dyn Signer],
        wait_blocks: u32,
    ) -> Result<DarcId> {
        let parent = self.genesis_darc.read().base_id();
        let instruction = Instruction::spawn(
            InstanceId::from(parent),
            DARC_CONTRACT,
            vec![Argument::new(DARC_ARGUMENT, darc.to_bytes()?)],
        );
        let mut tx = ClientTransaction::new(vec![instruction])?;
        self.sign_and_submit(&mut tx, &[signers.to_vec()], wait_blocks)
            .await?;
        info!(darc = %darc.base_id(), "darc spawned");
        Ok(darc.base_id())
    }

    /// Install `next` as the new version of its Darc
    ///
    /// Fails with `StaleState` when the ledger's current version is not the
    /// one `next` was evolved from, and with `Delegation` when the signers do
    /// not satisfy the current version's evolve rule.
    pub async fn evolve_darc(
        &self,
        next: &Darc,
        signers: &[&dyn Signer],
        wait_blocks: u32,
    ) -> Result<()> {
        let base_id = next.base_id();
        let current = self.fetch_darc(&base_id).await?;
        if current.version() + 1 != next.version() {
            return Err(LedgerError::stale(format!(
                "darc {base_id} is at version {} on the ledger, evolution targets {}",
                current.version(),
                next.version()
            )));
        }
        current.check_successor(next)?;

        let identities: Vec<Identity> = signers.iter().map(|signer| signer.identity()).collect();
        if !self
            .resolver()
            .is_authorized(&current, EVOLVE_ACTION, &identities)
            .await?
        {
            return Err(LedgerError::delegation(format!(
                "signers may not evolve darc {base_id}"
            )));
        }

        let instruction = Instruction::invoke(
            InstanceId::from(base_id),
            DARC_CONTRACT,
            EVOLVE_COMMAND,
            vec![Argument::new(DARC_ARGUMENT, next.to_bytes()?)],
        );
        let mut tx = ClientTransaction::new(vec![instruction])?;
        self.sign_and_submit(&mut tx, &[signers.to_vec()], wait_blocks)
            .await?;
        info!(darc = %base_id, version = next.version(), "darc evolved");

        let is_genesis_darc = self.genesis_darc.read().base_id() == base_id;
        if is_genesis_darc {
            *self.genesis_darc.write() = next.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Connection> DarcProvider for Ledger<C> {
    async fn fetch_darc(&self, base_id: &DarcId) -> Result<Darc> {
        verified_darc(&self.connection, &self.genesis, base_id).await
    }
}

#[async_trait]
impl<C: Connection> CounterSource for Ledger<C> {
    async fn signer_counters(&self, identities: &[Identity]) -> Result<Vec<u64>> {
        self.get_signer_counters(identities, 0).await
    }
}

async fn verified_instance<C: Connection + ?Sized>(
    connection: &C,
    genesis: &SkipBlock,
    id: InstanceId,
    contract_kind: &str,
) -> Result<Instance> {
    let request = LedgerRequest::GetProof(GetProof {
        chain_id: genesis.hash,
        key: id,
    });
    let proof = send_checked(connection, request)
        .await?
        .into_get_proof()?
        .proof;
    proof.verify_with_roster(&genesis.hash, &genesis.roster)?;
    if !proof.exists(id.as_bytes())? {
        return Err(LedgerError::not_found(format!("instance {id}")));
    }
    proof.proven_instance(contract_kind)
}

async fn verified_darc<C: Connection + ?Sized>(
    connection: &C,
    genesis: &SkipBlock,
    base_id: &DarcId,
) -> Result<Darc> {
    let instance =
        verified_instance(connection, genesis, InstanceId::from(*base_id), DARC_CONTRACT).await?;
    let darc = Darc::from_bytes(&instance.data)?;
    if darc.base_id() != *base_id {
        return Err(LedgerError::protocol(format!(
            "instance {base_id} holds darc {}",
            darc.base_id()
        )));
    }
    Ok(darc)
}
