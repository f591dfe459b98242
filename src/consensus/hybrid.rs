use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::posw::{PoswFinalizer, PoswValidator, VdfInput};
use super::race::{BlockRace, RaceOutcome};
use super::validator::BlockValidator;
use crate::blockchain::{BlockHasher, Chain, HybridBlock, Sha256Hasher};
use crate::config::NodeConfig;
use crate::error::{ConsensusError, Rejection};
use crate::pow::{
    DifficultyAdjuster, DifficultySchedule, MinedBlock, PowEngine, PowValidator, SharedSchedule,
};
use crate::transaction::{ClientReq, KeyRegistry};
use crate::vdf::VdfParameters;

/// Where the orchestrator is in the current block cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Proposing,
    PowDone,
    Finalizing,
    Finalized,
    Validating,
    Accepted,
    Rejected,
}

/// Wall-clock cost of the last proposal and finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub pow: Duration,
    pub vdf: Duration,
}

/// Drives propose -> finalize -> validate for one chain and retargets the
/// shared difficulty schedule as blocks are accepted.
pub struct HybridConsensus<H = Sha256Hasher> {
    pow: PowEngine<H>,
    finalizer: PoswFinalizer,
    validator: BlockValidator<H>,
    adjuster: DifficultyAdjuster,
    schedule: SharedSchedule,
    phase: Phase,
    timings: PhaseTimings,
    /// Pow hash of the block awaiting finalization.
    proposed: Option<String>,
}

impl HybridConsensus<Sha256Hasher> {
    pub fn new(
        params: VdfParameters,
        input: VdfInput,
        schedule: SharedSchedule,
        adjuster: DifficultyAdjuster,
        max_txs: usize,
    ) -> Self {
        Self::with_hasher(Sha256Hasher, params, input, schedule, adjuster, max_txs)
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            config.vdf.clone(),
            config.vdf_input,
            SharedSchedule::new(DifficultySchedule::new(config.initial_difficulty)),
            config.adjuster(),
            config.max_txs_per_block,
        )
    }
}

impl<H: BlockHasher + Clone> HybridConsensus<H> {
    pub fn with_hasher(
        hasher: H,
        params: VdfParameters,
        input: VdfInput,
        schedule: SharedSchedule,
        adjuster: DifficultyAdjuster,
        max_txs: usize,
    ) -> Self {
        let params = Arc::new(params);
        Self {
            pow: PowEngine::with_hasher(hasher.clone(), schedule.clone(), max_txs),
            finalizer: PoswFinalizer::new(Arc::clone(&params), input),
            validator: BlockValidator::new(
                PowValidator::with_hasher(hasher),
                PoswValidator::new(params, input),
                schedule.clone(),
            ),
            adjuster,
            schedule,
            phase: Phase::Idle,
            timings: PhaseTimings::default(),
            proposed: None,
        }
    }
}

impl<H: BlockHasher> HybridConsensus<H> {
    /// Reject blocks whose transactions are not signed by a registered sender.
    pub fn with_keys(mut self, keys: KeyRegistry) -> Self {
        self.validator = self.validator.with_keys(keys);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn timings(&self) -> PhaseTimings {
        self.timings
    }

    pub fn schedule(&self) -> &SharedSchedule {
        &self.schedule
    }

    pub fn validator(&self) -> &BlockValidator<H> {
        &self.validator
    }

    pub fn pow_engine(&self) -> &PowEngine<H> {
        &self.pow
    }

    /// Mine a child of `prev`. Starts a new cycle from any phase.
    pub fn propose(
        &mut self,
        prev: &HybridBlock,
        transactions: Vec<ClientReq>,
    ) -> Result<MinedBlock, ConsensusError> {
        self.phase = Phase::Proposing;
        self.timings = PhaseTimings::default();
        self.proposed = None;
        let started = Instant::now();

        match self.pow.propose(prev, transactions) {
            Ok(mined) => {
                self.timings.pow = started.elapsed();
                self.phase = Phase::PowDone;
                self.proposed = Some(mined.pow_hash().to_string());
                Ok(mined)
            }
            Err(e) => {
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Attach a VDF proof to the block from the preceding `propose`.
    pub fn finalize(&mut self, mined: MinedBlock) -> Result<HybridBlock, ConsensusError> {
        if self.phase != Phase::PowDone {
            return Err(ConsensusError::InvalidPhase {
                expected: Phase::PowDone,
                actual: self.phase,
            });
        }
        if self.proposed.as_deref() != Some(mined.pow_hash()) {
            return Err(ConsensusError::NotProposed {
                pow_hash: mined.pow_hash().to_string(),
            });
        }
        self.proposed = None;
        self.phase = Phase::Finalizing;
        let started = Instant::now();

        match self.finalizer.finalize_with(mined, self.pow.hasher()) {
            Ok(block) => {
                self.timings.vdf = started.elapsed();
                self.phase = Phase::Finalized;
                Ok(block)
            }
            Err(e) => {
                self.phase = Phase::Idle;
                Err(e.into())
            }
        }
    }

    pub fn validate(&mut self, block: &HybridBlock) -> bool {
        self.check(block).is_ok()
    }

    /// Like [`validate`](Self::validate), naming the failing stage.
    pub fn check(&mut self, block: &HybridBlock) -> Result<(), Rejection> {
        self.phase = Phase::Validating;
        let verdict = self.validator.check(block);
        match &verdict {
            Ok(()) => {
                debug!("Block #{} accepted", block.height);
                self.phase = Phase::Accepted;
            }
            Err(reason) => {
                warn!("Block #{} rejected: {reason}", block.height);
                self.phase = Phase::Rejected;
            }
        }
        verdict
    }

    /// Full local cycle: propose, finalize and self-validate.
    pub fn produce(
        &mut self,
        prev: &HybridBlock,
        transactions: Vec<ClientReq>,
    ) -> Result<HybridBlock, ConsensusError> {
        let mined = self.propose(prev, transactions)?;
        let block = self.finalize(mined)?;
        self.check(&block)?;
        info!(
            "Block #{} produced: pow={:?} vdf={:?}",
            block.height, self.timings.pow, self.timings.vdf
        );
        Ok(block)
    }

    /// Validate `block` against the tip of `chain`, append it and retarget
    /// when a full window has accumulated. A rejected block leaves the
    /// chain and schedule untouched.
    pub fn accept(&mut self, chain: &mut Chain, block: HybridBlock) -> Result<(), ConsensusError> {
        if let Err(reason) = self.validator.check_extends(chain.tip(), &block) {
            self.phase = Phase::Rejected;
            return Err(reason.into());
        }
        self.check(&block)?;
        chain.append(block)?;
        self.retarget(chain)?;
        Ok(())
    }

    /// Retarget after every `window` non-genesis blocks. The new difficulty
    /// applies from the next height on. Returns it when a retarget ran.
    pub fn retarget(&self, chain: &Chain) -> Result<Option<u32>, ConsensusError> {
        let history = &chain.blocks()[1..];
        let window = self.adjuster.window();
        if history.is_empty() || history.len() % window != 0 {
            return Ok(None);
        }

        let tip = chain.height();
        let current = self.schedule.difficulty_at(tip);
        let next = self.adjuster.retarget(history, current);
        if next != current {
            self.schedule.record(tip + 1, next)?;
        }
        Ok(Some(next))
    }

    /// Re-validate every block after genesis, including linkage.
    pub fn audit(&self, chain: &Chain) -> Result<(), ConsensusError> {
        for pair in chain.blocks().windows(2) {
            let (parent, block) = (&pair[0], &pair[1]);
            self.validator
                .check_extends(parent, block)
                .and_then(|()| self.validator.check(block))
                .map_err(|reason| ConsensusError::AuditFailed {
                    height: block.height,
                    reason,
                })?;
        }
        info!("Audit passed for {} blocks", chain.blocks().len());
        Ok(())
    }
}

impl<H: BlockHasher + 'static> HybridConsensus<H> {
    pub fn block_race(&self) -> BlockRace<H> {
        BlockRace::new(self.pow.clone(), self.validator.clone())
    }

    /// Propose while listening for competing blocks at the same height.
    /// A local win leaves the orchestrator ready to finalize; a received
    /// block has already passed validation.
    pub async fn propose_racing(
        &mut self,
        prev: &HybridBlock,
        transactions: Vec<ClientReq>,
        incoming: mpsc::Receiver<HybridBlock>,
    ) -> Result<RaceOutcome, ConsensusError> {
        self.phase = Phase::Proposing;
        self.timings = PhaseTimings::default();
        self.proposed = None;
        let started = Instant::now();

        let outcome = self.block_race().run(prev.clone(), transactions, incoming).await;
        self.phase = match &outcome {
            Ok(RaceOutcome::Mined(mined)) => {
                self.timings.pow = started.elapsed();
                self.proposed = Some(mined.pow_hash().to_string());
                Phase::PowDone
            }
            Ok(RaceOutcome::Received(_)) => Phase::Accepted,
            Err(_) => Phase::Idle,
        };
        outcome
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;
    use crate::error::{PowRejection, ProofRejection};
    use crate::transaction::signature::tests::{keypair, signed_req};
    use crate::vdf::{SequentialProof, test_params};

    fn node(window: usize) -> HybridConsensus {
        HybridConsensus::new(
            test_params(16),
            VdfInput::PowHash,
            SharedSchedule::new(DifficultySchedule::new(1)),
            DifficultyAdjuster::new(window, 600, 4),
            3,
        )
    }

    fn tx(seq: u64) -> ClientReq {
        ClientReq::new(7, seq, "append log", "30".into())
    }

    #[test]
    fn produce_walks_the_phases() {
        let mut node = node(100);
        assert_eq!(node.phase(), Phase::Idle);

        let genesis = HybridBlock::genesis();
        let mined = node.propose(&genesis, vec![tx(0)]).unwrap();
        assert_eq!(node.phase(), Phase::PowDone);

        let block = node.finalize(mined).unwrap();
        assert_eq!(node.phase(), Phase::Finalized);
        assert!(block.is_finalized());
        assert_eq!(block.vdf_proof.as_ref().unwrap().proof_elements().len(), 4);

        assert!(node.validate(&block));
        assert_eq!(node.phase(), Phase::Accepted);
    }

    #[test]
    fn finalize_requires_a_fresh_proposal() {
        let mut node = node(100);
        let mined = MinedBlock::try_from(HybridBlock::genesis()).unwrap();
        assert_eq!(
            node.finalize(mined),
            Err(ConsensusError::InvalidPhase {
                expected: Phase::PowDone,
                actual: Phase::Idle
            })
        );
    }

    #[test]
    fn finalize_only_takes_the_proposed_block() {
        let mut node = node(100);
        let genesis = HybridBlock::genesis();
        let mined = node.propose(&genesis, vec![tx(1)]).unwrap();

        let other = MinedBlock::try_from(genesis.clone()).unwrap();
        let err = node.finalize(other).unwrap_err();
        assert!(matches!(err, ConsensusError::NotProposed { .. }));
        assert_eq!(node.phase(), Phase::PowDone);

        let block = node.finalize(mined).unwrap();
        assert_eq!(block.height, 1);
        assert_eq!(node.phase(), Phase::Finalized);
    }

    #[test]
    fn over_cap_proposal_returns_to_idle() {
        let mut node = node(100);
        let err = node
            .propose(&HybridBlock::genesis(), (0..4).map(tx).collect())
            .unwrap_err();
        assert_eq!(err, ConsensusError::TooManyTransactions { count: 4, max: 3 });
        assert_eq!(node.phase(), Phase::Idle);
    }

    #[test]
    fn rejected_block_leaves_chain_untouched() {
        let mut node = node(100);
        let mut chain = Chain::new();
        let mut block = node.produce(chain.tip(), vec![]).unwrap();
        block.nonce += 1;

        let err = node.accept(&mut chain, block).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Rejected(Rejection::Pow(PowRejection::HashMismatch { .. }))
        ));
        assert_eq!(node.phase(), Phase::Rejected);
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn block_for_another_parent_is_rejected() {
        let mut node = node(100);
        let mut chain = Chain::new();
        let b1 = node.produce(chain.tip(), vec![]).unwrap();
        let stale = node.produce(chain.tip(), vec![tx(1)]).unwrap();
        node.accept(&mut chain, b1).unwrap();

        assert_eq!(
            node.accept(&mut chain, stale),
            Err(ConsensusError::Rejected(Rejection::WrongHeight { tip: 1, found: 1 }))
        );
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn fast_window_raises_difficulty_from_the_next_height() {
        let mut node = node(2);
        let mut chain = Chain::new();
        for _ in 0..2 {
            let block = node.produce(chain.tip(), vec![]).unwrap();
            node.accept(&mut chain, block).unwrap();
        }
        // two blocks produced milliseconds apart against a 600s target
        assert_eq!(node.schedule().difficulty_at(2), 1);
        assert_eq!(node.schedule().difficulty_at(3), 2);

        let b3 = node.produce(chain.tip(), vec![]).unwrap();
        assert_eq!(b3.difficulty, 2);
        assert!(b3.pow_hash.as_deref().unwrap().starts_with("00"));
        node.accept(&mut chain, b3).unwrap();

        // earlier blocks still pass under the extended schedule
        node.audit(&chain).unwrap();
    }

    #[test]
    fn audit_reports_the_first_bad_block() {
        let mut node = node(100);
        let mut chain = Chain::new();
        let b1 = node.produce(chain.tip(), vec![]).unwrap();
        node.accept(&mut chain, b1).unwrap();

        // linkage-valid but with a bogus proof, appended behind the validator's back
        let mined = node.propose(chain.tip(), vec![]).unwrap();
        let mut b2 = mined.into_inner();
        b2.attach_proof(SequentialProof::new(BigUint::from(4u32), vec![], 16));
        chain.append(b2).unwrap();

        let err = node.audit(&chain).unwrap_err();
        assert!(matches!(err, ConsensusError::AuditFailed { height: 2, .. }));
    }

    #[test]
    fn unfinalized_block_cannot_join() {
        let mut node = node(100);
        let mut chain = Chain::new();
        let mined = node.propose(chain.tip(), vec![]).unwrap();
        let err = node.accept(&mut chain, mined.into_inner()).unwrap_err();
        assert_eq!(
            err,
            ConsensusError::Rejected(Rejection::Posw(ProofRejection::MissingProof))
        );
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn registered_keys_reject_forged_requests() {
        let (sk, pk) = keypair();
        let (other_sk, _) = keypair();
        let mut keys = KeyRegistry::new();
        keys.insert(3, pk);

        let mut peer = node(100);
        let mut strict = node(100).with_keys(keys);
        let mut chain = Chain::new();

        let forged = peer
            .produce(chain.tip(), vec![signed_req(&other_sk, 3, 0, "put a 1")])
            .unwrap();
        let err = strict.accept(&mut chain, forged).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Rejected(Rejection::Transaction { sender: 3, .. })
        ));
        assert_eq!(strict.phase(), Phase::Rejected);
        assert_eq!(chain.height(), 0);

        let honest = peer
            .produce(chain.tip(), vec![signed_req(&sk, 3, 0, "put a 1")])
            .unwrap();
        strict.accept(&mut chain, honest).unwrap();
        assert_eq!(chain.height(), 1);
    }

    #[tokio::test]
    async fn racing_proposal_can_be_finalized() {
        let mut node = node(100);
        let genesis = HybridBlock::genesis();
        let (_tx, rx) = mpsc::channel(1);

        let outcome = node.propose_racing(&genesis, vec![], rx).await.unwrap();
        assert_eq!(node.phase(), Phase::PowDone);
        let RaceOutcome::Mined(mined) = outcome else {
            panic!("nothing was sent, local search must win");
        };
        let block = node.finalize(mined).unwrap();
        assert!(node.validate(&block));
    }
}
