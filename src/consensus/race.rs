use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use tokio::sync::mpsc;

use super::BlockValidator;
use crate::blockchain::{BlockHasher, HybridBlock, Sha256Hasher};
use crate::error::ConsensusError;
use crate::pow::{MinedBlock, PowEngine};
use crate::transaction::ClientReq;

/// Which candidate settled the height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome {
    /// Local nonce search finished first; the block still needs finalizing.
    Mined(MinedBlock),
    /// A valid finalized block arrived from elsewhere first.
    Received(HybridBlock),
}

/// Runs `local` on the blocking pool while validating blocks arriving on
/// `incoming`. The first result wins: a valid incoming block sets the
/// cancel flag handed to `local`, a finished local search drops the
/// receiver. Incoming blocks that fail validation or do not extend
/// `parent` are skipped. A closed channel leaves only the local search.
pub async fn race<F, H>(
    local: F,
    mut incoming: mpsc::Receiver<HybridBlock>,
    validator: BlockValidator<H>,
    parent: HybridBlock,
) -> Result<RaceOutcome, ConsensusError>
where
    F: FnOnce(Arc<AtomicBool>) -> Result<MinedBlock, ConsensusError> + Send + 'static,
    H: BlockHasher,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let mining = tokio::task::spawn_blocking({
        let cancel = Arc::clone(&cancel);
        move || local(cancel)
    });
    tokio::pin!(mining);

    let receiving = async {
        while let Some(block) = incoming.recv().await {
            let verdict = validator
                .check_extends(&parent, &block)
                .and_then(|()| validator.check(&block));
            match verdict {
                Ok(()) => return Some(block),
                Err(reason) => warn!("Race: ignoring block #{}: {reason}", block.height),
            }
        }
        None
    };
    tokio::pin!(receiving);

    tokio::select! {
        mined = &mut mining => {
            let mined = mined.map_err(|e| ConsensusError::MiningTask(e.to_string()))??;
            info!("Race: local block #{} mined first", mined.block().height);
            Ok(RaceOutcome::Mined(mined))
        }
        Some(block) = &mut receiving => {
            cancel.store(true, Ordering::Relaxed);
            info!("Race: accepted competing block #{} ({})", block.height, block.block_hash);
            Ok(RaceOutcome::Received(block))
        }
    }
}

/// Local proposal raced against blocks received for the same height.
pub struct BlockRace<H = Sha256Hasher> {
    engine: PowEngine<H>,
    validator: BlockValidator<H>,
}

impl<H: BlockHasher + 'static> BlockRace<H> {
    pub fn new(engine: PowEngine<H>, validator: BlockValidator<H>) -> Self {
        Self { engine, validator }
    }

    pub async fn run(
        &self,
        parent: HybridBlock,
        transactions: Vec<ClientReq>,
        incoming: mpsc::Receiver<HybridBlock>,
    ) -> Result<RaceOutcome, ConsensusError> {
        let engine = self.engine.clone();
        let prev = parent.clone();
        race(
            move |cancel| engine.propose_until(&prev, transactions, &cancel),
            incoming,
            self.validator.clone(),
            parent,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hasher::tests::NonceGateHasher;
    use crate::consensus::{HybridConsensus, VdfInput};
    use crate::pow::{DifficultyAdjuster, DifficultySchedule, SharedSchedule};
    use crate::vdf::test_params;

    fn node() -> HybridConsensus {
        HybridConsensus::new(
            test_params(8),
            VdfInput::PowHash,
            SharedSchedule::new(DifficultySchedule::new(1)),
            DifficultyAdjuster::default(),
            10,
        )
    }

    fn spin_until_cancelled(cancel: Arc<AtomicBool>) -> Result<MinedBlock, ConsensusError> {
        while !cancel.load(Ordering::Relaxed) {
            std::thread::yield_now();
        }
        Err(ConsensusError::Cancelled)
    }

    #[tokio::test]
    async fn valid_incoming_block_cancels_local_search() {
        let mut peer = node();
        let genesis = HybridBlock::genesis();
        let competing = peer.produce(&genesis, vec![]).unwrap();

        let local = node();
        let (tx, rx) = mpsc::channel(4);
        tx.send(competing.clone()).await.unwrap();

        let outcome = race(spin_until_cancelled, rx, local.validator().clone(), genesis)
            .await
            .unwrap();
        assert_eq!(outcome, RaceOutcome::Received(competing));
    }

    #[tokio::test]
    async fn invalid_incoming_blocks_are_skipped() {
        let mut peer = node();
        let genesis = HybridBlock::genesis();
        let competing = peer.produce(&genesis, vec![]).unwrap();

        let mut forged = competing.clone();
        forged.nonce += 1;
        let mut orphan = competing.clone();
        orphan.prev_hash = Some("elsewhere".into());

        let local = node();
        let (tx, rx) = mpsc::channel(4);
        tx.send(forged).await.unwrap();
        tx.send(orphan).await.unwrap();
        tx.send(competing.clone()).await.unwrap();

        let outcome = race(spin_until_cancelled, rx, local.validator().clone(), genesis)
            .await
            .unwrap();
        assert_eq!(outcome, RaceOutcome::Received(competing));
    }

    #[tokio::test]
    async fn local_search_wins_when_nothing_arrives() {
        let local = node();
        let genesis = HybridBlock::genesis();
        // sender stays alive so the receiving side stays pending
        let (_tx, rx) = mpsc::channel(1);

        let outcome = local.block_race().run(genesis.clone(), vec![], rx).await.unwrap();
        match outcome {
            RaceOutcome::Mined(mined) => {
                assert_eq!(mined.block().height, 1);
                assert!(local.validator().pow().validate(mined.block(), 1));
            }
            other => panic!("expected local win, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_channel_leaves_the_local_search() {
        let schedule = SharedSchedule::new(DifficultySchedule::new(4));
        let engine =
            PowEngine::with_hasher(NonceGateHasher { winning_nonce: 12 }, schedule.clone(), 10);
        let local = node();
        let (tx, rx) = mpsc::channel::<HybridBlock>(1);
        drop(tx);

        let genesis = HybridBlock::genesis();
        let prev = genesis.clone();
        let outcome = race(
            move |cancel| engine.propose_until(&prev, vec![], &cancel),
            rx,
            local.validator().clone(),
            genesis,
        )
        .await
        .unwrap();
        match outcome {
            RaceOutcome::Mined(mined) => assert_eq!(mined.block().nonce, 12),
            other => panic!("expected local win, got {other:?}"),
        }
    }
}
