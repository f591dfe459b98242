use anyhow::{Context, Result};
use log::info;
use tokio::sync::mpsc;

use hybrid_chain::consensus::RaceOutcome;
use hybrid_chain::transaction::ClientReq;
use hybrid_chain::{Chain, HybridConsensus, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::init();
    let config = NodeConfig::from_env().context("invalid node configuration")?;

    println!("⛓️ Starting hybrid PoW/PoSW node");
    println!("   VDF: {}", config.vdf);
    println!(
        "   difficulty: {} (max {}), window {} blocks, target {}s",
        config.initial_difficulty,
        config.max_difficulty,
        config.difficulty_window,
        config.target_block_time_secs
    );

    let mut consensus = HybridConsensus::from_config(&config);
    let mut chain = Chain::new();

    for round in 0..config.blocks_to_mine {
        let prev = chain.tip().clone();
        let txs = vec![ClientReq::new(0, round, format!("note {round}"), String::new())];

        // a transport layer would feed competing blocks through `_peer_tx`
        let (_peer_tx, incoming) = mpsc::channel(16);
        let block = match consensus.propose_racing(&prev, txs, incoming).await? {
            RaceOutcome::Mined(mined) => consensus.finalize(mined)?,
            RaceOutcome::Received(block) => block,
        };

        let hash = block.block_hash.clone();
        let proof_size = block.vdf_proof.as_ref().map(|p| p.size_bytes()).unwrap_or(0);
        consensus.accept(&mut chain, block)?;
        let timings = consensus.timings();
        info!("Chain height is now {}", chain.height());
        println!(
            "#{} {} pow={:?} vdf={:?} proof={}B",
            chain.height(),
            hash,
            timings.pow,
            timings.vdf,
            proof_size
        );
    }

    consensus.audit(&chain)?;
    println!("✅ {} blocks produced and audited", config.blocks_to_mine);
    Ok(())
}
