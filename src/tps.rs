use futures::{StreamExt, TryStreamExt, stream};

use crate::config::TPS_FETCH_CONCURRENCY;
use crate::data::TpsSample;
use crate::error::FetchResult;
use crate::rpc::ChainReader;

/// Estimates throughput over the `window_blocks + 1` blocks ending at the
/// chain head (clamped at genesis). Blocks are requested with a bounded
/// fan-out; elapsed time is floored at one second.
pub async fn estimate<C: ChainReader>(client: &C, window_blocks: u64) -> FetchResult<TpsSample> {
    let latest = client.block_number().await?;
    let start = latest.saturating_sub(window_blocks);

    let blocks: Vec<_> = stream::iter(start..=latest)
        .map(|n| client.block_summary(n))
        .buffered(TPS_FETCH_CONCURRENCY)
        .try_collect()
        .await?;

    let total_txs: u64 = blocks.iter().map(|b| b.tx_count as u64).sum();
    let first_ts = blocks.first().map(|b| b.timestamp).unwrap_or_default();
    let last_ts = blocks.last().map(|b| b.timestamp).unwrap_or_default();

    Ok(TpsSample {
        total_txs,
        tps: rate(total_txs, first_ts, last_ts),
    })
}

/// `total / max(1, last - first)`; inverted timestamps count as zero elapsed.
pub fn rate(total_txs: u64, first_ts: u64, last_ts: u64) -> f64 {
    let elapsed = last_ts.saturating_sub(first_ts).max(1);
    total_txs as f64 / elapsed as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::testing::MockChain;

    #[tokio::test]
    async fn fetches_window_plus_one_blocks() {
        // blocks 100..=130, two seconds apart, 3 txs each
        let chain = MockChain::new(Network::Mainnet).with_chain(100..=130, 1_000, 2, 3);
        let sample = estimate(&chain, 30).await.unwrap();

        let mut requested = chain.requested_blocks();
        requested.sort_unstable();
        assert_eq!(requested, (100..=130).collect::<Vec<_>>());
        assert_eq!(sample.total_txs, 31 * 3);
        assert!((sample.tps - 93.0 / 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn window_is_clamped_at_genesis() {
        let chain = MockChain::new(Network::Mainnet).with_chain(0..=4, 500, 1, 2);
        let sample = estimate(&chain, 30).await.unwrap();

        let mut requested = chain.requested_blocks();
        requested.sort_unstable();
        assert_eq!(requested, vec![0, 1, 2, 3, 4]);
        assert_eq!(sample.total_txs, 10);
        assert!((sample.tps - 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_block_fails_the_sample() {
        let chain = MockChain::new(Network::Mainnet)
            .with_block(10, 100, 1)
            .with_block(8, 90, 1);
        assert!(estimate(&chain, 2).await.is_err());
    }

    #[test]
    fn rate_floors_elapsed_at_one_second() {
        assert_eq!(rate(12, 1_000, 1_000), 12.0);
        assert_eq!(rate(12, 1_005, 1_000), 12.0);
        assert_eq!(rate(12, 1_000, 1_004), 3.0);
        assert_eq!(rate(0, 0, 0), 0.0);
    }
}
