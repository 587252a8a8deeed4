//! One-shot smoke run of every fetcher, printed to stdout.
use crate::data::{market_cap, wei_to_gwei};
use crate::market::{MarketSource, fetch_circulating_supply, fetch_price_quote};
use crate::rpc::{ChainReader, fetch_block_info, fetch_gas_price, fetch_rollup_info};
use crate::tps;

fn opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}

pub async fn probe_network<C: ChainReader, M: MarketSource>(client: &C, market: &M, tps_window: u64) {
    let net = client.network();
    println!("[{net}] RPC: {}", client.endpoint());

    let gas = fetch_gas_price(client).await;
    println!(
        "[{net}] Gas: {} wei ({} gwei)",
        opt(gas),
        opt(gas.map(|w| format!("{:.3}", wei_to_gwei(w))))
    );

    let block = fetch_block_info(client).await;
    println!(
        "[{net}] Block: {} BlockTimeSec: {}",
        opt(block.map(|b| b.block_number)),
        opt(block.and_then(|b| b.block_time_sec))
    );

    let price = fetch_price_quote(market).await;
    println!(
        "[{net}] Price: usd={} counter={} change24h={}%",
        opt(price.usd),
        opt(price.counter_asset_price),
        opt(price.change_24h_pct.map(|c| format!("{c:.2}")))
    );

    let supply = fetch_circulating_supply(market).await;
    println!("[{net}] CirculatingSupply: {}", opt(supply));
    println!("[{net}] MarketCap(USD): {}", opt(market_cap(price.usd, supply)));

    let rollup = fetch_rollup_info(client).await;
    println!(
        "[{net}] Rollup: txBatch={} stateBatch={}",
        opt(rollup.l1_txn_batch),
        opt(rollup.l1_state_batch)
    );

    match tps::estimate(client, tps_window).await {
        Ok(sample) => println!(
            "[{net}] Txs({tps_window} blocks): {} TPS: {:.2}",
            sample.total_txs, sample.tps
        ),
        Err(e) => {
            tracing::warn!(network = %net, error = %e, "tps estimate failed");
            println!("[{net}] Txs({tps_window} blocks): null TPS: null");
        }
    }
}
