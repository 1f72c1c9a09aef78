//! Simulate lookups in a uniform network and watch the network size estimate converge.
//!
//! Run: `cargo run --example netsize_simulation -- --size 20000 --lookups 50`

use std::time::Instant;

use clap::Parser;
use kad_lookup::{Error, Estimator, Key, PeerId, RoutingTable, MAX_BUCKET_SIZE_K};
use tracing::Level;

const DEFAULT_SIZE: usize = 10_000;
const DEFAULT_LOOKUPS: usize = 30;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of peers in the simulated network
    #[arg(short, long, default_value_t = DEFAULT_SIZE)]
    size: usize,
    /// Number of lookups to track
    #[arg(short, long, default_value_t = DEFAULT_LOOKUPS)]
    lookups: usize,
    /// Log estimator internals
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::TRACE
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    println!("Building a network with {} peers...", cli.size);

    // Keyspace positions are computed once, lookups only sort.
    let network: Vec<(Key, PeerId)> = (0..cli.size)
        .map(|_| {
            let peer = PeerId::random();
            (peer.key(), peer)
        })
        .collect();

    let local = PeerId::random();
    let mut table = RoutingTable::new(local.key());
    for (_, peer) in &network {
        table.add(peer.clone());
    }

    let estimator = match Estimator::with_defaults(&local, table, MAX_BUCKET_SIZE_K) {
        Ok(estimator) => estimator,
        Err(error) => {
            eprintln!("{error}");
            return;
        }
    };

    let start = Instant::now();

    for lookup in 1..=cli.lookups {
        let target = Key::random();

        let mut by_distance: Vec<(Key, PeerId)> = network.clone();
        by_distance.sort_by_key(|(key, _)| key.distance(&target));

        let closest: Vec<PeerId> = by_distance
            .into_iter()
            .take(MAX_BUCKET_SIZE_K)
            .map(|(_, peer)| peer)
            .collect();

        if let Err(error) = estimator.track(&target, &closest) {
            eprintln!("{error}");
            return;
        }

        match estimator.network_size() {
            Ok(estimate) => println!(
                "after {lookup:>3} lookups: {estimate:>10.0} peers ({:+.1}%)",
                (estimate - cli.size as f64) / cli.size as f64 * 100.0
            ),
            Err(Error::InsufficientData { index, count, required }) => println!(
                "after {lookup:>3} lookups: not enough data (depth {index}: {count}/{required})"
            ),
            Err(error) => println!("after {lookup:>3} lookups: {error}"),
        }
    }

    println!(
        "\nDone in {:?}, actual size: {} peers",
        start.elapsed(),
        cli.size
    );
}
