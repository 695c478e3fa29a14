//! Local driver that steps an endpoint client and an arbiter loop
//! together for a fixed number of timeslots, logging what each side
//! observes. Useful for poking at the allocator and pacer without a real
//! network — not a production arbiter deployment.

use clap::Parser;
use tracing::info;

use fastpass_arbiter::{Allocator, ArbiterLoop, Pim, RxDemand};
use fastpass_endpoint::client::EndpointClient;
use fastpass_proto::SparseDemandTable;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of timeslots to simulate.
    #[arg(short = 'n', long, default_value_t = 20)]
    timeslots: u64,

    /// Number of synthetic destination flows to generate demand for.
    #[arg(short = 'f', long, default_value_t = 4)]
    flows: u64,

    /// PIM allocator matching rounds per timeslot.
    #[arg(long, default_value_t = 4)]
    pim_rounds: u32,

    /// RNG seed, for reproducible runs.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(?args, "starting fastpass-sim");

    let mut endpoint = EndpointClient::new(SparseDemandTable::new(), /*window*/ 8, /*watermark*/ 4, 15);
    let mut arbiter = ArbiterLoop::new(1024, Allocator::Pim(Pim::new(args.pim_rounds, args.seed)));

    for dst in 0..args.flows {
        endpoint.demand.inc_demand(dst, 1);
        endpoint.on_demand_grew(dst);
    }

    for _ in 0..args.timeslots {
        let entries = endpoint.build_request_entries();
        let rx: Vec<RxDemand> = entries
            .iter()
            .map(|e| RxDemand {
                src: 0,
                dst_key: e.dst_key,
                cumulative_count: e.new_requested,
            })
            .collect();

        let record = arbiter.step(&rx);
        info!(
            timeslot = arbiter.current_timeslot() - 1,
            requests = entries.len(),
            admitted = record.n_admitted(),
            "timeslot complete"
        );

        for dst in 0..args.flows {
            endpoint.demand.inc_demand(dst, 1);
            endpoint.on_demand_grew(dst);
        }
    }
}
