use clap::Parser;
use clap::ValueEnum;
use probe_hash::CuckooTable;
use probe_hash::Map;
use probe_hash::OpenAddressingTable;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    Open,
    Cuckoo,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "entries", default_value_t = 1000)]
    entries: u64,

    #[arg(short = 's', long = "strategy", value_enum, default_value_t = Strategy::Open)]
    strategy: Strategy,

    /// Sub-tables for the cuckoo strategy.
    #[arg(short = 'w', long = "ways", default_value_t = 2)]
    ways: usize,

    /// Remove every other entry after filling, to show tombstone buildup.
    #[arg(long = "churn")]
    churn: bool,
}

fn fill<M: Map<u64, u64>>(table: &mut M, args: &Args) {
    println!("Filling table with {} u64 keys...", args.entries);

    let mut failures = 0;
    for i in 0..args.entries {
        if let Err(e) = table.insert(i, i) {
            println!("insert {} failed: {}", i, e);
            failures += 1;
        }
    }

    if args.churn {
        for i in (0..args.entries).step_by(2) {
            table.remove(&i).unwrap();
        }
    }

    println!(
        "Inserted {} values, {} failures, {} live",
        args.entries - failures,
        failures,
        table.len()
    );
}

fn main() {
    let args = Args::parse();

    match args.strategy {
        Strategy::Open => {
            let mut table = OpenAddressingTable::new();
            fill(&mut table, &args);
            println!(
                "Final capacity: {} ({:.2}% load)",
                table.capacity(),
                table.load_factor() * 100.0
            );
            table.probe_histogram().print();
            table.debug_stats().print();
        }
        Strategy::Cuckoo => {
            let mut table = match CuckooTable::with_ways(args.ways) {
                Ok(table) => table,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(2);
                }
            };
            fill(&mut table, &args);
            println!(
                "Final capacity: {} across {} ways ({:.2}% load)",
                table.capacity(),
                table.ways(),
                table.load_factor() * 100.0
            );
            table.probe_histogram().print();
            table.debug_stats().print();
        }
    }
}
