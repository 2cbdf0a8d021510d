use pagedb::{EngineConfig, StorageEngine};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    println!("pagedb - a minimal paged storage engine");
    println!("=======================================\n");

    let db_path = "demo.db";

    // The reference configuration: 3 buffer frames and 3 keys per node,
    // small enough that splits and evictions show up immediately
    let config = EngineConfig::default();
    let mut engine =
        StorageEngine::open(db_path, config).expect("failed to open storage engine");
    println!(
        "Opened {} (capacity {} frames, {} keys per node)\n",
        db_path, config.buffer_capacity, config.max_keys
    );

    // Fills the root leaf, then splits it, then lands in the new sibling
    for key in [10, 20, 30, 40, 50] {
        println!(">>> insert {}", key);
        engine.insert(key).expect("insert failed");
    }

    engine.flush().expect("flush failed");

    let bpm = engine.buffer_pool();
    println!("\nPages allocated: {}", bpm.allocated_count());
    println!("Evictions:       {}", bpm.eviction_count());
    println!("Disk writes:     {}", engine.disk_manager().write_count());

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed");
}
