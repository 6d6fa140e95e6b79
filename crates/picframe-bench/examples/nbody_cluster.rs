//! Multi-device n-body run.
//!
//! Splits the cluster profile over four threads, runs ten steps and prints
//! per-device metrics and the gathered mid-plane density.
//!
//! Run with `RUST_LOG=debug` to see per-step exchange logs.

use log::info;
use picframe_bench::cluster_profile;
use picframe_engine::run_cluster;
use picframe_kernels::NBody;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = cluster_profile();
    info!(
        "{} devices, {} global cells, {} particles per supercell",
        config.device_count(),
        config.global_cells,
        config.particles_per_supercell
    );

    let reports = match run_cluster(&config, |_| NBody::from_config(&config)) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("run failed: {e}");
            std::process::exit(1);
        }
    };

    println!("=== picframe n-body cluster ===\n");
    for report in &reports {
        let sent: u64 = report.metrics.iter().map(|m| m.sent).sum();
        let received: u64 = report.metrics.iter().map(|m| m.received).sum();
        let total_us: u64 = report.metrics.iter().map(|m| m.total_us).sum();
        println!(
            "  device {:>2}: domain {} + {}, live={:>6}, sent={:>5}, received={:>5}, time={:>8}μs",
            report.rank,
            report.local_domain.offset,
            report.local_domain.size,
            report.live_particles,
            sent,
            received,
            total_us,
        );
    }

    if let Some(density) = reports.iter().find_map(|r| r.density.as_ref()) {
        let width = config.global_cells.x as usize;
        println!("\nmid-plane density ({} x {}):", width, density.len() / width);
        for row in density.chunks(width) {
            let line: String = row
                .iter()
                .map(|&v| match v as u32 {
                    0 => '.',
                    1 => '+',
                    _ => '#',
                })
                .collect();
            println!("  {line}");
        }
    }
}
