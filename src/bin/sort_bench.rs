//! splat-sort-bench: drive the sort pipeline over a synthetic cloud
//!
//! Usage:
//!   splat-sort-bench --splats 500000 --frames 240
//!   splat-sort-bench --config sort.json --reversed
//!   splat-sort-bench --splats 2000000 --method gpu-bitonic   (needs --features gpu)

use clap::{Parser, ValueEnum};
use nalgebra::{Matrix4, Point3, Vector3};
use rand::{Rng, SeedableRng};
use splat_sort::{SortConfig, SortMethod, SortRequest, SortWorker, SplatCloud};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodArg {
    Cpu,
    GpuBitonic,
    Auto,
}

impl From<MethodArg> for SortMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Cpu => SortMethod::CpuRadix,
            MethodArg::GpuBitonic => SortMethod::GpuBitonic,
            MethodArg::Auto => SortMethod::Auto,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Benchmark the splat depth-sorting pipeline")]
struct Args {
    /// Number of random splats (at least 1)
    #[arg(long, default_value_t = 250_000, value_parser = parse_splat_count)]
    splats: usize,

    /// Number of camera frames to simulate
    #[arg(long, default_value_t = 120)]
    frames: usize,

    /// Simulated frame time in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// JSON sort configuration (command-line flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    method: Option<MethodArg>,

    /// Sort far-to-near
    #[arg(long)]
    reversed: bool,

    /// RNG seed for the synthetic cloud
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_splat_count(s: &str) -> Result<usize, String> {
    let count: usize = s.parse().map_err(|e| format!("{}", e))?;
    if count == 0 {
        return Err("the cloud needs at least one splat".to_string());
    }
    Ok(count)
}

/// Camera orbiting the origin at `radius`, looking at it.
fn orbit_camera(frame: usize, radius: f32) -> Matrix4<f32> {
    let angle = frame as f32 * 0.02;
    let eye = Point3::new(radius * angle.cos(), 0.5 * radius, radius * angle.sin());
    // look_at_rh builds the view matrix; the request wants the camera's world
    // transform, which is its inverse.
    Matrix4::look_at_rh(&eye, &Point3::origin(), &Vector3::y())
        .try_inverse()
        .unwrap_or_else(Matrix4::identity)
}

fn random_cloud(count: usize, seed: u64) -> SplatCloud<Vector3<f32>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            )
        })
        .collect::<Vec<_>>()
        .into()
}

fn run_cpu(cloud: &SplatCloud<Vector3<f32>>, config: &SortConfig, args: &Args) {
    let worker = match SortWorker::spawn(cloud.clone(), config) {
        Ok(worker) => worker,
        Err(e) => {
            log::error!("Failed to start sort worker: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut received = 0usize;
    let mut latency_total = Duration::ZERO;
    let mut submitted_at = Vec::with_capacity(args.frames);

    for frame in 0..args.frames {
        let request = SortRequest::new(orbit_camera(frame, 30.0), Matrix4::identity(), cloud.len());
        submitted_at.push((request, Instant::now()));
        worker.submit(request);

        std::thread::sleep(Duration::from_millis(args.frame_ms));

        if let Some(result) = worker.try_recv() {
            if let Some((_, at)) = submitted_at.iter().find(|(r, _)| *r == result.request) {
                latency_total += at.elapsed();
            }
            received += 1;
            worker.recycle(result);
        }
    }

    let stats = worker.stats();
    let elapsed = start.elapsed();
    log::info!(
        "{} frames in {:.2}s: {} results received, {} sorts, {} coalesced, {} dropped, {} buffers allocated",
        args.frames,
        elapsed.as_secs_f64(),
        received,
        stats.sorts_completed,
        stats.requests_coalesced,
        stats.results_dropped,
        stats.buffers_allocated
    );
    if received > 0 {
        log::info!(
            "Mean request → result latency: {:.2} ms",
            latency_total.as_secs_f64() * 1000.0 / received as f64
        );
    }
}

#[cfg(feature = "gpu")]
fn run_gpu(cloud: &SplatCloud<Vector3<f32>>, config: &SortConfig, args: &Args) {
    use splat_sort::gpu::{GpuContext, GpuSplatSorter};

    let result = GpuContext::new_blocking().and_then(|ctx| {
        let sorter = GpuSplatSorter::new(&ctx.device, cloud, config)?;
        Ok((ctx, sorter))
    });
    let (ctx, sorter) = match result {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    for frame in 0..args.frames {
        let request = SortRequest::new(orbit_camera(frame, 30.0), Matrix4::identity(), cloud.len());
        if let Err(e) = sorter.sort_blocking(&ctx, &request) {
            log::error!("GPU sort failed on frame {}: {}", frame, e);
            std::process::exit(1);
        }
    }
    let elapsed = start.elapsed();
    log::info!(
        "{} GPU sorts in {:.2}s ({:.2} ms each, including readback)",
        args.frames,
        elapsed.as_secs_f64(),
        elapsed.as_secs_f64() * 1000.0 / args.frames.max(1) as f64
    );
}

#[cfg(not(feature = "gpu"))]
fn run_gpu(_cloud: &SplatCloud<Vector3<f32>>, _config: &SortConfig, _args: &Args) {
    log::error!("GPU support not enabled. Compile with --features gpu");
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    log::info!("splat-sort-bench v{}", splat_sort::VERSION);

    let mut config = match &args.config {
        Some(path) => match SortConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => SortConfig::default(),
    };
    if let Some(method) = args.method {
        config.method = method.into();
    }
    config.reversed |= args.reversed;
    config.capacity = config.capacity.max(args.splats);

    log::info!("Generating {} random splats (seed {})", args.splats, args.seed);
    let cloud = random_cloud(args.splats, args.seed);

    match config.resolve_method(cloud.len()) {
        SortMethod::GpuBitonic => run_gpu(&cloud, &config, &args),
        _ => run_cpu(&cloud, &config, &args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_splats_rejected_at_parse_time() {
        assert!(parse_splat_count("0").is_err());
        assert!(Args::try_parse_from(["splat-sort-bench", "--splats", "0"]).is_err());
    }

    #[test]
    fn test_splat_count_parses() {
        assert_eq!(parse_splat_count("1"), Ok(1));
        assert!(parse_splat_count("many").is_err());
        let args = Args::try_parse_from(["splat-sort-bench", "--splats", "12"]).unwrap();
        assert_eq!(args.splats, 12);
    }
}
