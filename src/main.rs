use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use polyevo::dna::GeneRole;
use polyevo::render::render_genes;
use polyevo::{limit_dimensions, Configuration, EngineWorker, GeneLayout, GenerationRequest, PixelBuffer, StepOutcome};

/// Evolve polygons toward a target image and save the best rendering.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Target image path.
    input: PathBuf,

    /// Settings file (JSON). Missing keys take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective settings to this file and continue.
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,

    /// Number of generations to run.
    #[arg(short, long, default_value_t = 500)]
    generations: u64,

    /// Stop early after this many generations without improvement.
    #[arg(long, value_name = "N")]
    max_stagnation: Option<u64>,

    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Longest side of the rendering, overrides the settings file.
    #[arg(short, long)]
    resolution: Option<u32>,

    /// Output image path (PNG).
    #[arg(short, long, default_value = "best.png")]
    output: PathBuf,

    /// Render the output at the input's native size instead of the rendering size.
    #[arg(long)]
    full_size: bool,

    /// Log progress every N generations.
    #[arg(long, value_name = "N", default_value_t = 10)]
    log_every: u64,
}

/// scale vertex coordinates from the rendering size to another size
fn scale_genes(layout: &GeneLayout, genes: &[f32], sx: f32, sy: f32) -> Vec<f32> {
    genes
        .iter()
        .enumerate()
        .map(|(pos, &g)| match layout.role(pos) {
            GeneRole::VertexStart { .. } => g * sx,
            GeneRole::VertexTail => g * sy,
            GeneRole::ColorStart | GeneRole::ColorTail => g,
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // name rayon's workers once at startup ("rayon-0", ...)
    let _ = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-{i}"))
        .build_global();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Configuration::load(path),
        None => Configuration::default(),
    };
    if let Some(resolution) = args.resolution {
        cfg.resolution = resolution;
    }
    cfg.validate()?;
    if let Some(path) = &args.save_config {
        cfg.save(path)?;
        log::info!("settings written to {}", path.display());
    }

    let img = image::open(&args.input)?.to_rgba8();
    let (width, height) = img.dimensions();
    let (render_w, render_h) = limit_dimensions(width, height, cfg.resolution);
    log::info!(
        "target {} ({width}x{height}), rendering at {render_w}x{render_h}, {} polygons x {} vertices",
        args.input.display(),
        cfg.nb_polygons,
        cfg.nb_vertex
    );
    let layout = GeneLayout::from_config(&cfg);

    let worker = EngineWorker::spawn(args.seed)?;
    // every request carries the target, so ship it at the rendering size
    let target = PixelBuffer::new(width, height, img.into_raw()).resized(render_w, render_h)?;
    let mut request = GenerationRequest::bootstrap(target, cfg, render_w, render_h);
    let started = Instant::now();
    let mut best = None;

    for _ in 0..args.generations {
        let response = worker.run_step(request.clone())?;
        if response.outcome == StepOutcome::RenderSurfaceUnavailable {
            return Err(format!("cannot render at {render_w}x{render_h}").into());
        }

        let generation = response.generation;
        let stagnation = response.not_improving_since;
        if let Some(b) = &response.best {
            if generation % args.log_every.max(1) == 0 || generation == 1 {
                log::info!(
                    "generation {generation}: fitness {:.4} (ssim {:?}, pixel {:?}, sub {:?}), not improving since {stagnation}, {:.3}s/step",
                    b.fitness,
                    b.scores.ssim,
                    b.scores.pixel_diff,
                    b.scores.sub_pixel,
                    response.elapsed_time
                );
            }
            best = Some(b.clone());
        }
        request = request.follow_up(response);

        if args.max_stagnation.is_some_and(|max| stagnation >= max) {
            log::info!("no improvement for {stagnation} generations, stopping");
            break;
        }
    }
    worker.shutdown();

    let Some(best) = best else {
        return Err("no generation completed".into());
    };
    log::info!(
        "best fitness {:.4} after {} generations in {:.1}s",
        best.fitness,
        request.generation,
        started.elapsed().as_secs_f64()
    );

    let (out_w, out_h, genes) = if args.full_size {
        let sx = width as f32 / render_w as f32;
        let sy = height as f32 / render_h as f32;
        (width, height, scale_genes(&layout, &best.genes, sx, sy))
    } else {
        (render_w, render_h, best.genes.clone())
    };
    let rgba = render_genes(&layout, &genes, out_w, out_h)?;
    let out = image::RgbaImage::from_raw(out_w, out_h, rgba).ok_or("rendered buffer has the wrong size")?;
    out.save(&args.output)?;
    log::info!("saved {}", args.output.display());
    Ok(())
}
