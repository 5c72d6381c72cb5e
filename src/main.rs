//! The `prisma` command-line front-end: argument handling (with stdin
//! prompts for anything missing), scene loading, and the render → tonemap →
//! PPM pipeline. The rendering core lives in the library crate.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use crossterm::style::Stylize;

use prisma::renderer::{write_ppm, Renderer};
use prisma::scene::Scene;

/// prisma — spectral path tracing from binary scenes to PPM images
#[derive(Parser, Debug)]
#[command(
    name = "prisma",
    version,
    about = "A physically-based spectral path tracer written in Rust 🦀",
    long_about = "Renders binary scene descriptions with Monte Carlo spectral path \
                  tracing: every pixel sample is traced independently at 81 wavelengths \
                  across the visible spectrum, converted through the CIE color pipeline, \
                  Reinhard-tonemapped, and written as an ASCII PPM image.",
    after_help = "EXAMPLES:\n  \
                  prisma cornell.scene cornell.ppm 0\n  \
                  prisma glass.scene glass.ppm 8\n  \
                  prisma            (prompts for every missing argument)"
)]
struct Cli {
    /// Path to the binary scene description
    scene: Option<String>,

    /// Output PPM image path
    output: Option<String>,

    /// Worker thread count (0 = use all available cores)
    threads: Option<usize>,
}

/// Prompts on stdin for an argument that was not supplied on the command
/// line.
fn prompt(label: &str) -> String {
    print!("[+] {label}: ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

fn print_header(scene_path: &str, renderer: &Renderer, threads: usize) {
    let scene = renderer.scene();
    eprintln!();
    eprintln!("  ╔═══════════════════════════════════════════════╗");
    eprintln!("  ║  prisma 🌈  Spectral Path Tracer              ║");
    eprintln!("  ╚═══════════════════════════════════════════════╝");
    eprintln!();
    eprintln!("  Scene:    {}", scene_path.bold());
    eprintln!(
        "  Entities: {} primitive(s), {} distribution(s), {} material(s), {} light(s)",
        scene.primitives.len(),
        scene.distributions.len(),
        scene.materials.len(),
        scene.lights.len()
    );
    eprintln!(
        "  BVH:      {} leaves over {} nodes",
        renderer.bvh_leaf_count(),
        renderer.bvh_node_count()
    );
    eprintln!(
        "  Render:   {}×{} @ {} spp, {}",
        scene.params.width,
        scene.params.height,
        scene.params.samples,
        if threads == 0 {
            "all cores".to_string()
        } else {
            format!("{threads} thread(s)")
        }
    );
    eprintln!();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let scene_path = cli
        .scene
        .unwrap_or_else(|| prompt("Scene file to render"));
    let output_path = cli.output.unwrap_or_else(|| prompt("Output file"));
    let threads = cli
        .threads
        .unwrap_or_else(|| prompt("Thread count (0 = all cores)").parse().unwrap_or(0));

    let scene = match Scene::open(&scene_path) {
        Ok(scene) => scene,
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let renderer = Renderer::new(scene);
    print_header(&scene_path, &renderer, threads);

    let start = Instant::now();
    let (pixels, stats) = renderer.render(threads);
    stats.print_summary();

    if let Err(error) = write_ppm(
        &output_path,
        &pixels,
        &renderer.scene().params,
        start.elapsed().as_secs(),
    ) {
        eprintln!("{} cannot write {output_path}: {error}", "error:".red().bold());
        return ExitCode::FAILURE;
    }

    eprintln!();
    eprintln!("  Saved {} ✨", output_path.clone().bold());
    eprintln!("  Rendered with prisma v{}", env!("CARGO_PKG_VERSION"));
    ExitCode::SUCCESS
}
