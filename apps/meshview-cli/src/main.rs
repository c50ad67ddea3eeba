//! Headless model inspector: summarise or validate a glTF file using the same
//! importer the viewer runs, without touching a GPU.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use meshview_assets::{load_scene, ImportOptions, SceneData, TextureCache, TextureSource};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "meshview-cli", version, about = "Inspect glTF models without opening a window")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a per-mesh summary of a model.
    Info {
        model: PathBuf,
    },
    /// Import a model and decode every texture it references; fail on any error.
    Validate {
        model: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Command::Info { model } => info(&model),
        Command::Validate { model } => validate(&model),
    }
}

fn import(model: &Path) -> anyhow::Result<SceneData> {
    load_scene(model, ImportOptions::default())
        .with_context(|| format!("failed to import {}", model.display()))
}

fn info(model: &Path) -> anyhow::Result<()> {
    let scene = import(model)?;
    println!("{}: {} mesh(es)", model.display(), scene.meshes.len());
    for mesh in &scene.meshes {
        let [r, g, b, a] = mesh.base_color;
        println!(
            "  {}: {} vertices, {} triangles, base colour [{r}, {g}, {b}, {a}], {} texture(s)",
            mesh.name,
            mesh.vertices.len(),
            mesh.triangle_count(),
            mesh.textures.len()
        );
        for texture in &mesh.textures {
            println!("    {}: {}", texture.kind.label(), texture.source.cache_key());
        }
    }
    Ok(())
}

fn validate(model: &Path) -> anyhow::Result<()> {
    let scene = import(model)?;

    // Decode each distinct source once, the same dedup the viewer relies on.
    let mut cache: TextureCache<bool> = TextureCache::new();
    let mut failures = 0usize;
    for mesh in &scene.meshes {
        for texture in &mesh.textures {
            let key = texture.source.cache_key();
            let entry = cache.load(&key, texture.kind, || match texture.source.decode() {
                Ok(_) => true,
                Err(err) => {
                    eprintln!("texture {key}: {err}");
                    false
                }
            });
            if !entry.handle {
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} texture reference(s) failed to decode");
    }

    let vertices: usize = scene.meshes.iter().map(|m| m.vertices.len()).sum();
    let embedded = scene
        .meshes
        .iter()
        .flat_map(|m| m.textures.iter())
        .filter(|t| matches!(t.source, TextureSource::Embedded { .. }))
        .count();
    println!(
        "ok: {} mesh(es), {vertices} vertices, {} distinct texture(s) ({embedded} embedded reference(s))",
        scene.meshes.len(),
        cache.len()
    );
    Ok(())
}
