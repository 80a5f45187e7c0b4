use std::fs;
use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rootcause::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vfs::{PhysicalFS, VfsPath};

use oggimport::ImportOptions;
use oggimport::Importer;
use oggimport::assets::VfsAssetHost;
use oggimport::catalog::JsonCatalog;
use oggimport::skills::{DEFAULT_SKILLS, SkillTable};
use oggimport::storage::MemoryStore;

/// Import an OggDude character export into a JSON entity store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of reference catalogs, one subdirectory per catalog
    #[clap(short, long)]
    catalogs: PathBuf,

    /// World the character is imported into
    #[clap(short, long, default_value = "default")]
    world: String,

    /// Directory uploaded assets are written to
    #[clap(short, long, default_value = "assets")]
    assets: PathBuf,

    /// Entity store file. Created if it doesn't exist, rewritten after a
    /// successful import
    #[clap(short, long, default_value = "characters.json")]
    output: PathBuf,

    /// Update an existing character leaf by leaf instead of replacing it
    #[clap(long)]
    partial: bool,

    /// Directory containing a Skills.xml with extra skill definitions
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Log debug output
    #[clap(short, long)]
    verbose: bool,

    /// Character export (.xml)
    sheet: PathBuf,
}

fn load_store(path: &PathBuf) -> Result<MemoryStore, Report> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }
    let data = fs::read(path).context_with(|| format!("Failed to read store {}", path.display()))?;
    serde_json::from_slice(&data).map_err(|e| rootcause::report!("Failed to parse store {}: {e}", path.display()))
}

fn main() -> Result<(), Report> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let skills = match &args.data_dir {
        Some(dir) => SkillTable::load(&VfsPath::new(PhysicalFS::new(dir))),
        None => DEFAULT_SKILLS.clone(),
    };

    if !args.catalogs.is_dir() {
        bail!("catalog directory not found: {}", args.catalogs.display());
    }
    let catalog = JsonCatalog::open(&VfsPath::new(PhysicalFS::new(&args.catalogs)))
        .map_err(|e| rootcause::report!("Failed to open catalogs: {e}"))?;

    fs::create_dir_all(&args.assets)
        .context_with(|| format!("Failed to create asset directory {}", args.assets.display()))?;
    let mut assets = VfsAssetHost::new(VfsPath::new(PhysicalFS::new(&args.assets)));

    let mut store = load_store(&args.output)?;
    let options = ImportOptions::builder()
        .world_id(args.world.clone())
        .partial_update(args.partial)
        .build();

    let sheet = fs::read(&args.sheet).context_with(|| format!("Failed to read {}", args.sheet.display()))?;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}% {msg}")
            .map_err(|e| rootcause::report!("Invalid progress template: {e}"))?,
    );
    bar.set_message(
        args.sheet
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );

    let outcome = {
        let mut importer = Importer::new(&catalog, &mut store, &mut assets, &skills, &options);
        importer.import_bytes(&sheet, &mut |percent: u8| bar.set_position(percent as u64))
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            bar.abandon();
            bail!("Failed to import {}: {e}", args.sheet.display());
        }
    };
    bar.finish();

    let data = serde_json::to_vec_pretty(&store).map_err(|e| rootcause::report!("Failed to serialize store: {e}"))?;
    fs::write(&args.output, data).context_with(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        "{} {} ({}) in {}",
        if outcome.created { "created" } else { "updated" },
        outcome.record.name,
        outcome.id,
        args.output.display()
    );

    Ok(())
}
