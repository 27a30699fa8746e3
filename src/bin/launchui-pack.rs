use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use launchui_pack::config::configured_seven_zip;
use launchui_pack::{
    recompress_existing, HostEnvironment, Overrides, PackageConfig, Packager, SecondaryArchive,
    SevenZip, ZipArchiveBuilder,
};

const LOG_ENV: &str = "LAUNCHUI_PACK_LOG";

fn usage() -> &'static str {
    "Usage:\n  launchui-pack package [--root DIR] [--arch ARCH] [--version VER] [--json]\n  launchui-pack plan [--root DIR] [--arch ARCH] [--version VER] [--json]\n  launchui-pack recompress <archive.zip> [--seven-zip TOOL]"
}

#[derive(Debug, Default)]
struct Flags {
    root: Option<PathBuf>,
    arch: Option<String>,
    version: Option<String>,
    json: bool,
}

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [cmd, rest @ ..] if cmd == "package" => package(&parse_flags(rest)?),
        [cmd, rest @ ..] if cmd == "plan" => plan(&parse_flags(rest)?),
        [cmd, archive] if cmd == "recompress" => recompress(Path::new(archive), None),
        [cmd, archive, flag, tool] if cmd == "recompress" && flag == "--seven-zip" => {
            recompress(Path::new(archive), Some(tool.clone()))
        }
        _ => bail!(usage()),
    }
}

fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_flags(args: &[String]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut rest = args;

    loop {
        rest = match rest {
            [] => break,
            [flag, value, tail @ ..] if flag == "--root" => {
                flags.root = Some(PathBuf::from(value));
                tail
            }
            [flag, value, tail @ ..] if flag == "--arch" => {
                flags.arch = Some(value.clone());
                tail
            }
            [flag, value, tail @ ..] if flag == "--version" => {
                flags.version = Some(value.clone());
                tail
            }
            [flag, tail @ ..] if flag == "--json" => {
                flags.json = true;
                tail
            }
            [other, ..] => bail!("unexpected argument '{}'\n{}", other, usage()),
        };
    }

    Ok(flags)
}

fn load_config(flags: &Flags) -> Result<PackageConfig> {
    let root = match &flags.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let overrides = Overrides {
        arch: flags.arch.clone(),
        version: flags.version.clone(),
    };

    PackageConfig::load(&root, &HostEnvironment::capture(), &overrides)
        .with_context(|| format!("loading packaging configuration for '{}'", root.display()))
}

fn package(flags: &Flags) -> Result<()> {
    let config = load_config(flags)?;
    let compressor = SevenZip::new(config.seven_zip.as_str());

    let descriptor = Packager::new(&config, &ZipArchiveBuilder, &compressor).run()?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    println!(
        "{}  {}  ({} entries, {} bytes)",
        descriptor.primary.sha256,
        descriptor.primary.path.display(),
        descriptor.primary.entries,
        descriptor.primary.size_bytes
    );
    match &descriptor.secondary {
        SecondaryArchive::Created {
            path,
            size_bytes,
            sha256,
        } => println!("{}  {}  ({} bytes)", sha256, path.display(), size_bytes),
        SecondaryArchive::Skipped { tool } => println!("secondary archive skipped ('{}' not found)", tool),
    }
    Ok(())
}

fn plan(flags: &Flags) -> Result<()> {
    let config = load_config(flags)?;
    let compressor = SevenZip::new(config.seven_zip.as_str());

    let entries = Packager::new(&config, &ZipArchiveBuilder, &compressor).plan()?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", config.primary_archive().display());
    for entry in &entries {
        println!("  {} <- {}", entry.destination, entry.source.display());
    }
    Ok(())
}

fn recompress(archive: &Path, tool: Option<String>) -> Result<()> {
    let tool = match tool {
        Some(tool) => tool,
        None => {
            let cwd = std::env::current_dir().context("resolving current directory")?;
            configured_seven_zip(&cwd).context("reading compression tool from configuration")?
        }
    };
    let compressor = SevenZip::new(tool.as_str());

    match recompress_existing(&compressor, archive)
        .with_context(|| format!("recompressing '{}'", archive.display()))?
    {
        Some(secondary) => println!("{}", secondary.display()),
        None => println!("secondary archive skipped ('{}' not found)", tool),
    }
    Ok(())
}
