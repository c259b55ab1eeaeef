//! Command handlers: load settings, wire services, print results

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::CommandFactory;
use colored::Colorize;
use tracing::{debug, instrument};

use crate::application::services::{
    OutlierReport, PercentileReport, TileRenderer, TreemapOptions,
};
use crate::application::{ApplicationError, IoResultExt};
use crate::cli::args::{Cli, Commands, ConfigCommands, OutputFormat};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::mapview::OSM_ATTRIBUTION;
use crate::domain::{parse_tile_list, MapView, TileJob, UrlPattern};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::server::{self, ProxyState};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Info {
            source,
            kind,
            d3_json,
            tree,
        }) => cmd_info(source, kind.as_deref(), *d3_json, *tree),
        Some(Commands::Treemap {
            source,
            output,
            width,
            height,
            padding,
        }) => cmd_treemap(
            source,
            output.as_deref(),
            TreemapOptions {
                width: *width,
                height: *height,
                padding: *padding,
            },
        ),
        Some(Commands::Map { port }) => cmd_map(*port),
        Some(Commands::Proxy { url, port, cache }) => cmd_proxy(url, *port, *cache),
        Some(Commands::Heatmap {
            url,
            port,
            cache,
            sub_zooms,
            max_zoom,
        }) => cmd_heatmap(url, *port, *cache, *sub_zooms, *max_zoom),
        Some(Commands::Percentiles {
            tiles_file,
            url,
            percentiles,
            cache,
            jobs,
            format,
        }) => cmd_percentiles(tiles_file, url, percentiles, *cache, *jobs, *format),
        Some(Commands::Outliers {
            tiles_file,
            url,
            cache,
            jobs,
            num,
        }) => cmd_outliers(tiles_file, url, *cache, *jobs, *num),
        Some(Commands::Config { command }) => cmd_config(command),
        Some(Commands::Completion { shell }) => cmd_completion(*shell),
        None => Cli::command()
            .print_help()
            .map_err(|e| CliError::from(InfraError::io("print help", e))),
    }
}

// ============================================================
// Wiring
// ============================================================

fn current_dir() -> CliResult<std::path::PathBuf> {
    std::env::current_dir().map_err(|e| CliError::from(InfraError::io("get current directory", e)))
}

fn load_settings() -> CliResult<Settings> {
    let cwd = current_dir()?;
    let settings = Settings::load(Some(cwd.as_path()))?;
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn container(settings: Settings, cache: bool) -> CliResult<ServiceContainer> {
    let container = ServiceContainer::new(settings)?;
    if cache {
        debug!("caching tiles in {}", container.settings.cache_dir.display());
        Ok(container.with_cache())
    } else {
        Ok(container)
    }
}

fn read_tiles(fs: &dyn FileSystem, tiles_file: &Path, url: &str) -> CliResult<Vec<TileJob>> {
    let content = fs
        .read_to_string(tiles_file)
        .with_path_context("read tile list", tiles_file)?;
    Ok(parse_tile_list(&content, &UrlPattern::new(url))?)
}

// ============================================================
// Single tile and documents
// ============================================================

#[instrument]
fn cmd_info(source: &str, kind: Option<&str>, d3_json: bool, tree: bool) -> CliResult<()> {
    let container = container(load_settings()?, false)?;
    let sizes = match container.inspect_service().inspect(source, kind) {
        Err(ApplicationError::Fetch { status, .. }) => return Err(CliError::TileFetch { status }),
        result => result?,
    };

    if d3_json {
        output::info(&sizes.treemap_document(source).to_json());
    } else if tree {
        output::info(&sizes.to_termtree(source));
    } else {
        for (label, value) in sizes.flatten() {
            output::info(&format!("{label} => {value}"));
        }
    }
    Ok(())
}

#[instrument]
fn cmd_treemap(source: &str, out: Option<&Path>, options: TreemapOptions) -> CliResult<()> {
    let container = container(load_settings()?, false)?;
    let svg = container.treemap_service().render(source, options)?;

    match out {
        Some(path) => {
            container
                .fs
                .write(path, svg.as_bytes())
                .with_path_context("write SVG", path)?;
            output::action("Wrote", &path.display());
        }
        None => output::info(&svg),
    }
    Ok(())
}

#[instrument]
fn cmd_map(port: Option<u16>) -> CliResult<()> {
    let settings = load_settings()?;
    let view = MapView::for_proxy(port.unwrap_or(settings.server.port), OSM_ATTRIBUTION);
    output::info(&view.script()?);
    Ok(())
}

// ============================================================
// Tile proxy
// ============================================================

#[instrument]
fn cmd_proxy(url: &str, port: Option<u16>, cache: bool) -> CliResult<()> {
    let settings = load_settings()?;
    let port = port.unwrap_or(settings.server.port);
    let max_zoom = settings.server.max_zoom;

    // Keeps the blocking HTTP client alive until the runtime is gone.
    let container = container(settings, cache)?;
    let renderer = Arc::new(container.treemap_tiles(UrlPattern::new(url)));
    serve(renderer, port, max_zoom)
}

#[instrument]
fn cmd_heatmap(
    url: &str,
    port: Option<u16>,
    cache: bool,
    sub_zooms: Option<u8>,
    max_zoom: Option<u8>,
) -> CliResult<()> {
    let mut settings = load_settings()?;
    if let Some(sub_zooms) = sub_zooms {
        settings.heatmap.sub_zooms = sub_zooms;
    }
    if let Some(max_zoom) = max_zoom {
        settings.heatmap.max_zoom = max_zoom;
    }
    let port = port.unwrap_or(settings.server.port);
    let server_max_zoom = settings.server.max_zoom;

    let container = container(settings, cache)?;
    let renderer = Arc::new(container.heatmap_tiles(UrlPattern::new(url)));
    serve(renderer, port, server_max_zoom)
}

fn serve(renderer: Arc<dyn TileRenderer>, port: u16, max_zoom: u8) -> CliResult<()> {
    let view = MapView::for_proxy(port, OSM_ATTRIBUTION);
    view.validate()?;
    let state = ProxyState::new(renderer, view, max_zoom)?;
    server::serve(state, port)?;
    Ok(())
}

// ============================================================
// Statistics
// ============================================================

#[instrument]
fn cmd_percentiles(
    tiles_file: &Path,
    url: &str,
    percentiles: &[f64],
    cache: bool,
    jobs: Option<usize>,
    format: OutputFormat,
) -> CliResult<()> {
    let settings = load_settings()?;
    let percentiles = if percentiles.is_empty() {
        settings.stats.percentiles.clone()
    } else {
        percentiles.to_vec()
    };
    let jobs = jobs.unwrap_or(settings.stats.jobs);

    let container = container(settings, cache)?;
    let tiles = read_tiles(container.fs.as_ref(), tiles_file, url)?;
    let report = container.stats_service(jobs).percentiles(&tiles, &percentiles)?;

    match format {
        OutputFormat::Text => print_percentiles_text(&report),
        OutputFormat::Csv => print!("{}", percentiles_csv(&report)),
    }
    if report.failed > 0 {
        output::warning(&format!("{} tile(s) could not be fetched or decoded", report.failed));
    }
    Ok(())
}

/// Column header of a percentile, e.g. `p50` or `p99.9`.
fn percentile_label(p: f64) -> String {
    format!("p{p}")
}

fn print_percentiles_text(report: &PercentileReport) {
    for (group, rows) in &report.groups {
        let mut header = format!("{:>20}", group.to_string());
        for p in &report.percentiles {
            header.push_str(&format!(" {:>8}", percentile_label(*p)));
        }
        println!("{}", header.green().bold());

        for (label, values) in rows {
            let mut line = format!("{label:>20}");
            for value in values {
                line.push_str(&format!(" {value:>8}"));
            }
            if label.starts_with('~') {
                println!("{}", line.bold());
            } else {
                println!("{line}");
            }
        }
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// `group,layer,p...` rows; group is `overall` or a zoom level.
fn percentiles_csv(report: &PercentileReport) -> String {
    let mut out = String::from("group,layer");
    for p in &report.percentiles {
        out.push(',');
        out.push_str(&percentile_label(*p));
    }
    out.push('\n');

    for (group, rows) in &report.groups {
        for (label, values) in rows {
            out.push_str(&group.to_string());
            out.push(',');
            out.push_str(&csv_field(label));
            for value in values {
                out.push(',');
                out.push_str(&value.to_string());
            }
            out.push('\n');
        }
    }
    out
}

#[instrument]
fn cmd_outliers(
    tiles_file: &Path,
    url: &str,
    cache: bool,
    jobs: Option<usize>,
    num: Option<usize>,
) -> CliResult<()> {
    let settings = load_settings()?;
    let jobs = jobs.unwrap_or(settings.stats.jobs);
    let num = num.unwrap_or(settings.stats.outliers);

    let container = container(settings, cache)?;
    let tiles = read_tiles(container.fs.as_ref(), tiles_file, url)?;
    let report = container.stats_service(jobs).outliers(&tiles, num)?;

    print_outliers(&report);
    if report.failed > 0 {
        output::warning(&format!("{} tile(s) could not be fetched or decoded", report.failed));
    }
    Ok(())
}

fn print_outliers(report: &OutlierReport) {
    for (layer, outliers) in &report.layers {
        output::header(&format!("Layer '{layer}'"));
        for outlier in outliers {
            output::info(&format!("{:8} {}", outlier.size, outlier.url));
        }
    }
}

// ============================================================
// Settings and shell integration
// ============================================================

#[instrument]
fn cmd_config(command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings()?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".into())
                })?
            } else {
                local_config_path(&current_dir()?)
            };
            write_template(&RealFileSystem, &path)?;
            output::success(&format!("Created {}", path.display()));
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("Global", &describe_path(&path)),
                None => output::action("Global", &"(unavailable)"),
            }
            output::action("Local", &describe_path(&local_config_path(&current_dir()?)));
            output::detail(&"Env: SCOVILLE_* (e.g. SCOVILLE_SERVER__PORT)");
        }
    }
    Ok(())
}

/// Write the commented settings template, refusing to overwrite.
fn write_template(fs: &dyn FileSystem, path: &Path) -> CliResult<()> {
    if fs.exists(path) {
        return Err(CliError::Usage(format!(
            "config already exists: {}",
            path.display()
        )));
    }
    fs.ensure_parent(path)
        .and_then(|_| fs.write(path, Settings::template().as_bytes()))
        .with_path_context("write config", path)?;
    Ok(())
}

fn describe_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found)", path.display())
    }
}

fn cmd_completion(shell: clap_complete::Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
