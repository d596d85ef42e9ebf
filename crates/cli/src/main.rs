//! heatisle CLI - land surface temperature and feature tables from Landsat 8

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use heatisle_algorithms::imagery::{compute_indices, ndvi, AlbedoCoefficients};
use heatisle_algorithms::pipeline::{PipelineOutput, ScenePipeline};
use heatisle_algorithms::proximity::{KernelDensityParams, Normalization, ProximitySpec};
use heatisle_algorithms::scene::{land_mask, load, BandId, BandSet, ScenePaths};
use heatisle_algorithms::table::FeatureTable;
use heatisle_algorithms::thermal::{LstChain, LstParams, LstProducts, ThermalCalibration};
use heatisle_core::io::{read_geojson, read_geotiff, write_geotiff};
use heatisle_core::{BoundingBox, Raster, VectorLayer, CRS};

use config::{FilterSection, LayerKind, RunConfig};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "heatisle")]
#[command(author, version, about = "Land surface temperature and feature tables from Landsat 8", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute NDVI, NDBI, NDWI and albedo for a scene
    Indices {
        /// Landsat product directory (*_B<n>.TIF files)
        scene: PathBuf,
        /// Output directory for the index GeoTIFFs
        output: PathBuf,
        /// Crop box: min_x,min_y,max_x,max_y in the scene CRS
        #[arg(short, long)]
        bbox: Option<String>,
    },
    /// Derive land surface temperature (°C) for a scene
    Lst {
        /// Landsat product directory (*_B<n>.TIF files)
        scene: PathBuf,
        /// Output LST GeoTIFF
        output: PathBuf,
        /// MTL metadata file (default: the *_MTL.txt in the scene directory)
        #[arg(short, long)]
        mtl: Option<PathBuf>,
        /// Crop box: min_x,min_y,max_x,max_y in the scene CRS
        #[arg(short, long)]
        bbox: Option<String>,
        /// Also write radiance, brightness temperature, Pv and emissivity
        #[arg(long)]
        intermediates: bool,
    },
    /// Distance or kernel-density layer from a GeoJSON file
    Proximity {
        /// GeoJSON features
        input: PathBuf,
        /// Raster whose grid the output follows
        template: PathBuf,
        /// Output GeoTIFF
        output: PathBuf,
        /// Layer type
        #[arg(short, long, value_enum, default_value = "distance")]
        kind: KindArg,
        /// Kernel radius in cells (density)
        #[arg(short, long, default_value = "5")]
        radius: usize,
        /// Land polygons to mask the output to
        #[arg(long)]
        land: Option<PathBuf>,
        /// Rescaling applied after masking
        #[arg(short, long, value_enum)]
        normalize: Option<NormalizeArg>,
        /// CRS of GeoJSON files that do not declare one
        #[arg(long, default_value = "EPSG:4326")]
        crs: String,
    },
    /// Run the full scene pipeline from a YAML configuration
    Run {
        /// YAML run configuration
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Distance,
    Density,
}

#[derive(Clone, Copy, ValueEnum)]
enum NormalizeArg {
    None,
    MinMax,
    Standardize,
}

impl From<NormalizeArg> for Normalization {
    fn from(arg: NormalizeArg) -> Self {
        match arg {
            NormalizeArg::None => Normalization::None,
            NormalizeArg::MinMax => Normalization::MinMax,
            NormalizeArg::Standardize => Normalization::Standardize,
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_bbox(s: &str) -> Result<BoundingBox> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid bbox '{}'", s))?;
    if parts.len() != 4 {
        bail!("bbox needs 4 comma-separated numbers: min_x,min_y,max_x,max_y");
    }
    Ok(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_layer(path: &Path, tag: &str, crs: &CRS) -> Result<VectorLayer> {
    read_geojson(path, tag, Some(*crs))
        .with_context(|| format!("Failed to read vector layer {}", path.display()))
}

fn read_scene(paths: &ScenePaths, bbox: Option<&BoundingBox>) -> Result<BandSet> {
    let pb = spinner("Reading bands...");
    let bands = load(paths, bbox).with_context(|| {
        format!("Failed to load scene {}", paths.meta.scene_id)
    })?;
    pb.finish_and_clear();
    Ok(bands)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn calibration_for(scene: &ScenePaths, mtl: Option<&Path>) -> Result<ThermalCalibration> {
    let path = match (mtl, &scene.mtl) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(p)) => p.clone(),
        (None, None) => bail!("No *_MTL.txt in the scene directory; pass --mtl"),
    };
    ThermalCalibration::from_mtl(&path)
        .with_context(|| format!("Failed to read calibration from {}", path.display()))
}

// ─── Run ────────────────────────────────────────────────────────────────

fn run_config(path: &Path) -> Result<()> {
    let config = RunConfig::load(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))?;
    let scene = config.scene_paths().context("Invalid scene section")?;
    let params = config.lst_params(&scene).context("Invalid calibration")?;

    let vector_crs = config.vector_crs().context("Invalid vector_crs")?;
    let bbox = config.bbox();
    let bands = read_scene(&scene, bbox.as_ref())?;

    let mut pipeline = ScenePipeline::new(params).with_albedo(config.albedo);
    if let Some(land) = &config.land_mask {
        pipeline = pipeline.with_land_mask(read_layer(land, "land", &vector_crs)?);
    }
    for layer in &config.layers {
        let features = read_layer(&layer.path, &layer.name, &vector_crs)?;
        let mut spec = match layer.kind {
            LayerKind::Distance => ProximitySpec::distance(&layer.name, features),
            LayerKind::Density => {
                ProximitySpec::density(&layer.name, features, layer.density_params())
            }
        };
        if let Some(normalization) = layer.normalization {
            spec = spec.with_normalization(normalization);
        }
        pipeline = pipeline.with_layer(spec);
    }
    if let Some(dem) = &config.elevation {
        pipeline = pipeline.with_elevation(read_raster(dem)?);
    }

    let pb = spinner("Running pipeline...");
    let result = pipeline.run(&bands);
    pb.finish_and_clear();
    let output = result.context("Pipeline failed")?;
    let subset = filtered_table(&output.table, config.filter.as_ref())?;

    if let Some(dir) = &config.output.grids {
        write_grids(&output, dir)?;
    }

    let table = &output.table;
    table
        .write_csv(&config.output.table)
        .with_context(|| format!("Failed to write {}", config.output.table.display()))?;
    let report = table.report();
    println!(
        "Feature table: {} rows ({} of {} cells dropped as incomplete)",
        report.retained_rows, report.dropped_cells, report.total_cells
    );
    for (name, invalid) in &report.invalid_by_column {
        info!("  {}: {} no-data cells", name, invalid);
    }

    if let (Some(filter), Some(subset)) = (&config.filter, subset) {
        if subset.is_empty() {
            warn!("filter {} > {} kept no rows", filter.column, filter.above);
        }
        subset
            .write_csv(&filter.table)
            .with_context(|| format!("Failed to write {}", filter.table.display()))?;
        println!(
            "Filtered table ({} > {}): {} rows -> {}",
            filter.column,
            filter.above,
            subset.len(),
            filter.table.display()
        );
    }
    Ok(())
}

/// Apply the configured filter before anything is written, so an unknown
/// column aborts the run with no output on disk
fn filtered_table(table: &FeatureTable, filter: Option<&FilterSection>) -> Result<Option<FeatureTable>> {
    filter
        .map(|f| {
            table
                .filter_above(&f.column, f.above)
                .with_context(|| format!("Invalid filter column '{}'", f.column))
        })
        .transpose()
}

/// LST needs only B4, B5 and B10: NDVI comes straight from the red/NIR pair
fn scene_lst(bands: &BandSet, calibration: ThermalCalibration) -> Result<LstProducts> {
    let vegetation = ndvi(bands.get(BandId::B5)?, bands.get(BandId::B4)?)?;
    let chain = LstChain::new(LstParams::new(calibration))?;
    Ok(chain.run(bands.get(BandId::B10)?, &vegetation)?)
}

fn write_grids(output: &PipelineOutput, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut grids: Vec<(&str, &Raster<f64>)> = vec![
        ("lst", &output.lst.lst),
        ("brightness_temperature", &output.lst.brightness_temperature),
        ("emissivity", &output.lst.emissivity),
        ("ndvi", &output.indices.ndvi),
        ("ndbi", &output.indices.ndbi),
        ("ndwi", &output.indices.ndwi),
        ("albedo", &output.indices.albedo),
    ];
    for (name, grid) in &output.layers {
        grids.push((name.as_str(), grid));
    }
    if let Some(dem) = &output.elevation {
        grids.push(("elevation", dem));
    }
    for (name, grid) in grids {
        write_result(grid, &dir.join(format!("{}.tif", name.to_lowercase())))?;
    }
    info!("grids written to {}", dir.display());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let summary = raster.statistics();
            let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));

            println!("{}", input.display());
            println!("  Grid:      {} cols x {} rows, {} m cells", raster.cols(), raster.rows(), raster.cell_size());
            println!("  Extent:    {}", raster.extent());
            println!(
                "  CRS:       {}",
                raster.crs().map_or_else(|| "none".to_string(), |c| c.to_string())
            );
            println!(
                "  No-data:   {}",
                raster.nodata().map_or_else(|| "none".to_string(), |v| v.to_string())
            );
            println!(
                "  Range:     {} .. {} (mean {}, sd {})",
                fmt(summary.min),
                fmt(summary.max),
                fmt(summary.mean),
                fmt(summary.std_dev)
            );
            println!(
                "  Coverage:  {} of {} cells valid ({:.1}%)",
                summary.valid_count,
                raster.len(),
                100.0 * summary.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        Commands::Indices { scene, output, bbox } => {
            let bbox = bbox.as_deref().map(parse_bbox).transpose()?;
            let paths = ScenePaths::discover(&scene)
                .with_context(|| format!("Failed to scan {}", scene.display()))?;
            let bands = read_scene(&paths, bbox.as_ref())?;
            let start = Instant::now();
            let indices = compute_indices(&bands, &AlbedoCoefficients::default())?;
            let elapsed = start.elapsed();
            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            for (name, grid) in [
                ("NDVI", &indices.ndvi),
                ("NDBI", &indices.ndbi),
                ("NDWI", &indices.ndwi),
                ("Albedo", &indices.albedo),
            ] {
                let path = output.join(format!("{}.tif", name.to_lowercase()));
                write_result(grid, &path)?;
                done(name, &path, elapsed);
            }
        }

        Commands::Lst {
            scene,
            output,
            mtl,
            bbox,
            intermediates,
        } => {
            let bbox = bbox.as_deref().map(parse_bbox).transpose()?;
            let paths = ScenePaths::discover(&scene)
                .with_context(|| format!("Failed to scan {}", scene.display()))?;
            let calibration = calibration_for(&paths, mtl.as_deref())?;
            let bands = read_scene(&paths, bbox.as_ref())?;

            let start = Instant::now();
            let products = scene_lst(&bands, calibration)?;
            let elapsed = start.elapsed();

            write_result(&products.lst, &output)?;
            if intermediates {
                let dir = output.parent().unwrap_or(Path::new("."));
                for (name, grid) in [
                    ("radiance", &products.radiance),
                    ("brightness_temperature", &products.brightness_temperature),
                    ("fractional_vegetation", &products.fractional_vegetation),
                    ("emissivity", &products.emissivity),
                ] {
                    write_result(grid, &dir.join(format!("{}.tif", name)))?;
                }
            }
            done("LST", &output, elapsed);
        }

        Commands::Proximity {
            input,
            template,
            output,
            kind,
            radius,
            land,
            normalize,
            crs,
        } => {
            let crs = CRS::from_identifier(&crs).context("Invalid --crs")?;
            let template = read_raster(&template)?;
            let tag = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("features")
                .to_string();
            let layer = read_layer(&input, &tag, &crs)?;
            let mask = land
                .map(|p| read_layer(&p, "land", &crs))
                .transpose()?
                .map(|l| land_mask(&l, &template))
                .transpose()?;

            let start = Instant::now();
            let mut spec = match kind {
                KindArg::Distance => ProximitySpec::distance(&tag, layer),
                KindArg::Density => {
                    ProximitySpec::density(&tag, layer, KernelDensityParams::new(radius))
                }
            };
            if let Some(n) = normalize {
                spec = spec.with_normalization(n.into());
            }
            let result = spec.build(&template, mask.as_ref())?;
            let elapsed = start.elapsed();

            write_result(&result, &output)?;
            done(&tag, &output, elapsed);
        }

        Commands::Run { config } => {
            let start = Instant::now();
            run_config(&config)?;
            println!("  Processing time: {:.2?}", start.elapsed());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatisle_algorithms::scene::SceneMeta;
    use heatisle_algorithms::table::assemble;
    use heatisle_core::{GeoTransform, NODATA};

    fn band(values: [f64; 4]) -> Raster<f64> {
        let mut r = Raster::from_vec(values.to_vec(), 2, 2).unwrap();
        r.set_transform(GeoTransform::new(350_000.0, 3_120_000.0, 30.0, -30.0));
        r.set_nodata(Some(NODATA));
        r
    }

    #[test]
    fn test_lst_from_thermal_subset() {
        let bands = BandSet::from_bands(
            SceneMeta::new("LC08_L1TP_207040_20230715_20230725_02_T1"),
            vec![
                (BandId::B4, band([0.08, 0.10, 0.12, 0.05])),
                (BandId::B5, band([0.30, 0.25, 0.15, 0.40])),
                (BandId::B10, band([25_000.0, 26_000.0, 27_000.0, 24_000.0])),
            ],
        )
        .unwrap();
        let calibration = ThermalCalibration::new(3.342e-4, 0.1, 774.8853, 1321.0789).unwrap();

        let products = scene_lst(&bands, calibration).unwrap();
        assert_eq!(products.lst.valid_count(), 4);
        // Hotter DN gives a hotter surface at similar emissivity
        assert!(products.lst.cell(0, 1).unwrap() > products.lst.cell(0, 0).unwrap());
    }

    #[test]
    fn test_unknown_filter_column_rejected() {
        let lst = band([30.0, 31.0, 32.0, 33.0]);
        let table = assemble(&[("LST", &lst)]).unwrap();
        let bad = FilterSection {
            column: "Buildings".into(),
            above: 0.5,
            table: PathBuf::from("buildings.csv"),
        };
        assert!(filtered_table(&table, Some(&bad)).is_err());

        let good = FilterSection { column: "LST".into(), ..bad };
        let subset = filtered_table(&table, Some(&good)).unwrap().unwrap();
        assert_eq!(subset.len(), 4);
        assert!(filtered_table(&table, None).unwrap().is_none());
    }
}
