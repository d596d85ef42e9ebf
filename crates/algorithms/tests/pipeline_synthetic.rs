//! End-to-end run of the scene pipeline on a synthetic Landsat scene.
//!
//! A 30×30 scene (30 m cells, UTM 28N) is written to a temporary directory
//! with Landsat-style file names, discovered, loaded, masked to a land
//! polygon covering the western two thirds, and turned into a feature table.

use geo::{line_string, point, polygon, MultiPoint};
use heatisle_algorithms::pipeline::ScenePipeline;
use heatisle_algorithms::proximity::{KernelDensityParams, ProximitySpec};
use heatisle_algorithms::scene::{load, BandId, ScenePaths};
use heatisle_algorithms::thermal::{LstParams, ThermalCalibration};
use heatisle_core::io::write_geotiff;
use heatisle_core::{BoundingBox, Error, GeoTransform, Raster, VectorLayer, CRS, NODATA};
use std::path::Path;

const PRODUCT: &str = "LC08_L1TP_207040_20230814_20230819_02_T1";
const SIZE: usize = 30;
const ORIGIN_X: f64 = 350_000.0;
const ORIGIN_Y: f64 = 3_110_000.0;
const CELL: f64 = 30.0;
/// Land ends 20 cells east of the origin
const COAST_X: f64 = ORIGIN_X + 20.0 * CELL;

fn utm() -> CRS {
    CRS::from_epsg(32628)
}

fn band_value(band: BandId, row: usize, col: usize) -> f64 {
    let (r, c) = (row as f64, col as f64);
    match band {
        BandId::B2 => 0.08 + 0.001 * c,
        BandId::B3 => 0.09 + 0.001 * r,
        BandId::B4 => 0.06 + 0.002 * c,
        BandId::B5 => 0.20 + 0.006 * r,
        BandId::B6 => 0.18 + 0.003 * c,
        BandId::B7 => 0.12 + 0.002 * r,
        BandId::B10 => 22_000.0 + 150.0 * c - 40.0 * r,
        BandId::B1 => 0.1,
    }
}

fn write_scene(dir: &Path) {
    for band in [BandId::B2, BandId::B3, BandId::B4, BandId::B5, BandId::B6, BandId::B7, BandId::B10] {
        let mut r: Raster<f64> = Raster::new(SIZE, SIZE);
        r.set_transform(GeoTransform::new(ORIGIN_X, ORIGIN_Y, CELL, -CELL));
        r.set_crs(Some(utm()));
        r.set_nodata(Some(NODATA));
        for row in 0..SIZE {
            for col in 0..SIZE {
                r.set(row, col, band_value(band, row, col)).unwrap();
            }
        }
        write_geotiff(&r, dir.join(format!("{}_{}.TIF", PRODUCT, band))).unwrap();
    }
}

fn elevation() -> Raster<f64> {
    let mut dem: Raster<f64> = Raster::new(40, 40);
    dem.set_transform(GeoTransform::new(ORIGIN_X - 100.0, ORIGIN_Y + 100.0, 25.0, -25.0));
    dem.set_crs(Some(utm()));
    dem.set_nodata(Some(NODATA));
    for row in 0..40 {
        for col in 0..40 {
            let (x, y) = dem.pixel_to_geo(col, row);
            dem.set(row, col, 0.1 * (COAST_X - x) + 0.01 * (y - ORIGIN_Y) + 50.0).unwrap();
        }
    }
    dem
}

fn land() -> VectorLayer {
    let south = ORIGIN_Y - SIZE as f64 * CELL;
    VectorLayer::from_geometries(
        "land",
        Some(utm()),
        vec![polygon![
            (x: ORIGIN_X, y: south),
            (x: COAST_X, y: south),
            (x: COAST_X, y: ORIGIN_Y),
            (x: ORIGIN_X, y: ORIGIN_Y),
        ]],
    )
}

fn coastline() -> VectorLayer {
    let south = ORIGIN_Y - SIZE as f64 * CELL;
    VectorLayer::from_geometries(
        "coastline",
        Some(utm()),
        vec![line_string![(x: COAST_X + 1.0, y: south), (x: COAST_X + 1.0, y: ORIGIN_Y)]],
    )
}

fn tourism() -> VectorLayer {
    let points = MultiPoint::new(vec![
        point!(x: ORIGIN_X + 100.0, y: ORIGIN_Y - 100.0),
        point!(x: ORIGIN_X + 400.0, y: ORIGIN_Y - 350.0),
        point!(x: ORIGIN_X + 450.0, y: ORIGIN_Y - 380.0),
        point!(x: ORIGIN_X + 200.0, y: ORIGIN_Y - 700.0),
    ]);
    VectorLayer::from_geometries("tourism", Some(utm()), vec![points])
}

fn params() -> LstParams {
    LstParams::new(ThermalCalibration::new(3.342e-4, 0.1, 774.8853, 1321.0789).unwrap())
}

fn pipeline() -> ScenePipeline {
    ScenePipeline::new(params())
        .with_land_mask(land())
        .with_layer(ProximitySpec::distance("DistCoast", coastline()))
        .with_layer(ProximitySpec::density("TourismExposure", tourism(), KernelDensityParams::new(4)))
        .with_elevation(elevation())
}

#[test]
fn synthetic_scene_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path());

    let paths = ScenePaths::discover(dir.path()).unwrap();
    assert_eq!(paths.bands.len(), 7);
    let bands = load(&paths, None).unwrap();
    let out = pipeline().run(&bands).unwrap();

    let table = &out.table;
    assert_eq!(
        table.columns(),
        &["X", "Y", "LST", "NDVI", "NDBI", "NDWI", "Albedo", "DistCoast", "TourismExposure", "Elevation"]
    );
    // every land cell is complete
    assert_eq!(table.len(), SIZE * 20);
    assert_eq!(table.report().total_cells, SIZE * SIZE);
    assert_eq!(table.report().dropped_cells, SIZE * 10);
    assert_eq!(table.label().unwrap().values[0], "Aug");

    for row in table.rows() {
        assert!(row.iter().all(|v| v.is_finite() && *v != NODATA));
        assert!(row[0] < COAST_X);
    }

    let lst = table.column_summary("LST").unwrap();
    assert!(lst.min > -10.0 && lst.max < 60.0, "implausible LST range {:?}", lst);

    let ndvi = table.column_summary("NDVI").unwrap();
    assert!(ndvi.min >= -1.0 && ndvi.max <= 1.0);

    let exposure = table.column_summary("TourismExposure").unwrap();
    assert!(exposure.mean.abs() < 1e-9);
    assert!((exposure.std_dev - 1.0).abs() < 1e-9);

    let coast = table.column_summary("DistCoast").unwrap();
    assert!((coast.min - CELL).abs() < 1e-9);
    assert!((coast.max - 20.0 * CELL).abs() < 1e-9);

    // elevation is a plane, so bilinear resampling reproduces it
    let xs = table.column("X").unwrap();
    let ys = table.column("Y").unwrap();
    let elev = table.column("Elevation").unwrap();
    for i in 0..table.len() {
        let expected = 0.1 * (COAST_X - xs[i]) + 0.01 * (ys[i] - ORIGIN_Y) + 50.0;
        assert!((elev[i] - expected).abs() < 1e-6);
    }

    let csv_path = dir.path().join("features.csv");
    table.write_csv(&csv_path).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(text.lines().count(), table.len() + 1);
    assert!(text.starts_with("X,Y,LST,NDVI,NDBI,NDWI,Albedo,DistCoast,TourismExposure,Elevation,Month"));
}

#[test]
fn cropped_scene_keeps_alignment() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path());
    let paths = ScenePaths::discover(dir.path()).unwrap();

    let bbox = BoundingBox::new(ORIGIN_X + 60.0, ORIGIN_Y - 300.0, ORIGIN_X + 360.0, ORIGIN_Y - 60.0);
    let bands = load(&paths, Some(&bbox)).unwrap();
    assert_eq!(bands.template().shape(), (8, 10));
    assert_eq!(bands.get(BandId::B10).unwrap().cell(0, 0), Some(band_value(BandId::B10, 2, 2)));

    let out = ScenePipeline::new(params()).run(&bands).unwrap();
    assert_eq!(out.table.len(), 80);
    assert_eq!(out.table.columns().len(), 7);
}

#[test]
fn missing_thermal_band_names_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path());
    std::fs::remove_file(dir.path().join(format!("{}_B10.TIF", PRODUCT))).unwrap();

    let bands = load(&ScenePaths::discover(dir.path()).unwrap(), None).unwrap();
    match ScenePipeline::new(params()).run(&bands) {
        Err(Error::Stage { stage, source }) => {
            assert_eq!(stage, "lst chain");
            assert!(matches!(*source, Error::MissingBand(ref b) if b == "B10"));
        }
        other => panic!("expected a stage error, got {:?}", other.map(|o| o.table.len())),
    }
}

#[test]
fn bbox_outside_scene_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path());
    let paths = ScenePaths::discover(dir.path()).unwrap();
    let bbox = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
    assert!(matches!(load(&paths, Some(&bbox)), Err(Error::OutOfBounds { .. })));
}
