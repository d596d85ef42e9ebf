//! Landsat 8 band identifiers and co-registered band sets

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use heatisle_core::raster::Raster;
use heatisle_core::{Error, Result};

/// Landsat 8 OLI/TIRS bands used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BandId {
    /// Coastal aerosol
    B1,
    /// Blue
    B2,
    /// Green
    B3,
    /// Red
    B4,
    /// Near infrared
    B5,
    /// Shortwave infrared 1
    B6,
    /// Shortwave infrared 2
    B7,
    /// Thermal infrared 1
    B10,
}

impl BandId {
    pub const ALL: [BandId; 8] = [
        BandId::B1,
        BandId::B2,
        BandId::B3,
        BandId::B4,
        BandId::B5,
        BandId::B6,
        BandId::B7,
        BandId::B10,
    ];

    /// Landsat band number
    pub fn number(self) -> u8 {
        match self {
            BandId::B1 => 1,
            BandId::B2 => 2,
            BandId::B3 => 3,
            BandId::B4 => 4,
            BandId::B5 => 5,
            BandId::B6 => 6,
            BandId::B7 => 7,
            BandId::B10 => 10,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.number() == n)
    }
}

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.number())
    }
}

impl FromStr for BandId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches(['B', 'b']);
        digits
            .parse::<u8>()
            .ok()
            .and_then(BandId::from_number)
            .ok_or_else(|| Error::InvalidParameter {
                name: "band",
                value: s.to_string(),
                reason: "expected one of B1..B7, B10".into(),
            })
    }
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Acquisition metadata of one scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    pub scene_id: String,
    /// Acquisition date, `YYYY-MM-DD`
    pub acquired: Option<String>,
    /// Explicit label for the output `Month` column
    pub month: Option<String>,
}

impl SceneMeta {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            ..Default::default()
        }
    }

    /// The explicit month label, or the abbreviated month of the acquisition date
    pub fn month_label(&self) -> Option<String> {
        if let Some(month) = &self.month {
            return Some(month.clone());
        }
        let acquired = self.acquired.as_deref()?;
        let month: usize = acquired.split('-').nth(1)?.parse().ok()?;
        MONTHS.get(month.checked_sub(1)?).map(|m| m.to_string())
    }
}

/// Co-registered bands of one scene.
///
/// Every band shares the shape, transform and CRS of the others; the set is
/// never mutated after construction.
#[derive(Debug, Clone)]
pub struct BandSet {
    meta: SceneMeta,
    first: BandId,
    bands: BTreeMap<BandId, Raster<f64>>,
}

impl BandSet {
    /// Build a band set, checking that all bands are aligned.
    pub fn from_bands(meta: SceneMeta, bands: Vec<(BandId, Raster<f64>)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (id, raster) in bands {
            if let Some((first_id, first)) = map.iter().next() {
                let first: &Raster<f64> = first;
                if let Err(e) = first.ensure_aligned(&raster) {
                    warn!("band {} is not aligned with {}", id, first_id);
                    return Err(e);
                }
            }
            map.insert(id, raster);
        }
        let first = *map.keys().next().ok_or_else(|| Error::InvalidParameter {
            name: "bands",
            value: "[]".into(),
            reason: "a band set needs at least one band".into(),
        })?;
        Ok(Self {
            meta,
            first,
            bands: map,
        })
    }

    pub fn meta(&self) -> &SceneMeta {
        &self.meta
    }

    pub fn get(&self, id: BandId) -> Result<&Raster<f64>> {
        self.bands
            .get(&id)
            .ok_or_else(|| Error::MissingBand(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = BandId> + '_ {
        self.bands.keys().copied()
    }

    /// Grid that defines the shared cell layout
    pub fn template(&self) -> &Raster<f64> {
        &self.bands[&self.first]
    }

    /// New band set with `f` applied to every band
    pub fn map_bands<F>(&self, f: F) -> Result<BandSet>
    where
        F: Fn(&Raster<f64>) -> Result<Raster<f64>>,
    {
        let bands = self
            .bands
            .iter()
            .map(|(id, r)| Ok((*id, f(r)?)))
            .collect::<Result<Vec<_>>>()?;
        BandSet::from_bands(self.meta.clone(), bands)
    }
}
