//! Lease boundaries
//!
//! Field names accept the common column spellings found in government lease
//! exports (`ML_NO`, `area_ha`, `start_date`, ...). [`LeaseBoundarySet::standardize`]
//! fills whatever is still missing.

use crate::vector::{area, is_valid_polygon, M2_PER_HECTARE};
use chrono::NaiveDate;
use geo::Polygon;
use minewatch_core::{Error, Result, Reprojector, CRS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const UNKNOWN: &str = "Unknown";

fn default_valid_from() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2020, 1, 1)
}

fn default_valid_to() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2030, 12, 31)
}

/// One legally granted mining lease
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseBoundary {
    #[serde(default, alias = "id", alias = "lease_no", alias = "lease_number", alias = "ML_NO")]
    pub lease_id: String,
    #[serde(
        default,
        alias = "name",
        alias = "mine_name",
        alias = "lease_title",
        alias = "ML_NAME"
    )]
    pub lease_name: String,
    #[serde(default, alias = "state_name", alias = "STATE", alias = "STATE_NAME")]
    pub state: String,
    #[serde(default, alias = "district_name", alias = "DISTRICT", alias = "DISTRICT_NAME")]
    pub district: String,
    #[serde(default, alias = "mineral_type", alias = "MINERAL", alias = "MINERAL_TYPE")]
    pub mineral: String,
    /// Granted area; zero or negative means unknown
    #[serde(default, alias = "area_ha", alias = "area", alias = "AREA_HA", alias = "AREA")]
    pub area_hectares: f64,
    #[serde(default, alias = "from_date", alias = "start_date", alias = "VALID_FROM")]
    pub valid_from: Option<NaiveDate>,
    #[serde(default, alias = "to_date", alias = "end_date", alias = "VALID_TO")]
    pub valid_to: Option<NaiveDate>,
    pub geometry: Polygon<f64>,
}

impl LeaseBoundary {
    /// Lease with only an id and a geometry; other fields are left for
    /// [`LeaseBoundarySet::standardize`].
    pub fn new(lease_id: impl Into<String>, geometry: Polygon<f64>) -> Self {
        Self {
            lease_id: lease_id.into(),
            lease_name: String::new(),
            state: String::new(),
            district: String::new(),
            mineral: String::new(),
            area_hectares: 0.0,
            valid_from: None,
            valid_to: None,
            geometry,
        }
    }
}

/// Leases sharing one CRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseBoundarySet {
    pub crs: CRS,
    pub leases: Vec<LeaseBoundary>,
}

impl LeaseBoundarySet {
    pub fn new(crs: CRS, leases: Vec<LeaseBoundary>) -> Self {
        Self { crs, leases }
    }

    pub fn empty(crs: CRS) -> Self {
        Self::new(crs, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LeaseBoundary> {
        self.leases.iter()
    }

    /// Fill missing attributes.
    ///
    /// - `lease_id` → `lease_<n>` (1-based position)
    /// - `lease_name` → `lease_id`
    /// - `state`, `district`, `mineral` → `"Unknown"`
    /// - validity → 2020-01-01 .. 2030-12-31
    /// - `area_hectares` ≤ 0 → geometry area measured in `area_crs`
    ///
    /// Fails only when an area has to be computed and `area_crs` or the set's
    /// CRS is unsupported.
    pub fn standardize(mut self, area_crs: &CRS) -> Result<Self> {
        let needs_area = self.leases.iter().any(|l| l.area_hectares <= 0.0);
        let reprojector = if needs_area {
            Some(Reprojector::new(&self.crs, area_crs)?)
        } else {
            None
        };

        for (i, lease) in self.leases.iter_mut().enumerate() {
            if lease.lease_id.trim().is_empty() {
                lease.lease_id = format!("lease_{}", i + 1);
            }
            if lease.lease_name.trim().is_empty() {
                lease.lease_name = lease.lease_id.clone();
            }
            for field in [&mut lease.state, &mut lease.district, &mut lease.mineral] {
                if field.trim().is_empty() {
                    *field = UNKNOWN.to_string();
                }
            }
            lease.valid_from = lease.valid_from.or_else(default_valid_from);
            lease.valid_to = lease.valid_to.or_else(default_valid_to);

            if lease.area_hectares > 0.0 {
                continue;
            }
            if let Some(reprojector) = &reprojector {
                lease.area_hectares = match reprojector.transform_polygon(&lease.geometry) {
                    Ok(projected) => area(&projected) / M2_PER_HECTARE,
                    Err(e) => {
                        warn!(lease_id = %lease.lease_id, error = %e, "cannot measure lease area");
                        0.0
                    }
                };
            }
        }
        debug!(leases = self.leases.len(), "standardized lease attributes");
        Ok(self)
    }

    /// Remove leases whose geometry is degenerate or non-finite.
    ///
    /// Returns the number removed.
    pub fn drop_invalid(&mut self) -> usize {
        let before = self.leases.len();
        self.leases.retain(|l| is_valid_polygon(&l.geometry));
        let removed = before - self.leases.len();
        if removed > 0 {
            warn!(removed, "dropped leases with invalid geometry");
        }
        removed
    }

    /// Leases in `state`
    pub fn filter_by_state(&self, state: &str) -> Self {
        self.filtered(|l| l.state == state)
    }

    /// Leases for `mineral`
    pub fn filter_by_mineral(&self, mineral: &str) -> Self {
        self.filtered(|l| l.mineral == mineral)
    }

    fn filtered(&self, keep: impl Fn(&LeaseBoundary) -> bool) -> Self {
        Self::new(
            self.crs.clone(),
            self.leases.iter().filter(|l| keep(l)).cloned().collect(),
        )
    }

    /// Counts and granted areas grouped by state and mineral
    pub fn summary(&self) -> LeaseSummary {
        let mut summary = LeaseSummary {
            total_leases: self.leases.len(),
            ..Default::default()
        };
        let mut states = BTreeSet::new();
        let mut minerals = BTreeSet::new();

        for lease in &self.leases {
            summary.total_area_hectares += lease.area_hectares;
            states.insert(lease.state.clone());
            minerals.insert(lease.mineral.clone());
            *summary.area_by_state.entry(lease.state.clone()).or_default() += lease.area_hectares;
            *summary
                .area_by_mineral
                .entry(lease.mineral.clone())
                .or_default() += lease.area_hectares;
        }
        summary.states = states.into_iter().collect();
        summary.minerals = minerals.into_iter().collect();
        summary
    }

    /// Check every lease geometry is usable, naming the first bad one
    pub fn validate(&self) -> Result<()> {
        match self.leases.iter().find(|l| !is_valid_polygon(&l.geometry)) {
            Some(lease) => Err(Error::Geometry(format!(
                "lease {} has an invalid geometry",
                lease.lease_id
            ))),
            None => Ok(()),
        }
    }
}

/// Overview of a lease set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LeaseSummary {
    pub total_leases: usize,
    pub total_area_hectares: f64,
    pub states: Vec<String>,
    pub minerals: Vec<String>,
    pub area_by_state: BTreeMap<String, f64>,
    pub area_by_mineral: BTreeMap<String, f64>,
}
