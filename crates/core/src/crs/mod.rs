//! Coordinate Reference System handling

mod reproject;

pub use reproject::{Projection, Reprojector};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation.
///
/// Serialized as its identifier string (`"EPSG:32644"`), so lease and polygon
/// files can carry a plain `"crs"` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation for CRSs without an EPSG code
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// Parse an identifier such as `EPSG:4326`, `epsg:32644`, `4326` or an
    /// OGC URN. Anything else is kept as WKT.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::UnsupportedCrs("empty CRS identifier".into()));
        }

        let upper = trimmed.to_ascii_uppercase();
        let code = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
            .unwrap_or(&upper);

        if let Ok(epsg) = code.parse::<u32>() {
            return Ok(Self::from_epsg(epsg));
        }
        if code.chars().all(|c| c.is_ascii_digit() || c == ':') {
            return Err(Error::UnsupportedCrs(trimmed.to_string()));
        }
        Ok(Self::from_wkt(trimmed))
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees.
    ///
    /// Only EPSG:4326 (and a WKT starting with `GEOGCS`/`GEOGCRS`) count as
    /// geographic.
    pub fn is_geographic(&self) -> bool {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => code == 4326,
            (None, Some(wkt)) => {
                let head = wkt.trim_start().to_ascii_uppercase();
                head.starts_with("GEOGCS") || head.starts_with("GEOGCRS")
            }
            (None, None) => false,
        }
    }

    /// The projection this CRS maps to, if supported by the built-in
    /// reprojector.
    pub fn projection(&self) -> Result<Projection> {
        self.epsg
            .and_then(Projection::from_epsg)
            .ok_or_else(|| Error::UnsupportedCrs(self.identifier()))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual WKT comparison; imperfect but enough for files written by one tool.
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a.trim() == b.trim();
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => format!("EPSG:{}", code),
            (None, Some(wkt)) => wkt.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.epsg, &self.wkt) {
            (None, Some(wkt)) => write!(f, "WKT:{}", &wkt[..wkt.len().min(50)]),
            _ => write!(f, "{}", self.identifier()),
        }
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl TryFrom<String> for CRS {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CRS> for String {
    fn from(crs: CRS) -> Self {
        crs.identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
        assert!(!CRS::web_mercator().is_geographic());
    }

    #[test]
    fn test_crs_parse() {
        assert_eq!(CRS::parse("EPSG:32644").unwrap(), CRS::from_epsg(32644));
        assert_eq!(CRS::parse("epsg:3857").unwrap(), CRS::web_mercator());
        assert_eq!(CRS::parse(" 4326 ").unwrap(), CRS::wgs84());
        assert_eq!(
            CRS::parse("urn:ogc:def:crs:EPSG::4326").unwrap(),
            CRS::wgs84()
        );
        assert!(CRS::parse("").is_err());

        let wkt = CRS::parse("GEOGCS[\"WGS 84\"]").unwrap();
        assert_eq!(wkt.epsg(), None);
        assert!(wkt.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_wkt("GEOGCS[\"WGS 84\"]")));
    }

    #[test]
    fn test_unsupported_projection() {
        assert!(CRS::from_epsg(32644).projection().is_ok());
        assert!(matches!(
            CRS::from_epsg(27700).projection(),
            Err(Error::UnsupportedCrs(_))
        ));
    }
}
