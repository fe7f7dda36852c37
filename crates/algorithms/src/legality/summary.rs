//! Compliance statistics over classification records

use minewatch_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};

use super::classifier::{ClassificationRecord, ClassificationRecordSet, ClassificationStatus, Severity};

/// Counts and areas per status, recomputable from the records at any time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_polygons: usize,
    pub legal_count: usize,
    pub illegal_count: usize,
    pub mixed_count: usize,
    pub error_count: usize,
    pub total_area_ha: f64,
    pub legal_area_ha: f64,
    /// Outside area summed over mixed and illegal records
    pub illegal_area_ha: f64,
    pub compliance_rate_percent: f64,
    pub violation_rate_percent: f64,
    pub average_confidence: f64,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
}

impl SummaryStatistics {
    pub fn from_records(records: &[ClassificationRecord]) -> Self {
        let mut s = Self {
            total_polygons: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return s;
        }

        let mut confidence_sum = 0.0;
        for r in records {
            s.total_area_ha += r.total_area_ha;
            confidence_sum += r.confidence;

            match r.status {
                ClassificationStatus::Legal => {
                    s.legal_count += 1;
                    s.legal_area_ha += r.total_area_ha;
                }
                ClassificationStatus::Mixed => {
                    s.mixed_count += 1;
                    s.illegal_area_ha += r.illegal_area_ha;
                }
                ClassificationStatus::Illegal => {
                    s.illegal_count += 1;
                    s.illegal_area_ha += r.illegal_area_ha;
                }
                ClassificationStatus::Error => s.error_count += 1,
            }

            match r.severity {
                Severity::Critical => s.critical_count += 1,
                Severity::High => s.high_count += 1,
                Severity::Medium => s.medium_count += 1,
                Severity::Low => s.low_count += 1,
                Severity::None => {}
            }
        }

        if s.total_area_ha > 0.0 {
            s.compliance_rate_percent = s.legal_area_ha / s.total_area_ha * 100.0;
            s.violation_rate_percent = s.illegal_area_ha / s.total_area_ha * 100.0;
        }
        s.average_confidence = confidence_sum / records.len() as f64;
        s
    }

    /// Mixed plus illegal
    pub fn violation_count(&self) -> usize {
        self.mixed_count + self.illegal_count
    }
}

/// Aggregation stage
#[derive(Debug, Clone, Default)]
pub struct SummaryAggregator;

impl Algorithm for SummaryAggregator {
    type Input = ClassificationRecordSet;
    type Output = SummaryStatistics;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "SummaryAggregator"
    }

    fn description(&self) -> &'static str {
        "Compliance and violation statistics over classification records"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        Ok(SummaryStatistics::from_records(&input.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;
    use minewatch_core::CRS;

    fn record(
        id: &str,
        status: ClassificationStatus,
        total: f64,
        outside: f64,
        confidence: f64,
    ) -> ClassificationRecord {
        let overlap = if total > 0.0 { (total - outside) / total * 100.0 } else { 0.0 };
        ClassificationRecord {
            polygon_id: id.to_string(),
            geometry: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
            total_area_ha: total,
            inside_area_ha: total - outside,
            outside_area_ha: outside,
            overlap_percentage: overlap,
            status,
            confidence,
            overlapping_leases: Vec::new(),
            illegal_area_ha: if status.is_violation() { outside } else { 0.0 },
            severity: Severity::assess(status, overlap),
            error: None,
        }
    }

    #[test]
    fn test_summary_partition() {
        use ClassificationStatus::*;
        let records = vec![
            record("a", Legal, 4.0, 0.0, 0.9),
            record("b", Mixed, 10.0, 1.5, 0.85),
            record("c", Illegal, 5.0, 5.0, 0.432),
            record("d", Error, 0.0, 0.0, 0.0),
        ];
        let s = SummaryStatistics::from_records(&records);

        assert_eq!(s.total_polygons, 4);
        assert_eq!((s.legal_count, s.mixed_count, s.illegal_count, s.error_count), (1, 1, 1, 1));
        assert_relative_eq!(s.total_area_ha, 19.0);
        assert_relative_eq!(s.legal_area_ha, 4.0);
        assert_relative_eq!(s.illegal_area_ha, 6.5);
        assert_relative_eq!(s.compliance_rate_percent, 4.0 / 19.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(s.violation_rate_percent, 6.5 / 19.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(s.average_confidence, (0.9 + 0.85 + 0.432) / 4.0, epsilon = 1e-12);
        assert_eq!((s.critical_count, s.low_count), (1, 1));
        assert_eq!(s.violation_count(), 2);
    }

    #[test]
    fn test_empty_is_all_zero() {
        let s = SummaryAggregator
            .execute_default(ClassificationRecordSet::empty(CRS::wgs84()))
            .unwrap();
        assert_eq!(s, SummaryStatistics::default());
    }

    #[test]
    fn test_zero_area_rates() {
        let records = vec![record("d", ClassificationStatus::Error, 0.0, 0.0, 0.0)];
        let s = SummaryStatistics::from_records(&records);
        assert_eq!(s.compliance_rate_percent, 0.0);
        assert_eq!(s.violation_rate_percent, 0.0);
    }
}
