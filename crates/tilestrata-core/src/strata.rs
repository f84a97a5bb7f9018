//! Difficulty strata: quantile-based binning of tile scores into a 3×3 grid.
//!
//! Classification is a strict second pass: thresholds come from quantiles of
//! the *whole* score list, so [`StrataClassifier::fit`] must see every score
//! before any tile can be labelled.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::score::TileScore;
use crate::stats::quantile;
use crate::tiling::TileId;

pub const STRATUM_COUNT: usize = 9;

/// `(target_bin, edge_bin)`, both in 1..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawLabel")]
pub struct StratumLabel {
    pub target_bin: u8,
    pub edge_bin: u8,
}

/// Unchecked wire form; bins are range-checked on the way in.
#[derive(Deserialize)]
struct RawLabel {
    target_bin: u8,
    edge_bin: u8,
}

impl TryFrom<RawLabel> for StratumLabel {
    type Error = StrataError;

    fn try_from(raw: RawLabel) -> Result<Self> {
        Self::new(raw.target_bin, raw.edge_bin).ok_or(StrataError::LabelRange {
            target_bin: raw.target_bin,
            edge_bin: raw.edge_bin,
        })
    }
}

impl StratumLabel {
    pub fn new(target_bin: u8, edge_bin: u8) -> Option<Self> {
        if (1..=3).contains(&target_bin) && (1..=3).contains(&edge_bin) {
            Some(Self { target_bin, edge_bin })
        } else {
            None
        }
    }

    /// Canonical stratum index: t1e1 = 0, t1e2 = 1, … t3e3 = 8.
    #[inline]
    pub fn index(self) -> usize {
        (self.target_bin as usize - 1) * 3 + (self.edge_bin as usize - 1)
    }

    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < STRATUM_COUNT);
        Self {
            target_bin: (index / 3) as u8 + 1,
            edge_bin: (index % 3) as u8 + 1,
        }
    }

    /// All strata in canonical order.
    pub fn all() -> impl Iterator<Item = StratumLabel> {
        (0..STRATUM_COUNT).map(Self::from_index)
    }

    /// `t{target}e{edge}`, the tag appended to labelled tile names.
    pub fn tag(self) -> String {
        format!("t{}e{}", self.target_bin, self.edge_bin)
    }

    /// Parse the stratum tag embedded in a tile file name.
    ///
    /// The tag is the last `_`-separated segment of the stem and must read
    /// `t<digits>e<digits>` with both bins in 1..=3:
    ///   "sample_h003w010_t2e3.tif" → t2e3
    ///   "sample_h003w010.tif"      → NamingConvention error
    pub fn parse_name(name: &str) -> Result<Self> {
        let err = || StrataError::NamingConvention {
            name: name.to_string(),
        };
        let stem = name.strip_suffix(".tif").unwrap_or(name);
        let tag = stem.rsplit('_').next().ok_or_else(err)?;
        let rest = tag.strip_prefix('t').ok_or_else(err)?;
        let (t, e) = rest.split_once('e').ok_or_else(err)?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(t) || !digits(e) {
            return Err(err());
        }
        let t: u8 = t.parse().map_err(|_| err())?;
        let e: u8 = e.parse().map_err(|_| err())?;
        Self::new(t, e).ok_or_else(err)
    }
}

impl fmt::Display for StratumLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}e{}", self.target_bin, self.edge_bin)
    }
}

/// A scored tile with its stratum attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTile {
    pub id: TileId,
    pub target_level: f64,
    pub edge_level: f64,
    pub label: StratumLabel,
}

impl LabeledTile {
    /// `<prefix>_h{row:03}w{col:03}_t{t}e{e}.tif`
    pub fn file_name(&self) -> String {
        format!("{}_{}.tif", self.id.stem(), self.label.tag())
    }
}

/// Quantile bounds of the central score range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileRange {
    pub low: f64,
    pub high: f64,
}

impl Default for QuantileRange {
    fn default() -> Self {
        Self {
            low: 0.05,
            high: 0.95,
        }
    }
}

/// Bin edges `(l1, l2)` on one axis: `[min, max]` split into thirds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisThresholds {
    pub l1: f64,
    pub l2: f64,
}

impl AxisThresholds {
    fn from_range(min: f64, max: f64) -> Self {
        let step = (max - min) / 3.0;
        Self {
            l1: min + step,
            l2: min + 2.0 * step,
        }
    }
}

/// Fitted global thresholds for both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrataClassifier {
    pub target: AxisThresholds,
    pub edge: AxisThresholds,
}

impl StrataClassifier {
    /// Derive thresholds from the complete score list.
    pub fn fit(scores: &[TileScore], range: QuantileRange) -> Result<Self> {
        if scores.is_empty() {
            return Err(StrataError::EmptyScores);
        }
        let t_min = quantile(scores.iter().map(|s| s.target_level), range.low);
        let t_max = quantile(scores.iter().map(|s| s.target_level), range.high);
        let e_min = quantile(scores.iter().map(|s| s.edge_level), range.low);
        let e_max = quantile(scores.iter().map(|s| s.edge_level), range.high);
        let fitted = Self {
            target: AxisThresholds::from_range(t_min, t_max),
            edge: AxisThresholds::from_range(e_min, e_max),
        };
        tracing::info!(
            t_l1 = fitted.target.l1,
            t_l2 = fitted.target.l2,
            e_l1 = fitted.edge.l1,
            e_l2 = fitted.edge.l2,
            "strata thresholds"
        );
        Ok(fitted)
    }

    /// Target bin: `[0, l1)` → 1, `[l1, l2)` → 2, `[l2, ∞)` → 3. The bottom
    /// bin starts at 0 regardless of the fitted minimum.
    pub fn target_bin(&self, t: f64) -> Option<u8> {
        let AxisThresholds { l1, l2 } = self.target;
        if (0.0..l1).contains(&t) {
            Some(1)
        } else if l1 <= t && t < l2 {
            Some(2)
        } else if t >= l2 {
            Some(3)
        } else {
            None
        }
    }

    /// Edge bin: `(−∞, l1)` → 1, `[l1, l2)` → 2, `[l2, ∞)` → 3.
    pub fn edge_bin(&self, e: f64) -> Option<u8> {
        let AxisThresholds { l1, l2 } = self.edge;
        if e < l1 {
            Some(1)
        } else if l1 <= e && e < l2 {
            Some(2)
        } else if e >= l2 {
            Some(3)
        } else {
            None
        }
    }

    pub fn classify(&self, score: &TileScore) -> Result<LabeledTile> {
        let target_bin = self.target_bin(score.target_level).ok_or_else(|| StrataError::LevelRange {
            axis: "target",
            id: score.id.stem(),
            value: score.target_level,
        })?;
        let edge_bin = self.edge_bin(score.edge_level).ok_or_else(|| StrataError::LevelRange {
            axis: "edge",
            id: score.id.stem(),
            value: score.edge_level,
        })?;
        Ok(LabeledTile {
            id: score.id.clone(),
            target_level: score.target_level,
            edge_level: score.edge_level,
            label: StratumLabel { target_bin, edge_bin },
        })
    }

    pub fn classify_all(&self, scores: &[TileScore]) -> Result<Vec<LabeledTile>> {
        scores.iter().map(|s| self.classify(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn score(i: usize, t: f64, e: f64) -> TileScore {
        TileScore {
            id: TileId::new("sample", i, 0),
            target_level: t,
            edge_level: e,
        }
    }

    #[test]
    fn index_follows_canonical_order() {
        let tags: Vec<String> = StratumLabel::all().map(|l| l.tag()).collect();
        assert_eq!(tags, ["t1e1", "t1e2", "t1e3", "t2e1", "t2e2", "t2e3", "t3e1", "t3e2", "t3e3"]);
        for (i, l) in StratumLabel::all().enumerate() {
            assert_eq!(l.index(), i);
        }
    }

    #[test]
    fn parse_name_reads_trailing_tag() {
        let l = StratumLabel::parse_name("sample_h003w010_t2e3.tif").unwrap();
        assert_eq!(l, StratumLabel::new(2, 3).unwrap());
        // A prefix containing 't' or 'e' must not confuse the parser.
        let l = StratumLabel::parse_name("test_tile_h000w001_t1e1.tif").unwrap();
        assert_eq!(l.index(), 0);
    }

    #[test]
    fn parse_name_rejects_untagged_name() {
        let err = StratumLabel::parse_name("sample_h003w010.tif").unwrap_err();
        assert!(matches!(err, StrataError::NamingConvention { .. }));
    }

    #[test]
    fn deserialize_rejects_out_of_range_bins() {
        let ok: StratumLabel = serde_json::from_str(r#"{"target_bin":3,"edge_bin":1}"#).unwrap();
        assert_eq!(ok.index(), 6);
        for bad in [r#"{"target_bin":4,"edge_bin":1}"#, r#"{"target_bin":1,"edge_bin":0}"#] {
            let err = serde_json::from_str::<StratumLabel>(bad).unwrap_err();
            assert!(err.to_string().contains("outside"), "{err}");
        }
    }

    #[test]
    fn parse_name_rejects_out_of_range_bins() {
        assert!(StratumLabel::parse_name("s_h000w000_t4e1.tif").is_err());
        assert!(StratumLabel::parse_name("s_h000w000_t1e0.tif").is_err());
        assert!(StratumLabel::parse_name("s_h000w000_tXe1.tif").is_err());
    }

    #[test]
    fn labeled_file_name_appends_tag() {
        let lt = LabeledTile {
            id: TileId::new("sample", 3, 10),
            target_level: 0.2,
            edge_level: 0.4,
            label: StratumLabel::new(1, 2).unwrap(),
        };
        assert_eq!(lt.file_name(), "sample_h003w010_t1e2.tif");
        assert_eq!(StratumLabel::parse_name(&lt.file_name()).unwrap(), lt.label);
    }

    #[test]
    fn fit_requires_scores() {
        assert!(matches!(
            StrataClassifier::fit(&[], QuantileRange::default()),
            Err(StrataError::EmptyScores)
        ));
    }

    #[test]
    fn fit_splits_range_into_thirds() {
        let scores: Vec<TileScore> = (0..=100).map(|i| score(i, i as f64 / 100.0, i as f64)).collect();
        let c = StrataClassifier::fit(&scores, QuantileRange::default()).unwrap();
        // q05 = 0.05, q95 = 0.95 → step 0.3
        assert!((c.target.l1 - 0.35).abs() < 1e-9);
        assert!((c.target.l2 - 0.65).abs() < 1e-9);
        assert!((c.edge.l1 - 35.0).abs() < 1e-9);
        assert!((c.edge.l2 - 65.0).abs() < 1e-9);
    }

    #[test]
    fn bins_are_left_closed() {
        let c = StrataClassifier {
            target: AxisThresholds { l1: 0.3, l2: 0.6 },
            edge: AxisThresholds { l1: 1.0, l2: 2.0 },
        };
        assert_eq!(c.target_bin(0.0), Some(1));
        assert_eq!(c.target_bin(0.3), Some(2));
        assert_eq!(c.target_bin(0.6), Some(3));
        assert_eq!(c.target_bin(5.0), Some(3));
        assert_eq!(c.target_bin(-0.1), None);
        assert_eq!(c.edge_bin(0.0), Some(1));
        assert_eq!(c.edge_bin(1.0), Some(2));
        assert_eq!(c.edge_bin(2.0), Some(3));
        assert_eq!(c.edge_bin(f64::NAN), None);
    }

    #[test]
    fn classify_reports_level_range() {
        let c = StrataClassifier {
            target: AxisThresholds { l1: 0.3, l2: 0.6 },
            edge: AxisThresholds { l1: 1.0, l2: 2.0 },
        };
        let err = c.classify(&score(0, -1.0, 0.5)).unwrap_err();
        assert!(matches!(err, StrataError::LevelRange { axis: "target", .. }));
    }

    #[test]
    fn degenerate_range_still_labels_every_tile() {
        // All tiles identical: thresholds collapse onto the common value.
        let scores: Vec<TileScore> = (0..10).map(|i| score(i, 0.5, 1.0)).collect();
        let c = StrataClassifier::fit(&scores, QuantileRange::default()).unwrap();
        let labels = c.classify_all(&scores).unwrap();
        assert!(labels.iter().all(|l| l.label == StratumLabel::new(3, 3).unwrap()));
    }

    proptest! {
        #[test]
        fn target_bins_partition_non_negative_axis(
            mut levels in proptest::collection::vec(0.0f64..1.0, 1..64),
            level in 0.0f64..10.0,
        ) {
            levels.push(0.0);
            let scores: Vec<TileScore> = levels.iter().enumerate().map(|(i, &t)| score(i, t, t)).collect();
            let c = StrataClassifier::fit(&scores, QuantileRange::default()).unwrap();

            let bin = c.target_bin(level);
            prop_assert!(bin.is_some());
            let expected = if level < c.target.l1 { 1 } else if level < c.target.l2 { 2 } else { 3 };
            prop_assert_eq!(bin, Some(expected));
            prop_assert!(c.edge_bin(level).is_some());
        }

        #[test]
        fn zero_target_always_lands_in_first_bin(
            levels in proptest::collection::vec(0.001f64..1.0, 1..64),
        ) {
            let mut scores: Vec<TileScore> = levels.iter().enumerate().map(|(i, &t)| score(i, t, 0.0)).collect();
            scores.push(score(999, 0.0, 0.0));
            let c = StrataClassifier::fit(&scores, QuantileRange::default()).unwrap();
            let lt = c.classify(scores.last().unwrap()).unwrap();
            prop_assert_eq!(lt.label.target_bin, 1);
        }
    }
}
