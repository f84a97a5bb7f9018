//! Stratified random selection and materialisation of the chosen tiles.
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::Result;
use crate::quota::QuotaPlan;
use crate::store::{IndexEntry, TileIndex, TileStore};
use crate::strata::{LabeledTile, StratumLabel, STRATUM_COUNT};
use crate::tiling::TileId;

/// Anything that can be drawn by the selector.
pub trait Stratified {
    fn tile_id(&self) -> &TileId;
    fn stratum(&self) -> StratumLabel;
}

impl Stratified for LabeledTile {
    fn tile_id(&self) -> &TileId {
        &self.id
    }

    fn stratum(&self) -> StratumLabel {
        self.label
    }
}

impl Stratified for IndexEntry {
    fn tile_id(&self) -> &TileId {
        &self.tile.id
    }

    fn stratum(&self) -> StratumLabel {
        self.tile.label
    }
}

/// Draw up to `plan.quota(s)` tiles from every stratum `s`.
///
/// The pool is put in identifier order, shuffled once and scanned once; each
/// tile joins its stratum's bucket while the bucket is below quota. Buckets
/// are returned concatenated in canonical stratum order. A fixed `seed` makes
/// the draw reproducible regardless of the order `pool` arrives in.
pub fn select_samples<T>(plan: &QuotaPlan, pool: &[T], seed: Option<u64>) -> Vec<T>
where
    T: Stratified + Clone,
{
    let mut order: Vec<&T> = pool.iter().collect();
    order.sort_by(|a, b| a.tile_id().cmp(b.tile_id()));

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    order.shuffle(&mut rng);

    let mut buckets: [Vec<&T>; STRATUM_COUNT] = Default::default();
    for item in order {
        let s = item.stratum();
        let bucket = &mut buckets[s.index()];
        if (bucket.len() as u64) < plan.quota(s) {
            bucket.push(item);
        }
    }

    for (s, bucket) in buckets.iter().enumerate() {
        let quota = plan.quotas[s];
        if (bucket.len() as u64) < quota {
            tracing::warn!(
                stratum = %StratumLabel::from_index(s),
                quota,
                drawn = bucket.len(),
                "stratum under-filled"
            );
        }
    }

    buckets.into_iter().flatten().cloned().collect()
}

/// Copy every chosen tile from `source_dir` into `dest_dir` and write the
/// destination's sidecar index.
///
/// `progress(done, total)` is called after each copy. The first failed copy
/// aborts the run; tiles already copied are left in place.
pub fn materialize<S, F>(
    store: &mut S,
    chosen: &[IndexEntry],
    source_dir: &Path,
    dest_dir: &Path,
    mut progress: F,
) -> Result<TileIndex>
where
    S: TileStore + ?Sized,
    F: FnMut(usize, usize),
{
    let total = chosen.len();
    let mut copied: Vec<PathBuf> = Vec::with_capacity(total);
    for (i, entry) in chosen.iter().enumerate() {
        let from = source_dir.join(&entry.file_name);
        copied.push(store.copy(&from, dest_dir)?);
        progress(i + 1, total);
    }

    let index = TileIndex::new(chosen.to_vec());
    store.write_index(dest_dir, &index)?;
    tracing::info!(tiles = copied.len(), dest = %dest_dir.display(), "samples materialised");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::StrataCensus;
    use crate::error::StrataError;
    use crate::quota::plan_quotas;
    use crate::raster::{GeoTransform, PixelType, Raster};
    use crate::store::MemoryTileStore;

    /// `counts[s]` tiles in stratum `s`, ids numbered row-major.
    fn pool(counts: [usize; STRATUM_COUNT]) -> Vec<LabeledTile> {
        let mut out = Vec::new();
        let mut row = 0;
        for (s, &n) in counts.iter().enumerate() {
            for _ in 0..n {
                out.push(LabeledTile {
                    id: TileId::new("sample", row, 0),
                    target_level: 0.0,
                    edge_level: 0.0,
                    label: StratumLabel::from_index(s),
                });
                row += 1;
            }
        }
        out
    }

    fn populations(tiles: &[LabeledTile]) -> [u64; STRATUM_COUNT] {
        StrataCensus::from_labels(tiles.iter().map(|t| t.label)).flatten()
    }

    #[test]
    fn selection_census_matches_plan() {
        let tiles = pool([5, 5, 5, 5, 5, 5, 5, 5, 1000]);
        let plan = plan_quotas(&populations(&tiles), 0.03).unwrap();
        let chosen = select_samples(&plan, &tiles, Some(7));
        assert_eq!(chosen.len(), 36);
        assert_eq!(populations(&chosen), plan.quotas);
    }

    #[test]
    fn output_is_grouped_in_canonical_order() {
        let tiles = pool([3, 3, 3, 3, 3, 3, 3, 3, 3]);
        let plan = plan_quotas(&populations(&tiles), 0.5).unwrap();
        let chosen = select_samples(&plan, &tiles, Some(1));
        let idx: Vec<usize> = chosen.iter().map(|t| t.label.index()).collect();
        let mut sorted = idx.clone();
        sorted.sort();
        assert_eq!(idx, sorted);
    }

    #[test]
    fn fixed_seed_is_reproducible_and_order_independent() {
        let tiles = pool([10, 20, 30, 40, 50, 60, 70, 80, 90]);
        let plan = plan_quotas(&populations(&tiles), 0.1).unwrap();
        let a = select_samples(&plan, &tiles, Some(42));
        let mut reversed = tiles.clone();
        reversed.reverse();
        let b = select_samples(&plan, &reversed, Some(42));
        assert_eq!(a, b);

        let c = select_samples(&plan, &tiles, Some(43));
        assert_eq!(populations(&a), populations(&c));
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let plan = plan_quotas(&[0; STRATUM_COUNT], 0.5).unwrap();
        assert!(select_samples::<LabeledTile>(&plan, &[], None).is_empty());
    }

    fn entries(n: usize) -> Vec<IndexEntry> {
        pool([n, 0, 0, 0, 0, 0, 0, 0, 0])
            .into_iter()
            .map(|tile| IndexEntry {
                file_name: tile.file_name(),
                tile,
            })
            .collect()
    }

    #[test]
    fn materialize_copies_and_indexes() {
        let mut store = MemoryTileStore::new();
        let chosen = entries(3);
        let r = Raster::new(1, 2, 2, PixelType::U8, GeoTransform::identity(), 1.0);
        for e in &chosen {
            let loc = store.write(Path::new("pool"), &e.tile.id, &r).unwrap();
            store.rename(&loc, &e.file_name).unwrap();
        }

        let mut ticks = Vec::new();
        let index = materialize(&mut store, &chosen, Path::new("pool"), Path::new("out"), |d, t| {
            ticks.push((d, t))
        })
        .unwrap();

        assert_eq!(ticks, [(1, 3), (2, 3), (3, 3)]);
        assert_eq!(store.list(Path::new("out")).unwrap().len(), 3);
        assert_eq!(store.read_index(Path::new("out")).unwrap(), Some(index.clone()));
        assert_eq!(index.census().total(), 3);
    }

    #[test]
    fn materialize_fails_fast_on_missing_tile() {
        let mut store = MemoryTileStore::new();
        let chosen = entries(2);
        let r = Raster::new(1, 2, 2, PixelType::U8, GeoTransform::identity(), 1.0);
        // Only the second tile exists.
        let loc = store.write(Path::new("pool"), &chosen[1].tile.id, &r).unwrap();
        store.rename(&loc, &chosen[1].file_name).unwrap();

        let mut calls = 0;
        let err = materialize(&mut store, &chosen, Path::new("pool"), Path::new("out"), |_, _| calls += 1)
            .unwrap_err();
        assert!(matches!(err, StrataError::CopyFailure { .. }));
        assert_eq!(calls, 0);
        assert!(store.read_index(Path::new("out")).unwrap().is_none());
    }
}
