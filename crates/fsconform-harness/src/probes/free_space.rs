//! Free-cluster accounting.

use fsconform_core::FreeSpace;

use super::{seed, Step};
use crate::context::ProbeContext;
use crate::probe::{check, Category, Probe, ProbeResult, ProbeResultExt};

const CLUSTERS_WRITTEN: u64 = 10;

pub fn probes() -> Vec<Probe> {
    vec![
        Probe::new("FreeSpaceBasic", Category::FreeSpace, free_space_basic),
        Probe::new("FreeSpaceDeletion", Category::FreeSpace, free_space_deletion),
        Probe::new("FreeSpaceGeometrySane", Category::FreeSpace, free_space_geometry_sane),
    ]
}

fn query(ctx: &ProbeContext<'_>) -> Step<FreeSpace> {
    ctx.oracle()
        .free_space(ctx.volume_root())
        .op("GetDiskFreeSpace")
}

/// Incompressible, non-zero content spanning `clusters` whole clusters.
fn payload(space: &FreeSpace, clusters: u64) -> Vec<u8> {
    let len = (space.cluster_size * clusters) as usize;
    (0..len)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 7) as u8 | 1)
        .collect()
}

fn free_space_basic(ctx: &ProbeContext<'_>) -> ProbeResult {
    let before = query(ctx)?;
    let path = ctx.path("filler.bin");
    seed(ctx, &path, &payload(&before, CLUSTERS_WRITTEN))?;

    let after = query(ctx)?;
    check(
        after.free_clusters < before.free_clusters,
        "free clusters after write",
        format!("fewer than {}", before.free_clusters),
        after.free_clusters,
    )?;
    Ok(format!(
        "cluster={} free {} -> {}",
        before.cluster_size, before.free_clusters, after.free_clusters
    ))
}

fn free_space_deletion(ctx: &ProbeContext<'_>) -> ProbeResult {
    let initial = query(ctx)?;
    let path = ctx.path("filler.bin");
    seed(ctx, &path, &payload(&initial, CLUSTERS_WRITTEN))?;
    let filled = query(ctx)?;

    ctx.oracle().delete_file(&path).setup("delete filler")?;
    let released = query(ctx)?;
    check(
        released.free_clusters > filled.free_clusters,
        "free clusters after delete",
        format!("more than {}", filled.free_clusters),
        released.free_clusters,
    )?;
    Ok(format!(
        "free {} -> {} -> {}",
        initial.free_clusters, filled.free_clusters, released.free_clusters
    ))
}

fn free_space_geometry_sane(ctx: &ProbeContext<'_>) -> ProbeResult {
    let space = query(ctx)?;
    check(space.total_clusters > 0, "total clusters", "non-zero", space.total_clusters)?;
    check(
        space.free_clusters <= space.total_clusters,
        "free clusters",
        format!("at most {}", space.total_clusters),
        space.free_clusters,
    )?;
    check(
        space.bytes_per_sector > 0 && space.cluster_size % space.bytes_per_sector == 0,
        "cluster size",
        format!("a multiple of {}", space.bytes_per_sector),
        space.cluster_size,
    )?;
    Ok(format!(
        "cluster={} sector={} total={}",
        space.cluster_size, space.bytes_per_sector, space.total_clusters
    ))
}
