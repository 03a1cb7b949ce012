//! Allocated size of sparse, compressed and dense files.

use fsconform_core::{Access, Disposition};

use super::seed;
use crate::context::ProbeContext;
use crate::probe::{check, check_bytes, Category, Probe, ProbeResult, ProbeResultExt};

const SPARSE_OFFSET: u64 = 1 << 20;

pub fn probes() -> Vec<Probe> {
    use Category::AllocationSize;
    vec![
        Probe::new("AllocationCompressedFile", AllocationSize, allocation_compressed_file),
        Probe::new("AllocationSparseFile", AllocationSize, allocation_sparse_file),
        Probe::new(
            "AllocationDenseFileCoversLength",
            AllocationSize,
            allocation_dense_file_covers_length,
        ),
        Probe::new(
            "AllocationSparseHoleReadsZero",
            AllocationSize,
            allocation_sparse_hole_reads_zero,
        ),
    ]
}

fn allocation_compressed_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("compressed.bin");
    let handle = ctx
        .open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .setup("create file")?;
    handle.set_compressed().op("enable compression")?;
    handle
        .write(Some(0), &vec![b'A'; 100 * 1024])
        .setup("write compressible data")?;
    handle.flush().setup("flush")?;
    handle.close().setup("close")?;

    let logical = ctx.oracle().size(&path).setup("size")?;
    let allocated = ctx.oracle().allocated_size(&path).op("GetCompressedFileSize")?;
    check(
        allocated < logical,
        "allocated size",
        format!("less than {logical}"),
        allocated,
    )?;
    Ok(format!("logical={logical} allocated={allocated}"))
}

fn allocation_sparse_file(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("sparse.bin");
    let handle = ctx
        .open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .setup("create file")?;
    handle.set_sparse().op("mark sparse")?;
    handle
        .write(Some(SPARSE_OFFSET), &[1])
        .setup("write past hole")?;
    handle.flush().setup("flush")?;
    handle.close().setup("close")?;

    let logical = ctx.oracle().size(&path).setup("size")?;
    check(
        logical == SPARSE_OFFSET + 1,
        "logical size",
        SPARSE_OFFSET + 1,
        logical,
    )?;
    let allocated = ctx.oracle().allocated_size(&path).op("GetCompressedFileSize")?;
    check(
        allocated < logical,
        "allocated size",
        format!("less than {logical}"),
        allocated,
    )?;
    Ok(format!("logical={logical} allocated={allocated}"))
}

fn allocation_dense_file_covers_length(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("dense.bin");
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8 + 1).collect();
    seed(ctx, &path, &data)?;

    let logical = ctx.oracle().size(&path).setup("size")?;
    let allocated = ctx.oracle().allocated_size(&path).op("GetCompressedFileSize")?;
    check(
        allocated >= logical,
        "allocated size",
        format!("at least {logical}"),
        allocated,
    )?;
    Ok(format!("logical={logical} allocated={allocated}"))
}

fn allocation_sparse_hole_reads_zero(ctx: &ProbeContext<'_>) -> ProbeResult {
    let path = ctx.path("sparse.bin");
    let handle = ctx
        .open(&path, Disposition::CreateNew, Access::READ_WRITE)
        .setup("create file")?;
    handle.set_sparse().op("mark sparse")?;
    handle
        .write(Some(SPARSE_OFFSET), b"Z")
        .setup("write past hole")?;

    let hole = handle.read(Some(4096), 8).op("ReadFile in hole")?;
    check_bytes("hole content", &[0; 8], &hole)?;
    let tail = handle.read(Some(SPARSE_OFFSET), 8).op("ReadFile at data")?;
    check_bytes("data after hole", b"Z", &tail)?;
    Ok(format!("hole=[0,{SPARSE_OFFSET})"))
}
