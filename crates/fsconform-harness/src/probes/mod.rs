//! The built-in probe library, one module per category.

use std::path::Path;

use fsconform_core::{Access, Disposition, FileAttributes};

use crate::context::{OpenHandle, ProbeContext};
use crate::probe::{Probe, ProbeFailure, ProbeResultExt};

mod allocation;
mod attributes;
mod copy;
mod creation;
mod delete;
mod directories;
mod enumeration;
mod free_space;
mod handle_info;
mod links;
mod locking;
mod moves;
mod read_write;
mod truncation;

/// Every probe in reporting order.
pub fn all() -> Vec<Probe> {
    [
        creation::probes(),
        links::probes(),
        directories::probes(),
        copy::probes(),
        moves::probes(),
        delete::probes(),
        attributes::probes(),
        truncation::probes(),
        handle_info::probes(),
        allocation::probes(),
        free_space::probes(),
        read_write::probes(),
        enumeration::probes(),
        locking::probes(),
    ]
    .concat()
}

type Step<T> = Result<T, ProbeFailure>;

/// Create an empty file, failing if the name is taken.
fn touch(ctx: &ProbeContext<'_>, path: &Path) -> Step<()> {
    ctx.open(path, Disposition::CreateNew, Access::READ_WRITE)
        .and_then(|h| h.close())
        .setup("create file")
}

fn seed(ctx: &ProbeContext<'_>, path: &Path, data: &[u8]) -> Step<()> {
    ctx.write_file(path, data).setup("write initial content")
}

fn read_back(ctx: &ProbeContext<'_>, path: &Path) -> Step<Vec<u8>> {
    ctx.read_file(path).setup("read content back")
}

fn mkdir(ctx: &ProbeContext<'_>, path: &Path) -> Step<()> {
    ctx.create_dir(path).setup("create directory")
}

fn open_rw<'a>(ctx: &ProbeContext<'a>, path: &Path) -> Step<OpenHandle<'a>> {
    ctx.open(path, Disposition::OpenExisting, Access::READ_WRITE)
        .setup("open existing file")
}

fn attributes_of(ctx: &ProbeContext<'_>, path: &Path) -> Step<FileAttributes> {
    ctx.oracle().attributes(path).setup("read attributes")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
