//! Archive assembly for folder, selection and pattern downloads.

mod archive;

pub use archive::{BundleEntry, BundlePlan, BundleReport, ZipBundler};
