//! shadekit - a hillshading tile engine for Rust
//!
//! shadekit turns a folder of HGT elevation tiles into per-tile
//! greyscale shade bitmaps, on demand, under tight memory and
//! concurrency budgets. Rendered tiles are cached in a dual-budget LRU,
//! concurrent requests for the same tile share one render, and each
//! render streams DEM samples through a multi-reader, multi-computer
//! task pipeline.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadekit::{AdaptiveShadingKernel, FsDemFolder, RenderConfig};
//!
//! let config = RenderConfig::new(Arc::new(AdaptiveShadingKernel::new()));
//! config.set_dem_folder(Arc::new(FsDemFolder::new("/data/dem")));
//! config.apply_configuration(true);
//!
//! if let Some(tile) = config.shading_tile(47.4, 8.5, 12, 1800.0, 1800.0) {
//!     println!("shaded {}x{} pixels", tile.width(), tile.height());
//! }
//! ```

pub mod bitmap;
pub mod cache;
pub mod config;
pub mod dem;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod shading;
pub mod types;

pub use bitmap::{Border, ShadeBitmap};
pub use cache::{max_memory_mb, set_max_memory_mb, CacheConfig, HgtCache, LoadFuture};
pub use config::RenderConfig;
pub use dem::{
    DemFile, DemFolder, DemIndex, DemStream, FsDemFile, FsDemFolder, MemoryDemFile,
    MemoryDemFolder, ZipDemFile, NO_DATA,
};
pub use error::{Error, Result};
pub use pipeline::{close_render_pool, PipelineParams, RasterPipeline, StopSignal, ThreadConfig};
pub use shading::{AdaptiveShadingKernel, ShadingKernel, SimpleShadingKernel, StripShader};
pub use types::{BoundingBox, TileKey};
