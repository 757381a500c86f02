pub mod blur;
pub mod config;
pub mod error;
pub mod heightmap;
pub mod partition;
pub mod region;

pub use blur::{BlurState, MouldBlur, MouldReport};
pub use config::{MouldJobParams, MouldSettings, TerrainSettings};
pub use error::{MouldError, MouldResult};
pub use heightmap::{Heightmap, generate_base_terrain};
pub use partition::{JobPlan, RowBand, plan_jobs};
pub use region::{Region, SENTINEL, ScratchMask};
