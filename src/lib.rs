//! Weather routed sailing passages by isochron propagation.
//!
//! From a start, a destination, a time varying weather field and a speed
//! polar of the vessel, the engine grows a family of isochrons: closed
//! regions whose boundary holds the positions the boat can just reach in
//! a given elapsed time. The optimal route to any reachable point falls
//! out of the ancestry of the boundary position closest to it.

pub(crate) mod algorithm;
pub mod environment;
pub(crate) mod isochron;
pub mod polar;
pub mod position;
pub mod router;
pub mod utils;

pub use environment::{Climatology, Current, LandsProvider, WeatherGrid, Wind, WindAtlas};
pub use polar::{Polar, Polars, PolarsSpec, SailPlan, Vmgs};
pub use position::Coords;
pub use router::{
    ClimatologyType, IntegratorType, PlotData, ResolvedPosition, RouteMap,
    RouteMapConfiguration, RouteMapPosition, RouteMapStatistics,
};
pub use utils::{Distance, Speed};
