//! Clustered force-directed graph visualization engine.
//!
//! [`VisualizationSession`] ties the pieces together: a [`GraphModel`], the
//! [`StyleResolver`], the cluster network derived from both, and the layout
//! that positions it.

pub mod cluster;
pub mod config;
pub mod error;
pub mod interaction;
pub mod model;
pub mod physics;
pub mod render;
pub mod session;
pub mod source;
pub mod style;
pub mod util;
pub mod viewport;

pub use cluster::{ClusterNetwork, ClusterNetworkBuilder, ExpansionMap, ExpansionState};
pub use config::VizConfig;
pub use error::{Result, VizError};
pub use interaction::{InteractionController, PointerEvent, VizEvent};
pub use model::GraphModel;
pub use physics::ForceLayoutEngine;
pub use render::RenderSnapshot;
pub use session::VisualizationSession;
pub use source::{DatasetSource, GraphDataset, NeighbourSource};
pub use style::StyleResolver;
pub use viewport::{Viewport, ZoomLimits};
