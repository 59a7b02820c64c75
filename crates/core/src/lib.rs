pub mod config;
pub mod dispatcher;
pub mod display;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod registry;
pub mod session;
pub mod store;
pub mod viewer;
pub mod wake;

pub use config::{PlayerConfiguration, ViewerConfig};
pub use display::SessionView;
pub use engine::{Engine, EngineEvent, EngineHandle, EventSink, SurfaceHandle};
pub use error::{Result, ViewerError};
pub use events::ViewerEvent;
pub use library::StreamLibrary;
pub use viewer::{Viewer, ViewerBuilder};
