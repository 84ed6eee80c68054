pub mod composite;
pub mod input;
pub mod layer;
pub mod messages;
pub mod model;
pub mod registration;
pub mod render;
pub mod save;
pub mod service;
pub mod session;
pub mod state;

pub use composite::{compose_for_viewing, detect_empty, flatten};
pub use input::SurfaceController;
pub use layer::AnnotationLayer;
pub use model::{Color, Point, Tool, ToolState};
pub use registration::{DisplaySize, RegistrationResolver, ScaleFilter};
pub use service::SaveCoordinator;
pub use session::ReviewSession;
