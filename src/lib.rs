pub mod draw;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod settings;
pub mod viewer;

pub use error::{AnnotationError, GatewayError, SaveError};
pub use gateway::{FsGateway, PersistenceGateway, ReportId};
pub use settings::AnnotationSettings;
pub use viewer::{render_report, ReportView, ViewerRole};
