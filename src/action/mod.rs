// Named control operations against checkables or the whole process.

mod handlers;
pub mod params;
mod registry;
mod result;

pub use handlers::register_builtin_actions;
pub use registry::{ActionDescriptor, ActionHandler, ActionRegistry};
pub use result::{ActionResult, ResultCode};

use crate::checkable::ObjectStore;
use crate::config::SharedMonitoringFlags;
use crate::process::ProcessControl;
use std::sync::Arc;


/// Everything a handler may touch besides its target object.
#[derive(Clone)]
pub struct ActionContext {
    pub store: Arc<ObjectStore>,
    pub flags: SharedMonitoringFlags,
    pub process: ProcessControl,
}
