mod capture;
mod flow;
mod summary;

pub use capture::*;
pub use flow::*;
pub use summary::*;

use std::sync::Arc;

use crate::session::Session;

pub struct AppState(pub Arc<Session>);
