//! The navigation controller and its configuration surface.

mod core;
mod options;

pub use self::core::{FormActivation, LinkActivation, NavigateOptions, Router, RouterBuilder};
pub use self::options::{RouteSpec, RouteTable, RouterOptions, ScrollRestoration, TransitionSpec};
