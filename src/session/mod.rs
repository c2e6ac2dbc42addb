//! Session handling: the route surface, navigation and role resolution.

pub mod navigator;
pub mod resolver;
pub mod route;

pub use navigator::Navigator;
pub use resolver::{home_for, AuthState, SessionResolver};
pub use route::Route;
