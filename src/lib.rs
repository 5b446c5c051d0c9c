//! Lab Coach - a terminal coach for hands-on encryption labs
//!
//! Each lab step shows code with blanks to fill in. Learners pick a
//! difficulty tier, reveal hints, answers or the full solution at a point
//! cost, verify their work against real infrastructure and move on.

pub mod app;
pub mod config;
pub mod exercise;
pub mod lab;
pub mod syntax;
pub mod telemetry;
pub mod theme;
pub mod ui;
pub mod verify;

pub use app::App;
pub use config::Config;
pub use theme::Theme;
