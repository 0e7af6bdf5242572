//! Chart configuration and plot-ready series.
//!
//! [`config`] decides which columns a chart kind binds to; [`series`] turns
//! the visible rows into the vectors `egui_plot` draws.

pub mod config;
pub mod series;
