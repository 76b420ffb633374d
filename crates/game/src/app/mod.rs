mod bootstrap;
mod config;
mod scenes;

pub(crate) use bootstrap::{build_app, AppWiring};
