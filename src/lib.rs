pub mod app;
pub mod blob;
pub mod catalog;
pub mod color;
pub mod config;
pub mod datastore;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod identifiers;
pub mod mapping;
pub mod nearby;
pub mod output;
pub mod payload;
pub mod progress;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod settings;
pub mod store;
pub mod uniprot;
pub mod userdata;
pub mod volcano;
