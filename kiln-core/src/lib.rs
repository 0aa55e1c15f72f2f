//! Kiln Core
//!
//! Core library for declaring AWS Image Builder resources and applying them,
//! treating side effects as values

pub mod config;
pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod resolver;
pub mod resource;
pub mod schema;
pub mod tags;
pub mod wait;
