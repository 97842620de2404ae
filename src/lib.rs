//! Inkblog - a small blog front
//!
//! Renders the index, post detail, tag filter and contacts pages from posts,
//! tags, comments and likes stored in SQLite or MySQL.

pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
