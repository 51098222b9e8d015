//! Noticias - news, tags and users
//!
//! A server-rendered CRUD application: news items written by users and
//! labelled with tags, stored in SQLite or MySQL.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod views;
