//! Configuration of the uploader

pub mod uploader_config;
