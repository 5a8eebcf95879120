pub mod cli;
pub mod collector;
pub mod config;
pub mod event;
pub mod object_store;
pub mod service;
pub mod source;
pub mod storage;
