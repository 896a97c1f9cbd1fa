//! Utilities module - text normalization and keyword matching

pub mod text_utils;

pub use text_utils::TextUtils;
