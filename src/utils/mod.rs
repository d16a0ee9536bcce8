//! 实用工具模块

pub mod file_tools;

pub use file_tools::FileTools;
