//! Defines methods shared by the binaries

/// Methods for reading arguments
pub mod args;
/// Methods for loading configs and writing reports
pub mod loaders;
