#![warn(clippy::all)]

//! LAS point cloud input and output for road boundary detection
//!
//! The detection pipeline consumes and produces plain arrays of 3D positions. This crate
//! handles the file side of that contract: reading a LAS file into a [PointCloud](crate::las::PointCloud)
//! and writing a derived point set back out with the header of the file it came from.

pub mod las;

pub use crate::las::PointCloud;
