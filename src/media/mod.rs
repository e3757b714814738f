// SPDX-License-Identifier: MPL-2.0

//! Frame buffers and pixel format conversion
//!
//! Capture hardware delivers planar YUV 4:2:0 with arbitrary strides. The
//! [`nv21_converter`] repacks it into the tightly packed NV21 layout the
//! frame transforms expect, and [`buffers`] holds the frame-sized storage
//! that is reused for as long as the resolution stays the same.

pub mod buffers;
pub mod nv21_converter;

pub use buffers::{ConvertedBuffer, ProcessedFrame, Snapshot};
pub use nv21_converter::{nv21_len, yuv420_to_nv21};
