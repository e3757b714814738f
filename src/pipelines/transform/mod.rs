// SPDX-License-Identifier: GPL-3.0-only

//! Frame transform boundary
//!
//! A transform turns one NV21 frame into RGBA. The algorithm is opaque to
//! the pipeline; only the buffer shapes are fixed: `nv21` holds
//! `width*height*3/2` bytes and `rgba_out` is pre-sized to `width*height*4`.
//! Transforms must not keep references to either buffer.

mod color;
mod edges;

pub use color::{GrayscaleConverter, Nv21ToRgba};
pub use edges::EdgeDetector;

use crate::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Image-processing step applied to every admitted frame
pub trait FrameTransform: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Process one frame. Returning false skips the frame.
    fn process(&mut self, nv21: &[u8], width: u32, height: u32, rgba_out: &mut [u8]) -> bool;
}

/// Built-in transforms selectable from the configuration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Edge map of the luma channel
    #[default]
    Edges,
    /// Plain colour conversion
    Color,
    /// Luma replicated to RGB
    Gray,
}

impl TransformKind {
    pub fn create(self) -> Box<dyn FrameTransform> {
        match self {
            TransformKind::Edges => Box::new(EdgeDetector::default()),
            TransformKind::Color => Box::new(Nv21ToRgba),
            TransformKind::Gray => Box::new(GrayscaleConverter),
        }
    }
}

/// Holder for the optional transform.
///
/// An absent transform, a `false` result and a panic inside the transform
/// all come back as [`PipelineError::TransformFailure`].
#[derive(Default)]
pub struct TransformStage {
    transform: Option<Box<dyn FrameTransform>>,
}

impl TransformStage {
    pub fn new(transform: Option<Box<dyn FrameTransform>>) -> Self {
        Self { transform }
    }

    pub fn is_available(&self) -> bool {
        self.transform.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.transform.as_deref().map(|t| t.name())
    }

    pub fn replace(&mut self, transform: Option<Box<dyn FrameTransform>>) {
        self.transform = transform;
    }

    pub fn run(
        &mut self,
        nv21: &[u8],
        width: u32,
        height: u32,
        rgba_out: &mut [u8],
    ) -> PipelineResult<()> {
        let Some(transform) = self.transform.as_mut() else {
            return Err(PipelineError::TransformFailure(
                "no transform loaded".to_string(),
            ));
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            transform.process(nv21, width, height, rgba_out)
        }));

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(PipelineError::TransformFailure(format!(
                "{} rejected the frame",
                transform.name()
            ))),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(PipelineError::TransformFailure(format!(
                    "{} panicked: {}",
                    transform.name(),
                    reason
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    impl FrameTransform for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn process(&mut self, _: &[u8], _: u32, _: u32, rgba_out: &mut [u8]) -> bool {
            rgba_out.fill(9);
            self.0
        }
    }

    struct Panics;

    impl FrameTransform for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn process(&mut self, _: &[u8], _: u32, _: u32, _: &mut [u8]) -> bool {
            panic!("boom");
        }
    }

    #[test]
    fn test_success() {
        let mut stage = TransformStage::new(Some(Box::new(Fixed(true))));
        let mut out = [0u8; 4];
        assert!(stage.run(&[0; 6], 2, 2, &mut out).is_ok());
        assert_eq!(out, [9; 4]);
    }

    #[test]
    fn test_absent_false_and_panic_are_failures() {
        let mut out = [0u8; 16];
        let nv21 = [0u8; 6];

        let mut absent = TransformStage::default();
        assert!(!absent.is_available());
        assert!(matches!(
            absent.run(&nv21, 2, 2, &mut out),
            Err(PipelineError::TransformFailure(_))
        ));

        let mut rejects = TransformStage::new(Some(Box::new(Fixed(false))));
        assert!(matches!(
            rejects.run(&nv21, 2, 2, &mut out),
            Err(PipelineError::TransformFailure(_))
        ));

        let mut panics = TransformStage::new(Some(Box::new(Panics)));
        match panics.run(&nv21, 2, 2, &mut out) {
            Err(PipelineError::TransformFailure(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kinds_create_named_transforms() {
        assert_eq!(TransformKind::Edges.create().name(), "edges");
        assert_eq!(TransformKind::Color.create().name(), "color");
        assert_eq!(TransformKind::Gray.create().name(), "gray");
    }
}
