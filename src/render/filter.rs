// SPDX-License-Identifier: GPL-3.0-only

//! Display filter selection

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Filter applied by the fragment stage at draw time
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Colour passes through
    #[default]
    None,
    /// `1 - rgb`
    Invert,
    /// Luminance binarized at one half
    Threshold,
}

impl FilterMode {
    /// All filters in cycle order
    pub const ALL: [FilterMode; 3] = [FilterMode::None, FilterMode::Invert, FilterMode::Threshold];

    /// The filter after this one in cycle order
    pub fn next(self) -> Self {
        match self {
            FilterMode::None => FilterMode::Invert,
            FilterMode::Invert => FilterMode::Threshold,
            FilterMode::Threshold => FilterMode::None,
        }
    }

    /// Value of the `mode` uniform
    pub fn code(self) -> u32 {
        self as u32
    }

    fn from_code(code: u32) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterMode::None => write!(f, "none"),
            FilterMode::Invert => write!(f, "invert"),
            FilterMode::Threshold => write!(f, "threshold"),
        }
    }
}

/// Current filter shared between the foreground and the render loop
#[derive(Debug, Clone, Default)]
pub struct FilterSelector(Arc<AtomicU32>);

impl FilterSelector {
    pub fn new(mode: FilterMode) -> Self {
        Self(Arc::new(AtomicU32::new(mode.code())))
    }

    pub fn get(&self) -> FilterMode {
        FilterMode::from_code(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: FilterMode) {
        self.0.store(mode.code(), Ordering::Release);
    }

    /// Advance to the next filter and return it
    pub fn cycle(&self) -> FilterMode {
        let previous = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |code| {
                Some(FilterMode::from_code(code).next().code())
            })
            .unwrap_or_default();
        FilterMode::from_code(previous).next()
    }
}
