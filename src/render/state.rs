// SPDX-License-Identifier: GPL-3.0-only

//! Texture bookkeeping for the render path, kept apart from any GPU object

use super::filter::FilterMode;

/// How the next frame reaches the texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUpload {
    /// Create a texture sized to the frame
    Allocate { width: u32, height: u32 },
    /// Overwrite the existing texture in place
    Update,
    /// The texture already holds this frame
    Skip,
}

/// Renderer-side state: texture dimensions, initialization, filter, counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderState {
    width: u32,
    height: u32,
    texture_initialized: bool,
    filter: FilterMode,
    allocations: u64,
    updates: u64,
    /// (epoch, sequence) of the frame last written to the texture
    uploaded: Option<(u64, u64)>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide how frame `(epoch, sequence)` of `width`x`height` is uploaded
    /// and record it.
    ///
    /// `reinitialize` forces a full allocation even at unchanged dimensions.
    pub fn plan_upload(
        &mut self,
        width: u32,
        height: u32,
        epoch: u64,
        sequence: u64,
        reinitialize: bool,
    ) -> TextureUpload {
        if reinitialize || width != self.width || height != self.height {
            self.texture_initialized = false;
        }

        if !self.texture_initialized {
            self.width = width;
            self.height = height;
            self.texture_initialized = true;
            self.allocations += 1;
            self.uploaded = Some((epoch, sequence));
            return TextureUpload::Allocate { width, height };
        }

        if self.uploaded == Some((epoch, sequence)) {
            return TextureUpload::Skip;
        }

        self.updates += 1;
        self.uploaded = Some((epoch, sequence));
        TextureUpload::Update
    }

    /// Forget the texture, e.g. after the surface was recreated
    pub fn invalidate(&mut self) {
        self.texture_initialized = false;
        self.uploaded = None;
    }

    pub fn is_texture_initialized(&self) -> bool {
        self.texture_initialized
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.texture_initialized.then_some((self.width, self.height))
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn set_filter(&mut self, filter: FilterMode) {
        self.filter = filter;
    }

    /// Cycle the filter and return the new one
    pub fn next_filter(&mut self) -> FilterMode {
        self.filter = self.filter.next();
        self.filter
    }

    /// Full texture allocations so far
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// In-place texture updates so far
    pub fn updates(&self) -> u64 {
        self.updates
    }
}
