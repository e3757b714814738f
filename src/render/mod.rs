// SPDX-License-Identifier: GPL-3.0-only

//! Preview rendering
//!
//! ```text
//! FrameExchange ──latest()──► RenderState ──plan──► PreviewRenderer ──► DisplaySurface
//!                                  ▲                       ▲
//!                           allocate / update        FilterMode uniform
//! ```
//!
//! Drawing happens on the render loop thread, only when requested.

pub mod filter;
pub mod preview;
pub mod render_loop;
pub mod state;
pub mod surface;

pub use filter::{FilterMode, FilterSelector};
pub use preview::PreviewRenderer;
pub use render_loop::{
    FpsCallback, FrameConsumer, RenderHandle, RenderHooks, RenderRequester, RenderSignal, spawn,
};
pub use state::{RenderState, TextureUpload};
pub use surface::{DisplaySurface, OffscreenSurface};
