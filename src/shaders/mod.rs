// SPDX-License-Identifier: GPL-3.0-only
//! WGSL sources for the preview renderer
//!
//! Filters live in their own file and are concatenated in front of the
//! program that uses them.

/// Shared filter functions (WGSL)
/// Contains: luminance(), apply_filter()
pub const FILTER_FUNCTIONS: &str = include_str!("filters.wgsl");

/// Full-screen quad vertex and fragment stages; needs [`FILTER_FUNCTIONS`]
pub const PREVIEW_PROGRAM: &str = include_str!("preview.wgsl");

/// Complete preview program source
pub fn preview_shader_source() -> String {
    format!("{}\n{}", FILTER_FUNCTIONS, PREVIEW_PROGRAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_source_has_entry_points() {
        let source = preview_shader_source();
        assert!(source.contains("fn vs_main"));
        assert!(source.contains("fn fs_main"));
        assert!(source.find("fn apply_filter") < source.find("fn fs_main"));
    }

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) -> naga::Module {
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(e) => panic!("Shader '{}' parse failed: {:?}", name, e),
        };
        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module);
        if let Err(e) = info {
            panic!("Shader '{}' validation failed: {:?}", name, e);
        }
        module
    }

    #[test]
    fn test_filter_functions_validate() {
        validate_shader("filters", FILTER_FUNCTIONS);
    }

    #[test]
    fn test_preview_shader_validates() {
        let module = validate_shader("preview", &preview_shader_source());
        let stages: Vec<_> = module
            .entry_points
            .iter()
            .map(|ep| (ep.name.as_str(), ep.stage))
            .collect();
        assert!(stages.contains(&("vs_main", naga::ShaderStage::Vertex)));
        assert!(stages.contains(&("fs_main", naga::ShaderStage::Fragment)));
    }
}
