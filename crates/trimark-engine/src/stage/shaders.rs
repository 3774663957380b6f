use std::borrow::Cow;

/// WGSL module for a submission strategy, selected at stage initialization.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderVariant {
    /// Per-draw parameters through a dynamic-offset uniform slot.
    Uniforms,
    /// Per-vertex parameters through vertex attributes.
    Attributes,
    /// Per-instance parameters through a fixed-size uniform block array.
    Ubos,
}

/// Placeholder in the uniform-block module, substituted with the computed
/// instances-per-block before compilation.
const MAX_ARRAY_SIZE: &str = "MAX_ARRAY_SIZE";

/// Returns the WGSL source for `variant`.
///
/// `block_instances` sizes the uniform-block array and is ignored by the
/// other variants.
pub fn module_source(variant: ShaderVariant, block_instances: usize) -> Cow<'static, str> {
    match variant {
        ShaderVariant::Uniforms => Cow::Borrowed(include_str!("shaders/uniforms.wgsl")),
        ShaderVariant::Attributes => Cow::Borrowed(include_str!("shaders/attributes.wgsl")),
        ShaderVariant::Ubos => Cow::Owned(
            include_str!("shaders/ubos.wgsl")
                .replace(MAX_ARRAY_SIZE, &block_instances.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_are_distinct_and_non_empty() {
        let u = module_source(ShaderVariant::Uniforms, 0);
        let a = module_source(ShaderVariant::Attributes, 0);
        let b = module_source(ShaderVariant::Ubos, 512);
        assert!(!u.is_empty() && !a.is_empty() && !b.is_empty());
        assert_ne!(u, a);
        assert_ne!(u, b);
        assert_ne!(a, b);
    }

    #[test]
    fn each_variant_has_both_entry_points() {
        for (variant, block) in [
            (ShaderVariant::Uniforms, 0),
            (ShaderVariant::Attributes, 0),
            (ShaderVariant::Ubos, 512),
        ] {
            let src = module_source(variant, block);
            assert!(src.contains("fn vs_main"), "{variant:?} lacks vertex entry");
            assert!(src.contains("fn fs_main"), "{variant:?} lacks fragment entry");
        }
    }

    #[test]
    fn ubo_array_size_is_substituted() {
        let src = module_source(ShaderVariant::Ubos, 2_048);
        assert!(!src.contains(MAX_ARRAY_SIZE), "placeholder survived substitution");
        assert!(src.contains("2048"));
    }
}
