use crate::device::{GpuCaps, GpuInit};

/// Data-submission strategy for the triangle workload.
///
/// Selected once during stage initialization; never changes afterwards.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Strategy {
    /// One draw per triangle, parameters rebound through a dynamic uniform
    /// offset before each draw.
    Uniforms,
    /// Parameters replicated per vertex; one draw per triangle, or a single
    /// batched submission when multi-draw is also enabled.
    Attributes,
    /// Parameters packed into uniform blocks, issued chunk-by-chunk through
    /// batched indirect submission.
    UboMultiDraw,
}

/// Requested stage configuration.
///
/// Constructed once by the host and never mutated; capability conflicts are
/// resolved into a separate [`ResolvedFlags`] value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StageOptions {
    /// Feed per-triangle parameters through vertex attributes.
    pub use_attributes: bool,

    /// Feed per-triangle parameters through uniform blocks.
    ///
    /// Only meaningful together with `use_multi_draw` and `api_level` 2.
    pub use_ubos: bool,

    /// Batch draw submission into indirect multi-draw calls.
    pub use_multi_draw: bool,

    /// Emulated context tier (1 or 2) whose submission techniques the
    /// benchmark reproduces. Tier 2 unlocks the uniform-block path.
    pub api_level: u8,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            use_attributes: false,
            use_ubos: false,
            use_multi_draw: false,
            api_level: 1,
        }
    }
}

impl StageOptions {
    /// GPU init parameters matching these options.
    ///
    /// Multi-draw features are requested as optional so that a device
    /// without them still comes up and normalization can fall back.
    pub fn gpu_init(&self) -> GpuInit {
        let mut init = GpuInit::default();
        if self.use_multi_draw {
            init.optional_features |=
                wgpu::Features::MULTI_DRAW_INDIRECT_COUNT | wgpu::Features::INDIRECT_FIRST_INSTANCE;
        }
        init
    }
}

/// Effective submission configuration after capability checks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResolvedFlags {
    pub strategy: Strategy,

    /// Whether draws are batched through indirect multi-draw.
    ///
    /// Always true for [`Strategy::UboMultiDraw`]; never true for
    /// [`Strategy::Uniforms`].
    pub multi_draw: bool,
}

/// A fallback applied while normalizing requested options.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Fallback {
    MultiDrawUnavailable,
    UbosRequireApiLevel2,
    UbosRequireMultiDraw,
    DefaultedToUbos,
    DefaultedToAttributes,
}

impl Fallback {
    pub fn message(self) -> &'static str {
        match self {
            Self::MultiDrawUnavailable => {
                "disabling multi-draw: device lacks batched indirect submission"
            }
            Self::UbosRequireApiLevel2 => {
                "disabling uniform-block path: requires api level 2"
            }
            Self::UbosRequireMultiDraw => {
                "disabling uniform-block path: multi-draw is not enabled"
            }
            Self::DefaultedToUbos => {
                "multi-draw needs a per-instance data path; defaulting to uniform blocks"
            }
            Self::DefaultedToAttributes => {
                "multi-draw needs a per-instance data path; defaulting to vertex attributes"
            }
        }
    }
}

/// Normalizes requested options against the available capability.
///
/// Pure and total: any combination of inputs resolves to exactly one
/// strategy, applying fallbacks in a fixed order. Feeding a resolved
/// configuration back through produces the same result with no fallbacks.
pub fn normalize(options: StageOptions, multi_draw_available: bool) -> (ResolvedFlags, Vec<Fallback>) {
    let mut o = options;
    let mut fallbacks = Vec::new();

    if o.use_multi_draw && !multi_draw_available {
        o.use_multi_draw = false;
        fallbacks.push(Fallback::MultiDrawUnavailable);
    }

    if o.use_ubos && o.api_level < 2 {
        o.use_ubos = false;
        fallbacks.push(Fallback::UbosRequireApiLevel2);
    }

    if o.use_ubos && !o.use_multi_draw {
        o.use_ubos = false;
        fallbacks.push(Fallback::UbosRequireMultiDraw);
    }

    // Multi-draw batches per-triangle records, so some per-instance data
    // path must carry the parameters.
    if o.use_multi_draw && !(o.use_ubos || o.use_attributes) {
        if o.api_level == 2 {
            o.use_ubos = true;
            fallbacks.push(Fallback::DefaultedToUbos);
        } else {
            o.use_attributes = true;
            fallbacks.push(Fallback::DefaultedToAttributes);
        }
    }

    let strategy = if o.use_ubos {
        Strategy::UboMultiDraw
    } else if o.use_attributes {
        Strategy::Attributes
    } else {
        Strategy::Uniforms
    };

    (
        ResolvedFlags {
            strategy,
            multi_draw: o.use_multi_draw,
        },
        fallbacks,
    )
}

/// Resolves options against the device capability snapshot, warning for
/// every applied fallback.
pub fn resolve(options: StageOptions, caps: &GpuCaps) -> ResolvedFlags {
    let (resolved, fallbacks) = normalize(options, caps.multi_draw());
    for fallback in &fallbacks {
        log::warn!("{}", fallback.message());
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(attributes: bool, ubos: bool, multi_draw: bool, api_level: u8) -> StageOptions {
        StageOptions {
            use_attributes: attributes,
            use_ubos: ubos,
            use_multi_draw: multi_draw,
            api_level,
        }
    }

    // ── defaults ──────────────────────────────────────────────────────────

    #[test]
    fn no_flags_resolves_to_uniforms() {
        let (r, fb) = normalize(StageOptions::default(), true);
        assert_eq!(r.strategy, Strategy::Uniforms);
        assert!(!r.multi_draw);
        assert!(fb.is_empty());
    }

    #[test]
    fn attributes_alone() {
        let (r, fb) = normalize(opts(true, false, false, 1), false);
        assert_eq!(r.strategy, Strategy::Attributes);
        assert!(!r.multi_draw);
        assert!(fb.is_empty());
    }

    #[test]
    fn full_ubo_path() {
        let (r, fb) = normalize(opts(false, true, true, 2), true);
        assert_eq!(r.strategy, Strategy::UboMultiDraw);
        assert!(r.multi_draw);
        assert!(fb.is_empty());
    }

    // ── fallbacks ─────────────────────────────────────────────────────────

    #[test]
    fn multi_draw_disabled_when_unavailable() {
        let (r, fb) = normalize(opts(true, false, true, 1), false);
        assert_eq!(r.strategy, Strategy::Attributes);
        assert!(!r.multi_draw);
        assert_eq!(fb, vec![Fallback::MultiDrawUnavailable]);
    }

    #[test]
    fn ubos_need_api_level_2() {
        // ubos + multi-draw on api level 1 drops ubos; multi-draw then
        // falls back to attributes.
        let (r, fb) = normalize(opts(false, true, true, 1), true);
        assert_eq!(r.strategy, Strategy::Attributes);
        assert!(r.multi_draw);
        assert_eq!(
            fb,
            vec![Fallback::UbosRequireApiLevel2, Fallback::DefaultedToAttributes]
        );
    }

    #[test]
    fn ubos_need_multi_draw() {
        let (r, fb) = normalize(opts(false, true, false, 2), true);
        assert_eq!(r.strategy, Strategy::Uniforms);
        assert!(!r.multi_draw);
        assert_eq!(fb, vec![Fallback::UbosRequireMultiDraw]);
    }

    #[test]
    fn ubos_dropped_when_multi_draw_unavailable() {
        let (r, fb) = normalize(opts(false, true, true, 2), false);
        assert_eq!(r.strategy, Strategy::Uniforms);
        assert!(!r.multi_draw);
        assert_eq!(
            fb,
            vec![Fallback::MultiDrawUnavailable, Fallback::UbosRequireMultiDraw]
        );
    }

    #[test]
    fn bare_multi_draw_defaults_to_ubos_on_level_2() {
        let (r, fb) = normalize(opts(false, false, true, 2), true);
        assert_eq!(r.strategy, Strategy::UboMultiDraw);
        assert!(r.multi_draw);
        assert_eq!(fb, vec![Fallback::DefaultedToUbos]);
    }

    #[test]
    fn bare_multi_draw_defaults_to_attributes_on_level_1() {
        let (r, fb) = normalize(opts(false, false, true, 1), true);
        assert_eq!(r.strategy, Strategy::Attributes);
        assert!(r.multi_draw);
        assert_eq!(fb, vec![Fallback::DefaultedToAttributes]);
    }

    // ── invariants ────────────────────────────────────────────────────────

    #[test]
    fn normalization_is_idempotent() {
        for attributes in [false, true] {
            for ubos in [false, true] {
                for multi_draw in [false, true] {
                    for api_level in [1u8, 2] {
                        for available in [false, true] {
                            let o = opts(attributes, ubos, multi_draw, api_level);
                            let (first, _) = normalize(o, available);

                            // Re-run on the already-resolved flag set.
                            let resolved = StageOptions {
                                use_attributes: first.strategy == Strategy::Attributes,
                                use_ubos: first.strategy == Strategy::UboMultiDraw,
                                use_multi_draw: first.multi_draw,
                                api_level,
                            };
                            let (second, fb) = normalize(resolved, available);

                            assert_eq!(first, second, "input {o:?}, available {available}");
                            assert!(fb.is_empty(), "input {o:?}, available {available}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn resolved_flags_are_consistent() {
        for attributes in [false, true] {
            for ubos in [false, true] {
                for multi_draw in [false, true] {
                    for api_level in [1u8, 2] {
                        for available in [false, true] {
                            let o = opts(attributes, ubos, multi_draw, api_level);
                            let (r, _) = normalize(o, available);

                            match r.strategy {
                                Strategy::UboMultiDraw => assert!(r.multi_draw),
                                Strategy::Uniforms => assert!(!r.multi_draw),
                                Strategy::Attributes => {}
                            }
                            if r.multi_draw {
                                assert!(available);
                            }
                        }
                    }
                }
            }
        }
    }
}
