use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const DEFAULT_TEXT_MODEL: &str = "veo-3.0-fast-generate-001";
pub const DEFAULT_IMAGE_MODEL: &str = "veo-3.0-generate-001";

const VEO3_DURATIONS: &[u32] = &[4, 6, 8];
const FALLBACK_MIN_DURATION: u32 = 1;
const FALLBACK_MAX_DURATION: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durations {
    Set(&'static [u32]),
    Range(u32, u32),
}

impl Durations {
    pub fn contains(&self, seconds: u32) -> bool {
        match self {
            Durations::Set(values) => values.contains(&seconds),
            Durations::Range(lo, hi) => (*lo..=*hi).contains(&seconds),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Durations::Set(values) => values
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Durations::Range(lo, hi) => format!("{lo}-{hi}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCapability {
    pub display_name: &'static str,
    pub supports_audio: bool,
    pub supports_reference_images: bool,
    pub durations: Durations,
    pub default_duration: u32,
    pub preview: bool,
}

static MODELS: Lazy<HashMap<&'static str, ModelCapability>> = Lazy::new(|| {
    let veo2 = |name, reference_images| ModelCapability {
        display_name: name,
        supports_audio: false,
        supports_reference_images: reference_images,
        durations: Durations::Range(5, 8),
        default_duration: 8,
        preview: false,
    };
    let veo3 = |name, preview| ModelCapability {
        display_name: name,
        supports_audio: true,
        supports_reference_images: false,
        durations: Durations::Set(VEO3_DURATIONS),
        default_duration: 8,
        preview,
    };

    HashMap::from([
        ("veo-2.0-generate-001", veo2("Veo 2.0", false)),
        ("veo-2.0-generate-exp", veo2("Veo 2.0 experimental", true)),
        ("veo-3.0-generate-001", veo3("Veo 3.0", false)),
        ("veo-3.0-fast-generate-001", veo3("Veo 3.0 fast", false)),
        ("veo-3.0-generate-preview", veo3("Veo 3.0 preview", true)),
        ("veo-3.0-fast-generate-preview", veo3("Veo 3.0 fast preview", true)),
    ])
});

pub fn lookup(model_id: &str) -> Option<&'static ModelCapability> {
    MODELS.get(model_id)
}

/// Capability for any model id. Unknown ids get a permissive record so new
/// publisher models can be used before the table learns about them.
pub fn capability_for(model_id: &str) -> ModelCapability {
    if let Some(known) = lookup(model_id) {
        return known.clone();
    }
    ModelCapability {
        display_name: "unlisted model",
        supports_audio: model_id.contains("veo-3"),
        supports_reference_images: false,
        durations: Durations::Range(FALLBACK_MIN_DURATION, FALLBACK_MAX_DURATION),
        default_duration: 8,
        preview: false,
    }
}

pub fn known_models() -> Vec<&'static str> {
    let mut ids: Vec<_> = MODELS.keys().copied().collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veo3_models_accept_only_even_durations() {
        let cap = capability_for("veo-3.0-fast-generate-001");
        assert!(cap.supports_audio);
        assert!(cap.durations.contains(6));
        assert!(!cap.durations.contains(5));
        assert_eq!(cap.durations.describe(), "4, 6, 8");
    }

    #[test]
    fn veo2_has_no_audio() {
        let cap = lookup("veo-2.0-generate-001").unwrap();
        assert!(!cap.supports_audio);
        assert!(cap.durations.contains(5));
        assert!(lookup("veo-2.0-generate-exp").unwrap().supports_reference_images);
    }

    #[test]
    fn unknown_model_falls_back_to_range() {
        let cap = capability_for("X");
        assert!(!cap.supports_audio);
        assert!(cap.durations.contains(6));
        assert!(!cap.durations.contains(61));

        assert!(capability_for("veo-3.1-generate-001").supports_audio);
    }

    #[test]
    fn default_models_are_listed() {
        let ids = known_models();
        assert!(ids.contains(&DEFAULT_TEXT_MODEL));
        assert!(ids.contains(&DEFAULT_IMAGE_MODEL));
    }
}
