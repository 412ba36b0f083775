use crate::models::Setting;

const NEUTRAL: &str = "linear-gradient(135deg, #f5f7fa 0%, #c3cfe2 100%)";

/// Terminal fallback for a setting. Always displayable, never empty.
pub fn fallback_gradient(setting: &Setting) -> &'static str {
    match setting {
        Setting::Bathroom => "linear-gradient(135deg, #e0f2f1 0%, #b2dfdb 100%)",
        Setting::Bedroom => "linear-gradient(135deg, #fdf6ec 0%, #e8d8c3 100%)",
        Setting::Vanity => "linear-gradient(135deg, #fce4ec 0%, #f8bbd0 100%)",
        Setting::Kitchen => "linear-gradient(135deg, #fff8e1 0%, #ffe0b2 100%)",
        Setting::Spa => "linear-gradient(135deg, #e8f5e9 0%, #c8e6c9 100%)",
        Setting::Gym => "linear-gradient(135deg, #eceff1 0%, #b0bec5 100%)",
        Setting::Office => "linear-gradient(135deg, #f5f5f5 0%, #d7dde4 100%)",
        Setting::Outdoor => "linear-gradient(135deg, #e3f2fd 0%, #a5d6a7 100%)",
        Setting::Travel => "linear-gradient(135deg, #e1f5fe 0%, #ffe0b2 100%)",
        Setting::Neutral | Setting::Custom(_) => NEUTRAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_settings_get_the_neutral_gradient() {
        assert_eq!(fallback_gradient(&Setting::from("unknown-setting-xyz")), fallback_gradient(&Setting::Neutral));
        assert_ne!(fallback_gradient(&Setting::Spa), NEUTRAL);
    }
}
