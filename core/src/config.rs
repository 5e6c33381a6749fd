use serde::Deserialize;

/// Bluetooth role the BLE-MIDI bridge runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtMode {
    Disabled,
    Central,
    Peripheral,
}

/// Footswitch decoding mode (§4.F, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootswitchMode {
    Dual,
    QuadBanked,
    QuadBinary,
}

/// External footswitch preset-layout table selector (§4.F mode 4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FootswitchLayout {
    #[serde(rename = "1x3")]
    OneByThree,
    #[serde(rename = "1x4")]
    OneByFour,
    #[serde(rename = "1x5")]
    OneByFive,
    #[serde(rename = "2x3")]
    TwoByThree,
    #[serde(rename = "2x4")]
    TwoByFour,
    #[serde(rename = "2x5a")]
    TwoByFiveA,
    #[serde(rename = "2x5b")]
    TwoByFiveB,
    #[serde(rename = "2x6a")]
    TwoBySixA,
    #[serde(rename = "2x6b")]
    TwoBySixB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiMode {
    ApTimed,
    Station,
    Ap,
}

/// One entry of the independent effect-toggle footswitch channel (§4.F
/// mode 5).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EffectToggleConfig {
    pub switch: u8,
    pub cc: u8,
    pub value_a: u8,
    pub value_b: u8,
}

pub const MAX_EXTERNAL_EFFECT_FOOTSWITCHES: usize = 5;

/// Runtime configuration, loaded once at boot from an external persistent
/// store (treats the store itself as a non-goal; this struct only
/// defines the schema).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bt_mode: BtMode,
    #[serde(default)]
    pub bt_custom_name: Option<String>,
    #[serde(default)]
    pub bt_mvave_choc_enable: bool,
    #[serde(default)]
    pub bt_xvive_md1_enable: bool,
    #[serde(default)]
    pub bt_custom_enable: bool,

    #[serde(default)]
    pub midi_enable: bool,
    #[serde(default)]
    pub midi_channel: u8,

    pub footswitch_mode: FootswitchMode,
    #[serde(default)]
    pub ext_footsw_preset_layout: Option<FootswitchLayout>,
    #[serde(default)]
    pub effect_toggles: Vec<EffectToggleConfig>,

    #[serde(default)]
    pub toggle_bypass: bool,
    #[serde(default)]
    pub enable_bt_midi_cc: bool,

    #[serde(default)]
    pub wifi_mode: Option<WifiMode>,
    #[serde(default)]
    pub wifi_ssid: Option<String>,
    #[serde(default)]
    pub wifi_password: Option<String>,

    /// Feature gate for `modify_param`'s wire emission — see §9 and
    /// §4.D ("currently not transmitted ... `#if 0`-guarded").
    #[serde(default)]
    pub enable_param_mutation_tx: bool,
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config() {
        let toml_str = r#"
            bt_mode = "central"
            footswitch_mode = "quadbanked"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bt_mode, BtMode::Central);
        assert_eq!(config.footswitch_mode, FootswitchMode::QuadBanked);
        assert!(!config.toggle_bypass);
        assert!(!config.enable_param_mutation_tx);
    }

    #[test]
    fn load_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                bt_mode = "disabled"
                footswitch_mode = "dual"
                toggle_bypass = true
            "#,
        )
        .unwrap();
        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.bt_mode, BtMode::Disabled);
        assert!(config.toggle_bypass);
    }
}
