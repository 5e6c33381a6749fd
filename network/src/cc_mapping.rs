use tonex_core::{Cmd, ParamTable};

/// How a CC's 0..127 value becomes a parameter value, mirroring
/// `midi_helper_scale_midi_to_float`/`midi_helper_boolean_midi_to_float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    /// Linear-scaled into the parameter's `[min, max]` range.
    Linear,
    /// `127` maps to `1.0`, anything else to `0.0`.
    Boolean,
    /// The raw `0..127` MIDI value is used as-is (model-select parameters).
    Raw,
}

struct CcMapping {
    cc: u8,
    param_name: &'static str,
    kind: ScaleKind,
}

/// Representative span of the pedal's big CC table (§6), covering
/// every parameter group it defines: noise gate, compressor, EQ, modulation,
/// reverb, delay, plus the two "soft" CCs that request a preset change
/// instead of touching a parameter. Grounded on
/// `midi_helper_adjust_param_via_midi`'s `switch (change_num)`.
const CC_TABLE: &[CcMapping] = &[
    CcMapping { cc: 1, param_name: "DLY POST", kind: ScaleKind::Boolean },
    CcMapping { cc: 2, param_name: "DLY POWER", kind: ScaleKind::Boolean },
    CcMapping { cc: 3, param_name: "DLY MODEL", kind: ScaleKind::Raw },
    CcMapping { cc: 13, param_name: "NG POST", kind: ScaleKind::Boolean },
    CcMapping { cc: 14, param_name: "NG POWER", kind: ScaleKind::Boolean },
    CcMapping { cc: 15, param_name: "NG THRESH", kind: ScaleKind::Linear },
    CcMapping { cc: 16, param_name: "NG REL", kind: ScaleKind::Linear },
    CcMapping { cc: 17, param_name: "NG DEPTH", kind: ScaleKind::Linear },
    CcMapping { cc: 18, param_name: "COMP POWER", kind: ScaleKind::Boolean },
    CcMapping { cc: 19, param_name: "COMP THRESH", kind: ScaleKind::Linear },
    CcMapping { cc: 20, param_name: "COMP GAIN", kind: ScaleKind::Linear },
    CcMapping { cc: 21, param_name: "COMP ATTACK", kind: ScaleKind::Linear },
    CcMapping { cc: 22, param_name: "COMP POST", kind: ScaleKind::Boolean },
    CcMapping { cc: 23, param_name: "EQ BASS", kind: ScaleKind::Linear },
    CcMapping { cc: 24, param_name: "EQ BFREQ", kind: ScaleKind::Linear },
    CcMapping { cc: 25, param_name: "EQ MID", kind: ScaleKind::Linear },
    CcMapping { cc: 26, param_name: "EQ MIDQ", kind: ScaleKind::Linear },
    CcMapping { cc: 27, param_name: "EQ MFREQ", kind: ScaleKind::Linear },
    CcMapping { cc: 28, param_name: "EQ TREBLE", kind: ScaleKind::Linear },
    CcMapping { cc: 29, param_name: "EQ TFREQ", kind: ScaleKind::Linear },
    CcMapping { cc: 30, param_name: "EQ POST", kind: ScaleKind::Boolean },
    CcMapping { cc: 31, param_name: "MOD POST", kind: ScaleKind::Boolean },
    CcMapping { cc: 32, param_name: "MOD POWER", kind: ScaleKind::Boolean },
    CcMapping { cc: 33, param_name: "MOD MODEL", kind: ScaleKind::Raw },
    CcMapping { cc: 36, param_name: "MOD CH D", kind: ScaleKind::Linear },
    CcMapping { cc: 37, param_name: "MOD CH L", kind: ScaleKind::Linear },
    CcMapping { cc: 59, param_name: "RVB S1 T", kind: ScaleKind::Linear },
    CcMapping { cc: 62, param_name: "RVB S1 M", kind: ScaleKind::Linear },
    CcMapping { cc: 75, param_name: "RVB POWER", kind: ScaleKind::Boolean },
    CcMapping { cc: 84, param_name: "RVB POS", kind: ScaleKind::Boolean },
    CcMapping { cc: 85, param_name: "RVB MODEL", kind: ScaleKind::Raw },
    CcMapping { cc: 91, param_name: "DLY DG S", kind: ScaleKind::Boolean },
    CcMapping { cc: 92, param_name: "DLY TA M", kind: ScaleKind::Linear },
    CcMapping { cc: 93, param_name: "DLY TA F", kind: ScaleKind::Linear },
    CcMapping { cc: 95, param_name: "DLY TA X", kind: ScaleKind::Linear },
    CcMapping { cc: 102, param_name: "MDL GAIN", kind: ScaleKind::Linear },
    CcMapping { cc: 103, param_name: "MDL VOL", kind: ScaleKind::Linear },
    CcMapping { cc: 104, param_name: "MDL MIX", kind: ScaleKind::Linear },
];

const CC_PRESET_DOWN: u8 = 86;
const CC_PRESET_UP: u8 = 87;

pub fn scale_linear(min: f32, max: f32, midi_value: u8) -> f32 {
    min + ((midi_value as f32 / 127.0) * (max - min))
}

pub fn scale_boolean(midi_value: u8) -> f32 {
    if midi_value == 127 {
        1.0
    } else {
        0.0
    }
}

/// Translates one received CC (`control`, `value`) into a controller [`Cmd`],
/// looking up the named parameter's range in `params` when the mapping is
/// linear. Returns `None` for CC numbers with no mapping (§6: must
/// not panic or propagate an error for an unmapped CC, simply ignore it).
pub fn cc_to_cmd(params: &ParamTable, control: u8, value: u8) -> Option<Cmd> {
    match control {
        CC_PRESET_DOWN => return Some(Cmd::PrevPreset),
        CC_PRESET_UP => return Some(Cmd::NextPreset),
        _ => {}
    }

    let mapping = CC_TABLE.iter().find(|entry| entry.cc == control)?;
    let index = params.index_of(mapping.param_name)?;
    let scaled = match mapping.kind {
        ScaleKind::Linear => {
            let (min, max) = params.get_min_max(index).ok()?;
            scale_linear(min, max, value)
        }
        ScaleKind::Boolean => scale_boolean(value),
        ScaleKind::Raw => value as f32,
    };

    Some(Cmd::ModifyParam { index, value: scaled })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_cc_collapses_to_127_only() {
        assert_eq!(scale_boolean(127), 1.0);
        assert_eq!(scale_boolean(126), 0.0);
        assert_eq!(scale_boolean(0), 0.0);
    }

    #[test]
    fn linear_scaling_is_monotonic() {
        let low = scale_linear(-100.0, 0.0, 10);
        let mid = scale_linear(-100.0, 0.0, 64);
        let high = scale_linear(-100.0, 0.0, 127);
        assert!(low < mid);
        assert!(mid < high);
        assert_eq!(high, 0.0);
        assert_eq!(scale_linear(-100.0, 0.0, 0), -100.0);
    }

    #[test]
    fn preset_down_and_up_produce_preset_commands() {
        let params = ParamTable::new();
        assert!(matches!(cc_to_cmd(&params, CC_PRESET_DOWN, 0), Some(Cmd::PrevPreset)));
        assert!(matches!(cc_to_cmd(&params, CC_PRESET_UP, 0), Some(Cmd::NextPreset)));
    }

    #[test]
    fn delay_ccs_1_2_3_are_mapped() {
        let params = ParamTable::new();

        let post = cc_to_cmd(&params, 1, 127).unwrap();
        assert!(matches!(post, Cmd::ModifyParam { value, .. } if value == 1.0));

        let enable = cc_to_cmd(&params, 2, 0).unwrap();
        assert!(matches!(enable, Cmd::ModifyParam { value, .. } if value == 0.0));

        match cc_to_cmd(&params, 3, 5).unwrap() {
            Cmd::ModifyParam { index, value } => {
                assert_eq!(index, params.index_of("DLY MODEL").unwrap());
                assert_eq!(value, 5.0);
            }
            other => panic!("expected ModifyParam, got {other:?}"),
        }
    }

    #[test]
    fn mapped_cc_produces_modify_param_command() {
        let params = ParamTable::new();
        let cmd = cc_to_cmd(&params, 14, 127).unwrap();
        match cmd {
            Cmd::ModifyParam { index, value } => {
                assert_eq!(index, params.index_of("NG POWER").unwrap());
                assert_eq!(value, 1.0);
            }
            other => panic!("expected ModifyParam, got {other:?}"),
        }
    }

    #[test]
    fn unmapped_cc_is_ignored() {
        let params = ParamTable::new();
        assert!(cc_to_cmd(&params, 200, 10).is_none());
    }
}
