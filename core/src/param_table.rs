use crate::error::ControllerError;
use std::sync::Mutex;

/// One effect parameter: current value plus its semantic clamp range and a
/// short display name (§3 `Param`).
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub name: &'static str,
}

const fn p(value: f32, min: f32, max: f32, name: &'static str) -> Param {
    Param { value, min, max, name }
}

/// Factory-default parameter table, transcribed from the pedal firmware's
/// `TonexParameters[]` initializer (noise gate, compressor, EQ, reserved
/// "unknown" slots, reverb, modulation, delay — matching §4.C's
/// grouping). `value` here is only ever a reset default: it is overwritten
/// wholesale the first time a preset-details response is parsed.
fn factory_defaults() -> Vec<Param> {
    vec![
        // Noise gate
        p(0.0, 0.0, 1.0, "NG POST"),
        p(1.0, 0.0, 1.0, "NG POWER"),
        p(-64.0, -100.0, 0.0, "NG THRESH"),
        p(20.0, 5.0, 500.0, "NG REL"),
        p(-60.0, -100.0, -20.0, "NG DEPTH"),
        // Compressor
        p(1.0, 0.0, 1.0, "COMP POST"),
        p(0.0, 0.0, 1.0, "COMP POWER"),
        p(-14.0, -40.0, 0.0, "COMP THRESH"),
        p(-12.0, -30.0, 10.0, "COMP GAIN"),
        p(14.0, 1.0, 51.0, "COMP ATTACK"),
        // EQ
        p(0.0, 0.0, 1.0, "EQ POST"),
        p(5.0, 0.0, 10.0, "EQ BASS"),
        p(300.0, 75.0, 600.0, "EQ BFREQ"),
        p(5.0, 0.0, 10.0, "EQ MID"),
        p(0.7, 0.2, 3.0, "EQ MIDQ"),
        p(750.0, 150.0, 500.0, "EQ MFREQ"),
        p(5.0, 0.0, 10.0, "EQ TREBLE"),
        p(1900.0, 1000.0, 4000.0, "EQ TFREQ"),
        // Reserved / observed-but-unestablished slots. Per §9 Open
        // Question, their meaning must not be assumed stable — they are
        // carried through purely as placeholders.
        p(0.0, 0.0, 1.0, "UNK 1"),
        p(0.0, 0.0, 1.0, "UNK 2"),
        p(5.0, 0.0, 10.0, "MDL GAIN"),
        p(5.0, 0.0, 10.0, "MDL VOL"),
        p(100.0, 0.0, 100.0, "MDL MIX"),
        p(0.0, 0.0, 0.0, "UNK 3"),
        p(0.0, 0.0, 0.0, "UNK 4"),
        p(0.0, 0.0, 0.0, "UNK 5"),
        p(0.0, 0.0, 0.0, "UNK 6"),
        p(0.0, 0.0, 0.0, "UNK 7"),
        p(0.0, 0.0, 0.0, "UNK 8"),
        p(0.0, 0.0, 0.0, "UNK 9"),
        p(0.0, 0.0, 0.0, "UNK 10"),
        p(0.0, 0.0, 0.0, "UNK 11"),
        p(0.0, 0.0, 0.0, "UNK 12"),
        p(0.0, 0.0, 0.0, "UNK 13"),
        p(0.0, 0.0, 0.0, "UNK 14"),
        p(0.0, 0.0, 0.0, "UNK 15"),
        // Reverb
        p(0.0, 0.0, 1.0, "RVB POS"),
        p(1.0, 0.0, 1.0, "RVB POWER"),
        p(0.0, 0.0, 5.0, "RVB MODEL"),
        p(5.0, 0.0, 10.0, "RVB S1 T"),
        p(0.0, 0.0, 500.0, "RVB S1 P"),
        p(0.0, -10.0, 10.0, "RVB S1 C"),
        p(0.0, 0.0, 100.0, "RVB S1 M"),
        p(5.0, 0.0, 10.0, "RVB S2 T"),
        p(0.0, 0.0, 500.0, "RVB S2 P"),
        p(0.0, -10.0, 10.0, "RVB S2 C"),
        p(0.0, 0.0, 100.0, "RVB S2 M"),
        p(5.0, 0.0, 10.0, "RVB S3 T"),
        p(0.0, 0.0, 500.0, "RVB S3 P"),
        p(0.0, -10.0, 10.0, "RVB S3 C"),
        p(0.0, 0.0, 100.0, "RVB S3 M"),
        p(5.0, 0.0, 10.0, "RVB S4 T"),
        p(0.0, 0.0, 500.0, "RVB S4 P"),
        p(0.0, -10.0, 10.0, "RVB S4 C"),
        p(0.0, 0.0, 100.0, "RVB S4 M"),
        p(5.0, 0.0, 10.0, "RVB RM T"),
        p(0.0, 0.0, 500.0, "RVB RM P"),
        p(0.0, -10.0, 10.0, "RVB RM C"),
        p(0.0, 0.0, 100.0, "RVB RM M"),
        p(5.0, 0.0, 10.0, "RVB PL T"),
        p(0.0, 0.0, 500.0, "RVB PL P"),
        p(0.0, -10.0, 10.0, "RVB PL C"),
        p(0.0, 0.0, 100.0, "RVB PL M"),
        // Modulation
        p(0.0, 0.0, 1.0, "MOD POST"),
        p(0.0, 0.0, 1.0, "MOD POWER"),
        p(0.0, 0.0, 4.0, "MOD MODEL"),
        p(0.0, 0.0, 1.0, "MOD CH S"),
        p(0.0, 0.0, 1.0, "MOD CH T"),
        p(0.5, 0.1, 10.0, "MOD CH R"),
        p(0.0, 0.0, 100.0, "MOD CH D"),
        p(0.0, 0.0, 10.0, "MOD CH L"),
        p(0.0, 0.0, 1.0, "MOD TR S"),
        p(0.0, 0.0, 1.0, "MOD TR T"),
        p(0.5, 0.1, 10.0, "MOD TR R"),
        p(0.0, 0.0, 10.0, "MOD TR P"),
        p(0.0, 0.0, 100.0, "MOD TR D"),
        p(0.0, 0.0, 10.0, "MOD TR L"),
        p(0.0, 0.0, 1.0, "MOD PH S"),
        p(0.0, 0.0, 1.0, "MOD PH T"),
        p(0.5, 0.1, 10.0, "MOD PH R"),
        p(0.0, 0.0, 100.0, "MOD PH D"),
        p(0.0, 0.0, 10.0, "MOD PH L"),
        p(0.0, 0.0, 1.0, "MOD FL S"),
        p(0.0, 0.0, 1.0, "MOD FL T"),
        p(0.5, 0.1, 10.0, "MOD FL R"),
        p(0.0, 0.0, 100.0, "MOD FL D"),
        p(0.0, 0.0, 100.0, "MOD FL F"),
        p(0.0, 0.0, 10.0, "MOD FL L"),
        p(0.0, 0.0, 1.0, "MOD RO S"),
        p(0.0, 0.0, 1.0, "MOD RO T"),
        p(0.0, 0.0, 400.0, "MOD RO SP"),
        p(0.0, 0.0, 300.0, "MOD RO R"),
        p(0.0, 0.0, 100.0, "MOD RO D"),
        p(0.0, 0.0, 10.0, "MOD RO L"),
        // Delay
        p(0.0, 0.0, 1.0, "DLY POST"),
        p(0.0, 0.0, 1.0, "DLY POWER"),
        p(0.0, 0.0, 1.0, "DLY MODEL"),
        p(0.0, 0.0, 1.0, "DLY DG S"),
        p(0.0, 0.0, 1000.0, "DLY DG T"),
        p(0.0, 0.0, 1.0, "DLY DT M"),
        p(0.0, 0.0, 100.0, "DLY DT F"),
        p(0.0, 0.0, 1.0, "DLY DT O"),
        p(0.0, 0.0, 100.0, "DLY DT X"),
        p(0.0, 0.0, 1.0, "DLY TA S"),
        p(0.0, 0.0, 1.0, "DLY TA T"),
        p(0.0, 0.0, 1000.0, "DLY TA M"),
        p(0.0, 0.0, 100.0, "DLY TA F"),
        p(0.0, 0.0, 1.0, "DLY TA O"),
        p(0.0, 0.0, 100.0, "DLY TA X"),
    ]
}

pub const N_PARAMS: usize = 109;

/// Mutex-guarded process-wide parameter table (§4.C). MIDI-driven
/// writes and pedal-response writes race on this, hence the mutex — a
/// "lock for the whole access" approach rather than atomics per field.
pub struct ParamTable {
    params: Mutex<Vec<Param>>,
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamTable {
    pub fn new() -> Self {
        Self {
            params: Mutex::new(factory_defaults()),
        }
    }

    pub fn len(&self) -> usize {
        N_PARAMS
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Locks, reads `index`'s range, unlocks.
    pub fn get_min_max(&self, index: usize) -> Result<(f32, f32), ControllerError> {
        let guard = self.params.lock().expect("param table mutex poisoned");
        guard
            .get(index)
            .map(|param| (param.min, param.max))
            .ok_or(ControllerError::InvalidParamIndex(index))
    }

    pub fn get_value(&self, index: usize) -> Result<f32, ControllerError> {
        let guard = self.params.lock().expect("param table mutex poisoned");
        guard
            .get(index)
            .map(|param| param.value)
            .ok_or(ControllerError::InvalidParamIndex(index))
    }

    /// Clamps `value` into `[min, max]` for `index` without storing it.
    pub fn clamp(&self, index: usize, value: f32) -> Result<f32, ControllerError> {
        let (min, max) = self.get_min_max(index)?;
        Ok(value.clamp(min, max))
    }

    /// Clamps and stores `value` at `index`, returning the clamped value.
    pub fn set_value(&self, index: usize, value: f32) -> Result<f32, ControllerError> {
        let mut guard = self.params.lock().expect("param table mutex poisoned");
        let param = guard
            .get_mut(index)
            .ok_or(ControllerError::InvalidParamIndex(index))?;
        let clamped = value.clamp(param.min, param.max);
        param.value = clamped;
        Ok(clamped)
    }

    /// Scoped mutual exclusion over the whole table, for callers that need
    /// to touch several entries atomically (e.g. the preset-details parser
    /// reloading every value at once).
    pub fn with_locked<R>(&self, f: impl FnOnce(&mut Vec<Param>) -> R) -> R {
        let mut guard = self.params.lock().expect("param table mutex poisoned");
        f(&mut guard)
    }

    /// Finds a parameter's index by its display name. CC-mapping tables
    /// reference parameters by name rather than by bare index so they read
    /// the same way the pedal firmware's `TONEX_PARAM_*` enum does.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let guard = self.params.lock().expect("param table mutex poisoned");
        guard.iter().position(|param| param.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_expected_length() {
        let table = ParamTable::new();
        assert_eq!(table.len(), N_PARAMS);
        table.with_locked(|params| assert_eq!(params.len(), N_PARAMS));
    }

    #[test]
    fn clamp_restricts_to_range() {
        let table = ParamTable::new();
        // NG THRESH is [-100, 0]
        assert_eq!(table.clamp(2, 50.0).unwrap(), 0.0);
        assert_eq!(table.clamp(2, -500.0).unwrap(), -100.0);
        assert_eq!(table.clamp(2, -50.0).unwrap(), -50.0);
    }

    #[test]
    fn set_value_stores_clamped_result() {
        let table = ParamTable::new();
        let stored = table.set_value(2, 999.0).unwrap();
        assert_eq!(stored, 0.0);
        assert_eq!(table.get_value(2).unwrap(), 0.0);
    }

    #[test]
    fn invalid_index_is_reported() {
        let table = ParamTable::new();
        assert!(matches!(
            table.get_min_max(N_PARAMS),
            Err(ControllerError::InvalidParamIndex(_))
        ));
    }
}
