use crate::error::ControllerError;

/// Marks the byte immediately preceding the preset-name field in a
/// preset-details payload (`ToneOnePresetByteMarker` in the pedal firmware).
pub const PRESET_NAME_MARKER: [u8; 6] = [0xB9, 0x04, 0xB9, 0x02, 0xBC, 0x21];

/// Marks the byte immediately preceding the first `[0x88, f32]` parameter
/// entry in a preset-details payload (`param_start_marker`).
pub const PARAM_REGION_MARKER: [u8; 4] = [0xBA, 0x03, 0xBA, 0x6D];

/// Fixed width of the preset-name field that follows [`PRESET_NAME_MARKER`].
pub const PRESET_NAME_LEN: usize = 32;

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Opaque wrapper around a raw preset-details payload (§4.C
/// "PresetBlob"). Exposes the two byte regions the controller actually
/// needs: the preset's display name, and the `[marker, f32]`-encoded
/// parameter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetBlob {
    bytes: Vec<u8>,
}

impl PresetBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Extracts the preset name, locating it via [`PRESET_NAME_MARKER`] and
    /// trimming trailing NUL padding.
    pub fn preset_name(&self) -> Result<String, ControllerError> {
        let marker_pos =
            find_subslice(&self.bytes, &PRESET_NAME_MARKER).ok_or(ControllerError::InvalidFrame)?;
        let start = marker_pos + PRESET_NAME_MARKER.len();
        let end = start
            .checked_add(PRESET_NAME_LEN)
            .filter(|&e| e <= self.bytes.len())
            .ok_or(ControllerError::InvalidFrame)?;
        let raw = &self.bytes[start..end];
        let nul_pos = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..nul_pos]).into_owned())
    }

    /// Blind 4-byte overwrite of parameter `index`'s value at
    /// `param_region + index*(1+4) + 1` (§3 `PresetBlob` invariant).
    /// Does not touch any other byte, including the `0x88` tag itself.
    pub fn set_param_value(&mut self, index: usize, value: f32) -> Result<(), ControllerError> {
        let marker_pos = find_subslice(&self.bytes, &PARAM_REGION_MARKER)
            .ok_or(ControllerError::InvalidFrame)?;
        let region_start = marker_pos + PARAM_REGION_MARKER.len();
        let value_start = region_start
            .checked_add(index * 5 + 1)
            .ok_or(ControllerError::InvalidParamIndex(index))?;
        let value_end = value_start + 4;
        if value_end > self.bytes.len() {
            return Err(ControllerError::InvalidParamIndex(index));
        }
        self.bytes[value_start..value_end].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Extracts every `[0x88, f32]` entry following [`PARAM_REGION_MARKER`],
    /// in parameter-table order, stopping at the first non-`0x88` byte (a
    /// short/garbled response) or once `max_params` entries have been read.
    pub fn parameter_values(&self, max_params: usize) -> Result<Vec<f32>, ControllerError> {
        let marker_pos = find_subslice(&self.bytes, &PARAM_REGION_MARKER)
            .ok_or(ControllerError::InvalidFrame)?;
        let mut cursor = marker_pos + PARAM_REGION_MARKER.len();
        let mut values = Vec::with_capacity(max_params);

        for _ in 0..max_params {
            match self.bytes.get(cursor) {
                Some(0x88) => {
                    let value_start = cursor + 1;
                    let value_end = value_start + 4;
                    if value_end > self.bytes.len() {
                        break;
                    }
                    let raw: [u8; 4] = self.bytes[value_start..value_end]
                        .try_into()
                        .expect("slice is exactly 4 bytes");
                    values.push(f32::from_le_bytes(raw));
                    cursor = value_end;
                }
                _ => break,
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_blob(name: &str, values: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0xAA; 4];
        bytes.extend_from_slice(&PRESET_NAME_MARKER);
        let mut name_field = vec![0u8; PRESET_NAME_LEN];
        name_field[..name.len()].copy_from_slice(name.as_bytes());
        bytes.extend_from_slice(&name_field);
        bytes.extend_from_slice(&PARAM_REGION_MARKER);
        for v in values {
            bytes.push(0x88);
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn extracts_preset_name() {
        let blob = PresetBlob::new(build_blob("LeadTone", &[]));
        assert_eq!(blob.preset_name().unwrap(), "LeadTone");
    }

    #[test]
    fn extracts_parameter_values_in_order() {
        let values = [0.0_f32, 1.0, -64.0, 20.0];
        let blob = PresetBlob::new(build_blob("Crunch", &values));
        let parsed = blob.parameter_values(4).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn stops_at_short_buffer_without_panicking() {
        let mut bytes = build_blob("Stub", &[1.0]);
        bytes.truncate(bytes.len() - 2);
        let blob = PresetBlob::new(bytes);
        let parsed = blob.parameter_values(4).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn set_param_value_overwrites_only_target_slot() {
        let values = [1.0_f32, 2.0, 3.0];
        let mut blob = PresetBlob::new(build_blob("Crunch", &values));
        blob.set_param_value(1, 99.5).unwrap();
        let parsed = blob.parameter_values(3).unwrap();
        assert_eq!(parsed, [1.0, 99.5, 3.0]);
    }

    #[test]
    fn set_param_value_out_of_range_is_reported() {
        let mut blob = PresetBlob::new(build_blob("Crunch", &[1.0]));
        assert!(matches!(
            blob.set_param_value(50, 1.0),
            Err(ControllerError::InvalidParamIndex(_))
        ));
    }

    #[test]
    fn missing_marker_is_reported() {
        let blob = PresetBlob::new(vec![0u8; 16]);
        assert!(matches!(blob.preset_name(), Err(ControllerError::InvalidFrame)));
        assert!(matches!(
            blob.parameter_values(4),
            Err(ControllerError::InvalidFrame)
        ));
    }
}
