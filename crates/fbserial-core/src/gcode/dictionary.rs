//! Parameter dictionary
//!
//! Maps numeric device parameter ids to readable names.

/// Known device parameters, by wire id
pub const PARAMETER_DICTIONARY: &[(u16, &str)] = &[
    (0, "param_version"),
    (11, "movement_timeout_x"),
    (12, "movement_timeout_y"),
    (13, "movement_timeout_z"),
    (21, "movement_invert_endpoints_x"),
    (22, "movement_invert_endpoints_y"),
    (23, "movement_invert_endpoints_z"),
    (31, "movement_invert_motor_x"),
    (32, "movement_invert_motor_y"),
    (33, "movement_invert_motor_z"),
    (41, "movement_steps_acc_dec_x"),
    (42, "movement_steps_acc_dec_y"),
    (43, "movement_steps_acc_dec_z"),
    (51, "movement_home_up_x"),
    (52, "movement_home_up_y"),
    (53, "movement_home_up_z"),
    (61, "movement_min_spd_x"),
    (62, "movement_min_spd_y"),
    (63, "movement_min_spd_z"),
    (71, "movement_max_spd_x"),
    (72, "movement_max_spd_y"),
    (73, "movement_max_spd_z"),
];

/// Readable name for a parameter id
///
/// Ids missing from the dictionary render as `UNKNOWN_PARAMETER_<id>`.
pub fn parameter_name(id: u16) -> String {
    PARAMETER_DICTIONARY
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("UNKNOWN_PARAMETER_{}", id))
}
