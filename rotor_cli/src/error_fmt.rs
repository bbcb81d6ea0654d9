//! Human-readable error descriptions, exit codes and structured JSON errors.

use rotor_core::error::{BuildError, CoreError, FatalError};
use rotor_hardware::HwError;

/// The fatal condition behind an error, whether it surfaced directly or
/// through a halted task.
fn fatal_of(err: &eyre::Report) -> Option<&FatalError> {
    if let Some(f) = err.downcast_ref::<FatalError>() {
        return Some(f);
    }
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::TaskHalted { source, .. }) => Some(source),
        _ => None,
    }
}

fn fatal_text(f: &FatalError) -> String {
    match f {
        FatalError::MailboxOverflow(name) => format!(
            "What happened: The {name} mailbox overflowed.\nLikely causes: Its reader stopped draining (display or control task stalled).\nHow to fix: Raise mailbox.capacity or mailbox.display_decimation in the config, or check the reader task."
        ),
        FatalError::Disconnected(name) => format!(
            "What happened: The {name} mailbox lost its peer.\nLikely causes: The other task halted or was shut down first.\nHow to fix: See the earlier error in the log for the task that stopped."
        ),
        FatalError::PublishTimeout(name) => format!(
            "What happened: Publishing to {name} timed out.\nLikely causes: The actuator side is not taking duties.\nHow to fix: Check the PWM task, or set mailbox.actuator_send_timeout_ms = 0 to block instead."
        ),
        FatalError::SetpointOutOfRange { axis, index, max } => format!(
            "What happened: Target {axis} index {index} is outside the table (0..={max}).\nLikely causes: A bad --{axis} value or a corrupted target mailbox.\nHow to fix: Pick an index between 0 and {max}."
        ),
    }
}

/// Map an eyre::Report to an explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(f) = fatal_of(err) {
        return fatal_text(f);
    }
    if let Some(CoreError::TaskPanicked(task)) = err.downcast_ref::<CoreError>() {
        return format!(
            "What happened: The {task} task panicked.\nLikely causes: A bug; the panic message is in the log.\nHow to fix: Re-run with --log-level=debug and report the log."
        );
    }
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingAdc => "What happened: No height ADC was wired into the rig.\nHow to fix: Pass one via with_adc(...).".to_string(),
            BuildError::MissingTicks => "What happened: No tick counter was wired into the rig.\nHow to fix: Pass one via with_ticks(...).".to_string(),
            BuildError::ZeroCapacity => "What happened: A filter window is zero.\nHow to fix: Set filter.height_window and filter.pot_window to at least 1.".to_string(),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }
    if let Some(hw) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Hardware setup failed ({hw}).\nLikely causes: Wrong pin numbers, missing GPIO permissions or bad [sim] values.\nHow to fix: Check [pins] and [sim] in the config."
        );
    }

    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();
    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nHow to fix: Check the --config path. Details: {msg}"
        );
    }
    if lower.contains("parse config") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid.\nHow to fix: Edit the TOML config and try again. Details: {msg}"
        );
    }
    format!(
        "Something went wrong: {msg}\nHow to fix: Re-run with --log-level=debug for details."
    )
}

/// Stable exit codes: 3 overflow, 4 setpoint out of range, 5 peer lost
/// (disconnect or publish timeout), 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match fatal_of(err) {
        Some(FatalError::MailboxOverflow(_)) => 3,
        Some(FatalError::SetpointOutOfRange { .. }) => 4,
        Some(FatalError::Disconnected(_) | FatalError::PublishTimeout(_)) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match fatal_of(err) {
        Some(FatalError::MailboxOverflow(_)) => "MailboxOverflow",
        Some(FatalError::SetpointOutOfRange { .. }) => "SetpointOutOfRange",
        Some(FatalError::Disconnected(_)) => "Disconnected",
        Some(FatalError::PublishTimeout(_)) => "PublishTimeout",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let task = match err.downcast_ref::<CoreError>() {
        Some(CoreError::TaskHalted { task, .. } | CoreError::TaskPanicked(task)) => Some(*task),
        _ => None,
    };
    let details = match fatal_of(err) {
        Some(
            FatalError::MailboxOverflow(name)
            | FatalError::Disconnected(name)
            | FatalError::PublishTimeout(name),
        ) => Some(json!({ "mailbox": name })),
        Some(FatalError::SetpointOutOfRange { axis, index, max }) => {
            Some(json!({ "axis": axis.to_string(), "index": index, "max": max }))
        }
        None => None,
    };
    json!({
        "reason": reason_name(err),
        "task": task,
        "details": details,
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_core::setpoint::Axis;

    #[test]
    fn halted_task_maps_through_to_fatal_code() {
        let err = eyre::Report::new(CoreError::TaskHalted {
            task: "sampler",
            source: FatalError::MailboxOverflow("height display feed"),
        });
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("height display feed"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "MailboxOverflow");
        assert_eq!(v["task"], "sampler");
        assert_eq!(v["details"]["mailbox"], "height display feed");
    }

    #[test]
    fn bare_setpoint_error_is_four() {
        let err = eyre::Report::new(FatalError::SetpointOutOfRange {
            axis: Axis::Yaw,
            index: 24,
            max: 23,
        });
        assert_eq!(exit_code_for_error(&err), 4);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["details"]["axis"], "yaw");
        assert!(v["task"].is_null());
    }

    #[test]
    fn everything_else_is_one() {
        let err = eyre::eyre!("sim.cycle_ms must be >= 1");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("Configuration is invalid"));
    }
}
