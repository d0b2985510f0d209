use super::params;
use super::{ActionContext, ActionRegistry, ActionResult};
use crate::checkable::{
    now, AckOutcome, Acknowledgement, AcknowledgementType, CheckResult, CheckState,
    CheckableKind, CommentType, DowntimeRequest, HostState, ObjectHandle, ServiceState,
};
use crate::config::GlobalFlag;
use crate::value::{Map, Value};
use anyhow::anyhow;
use std::sync::Arc;

const CHECKABLE: &[CheckableKind] = &[CheckableKind::Service, CheckableKind::Host];
const GLOBAL: &[CheckableKind] = &[];

type Target<'a> = Option<&'a Arc<ObjectHandle>>;

/// Populate `registry` with every built-in action.
pub fn register_builtin_actions(registry: &mut ActionRegistry) {
    registry.register("process_check_result", CHECKABLE, process_check_result);
    registry.register("reschedule_check", CHECKABLE, reschedule_check);
    registry.register("send_custom_notification", CHECKABLE, send_custom_notification);
    registry.register("delay_notification", CHECKABLE, delay_notification);
    registry.register("acknowledge_problem", CHECKABLE, acknowledge_problem);
    registry.register("remove_acknowledgement", CHECKABLE, remove_acknowledgement);
    registry.register("add_comment", CHECKABLE, add_comment);
    registry.register("remove_comment", CHECKABLE, remove_comment);
    registry.register("remove_comment_by_id", GLOBAL, remove_comment_by_id);
    registry.register("schedule_downtime", CHECKABLE, schedule_downtime);
    registry.register("remove_downtime", CHECKABLE, remove_downtime);
    registry.register("remove_downtime_by_id", GLOBAL, remove_downtime_by_id);

    registry.register(
        "modify_global_notification_delivery",
        GLOBAL,
        modify_global_notification_delivery,
    );
    registry.register("modify_global_flap_detection", GLOBAL, modify_global_flap_detection);
    registry.register("modify_global_event_handling", GLOBAL, modify_global_event_handling);
    registry.register(
        "modify_global_performance_data_collection",
        GLOBAL,
        modify_global_performance_data_collection,
    );
    registry.register(
        "modify_global_service_check_execution",
        GLOBAL,
        modify_global_service_check_execution,
    );
    registry.register(
        "modify_global_host_check_execution",
        GLOBAL,
        modify_global_host_check_execution,
    );

    registry.register("shutdown_process", GLOBAL, shutdown_process);
    registry.register("restart_process", GLOBAL, restart_process);
}

/// Unwraps a validation step, returning its 403 result early.
macro_rules! validate {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(result) => return Ok(result),
        }
    };
}

fn process_check_result(ctx: &ActionContext, target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot process passive check result for non-existent object.",
        ));
    };

    let (passive_enabled, check_interval) = {
        let checkable = object.lock()?;
        (checkable.enable_passive_checks, checkable.check_interval)
    };
    if !passive_enabled {
        return Ok(ActionResult::invalid(format!(
            "Passive checks are disabled for {}.",
            object.name()
        )));
    }

    let exit_status = validate!(params::require_number(p, "exit_status"));
    if exit_status.fract() != 0.0 {
        return Ok(ActionResult::invalid(
            "Parameter 'exit_status' must be an integer.",
        ));
    }
    let exit_status = exit_status as i64;

    let state = match object.kind() {
        CheckableKind::Host => match exit_status {
            0 => CheckState::Host(HostState::Up),
            1 => CheckState::Host(HostState::Down),
            _ => {
                return Ok(ActionResult::invalid(format!(
                    "Invalid 'exit_status' for Host {}.",
                    object.name()
                )));
            }
        },
        CheckableKind::Service => CheckState::Service(ServiceState::from_exit_status(exit_status)),
    };

    let output = validate!(params::require_text(p, "plugin_output"));
    let timestamps = (
        validate!(params::optional_number(p, "execution_start")),
        validate!(params::optional_number(p, "execution_end")),
        validate!(params::optional_number(p, "schedule_start")),
        validate!(params::optional_number(p, "schedule_end")),
    );

    let current = now();
    let cr = CheckResult {
        output,
        state,
        performance_data: params::last(p, "performance_data").cloned().unwrap_or_default(),
        command: params::last(p, "check_command").cloned().unwrap_or_default(),
        execution_start: timestamps.0.unwrap_or(current),
        execution_end: timestamps.1.unwrap_or(current),
        schedule_start: timestamps.2.unwrap_or(current),
        schedule_end: timestamps.3.unwrap_or(current),
        check_source: params::text(p, "check_source").unwrap_or_default(),
    };

    ctx.store.process_check_result(object, cr)?;

    // Passive results keep arriving, so push the next active check out.
    object.lock()?.next_check = now() + check_interval;

    Ok(ActionResult::ok(format!(
        "Successfully processed check result for object {}.",
        object.name()
    )))
}

fn reschedule_check(_ctx: &ActionContext, target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot reschedule check for non-existent object.",
        ));
    };

    let next_check = validate!(params::optional_number(p, "next_check")).unwrap_or_else(now);
    {
        let mut checkable = object.lock()?;
        if params::flag(p, "force") {
            checkable.force_next_check = true;
        }
        checkable.next_check = next_check;
    }

    Ok(ActionResult::ok(format!(
        "Successfully rescheduled check for {}.",
        object.name()
    )))
}

fn send_custom_notification(
    ctx: &ActionContext,
    target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot send notification for non-existent object.",
        ));
    };

    let author = validate!(params::require_text(p, "author"));
    let comment = validate!(params::require_text(p, "comment"));
    let options = validate!(params::optional_number(p, "options")).unwrap_or(0.0) as i64;
    let forced = options & 2 != 0;

    ctx.store
        .request_notifications(object, &author, &comment, forced)?;

    Ok(ActionResult::ok(format!(
        "Successfully sent custom notification for {}.",
        object.name()
    )))
}

fn delay_notification(_ctx: &ActionContext, target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot delay notifications for non-existent object.",
        ));
    };

    let Some(timestamp) = params::last(p, "timestamp") else {
        return Ok(ActionResult::invalid(
            "A timestamp is required to delay notifications.",
        ));
    };
    let Some(timestamp) = timestamp.to_number() else {
        return Ok(ActionResult::invalid("Parameter 'timestamp' must be a number."));
    };

    object.lock()?.next_notification = timestamp;

    Ok(ActionResult::ok(format!(
        "Successfully delayed notifications for {}.",
        object.name()
    )))
}

fn acknowledge_problem(ctx: &ActionContext, target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot acknowledge problem for non-existent object.",
        ));
    };

    let (Some(author), Some(comment)) = (params::text(p, "author"), params::text(p, "comment"))
    else {
        return Ok(ActionResult::invalid(
            "Acknowledgements require author and comment.",
        ));
    };
    let expiry = validate!(params::optional_number(p, "timestamp")).unwrap_or(0.0);

    let outcome = ctx.store.acknowledge_problem(
        object,
        Acknowledgement {
            author,
            comment,
            kind: AcknowledgementType::from_sticky(params::flag(p, "sticky")),
            notify: params::flag(p, "notify"),
            expiry,
        },
    )?;
    if let AckOutcome::NotAProblem(state) = outcome {
        let kind = match state {
            CheckState::Host(_) => "Host",
            CheckState::Service(_) => "Service",
        };
        return Ok(ActionResult::conflict(format!(
            "{} {} is {}.",
            kind,
            object.name(),
            state.label()
        )));
    }

    Ok(ActionResult::ok(format!(
        "Successfully acknowledged problem for {}.",
        object.name()
    )))
}

fn remove_acknowledgement(
    ctx: &ActionContext,
    target: Target,
    _p: &Map,
) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot remove acknowledgement for non-existent object.",
        ));
    };

    ctx.store.clear_acknowledgement(object)?;
    ctx.store
        .remove_comments_by_type(object, CommentType::Acknowledgement)?;

    Ok(ActionResult::ok(format!(
        "Successfully removed acknowledgement for {}.",
        object.name()
    )))
}

fn add_comment(ctx: &ActionContext, target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot add comment for non-existent object.",
        ));
    };

    let (Some(author), Some(text)) = (params::text(p, "author"), params::text(p, "comment"))
    else {
        return Ok(ActionResult::invalid("Comments require author and comment."));
    };

    let comment = ctx
        .store
        .add_comment(object, CommentType::User, &author, &text, 0.0)?;

    Ok(ActionResult::ok(format!(
        "Successfully added comment with id {} for object {}.",
        comment.legacy_id,
        object.name()
    ))
    .with("comment_id", comment.id)
    .with("legacy_id", comment.legacy_id))
}

fn remove_comment(ctx: &ActionContext, target: Target, _p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot remove comments from non-existent object.",
        ));
    };

    ctx.store.remove_all_comments(object)?;

    Ok(ActionResult::ok(format!(
        "Successfully removed comments for {}.",
        object.name()
    )))
}

fn remove_comment_by_id(ctx: &ActionContext, _target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let legacy_id = validate!(params::require_id(p, "comment_id"));

    let removed = match ctx.store.comment_id_from_legacy(legacy_id) {
        Some(id) => ctx.store.remove_comment(&id)?,
        None => None,
    };
    if removed.is_none() {
        return Ok(ActionResult::not_found(format!(
            "Comment '{}' does not exist.",
            legacy_id
        )));
    }

    Ok(ActionResult::ok(format!(
        "Successfully removed comment {}.",
        legacy_id
    )))
}

fn schedule_downtime(ctx: &ActionContext, target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot schedule downtime for non-existent object.",
        ));
    };

    let required = ["start_time", "end_time", "duration", "author", "comment"];
    if !required.iter().all(|key| params::contains(p, key)) {
        return Ok(ActionResult::invalid(
            "Options 'start_time', 'end_time', 'duration', 'author' and 'comment' are required.",
        ));
    }

    let start_time = validate!(params::require_number(p, "start_time"));
    let end_time = validate!(params::require_number(p, "end_time"));
    let duration = validate!(params::require_number(p, "duration"));
    let author = validate!(params::require_text(p, "author"));
    let comment = validate!(params::require_text(p, "comment"));
    let trigger_legacy = validate!(params::optional_number(p, "trigger_id")).unwrap_or(0.0);

    // An unknown trigger id leaves the downtime untriggered-by anything.
    let triggered_by = if trigger_legacy > 0.0 {
        ctx.store.downtime_id_from_legacy(trigger_legacy as u64)
    } else {
        None
    };

    let downtime = ctx.store.add_downtime(
        object,
        DowntimeRequest {
            author,
            comment,
            start_time,
            end_time,
            duration,
            fixed: params::flag(p, "fixed"),
            triggered_by,
        },
    )?;

    Ok(ActionResult::ok(format!(
        "Successfully scheduled downtime with id {} for object {}.",
        downtime.legacy_id,
        object.name()
    ))
    .with("downtime_id", downtime.id)
    .with("legacy_id", downtime.legacy_id))
}

fn remove_downtime(ctx: &ActionContext, target: Target, _p: &Map) -> anyhow::Result<ActionResult> {
    let Some(object) = target else {
        return Ok(ActionResult::not_found(
            "Cannot remove downtimes from non-existent object.",
        ));
    };

    ctx.store.remove_all_downtimes(object)?;

    Ok(ActionResult::ok(format!(
        "Successfully removed downtimes for {}.",
        object.name()
    )))
}

fn remove_downtime_by_id(ctx: &ActionContext, _target: Target, p: &Map) -> anyhow::Result<ActionResult> {
    let legacy_id = validate!(params::require_id(p, "downtime_id"));

    let removed = match ctx.store.downtime_id_from_legacy(legacy_id) {
        Some(id) => ctx.store.remove_downtime(&id)?,
        None => None,
    };
    if removed.is_none() {
        return Ok(ActionResult::not_found(format!(
            "Downtime '{}' does not exist.",
            legacy_id
        )));
    }

    Ok(ActionResult::ok(format!(
        "Successfully removed downtime {}.",
        legacy_id
    )))
}

fn modify_global(ctx: &ActionContext, p: &Map, flag: GlobalFlag) -> anyhow::Result<ActionResult> {
    let active = match params::last(p, "active") {
        Some(Value::Boolean(b)) => *b,
        Some(Value::Number(n)) => *n != 0.0,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                return Ok(ActionResult::invalid(
                    "Parameter 'active' must be a boolean.",
                ))
            }
        },
        Some(_) => {
            return Ok(ActionResult::invalid(
                "Parameter 'active' must be a boolean.",
            ))
        }
        None => return Ok(ActionResult::invalid("Parameter 'active' is required.")),
    };

    ctx.flags
        .write()
        .map_err(|_| anyhow!("monitoring flags lock poisoned"))?
        .set(flag, active);

    Ok(ActionResult::ok(format!(
        "Globally {} {}.",
        if active { "enabled" } else { "disabled" },
        flag.description()
    )))
}

fn modify_global_notification_delivery(
    ctx: &ActionContext,
    _target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    modify_global(ctx, p, GlobalFlag::Notifications)
}

fn modify_global_flap_detection(
    ctx: &ActionContext,
    _target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    modify_global(ctx, p, GlobalFlag::FlapDetection)
}

fn modify_global_event_handling(
    ctx: &ActionContext,
    _target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    modify_global(ctx, p, GlobalFlag::EventHandlers)
}

fn modify_global_performance_data_collection(
    ctx: &ActionContext,
    _target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    modify_global(ctx, p, GlobalFlag::PerformanceData)
}

fn modify_global_service_check_execution(
    ctx: &ActionContext,
    _target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    modify_global(ctx, p, GlobalFlag::ServiceChecks)
}

fn modify_global_host_check_execution(
    ctx: &ActionContext,
    _target: Target,
    p: &Map,
) -> anyhow::Result<ActionResult> {
    modify_global(ctx, p, GlobalFlag::HostChecks)
}

fn shutdown_process(ctx: &ActionContext, _target: Target, _p: &Map) -> anyhow::Result<ActionResult> {
    ctx.process.request_shutdown();
    Ok(ActionResult::ok("Shutting down Lookout."))
}

fn restart_process(ctx: &ActionContext, _target: Target, _p: &Map) -> anyhow::Result<ActionResult> {
    ctx.process.request_restart();
    Ok(ActionResult::ok("Restarting Lookout."))
}
