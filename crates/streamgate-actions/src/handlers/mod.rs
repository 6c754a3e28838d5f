pub mod custom;
pub mod derive;
pub mod email;
pub mod report;
pub mod slack;
pub mod sms;
pub mod summary;

use streamgate_common::types::ActionOn;

use crate::template::{format_value, formatted_ts, TemplateVars};
use crate::ActionContext;

/// The shared substitution vocabulary every notification handler offers.
/// `on_entry`/`on_exit` are the handler's direction words ("into"/"from"
/// for email, "into"/"out of" for SMS and Slack).
pub(crate) fn base_vars(
    ctx: &ActionContext<'_>,
    on_entry: &'static str,
    on_exit: &'static str,
) -> TemplateVars {
    let on_word = match ctx.on {
        ActionOn::Entry => on_entry,
        ActionOn::Exit => on_exit,
    };
    TemplateVars::new()
        .set("label", ctx.filter.name.clone())
        .set("state", ctx.state.label.clone())
        .set("stream", ctx.point.stream_slug.clone())
        .set("device", ctx.point.device_slug.clone())
        .set("project", ctx.filter.project.clone())
        .set("on", on_word)
        .set("ts", formatted_ts(ctx.point.timestamp))
        .set("value", format_value(ctx.point.value, ctx.units))
}
