use std::fmt::Write;

use timeweave_orchestrator::{AppliedMove, Timeline, TimelineRegistry};
use timeweave_types::{
    board::Color,
    events::{EventPayload, RenderEvent, SystemEvent},
    game::{Move, Verdict},
    TimelineId,
};

pub fn format_event(event: &SystemEvent) -> String {
    let timestamp = event.timestamp.format("%H:%M:%S");
    match &event.payload {
        EventPayload::Lifecycle(lifecycle) => format!(
            "[{timestamp}] Lifecycle::{:?} {}",
            lifecycle.phase,
            lifecycle.details.clone().unwrap_or_default()
        ),
        EventPayload::Render(render) => match render {
            RenderEvent::TimelineCreated {
                id,
                parent_id,
                branch_turn,
            } => format!(
                "[{timestamp}] Timeline T{id} created (parent {}, ply {})",
                parent_id.map_or("-".to_string(), |p| format!("T{p}")),
                branch_turn.map_or("-".to_string(), |t| t.to_string())
            ),
            RenderEvent::TimelineDeleted { id } => format!("[{timestamp}] Timeline T{id} removed"),
            RenderEvent::BoardUpdated { timeline, board } => format!(
                "[{timestamp}] Board T{timeline} updated ({} pieces)",
                board.pieces().count()
            ),
            RenderEvent::MoveApplied { timeline, mv } => {
                format!("[{timestamp}] Move T{timeline} {mv}")
            }
        },
        EventPayload::Verdict(verdict) => {
            format!("[{timestamp}] Verdict {}", describe_verdict(*verdict))
        }
    }
}

pub fn describe_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Continue => "game continues".into(),
        Verdict::Win(color) => format!("{color} wins"),
        Verdict::Draw => "draw".into(),
    }
}

pub fn render_timeline(timeline: &Timeline) -> String {
    let mut out = String::new();
    let origin = match (timeline.parent_id(), timeline.branch_turn()) {
        (Some(parent), Some(turn)) => format!(", branched from T{parent} at ply {turn}"),
        _ => String::new(),
    };
    let _ = writeln!(
        out,
        "T{} [lane {:+}{origin}] ply {}, {} to move, {:?}",
        timeline.id(),
        timeline.display_offset(),
        timeline.ply(),
        timeline.side_to_move(),
        timeline.status()
    );
    let _ = writeln!(out, "{}", timeline.board());
    if let Some(last) = timeline.moves().last() {
        let _ = writeln!(out, "last: {last}");
    }
    out
}

/// Every timeline, highest lane first.
pub fn render_multiverse(registry: &TimelineRegistry) -> String {
    let mut timelines: Vec<&Timeline> = registry.iter().collect();
    timelines.sort_by(|a, b| b.display_offset().total_cmp(&a.display_offset()));
    timelines
        .into_iter()
        .map(render_timeline)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn describe_playable(color: Color, ids: &[TimelineId]) -> String {
    if ids.is_empty() {
        return format!("{color}: nothing to play");
    }
    let names: Vec<String> = ids.iter().map(|id| format!("T{id}")).collect();
    format!("{color} to move on {}", names.join(", "))
}

pub fn list_moves(moves: &[Move]) -> String {
    if moves.is_empty() {
        return "no legal moves".into();
    }
    let notation: Vec<&str> = moves.iter().map(|mv| mv.notation.as_str()).collect();
    format!("{} moves: {}", moves.len(), notation.join(" "))
}

pub fn describe_applied(applied: &AppliedMove) -> String {
    let records: Vec<String> = applied
        .records
        .iter()
        .map(|(timeline, mv)| format!("T{timeline} {mv}"))
        .collect();
    let mut line = format!("{:?}: {}", applied.class, records.join(", "));
    if let Some(id) = applied.created {
        let _ = write!(line, " (opened T{id})");
    }
    line
}
