use crate::options::Command;
use anyhow::{bail, Context, Result};
use chrono::Local;
use log::debug;
use lotbook::{
    clinometer::{AngleSample, Replay},
    Controller, FileSlots, Phase, Segment, SessionState,
};
use serde::Serialize;
use serde_json::json;
use std::fs;

impl Command {
    pub fn run(self, ctl: &mut Controller<FileSlots>, json: bool) -> Result<()> {
        debug!("running {self:?}");
        match self {
            Command::NewLot { name } => {
                let lot = ctl.new_lot(&name)?;
                emit(json, &lot, || format!("started lot {}", lot.name()))
            }
            Command::Capture { height } => {
                let seg = ctl.capture_manual(height)?;
                emit(json, &seg, || segment_line(&seg))
            }
            Command::Sight { pitch } => {
                let mut sensor = Replay::new(pitch.into_iter().map(AngleSample::new));
                let seg = ctl.capture_from(&mut sensor)?;
                emit(json, &seg, || segment_line(&seg))
            }
            Command::Calibrate { pitch } => {
                let offset = if pitch.is_empty() {
                    ctl.calibrate()?
                } else {
                    let mut sensor = Replay::new(pitch.into_iter().map(AngleSample::new));
                    ctl.calibrate_from(&mut sensor)?
                };
                emit(json, &json!({ "calibration_offset": offset }), || {
                    format!("calibration offset {offset:.1}°")
                })
            }
            Command::Edit { segment, height } => {
                let seg = ctl.edit_segment(position(segment)?, height)?;
                emit(json, &seg, || segment_line(&seg))
            }
            Command::Delete { segment } => {
                let seg = ctl.delete_segment(position(segment)?)?;
                emit(json, &seg, || format!("deleted segment {}", seg.index()))
            }
            Command::Commit => {
                let m = ctl.commit_measurement()?;
                emit(json, &m, || {
                    format!(
                        "tree {} {}: {:.2} m in {} segments",
                        m.tree_number(),
                        m.method(),
                        m.total_height(),
                        m.segments().len()
                    )
                })
            }
            Command::Next => {
                let tree = ctl.advance_tree()?;
                emit(json, &json!({ "tree": tree }), || format!("tree {tree}"))
            }
            Command::Tree { number } => {
                let discarded = ctl.change_tree(number)?;
                emit(
                    json,
                    &json!({ "tree": number, "discarded": discarded }),
                    || match discarded {
                        0 => format!("tree {number}"),
                        n => format!("tree {number}, discarded {n} uncommitted segments"),
                    },
                )
            }
            Command::Method { method } => {
                ctl.change_method(method.into())?;
                let method = ctl.state().active_method();
                emit(json, &json!({ "method": method }), || method.to_string())
            }
            Command::Distance { meters } => {
                ctl.change_distance(meters)?;
                emit(json, &json!({ "distance": meters }), || {
                    format!("distance {meters:.2} m")
                })
            }
            Command::Save => {
                let outcome = ctl.save_lot()?;
                emit(json, &json!({ "outcome": outcome }), || {
                    format!("lot {outcome:?}").to_lowercase()
                })
            }
            Command::Load { name } => {
                let tree = ctl.load_lot(&name)?;
                emit(json, &json!({ "lot": name, "tree": tree }), || {
                    format!("loaded {name} at tree {tree}")
                })
            }
            Command::DeleteLot { name } => {
                let lot = ctl.delete_lot_named(&name)?;
                emit(json, &json!({ "deleted": lot.name() }), || {
                    format!("deleted lot {}", lot.name())
                })
            }
            Command::Lots => {
                let lots = ctl.list_lots();
                emit(json, &lots, || {
                    lots.iter()
                        .map(|lot| {
                            let saved = lot.saved_at.map_or_else(
                                || "never".to_string(),
                                |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
                            );
                            format!(
                                "{}\ttrees: {}\tmeasurements: {}\tsaved: {saved}",
                                lot.name, lot.tree_count, lot.measurement_count
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
            Command::Status => {
                let status = Status::from(ctl.state());
                emit(json, &status, || status.to_string())
            }
            Command::Export { all, out } => {
                let export = if all {
                    ctl.export_archive()?
                } else {
                    ctl.export_lot()?
                };
                fs::create_dir_all(&out)?;
                let path = out.join(&export.file_name);
                fs::write(&path, &export.contents)
                    .with_context(|| format!("writing {}", path.display()))?;
                emit(json, &json!({ "path": path }), || path.display().to_string())
            }
            Command::Clear => {
                ctl.clear_all()?;
                emit(json, &json!({ "cleared": true }), || "session cleared".into())
            }
        }
    }
}

/// Converts a 1-based segment number to a ledger position.
fn position(segment: usize) -> Result<usize> {
    match segment.checked_sub(1) {
        Some(position) => Ok(position),
        None => bail!("segments are numbered from 1"),
    }
}

fn emit<T, F>(json: bool, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn segment_line(seg: &Segment) -> String {
    format!(
        "segment {}: {:.2} m (+{:.2}) {}",
        seg.index(),
        seg.cumulative_height(),
        seg.length(),
        seg.capture_method()
    )
}

#[derive(Serialize)]
struct Status<'a> {
    phase: String,
    lot: Option<&'a str>,
    tree: u32,
    method: lotbook::Method,
    distance: f64,
    eye_height: f64,
    calibration_offset: f64,
    current_angle: f64,
    live_height: f64,
    segments: &'a [Segment],
}

impl<'a> From<&'a SessionState> for Status<'a> {
    fn from(state: &'a SessionState) -> Self {
        let phase = match state.phase() {
            Phase::Idle => "idle".to_string(),
            Phase::TreeReady(method) => format!("ready {method}"),
            Phase::TreeComplete => "tree complete".to_string(),
        };
        Self {
            phase,
            lot: state.active_lot().map(|lot| lot.name()),
            tree: state.active_tree(),
            method: state.active_method(),
            distance: state.active_distance(),
            eye_height: state.eye_height(),
            calibration_offset: state.calibration_offset(),
            current_angle: state.current_angle(),
            live_height: state.live_height(),
            segments: state.ledger().segments(),
        }
    }
}

impl std::fmt::Display for Status<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "lot: {}", self.lot.unwrap_or("-"))?;
        writeln!(f, "phase: {}", self.phase)?;
        writeln!(f, "tree: {} {}", self.tree, self.method)?;
        writeln!(
            f,
            "distance: {:.2} m, eye height: {:.2} m",
            self.distance, self.eye_height
        )?;
        write!(
            f,
            "angle: {:.1}° (offset {:.1}°), live height: {:.2} m",
            self.current_angle, self.calibration_offset, self.live_height
        )?;
        for seg in self.segments {
            write!(f, "\n  {}", segment_line(seg))?;
        }
        Ok(())
    }
}
