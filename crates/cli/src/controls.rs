//! Line-based control surface read from stdin while the loop runs.

use std::io::BufRead;

use crossbeam_channel::Sender;

use faceshape_core::detection::domain::detector_factory::ModelId;
use faceshape_core::detection::domain::runtime::Backend;
use faceshape_core::pipeline::config_state::ConfigChange;

pub const HELP: &str = "commands: model <face-mesh|face-mesh-refined>, backend <auto|cpu|coreml|directml>, \
threads <n>, optimize <on|off>, size <WxH>, fps <n>, mesh <on|off>, box <on|off>, flip <on|off>, retry, quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Change(ConfigChange),
    Quit,
}

/// Parses one command line. Blank lines yield `Ok(None)`.
pub fn parse_control(line: &str) -> Result<Option<Control>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for '{command}'"));
    }

    let change = match (command, arg) {
        ("quit" | "exit", None) => return Ok(Some(Control::Quit)),
        ("retry", None) => ConfigChange::Retry,
        ("model", Some(v)) => ConfigChange::Model(v.parse::<ModelId>()?),
        ("backend", Some(v)) => ConfigChange::Backend(v.parse::<Backend>()?),
        ("threads", Some(v)) => ConfigChange::IntraThreads(parse_number(v)?),
        ("optimize", Some(v)) => ConfigChange::OptimizeGraph(parse_switch(v)?),
        ("size", Some(v)) => {
            let (width, height) = parse_size(v)?;
            ConfigChange::CaptureSize { width, height }
        }
        ("fps", Some(v)) => ConfigChange::TargetFps(parse_number(v)?),
        ("mesh", Some(v)) => ConfigChange::ShowMesh(parse_switch(v)?),
        ("box", Some(v)) => ConfigChange::ShowBoundingBox(parse_switch(v)?),
        ("flip", Some(v)) => ConfigChange::FlipHorizontal(parse_switch(v)?),
        _ => return Err(format!("unrecognized command '{}'; {HELP}", line.trim())),
    };
    Ok(Some(Control::Change(change)))
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("expected a non-negative integer, got '{value}'"))
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(format!("expected on or off, got '{value}'")),
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = parse_number(w)?;
    let height: u32 = parse_number(h)?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got '{value}'"));
    }
    Ok((width, height))
}

/// Forwards parsed commands until `quit` or end of input.
pub fn forward_controls(
    input: impl BufRead,
    changes: &Sender<ConfigChange>,
    shutdown: &Sender<()>,
) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_control(&line) {
            Ok(Some(Control::Change(change))) => {
                if changes.send(change).is_err() {
                    break;
                }
            }
            Ok(Some(Control::Quit)) => {
                let _ = shutdown.send(());
                break;
            }
            Ok(None) => {}
            Err(e) => eprintln!("{e}"),
        }
    }
}
