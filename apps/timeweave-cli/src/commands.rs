use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use timeweave_orchestrator::{BoardPoint, MoveRequest};
use timeweave_types::{board::PieceKind, TimelineId};

pub const HELP: &str = "\
commands:
  move <from> <to> [promotion]    e.g. move e2 e4, move T0:g1 T1:f3
  travel <from> <to>              target needs a ply, e.g. travel T0:g1 T0@2:f3
  show [timeline]                 print every board, or one
  moves <timeline>                list legal moves
  save <name> | load <name>
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Move(MoveRequest),
    Show(Option<TimelineId>),
    Moves(TimelineId),
    Save(String),
    Load(String),
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();
        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("move" | "m", [from, to, rest @ ..]) => ConsoleCommand::Move(request(from, to, rest)?),
            ("travel" | "t", [from, to, rest @ ..]) => {
                let request = request(from, to, rest)?;
                if request.to.ply.is_none() {
                    bail!("travel needs a past board such as T0@2:{}", request.to.square);
                }
                ConsoleCommand::Move(request)
            }
            ("show" | "s", []) => ConsoleCommand::Show(None),
            ("show" | "s", [id]) => ConsoleCommand::Show(Some(timeline(id)?)),
            ("moves", [id]) => ConsoleCommand::Moves(timeline(id)?),
            ("save", [name]) => ConsoleCommand::Save(name.to_string()),
            ("load", [name]) => ConsoleCommand::Load(name.to_string()),
            ("help" | "?", []) => ConsoleCommand::Help,
            ("quit" | "exit" | "q", []) => ConsoleCommand::Quit,
            _ => bail!("could not understand '{line}'; type help"),
        };
        Ok(command)
    }
}

fn request(from: &str, to: &str, rest: &[&str]) -> Result<MoveRequest> {
    let from: BoardPoint = from.parse()?;
    let to: BoardPoint = to.parse()?;
    let promotion = match rest {
        [] => None,
        [piece] => Some(promotion(piece)?),
        _ => bail!("too many arguments"),
    };
    Ok(MoveRequest::new(from, to).with_promotion(promotion))
}

fn promotion(text: &str) -> Result<PieceKind> {
    let letter = text.trim_start_matches('=');
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => PieceKind::from_letter(c)
            .filter(|kind| kind.is_promotion_target())
            .ok_or_else(|| anyhow!("cannot promote to '{text}'")),
        _ => Err(anyhow!("cannot promote to '{text}'")),
    }
}

fn timeline(text: &str) -> Result<TimelineId> {
    text.trim_start_matches(['T', 't'])
        .parse()
        .map_err(|_| anyhow!("'{text}' is not a timeline id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeweave_types::board::Square;

    #[test]
    fn parses_board_moves_with_promotion() {
        let command: ConsoleCommand = "move e7 e8 =N".parse().unwrap();
        let ConsoleCommand::Move(request) = command else {
            panic!("expected a move");
        };
        assert_eq!(request.from, BoardPoint::current(0, Square::parse("e7").unwrap()));
        assert_eq!(request.promotion, Some(PieceKind::Knight));
    }

    #[test]
    fn travel_requires_a_ply() {
        assert!("travel T0:g1 T0:f3".parse::<ConsoleCommand>().is_err());
        let command: ConsoleCommand = "travel T0:g1 T0@2:f3".parse().unwrap();
        let ConsoleCommand::Move(request) = command else {
            panic!("expected a move");
        };
        assert_eq!(request.to.ply, Some(2));
    }

    #[test]
    fn simple_commands() {
        assert_eq!("show".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Show(None));
        assert_eq!("show T3".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Show(Some(3)));
        assert_eq!("moves 1".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Moves(1));
        assert_eq!(
            "save opening".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Save("opening".into())
        );
        assert_eq!("quit".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
        assert!("move e2".parse::<ConsoleCommand>().is_err());
        assert!("move e2 e4 K".parse::<ConsoleCommand>().is_err());
        assert!("dance".parse::<ConsoleCommand>().is_err());
    }
}
