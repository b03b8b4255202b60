// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::config::parse_duration;
use crate::keys::parse_note;

const PRESS: &str = "press";
const RELEASE: &str = "release";
const VOLUME: &str = "volume";
const DECAY: &str = "decay";
const STOP: &str = "stop";

/// A controller that plays the piano from lines typed on stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command and forwards its event. Returns false at end of input.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <note>, {} <note>, {} <0-1>, {} <duration>, {}): ",
            PRESS, RELEASE, VOLUME, DECAY, STOP,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match parse_command(&input) {
            Ok(event) => events_tx
                .blocking_send(event)
                .map_err(io::Error::other)?,
            Err(reason) => warn!(input = input.trim(), reason = %reason, "Unrecognized input"),
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

/// Parses a command such as "press C4" or "volume 0.5".
fn parse_command(input: &str) -> Result<Event, String> {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next();

    let required = || argument.ok_or_else(|| format!("{} needs an argument", command));
    match command.as_str() {
        PRESS => parse_note(required()?)
            .map(|note| Event::Press(note.key_index()))
            .map_err(|e| e.to_string()),
        RELEASE => parse_note(required()?)
            .map(|note| Event::Release(note.key_index()))
            .map_err(|e| e.to_string()),
        VOLUME => required()?
            .parse::<f32>()
            .map(Event::Volume)
            .map_err(|e| e.to_string()),
        DECAY => parse_duration(required()?)
            .map(Event::Decay)
            .map_err(|e| e.to_string()),
        STOP => Ok(Event::StopAll),
        other => Err(format!("unknown command {}", other)),
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn get_event(event: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(event.as_bytes());
        let writer = BufWriter::new(Vec::new());
        assert!(Driver::monitor_io(&sender, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Event::Press(39), get_event("press C4")?.unwrap());
        assert_eq!(Event::Press(40), get_event("PRESS Db4\n")?.unwrap());
        assert_eq!(Event::Release(0), get_event("release 0")?.unwrap());
        assert_eq!(Event::Volume(0.5), get_event("volume 0.5")?.unwrap());
        assert_eq!(
            Event::Decay(Duration::from_millis(800)),
            get_event("decay 800ms")?.unwrap()
        );
        assert_eq!(Event::StopAll, get_event("stop")?.unwrap());
        Ok(())
    }

    #[test]
    fn test_unrecognized_input() -> Result<(), io::Error> {
        assert_eq!(None, get_event("unrecognized")?);
        assert_eq!(None, get_event("press")?);
        assert_eq!(None, get_event("press Q9")?);
        assert_eq!(None, get_event("press C2147483647")?);
        assert_eq!(None, get_event("volume loud")?);
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_end_of_input() -> Result<(), io::Error> {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        let reader = BufReader::new("".as_bytes());
        let writer = BufWriter::new(Vec::new());
        assert!(!Driver::monitor_io(&sender, reader, writer)?);
        Ok(())
    }
}
