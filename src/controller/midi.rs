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
use std::{io, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{debug, error, info, span, Instrument, Level};

use super::Event;
use crate::keys::{HIGHEST_MIDI, LOWEST_MIDI};
use crate::midi::Device;

/// Channel volume.
const CC_VOLUME: u8 = 7;
/// All Sound Off.
const CC_ALL_SOUND_OFF: u8 = 120;
/// All Notes Off.
const CC_ALL_NOTES_OFF: u8 = 123;

/// A controller that plays the piano from a MIDI keyboard.
pub struct Driver {
    /// The MIDI device.
    midi_device: Arc<dyn Device>,
    /// Zero-based channel to listen to, or every channel.
    channel: Option<u8>,
}

impl Driver {
    pub fn new(midi_device: Arc<dyn Device>, channel: Option<u8>) -> Driver {
        Driver {
            midi_device,
            channel,
        }
    }
}

/// Maps a raw MIDI message to a controller event. Notes outside the keyboard
/// and unrelated messages map to nothing.
pub fn event_for(raw_event: &[u8], channel_filter: Option<u8>) -> Option<Event> {
    let LiveEvent::Midi { channel, message } = LiveEvent::parse(raw_event).ok()? else {
        return None;
    };
    if channel_filter.is_some_and(|filter| filter != channel.as_int()) {
        return None;
    }

    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
            key_index(key.as_int()).map(Event::Press)
        }
        // Note On with zero velocity is a release.
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            key_index(key.as_int()).map(Event::Release)
        }
        MidiMessage::Controller { controller, value } => match controller.as_int() {
            CC_VOLUME => Some(Event::Volume(value.as_int() as f32 / 127.0)),
            CC_ALL_SOUND_OFF | CC_ALL_NOTES_OFF => Some(Event::StopAll),
            _ => None,
        },
        _ => None,
    }
}

fn key_index(midi: u8) -> Option<u8> {
    (LOWEST_MIDI..=HIGHEST_MIDI)
        .contains(&midi)
        .then(|| midi - LOWEST_MIDI)
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(64);
        let device = self.midi_device.clone();
        let channel = self.channel;

        let span = span!(Level::INFO, "MIDI driver");
        let watch_span = span.clone();
        tokio::task::spawn_blocking(move || {
            let _enter = watch_span.enter();
            info!(device = device.name(), "MIDI driver started.");

            if let Err(e) = device.watch_events(midi_events_tx) {
                error!(err = e.to_string(), "Error watching MIDI events");
            }
        });

        let device = self.midi_device.clone();
        tokio::spawn(
            async move {
                while let Some(raw_event) = midi_events_rx.recv().await {
                    let Some(event) = event_for(&raw_event, channel) else {
                        continue;
                    };
                    debug!(event = format!("{:?}", event), "Mapped MIDI event.");
                    if events_tx.send(event).await.is_err() {
                        info!("Controller closed.");
                        break;
                    }
                }

                info!("MIDI watcher closed.");
                device.stop_watch_events();
                Ok(())
            }
            .instrument(span),
        )
    }
}
