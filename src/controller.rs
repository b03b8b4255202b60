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
use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::config;
use crate::engine::{PianoEngine, SettingsUpdate};
use crate::keys::note_for_key;

pub mod keyboard;
pub mod midi;

/// Controller events that will trigger behavior in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Presses the key with the given index.
    Press(u8),

    /// Releases the key with the given index.
    Release(u8),

    /// Sets the master volume (0.0 to 1.0).
    Volume(f32),

    /// Sets the release time for notes released from now on.
    Decay(Duration),

    /// Releases every sounding key.
    StopAll,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Builds the driver described by the configuration.
pub fn driver(config: &config::Controller) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    Ok(match config {
        config::Controller::Keyboard => Arc::new(keyboard::Driver::new()),
        config::Controller::Midi(midi_config) => {
            let channel = midi_config.channel()?;
            let device = crate::midi::get_device(midi_config.device())?;
            Arc::new(midi::Driver::new(device, channel))
        }
    })
}

/// Plays the engine from a driver's events.
pub struct Controller {
    handle: JoinHandle<PianoEngine>,
}

impl Controller {
    /// Creates a new controller with the given driver. The controller owns the engine
    /// until the driver closes.
    pub fn new(engine: PianoEngine, driver: Arc<dyn Driver>) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(Controller::trigger_events(engine, driver).instrument(span)),
        }
    }

    /// Join will wait until the driver closes, returning the engine.
    pub async fn join(&mut self) -> Result<PianoEngine, JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine operations by watching the driver and getting events from it.
    async fn trigger_events(mut engine: PianoEngine, driver: Arc<dyn Driver>) -> PianoEngine {
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            debug!(event = format!("{:?}", event), "Received event.");

            // Every interaction is a chance to open or resume the output.
            if let Err(e) = engine.init() {
                error!(err = %e, "Unable to initialize audio");
            }
            Controller::apply(&mut engine, event);
        }

        info!("Controller closing.");
        engine.stop_all();
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(err = %e, "Driver stopped with an error"),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
        engine
    }

    fn apply(engine: &mut PianoEngine, event: Event) {
        match event {
            Event::Press(key) => match note_for_key(key) {
                Some(note) => engine.play_note(&note),
                None => warn!(key, "Key is not on the keyboard"),
            },
            Event::Release(key) => engine.stop_note(key),
            Event::Volume(volume) => engine.update_settings(SettingsUpdate::volume(volume)),
            Event::Decay(decay) => engine.update_settings(SettingsUpdate::decay(decay)),
            Event::StopAll => engine.stop_all(),
        }
    }
}
