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
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use ivory::audio;
use ivory::config;
use ivory::controller::{self, Controller};
use ivory::engine::{PianoEngine, Settings, STOP_MARGIN};
use ivory::keys::{self, KeyColor};
use ivory::midi;
use ivory::samples::{SampleLocation, SALAMANDER};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=sample-backed virtual piano

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/ivory
ExecStart=/usr/local/bin/ivory start "$IVORY_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=ivory.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample-backed virtual piano."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the 88 keys and the samples that cover them.
    Keys {},
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Plays a sequence of notes through the audio interface.
    Play {
        /// The device name to play through. "default" uses the default output.
        device_name: String,
        /// The notes to play, as names (C4, F#3, Bb2) or key indexes (0-87).
        #[arg(required = true)]
        notes: Vec<String>,
        /// How long each note is held.
        #[arg(long, default_value = "500ms")]
        hold: String,
        /// Where to load samples from: a base URL or a local directory.
        #[arg(short, long)]
        samples: Option<String>,
        /// Wait for every sample to load before playing.
        #[arg(short, long)]
        wait_for_samples: bool,
    },
    /// Start will play the piano from the configured controller.
    Start {
        /// The path to the piano config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keys {} => {
            println!("Keys:");
            for key in keys::generate_keys() {
                let color = match key.color() {
                    KeyColor::White => "white",
                    KeyColor::Black => "black",
                };
                let sample = SALAMANDER
                    .iter()
                    .find(|entry| entry.midi == key.midi())
                    .map(|entry| format!(" [sample {}]", entry.file))
                    .unwrap_or_default();
                println!("- {} {:.2} Hz {}{}", key, key.frequency(), color, sample);
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            device_name,
            notes,
            hold,
            samples,
            wait_for_samples,
        } => {
            let hold = config::parse_duration(&hold)?;
            let notes = notes
                .iter()
                .map(|note| keys::parse_note(note))
                .collect::<Result<Vec<_>, _>>()?;

            let device = audio::get_device(&config::Audio::new(&device_name))?;
            let location = samples
                .map(|samples| SampleLocation::parse(&samples))
                .unwrap_or_default();
            let mut engine =
                PianoEngine::new(device, location, Settings::default(), Handle::current());
            engine.init()?;

            if wait_for_samples {
                engine.loading_finished().wait_for(|done| *done).await?;
            }

            for note in notes {
                println!("Playing {}", note);
                engine.play_note(&note);
                tokio::time::sleep(hold).await;
                engine.stop_note(note.key_index());
            }

            // Let the last release ring out.
            tokio::time::sleep(engine.settings().decay() + STOP_MARGIN).await;
        }
        Commands::Start { config_path } => {
            let piano = config::Piano::load(&PathBuf::from(config_path))?;
            let device = audio::get_device(piano.audio())?;
            let engine = PianoEngine::new(
                device,
                piano.samples().location(),
                piano.settings().to_settings()?,
                Handle::current(),
            );
            let driver = controller::driver(piano.controller())?;

            let mut controller = Controller::new(engine, driver);
            controller.join().await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE);
        }
    }

    Ok(())
}
