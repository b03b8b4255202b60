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
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, span, warn, Instrument, Level};

use super::catalog::{CatalogEntry, SALAMANDER};
use crate::audio::decode::{decode, DecodeError};
use crate::audio::AudioBuffer;

/// Where the Salamander samples are served from by default.
pub const DEFAULT_SAMPLE_LOCATION: &str = "https://tonejs.github.io/audio/salamander/";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffers that have finished loading, tagged with their MIDI pitch.
pub type LoadedReceiver = crossbeam_channel::Receiver<(u8, AudioBuffer)>;
type LoadedSender = crossbeam_channel::Sender<(u8, AudioBuffer)>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A base URL or a local directory holding the sample files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleLocation {
    Remote(String),
    Local(PathBuf),
}

impl SampleLocation {
    /// URLs beginning with http:// or https:// are remote; anything else is a directory.
    pub fn parse(location: &str) -> SampleLocation {
        if location.starts_with("http://") || location.starts_with("https://") {
            let mut base = location.to_string();
            if !base.ends_with('/') {
                base.push('/');
            }
            SampleLocation::Remote(base)
        } else {
            SampleLocation::Local(PathBuf::from(location))
        }
    }
}

impl Default for SampleLocation {
    fn default() -> Self {
        SampleLocation::parse(DEFAULT_SAMPLE_LOCATION)
    }
}

impl fmt::Display for SampleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleLocation::Remote(base) => write!(f, "{}", base),
            SampleLocation::Local(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Reads sample files from a location.
#[derive(Clone)]
enum Fetcher {
    Remote { client: reqwest::Client, base: String },
    Local(PathBuf),
}

impl Fetcher {
    fn new(location: &SampleLocation) -> Result<Fetcher, LoadError> {
        Ok(match location {
            SampleLocation::Remote(base) => Fetcher::Remote {
                client: reqwest::Client::builder()
                    .user_agent(concat!("ivory/", env!("CARGO_PKG_VERSION")))
                    .timeout(FETCH_TIMEOUT)
                    .build()?,
                base: base.clone(),
            },
            SampleLocation::Local(dir) => Fetcher::Local(dir.clone()),
        })
    }

    async fn fetch(&self, file: &str) -> Result<Vec<u8>, LoadError> {
        match self {
            Fetcher::Remote { client, base } => {
                let url = format!("{}{}", base, file);
                let response = client.get(&url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            Fetcher::Local(dir) => Ok(tokio::fs::read(dir.join(file)).await?),
        }
    }
}

/// Loads the sample catalog in the background. Buffers are delivered over a
/// channel as each one finishes; loading runs at most once.
pub struct SampleLoader {
    location: SampleLocation,
    loaded_tx: Option<LoadedSender>,
    finished_tx: Option<watch::Sender<bool>>,
    finished_rx: watch::Receiver<bool>,
}

impl SampleLoader {
    /// Creates a loader and the receiving end for its buffers.
    pub fn new(location: SampleLocation) -> (SampleLoader, LoadedReceiver) {
        let (loaded_tx, loaded_rx) = crossbeam_channel::unbounded();
        let (finished_tx, finished_rx) = watch::channel(false);
        (
            SampleLoader {
                location,
                loaded_tx: Some(loaded_tx),
                finished_tx: Some(finished_tx),
                finished_rx,
            },
            loaded_rx,
        )
    }

    pub fn location(&self) -> &SampleLocation {
        &self.location
    }

    /// Whether loading has been kicked off.
    pub fn is_started(&self) -> bool {
        self.loaded_tx.is_none()
    }

    /// Flips to true once every catalog entry has loaded or failed.
    pub fn finished(&self) -> watch::Receiver<bool> {
        self.finished_rx.clone()
    }

    /// Starts loading every catalog entry on the given runtime without waiting
    /// for any of them. Returns false if loading was already started.
    pub fn start(&mut self, runtime: &Handle) -> bool {
        let (Some(loaded_tx), Some(finished_tx)) = (self.loaded_tx.take(), self.finished_tx.take())
        else {
            return false;
        };

        let fetcher = match Fetcher::new(&self.location) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                warn!(err = %e, location = %self.location, "Unable to load samples");
                let _ = finished_tx.send(true);
                return true;
            }
        };

        info!(
            location = %self.location,
            samples = SALAMANDER.len(),
            "Loading piano samples."
        );

        let span = span!(Level::INFO, "sample loader");
        runtime.spawn(
            async move {
                let mut tasks = JoinSet::new();
                for entry in SALAMANDER.iter() {
                    let fetcher = fetcher.clone();
                    tasks.spawn(async move {
                        let result = load_entry(&fetcher, entry).await;
                        (entry, result)
                    });
                }

                let mut loaded = 0usize;
                let mut failed = 0usize;
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok((entry, Ok(buffer))) => {
                            debug!(
                                sample = entry.name,
                                midi = entry.midi,
                                frames = buffer.frames(),
                                "Sample loaded"
                            );
                            loaded += 1;
                            // The engine may already be gone.
                            let _ = loaded_tx.send((entry.midi, buffer));
                        }
                        Ok((entry, Err(e))) => {
                            warn!(sample = entry.name, file = entry.file, err = %e, "Failed to load sample");
                            failed += 1;
                        }
                        Err(e) => {
                            warn!(err = %e, "Sample load task failed");
                            failed += 1;
                        }
                    }
                }

                info!(loaded, failed, "All samples loaded");
                let _ = finished_tx.send(true);
            }
            .instrument(span),
        );

        true
    }
}

async fn load_entry(fetcher: &Fetcher, entry: &CatalogEntry) -> Result<AudioBuffer, LoadError> {
    let bytes = fetcher.fetch(entry.file).await?;
    let extension = Path::new(entry.file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string);
    let buffer = tokio::task::spawn_blocking(move || decode(bytes, extension.as_deref())).await??;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            SampleLocation::parse("https://example.com/piano"),
            SampleLocation::Remote("https://example.com/piano/".to_string())
        );
        assert_eq!(
            SampleLocation::parse("http://example.com/"),
            SampleLocation::Remote("http://example.com/".to_string())
        );
        assert_eq!(
            SampleLocation::parse("/srv/samples"),
            SampleLocation::Local(PathBuf::from("/srv/samples"))
        );
        assert_eq!(
            SampleLocation::default().to_string(),
            DEFAULT_SAMPLE_LOCATION
        );
    }

    #[tokio::test]
    async fn test_load_directory_with_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["C4.mp3", "A4.mp3", "Ds1.mp3"] {
            write_wav(&dir.path().join(file), 1, 44100, 441).unwrap();
        }
        // Present but undecodable.
        std::fs::write(dir.path().join("C5.mp3"), b"not audio").unwrap();

        let (mut loader, loaded_rx) =
            SampleLoader::new(SampleLocation::Local(dir.path().to_path_buf()));
        let mut finished = loader.finished();
        assert!(!loader.is_started());
        assert!(loader.start(&Handle::current()));
        assert!(loader.is_started());
        assert!(!loader.start(&Handle::current()));

        finished.wait_for(|done| *done).await.unwrap();

        let mut pitches: Vec<u8> = loaded_rx.try_iter().map(|(midi, _)| midi).collect();
        pitches.sort();
        assert_eq!(pitches, vec![27, 60, 69]);
    }
}
