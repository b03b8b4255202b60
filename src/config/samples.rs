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
use serde::Deserialize;

use crate::samples::{SampleLocation, DEFAULT_SAMPLE_LOCATION};

/// Where piano samples are loaded from.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Samples {
    /// A base URL or a local directory holding the sample files.
    location: Option<String>,
}

impl Samples {
    pub fn new(location: &str) -> Samples {
        Samples {
            location: Some(location.to_string()),
        }
    }

    /// Returns the sample location, defaulting to the public Salamander set.
    pub fn location(&self) -> SampleLocation {
        SampleLocation::parse(self.location.as_deref().unwrap_or(DEFAULT_SAMPLE_LOCATION))
    }
}
