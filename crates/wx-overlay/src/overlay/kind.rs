// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Live overlay layer categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverlayKind {
    Lightning,
    Radar,
    Satellite,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 3] = [
        OverlayKind::Lightning,
        OverlayKind::Radar,
        OverlayKind::Satellite,
    ];

    /// Frame-index list backing this kind, if it has one
    #[must_use]
    pub fn frame_kind(self) -> Option<FrameKind> {
        match self {
            OverlayKind::Lightning => None,
            OverlayKind::Radar => Some(FrameKind::Radar),
            OverlayKind::Satellite => Some(FrameKind::Satellite),
        }
    }

    /// Label shown in the layer control
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            OverlayKind::Lightning => "Live Lightning",
            OverlayKind::Radar => "Live Radar",
            OverlayKind::Satellite => "Live Satellite Cloud",
        }
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayKind::Lightning => write!(f, "lightning"),
            OverlayKind::Radar => write!(f, "radar"),
            OverlayKind::Satellite => write!(f, "satellite"),
        }
    }
}

/// Overlay kinds that are resolved through the frame index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Radar,
    Satellite,
}

impl FrameKind {
    #[must_use]
    pub fn overlay_kind(self) -> OverlayKind {
        match self {
            FrameKind::Radar => OverlayKind::Radar,
            FrameKind::Satellite => OverlayKind::Satellite,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.overlay_kind().fmt(f)
    }
}
