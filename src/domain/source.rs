use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{DomainError, DomainResult};

/// Tipos de fuente seleccionables, en el orden del radio de la barra lateral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Video,
    Webcam,
    YouTube,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] =
        [SourceKind::Image, SourceKind::Video, SourceKind::Webcam, SourceKind::YouTube];

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Image => "Image",
            SourceKind::Video => "Video",
            SourceKind::Webcam => "Webcam",
            SourceKind::YouTube => "YouTube",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(SourceKind::Image),
            "video" => Ok(SourceKind::Video),
            "webcam" => Ok(SourceKind::Webcam),
            "youtube" => Ok(SourceKind::YouTube),
            other => Err(DomainError::InvalidSelection(format!("unknown source '{other}'"))),
        }
    }
}

/// Fuente activa en un ciclo de render, con su carga útil.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSelection {
    Image { upload: Option<Vec<u8>>, detect: bool },
    Video { name: String },
    Webcam { device: Option<String> },
    YouTube { url: String },
}

impl SourceSelection {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSelection::Image { .. } => SourceKind::Image,
            SourceSelection::Video { .. } => SourceKind::Video,
            SourceSelection::Webcam { .. } => SourceKind::Webcam,
            SourceSelection::YouTube { .. } => SourceKind::YouTube,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_listed_source() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.label().parse::<SourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_source_is_invalid_selection() {
        let err = "rtsp".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidSelection(_)));
        assert_eq!(err.kind(), "invalid_selection");
    }
}
