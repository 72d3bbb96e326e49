//! Validated run configuration

use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Highest accepted zoom level.
pub const MAX_ZOOM: u8 = 20;

/// Zoom level assumed by [`RunConfig::zoom_or_default`] when none was given.
pub const DEFAULT_ZOOM: u8 = 14;

/// An invalid command line configuration. Never produced by the decoder or the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingInput,
    ZoomOutOfRange { zoom: u32, max: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::MissingInput => write!(f, "no input file given"),
            ConfigError::ZoomOutOfRange { zoom, max } => {
                write!(f, "zoom level {zoom} is out of range 0..={max}")
            }
        }
    }
}

impl StdError for ConfigError {}

/// Everything a run needs: the extract to read and the requested zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    input_path: PathBuf,
    zoom: Option<u8>,
}

impl RunConfig {
    /// Validates the inputs of a run.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZoomOutOfRange`] if `zoom` exceeds [`MAX_ZOOM`].
    ///
    /// # Example
    /// ```
    /// use phaeton::*;
    ///
    /// let config = RunConfig::new("tests/extract.osm.pbf", Some(12)).unwrap();
    /// assert_eq!(config.zoom(), Some(12));
    /// assert!(RunConfig::new("tests/extract.osm.pbf", Some(21)).is_err());
    /// ```
    pub fn new<P: Into<PathBuf>>(input_path: P, zoom: Option<u32>) -> Result<Self, ConfigError> {
        let zoom = zoom
            .map(|zoom| match u8::try_from(zoom) {
                Ok(z) if z <= MAX_ZOOM => Ok(z),
                _ => Err(ConfigError::ZoomOutOfRange {
                    zoom,
                    max: MAX_ZOOM,
                }),
            })
            .transpose()?;

        Ok(RunConfig {
            input_path: input_path.into(),
            zoom,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// The zoom level as given on the command line.
    pub fn zoom(&self) -> Option<u8> {
        self.zoom
    }

    pub fn zoom_or_default(&self) -> u8 {
        self.zoom.unwrap_or(DEFAULT_ZOOM)
    }
}
