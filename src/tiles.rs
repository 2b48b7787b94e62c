//! PMTiles generation through the external `tippecanoe` tool.

use std::ffi::OsString;
use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::error::{Error, Result};

pub const ATTRIBUTION: &str = concat!(
    "<a href=\"https://findtransportdata.dft.gov.uk/\" target=\"_blank\">DfT</a>",
    " via <a href=\"https://github.com/dzfranklin/naptan-map\">naptan-map</a>"
);

/// Tileset metadata and the program used to build it.
#[derive(Debug, Clone)]
pub struct TileBuilder {
    pub program: String,
    pub name: String,
    pub description: String,
    pub attribution: String,
    pub layer: String,
}

impl Default for TileBuilder {
    fn default() -> Self {
        Self {
            program: "tippecanoe".to_string(),
            name: "Bus Stops (UK)".to_string(),
            description: "Active bus stops in England, Scotland, and Wales".to_string(),
            attribution: ATTRIBUTION.to_string(),
            layer: "default".to_string(),
        }
    }
}

impl TileBuilder {
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(18);
        args.push("--output".into());
        args.push(output.into());
        args.push("--force".into());
        for (flag, value) in [
            ("--name", &self.name),
            ("--description", &self.description),
            ("--attribution", &self.attribution),
            ("--layer", &self.layer),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }
        for flag in [
            "--generate-ids",
            "-zg",
            "--extend-zooms-if-still-dropping",
            "--no-tile-stats",
        ] {
            args.push(flag.into());
        }
        args.push(input.into());
        args
    }

    /// Builds `output` from the GeoJSON at `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TileBuild`] if the program cannot be started or exits
    /// with a failure status.
    #[tracing::instrument(skip(self), fields(program = %self.program, input = %input.display(), output = %output.display()))]
    pub async fn build(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Generating tiles");
        let status = Command::new(&self.program)
            .args(self.args(input, output))
            .status()
            .await
            .map_err(|e| Error::TileBuild(format!("could not run {}: {e}", self.program)))?;

        if !status.success() {
            return Err(Error::TileBuild(format!("{} exited with {status}", self.program)));
        }

        info!("Wrote tiles");
        Ok(())
    }
}
