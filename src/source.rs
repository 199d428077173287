use anyhow::{bail, Result};
use std::{fmt, path::PathBuf, str::FromStr};
use tokio::fs;
use tracing::info;

use crate::RosterErrors;

/// Where a roster export is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterSource {
    Path(PathBuf),
    Url(String),
}

impl RosterSource {
    /// Fetches the raw CSV text.
    pub async fn fetch(&self) -> Result<String> {
        info!("fetching roster from {self}");
        match self {
            RosterSource::Path(path) => match fs::read_to_string(path).await {
                Ok(text) => Ok(text),
                Err(err) => bail!(RosterErrors::SourceUnavailable(
                    self.to_string(),
                    err.to_string()
                )),
            },
            RosterSource::Url(url) => {
                let resp = match reqwest::get(url).await {
                    Ok(resp) => resp,
                    Err(err) => bail!(RosterErrors::SourceUnavailable(
                        url.clone(),
                        err.to_string()
                    )),
                };
                let status = resp.status();
                if !status.is_success() {
                    bail!(RosterErrors::BadStatus(url.clone(), status.as_u16()));
                }
                resp.text().await.map_err(|err| {
                    RosterErrors::SourceUnavailable(url.clone(), err.to_string()).into()
                })
            }
        }
    }
}

impl FromStr for RosterSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(RosterSource::Url(s.to_owned()))
        } else {
            Ok(RosterSource::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for RosterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterSource::Path(path) => write!(f, "{}", path.display()),
            RosterSource::Url(url) => f.write_str(url),
        }
    }
}
