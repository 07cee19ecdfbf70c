/// Value objects for the catalog domain
use serde::{Deserialize, Serialize};

/// Reading direction of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Horizontal,
    Vertical,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Horizontal => "horizontal",
            Direction::Vertical => "vertical",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "horizontal" => Ok(Direction::Horizontal),
            "vertical" => Ok(Direction::Vertical),
            _ => Err(format!("Invalid direction: {}", s)),
        }
    }
}

/// Download state of a single chapter in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    NotDownloaded,
    Downloaded,
    Archived,
    Ignored,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::NotDownloaded => "not_downloaded",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Archived => "archived",
            DownloadStatus::Ignored => "ignored",
        }
    }

    /// Whether the chapter still needs its pages fetched
    pub fn needs_download(&self) -> bool {
        matches!(self, DownloadStatus::NotDownloaded)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_downloaded" => Ok(DownloadStatus::NotDownloaded),
            "downloaded" => Ok(DownloadStatus::Downloaded),
            "archived" => Ok(DownloadStatus::Archived),
            "ignored" => Ok(DownloadStatus::Ignored),
            _ => Err(format!("Invalid download status: {}", s)),
        }
    }
}
